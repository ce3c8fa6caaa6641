use gpui::*;
use gpui_component::{Root, TitleBar};
use tracing_subscriber::EnvFilter;

use agent_chat::app::{AgentChatShell, Backend, Quit, load_client_config};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = load_client_config();
    let endpoint = config.base_url.clone();
    let backend = match Backend::from_config(config) {
        Ok(backend) => backend,
        Err(error) => {
            tracing::error!(error = %error, "agent chat cannot start");
            std::process::exit(1);
        }
    };

    let app = Application::new().with_assets(gpui_component_assets::Assets);

    app.run(move |cx| {
        gpui_tokio_bridge::init(cx);

        // Root and themes need gpui-component registered first.
        gpui_component::init(cx);

        cx.on_action(|_: &Quit, cx| {
            cx.quit();
        });
        cx.bind_keys([KeyBinding::new("cmd-q", Quit, None)]);

        cx.spawn(async move |cx| {
            cx.update(|cx| {
                let options = WindowOptions {
                    window_bounds: Some(WindowBounds::Windowed(Bounds::centered(
                        None,
                        size(px(900.), px(760.)),
                        cx,
                    ))),
                    titlebar: Some(TitleBar::title_bar_options()),
                    #[cfg(any(target_os = "linux", target_os = "freebsd"))]
                    window_decorations: Some(WindowDecorations::Client),
                    #[cfg(not(any(target_os = "linux", target_os = "freebsd")))]
                    window_decorations: None,
                    ..Default::default()
                };

                let opened = cx.open_window(options, |window, cx| {
                    let shell =
                        cx.new(|cx| AgentChatShell::new(backend, endpoint, window, cx));
                    cx.new(|cx| Root::new(shell, window, cx))
                });
                if let Err(error) = opened {
                    tracing::error!(error = %error, "failed to open main window");
                    cx.quit();
                    return;
                }

                cx.activate(true);
            })
        })
        .detach();
    });
}
