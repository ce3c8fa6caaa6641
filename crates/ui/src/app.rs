use std::sync::Arc;

use agent_chat_session::{AgentService, EventChannel, TurnState};
use agent_chat_transport::{ClientConfig, HttpAgentService, SseEventChannel, TransportError};
use gpui::*;
use gpui_component::{ActiveTheme, TitleBar, h_flex, v_flex};
use snafu::{ResultExt, Snafu};

use crate::chat::ChatView;

gpui::actions!(shell, [Quit]);

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("failed to build agent backend on `{stage}`: {source}"))]
    Backend {
        stage: &'static str,
        source: TransportError,
    },
}

pub type AppResult<T> = Result<T, AppError>;

/// Service and channel the chat view talks to.
#[derive(Clone)]
pub struct Backend {
    pub service: Arc<dyn AgentService>,
    pub channel: Arc<dyn EventChannel>,
    pub channel_name: String,
}

impl Backend {
    pub fn from_config(config: ClientConfig) -> AppResult<Self> {
        let channel_name = config.channel.clone();
        let channel = SseEventChannel::new(config.clone()).context(BackendSnafu {
            stage: "build-event-channel",
        })?;
        let service = HttpAgentService::new(config).context(BackendSnafu {
            stage: "build-agent-service",
        })?;

        Ok(Self {
            service: Arc::new(service),
            channel: Arc::new(channel),
            channel_name,
        })
    }
}

/// Loads the client config, falling back to defaults when the file is unreadable.
pub fn load_client_config() -> ClientConfig {
    match ClientConfig::load() {
        Ok(config) => config,
        Err(error) => {
            tracing::warn!(error = %error, "failed to load client config, using defaults");
            ClientConfig::default()
        }
    }
}

fn turn_label(turn: TurnState) -> &'static str {
    match turn {
        TurnState::Idle => "Ready",
        TurnState::Sending => "Sending",
        TurnState::Streaming => "Agent working",
    }
}

fn status_badge_text(turn: TurnState, session_label: &str) -> String {
    format!("{} · {session_label}", turn_label(turn))
}

/// Window root: a title bar with the endpoint and session status, above the chat view.
pub struct AgentChatShell {
    chat_view: Entity<ChatView>,
    endpoint: SharedString,
}

impl AgentChatShell {
    pub fn new(
        backend: Backend,
        endpoint: impl Into<SharedString>,
        window: &mut Window,
        cx: &mut Context<Self>,
    ) -> Self {
        let chat_view = cx.new(|cx| ChatView::new(backend, window, cx));
        // The badge reads chat state, so re-render with it.
        cx.observe(&chat_view, |_, _, cx| cx.notify()).detach();

        Self {
            chat_view,
            endpoint: endpoint.into(),
        }
    }

    fn status_badge(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let chat_view = self.chat_view.read(cx);
        let turn = chat_view.turn();
        let text = status_badge_text(turn, &chat_view.session_label());
        let (background, foreground) = match turn {
            TurnState::Idle => (theme.muted, theme.muted_foreground),
            TurnState::Sending | TurnState::Streaming => (theme.accent, theme.accent_foreground),
        };

        div()
            .id("shell-session-status")
            .px_2()
            .py_0p5()
            .rounded_full()
            .bg(background)
            .text_color(foreground)
            .text_xs()
            .child(text)
    }
}

impl Render for AgentChatShell {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .size_full()
            .bg(theme.background)
            .child(
                TitleBar::new().child(
                    h_flex()
                        .id("shell-title")
                        .w_full()
                        .pr_2()
                        .justify_between()
                        .items_center()
                        .child(div().text_sm().child("Agent Chat"))
                        .child(
                            h_flex()
                                .gap_2()
                                .items_center()
                                .child(
                                    div()
                                        .text_xs()
                                        .text_color(theme.muted_foreground)
                                        .child(self.endpoint.clone()),
                                )
                                .child(self.status_badge(cx)),
                        ),
                ),
            )
            .child(
                div()
                    .id("shell-chat")
                    .flex_1()
                    .min_h_0()
                    .overflow_hidden()
                    .child(self.chat_view.clone()),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_labels_cover_every_state() {
        assert_eq!(turn_label(TurnState::Idle), "Ready");
        assert_eq!(turn_label(TurnState::Sending), "Sending");
        assert_eq!(turn_label(TurnState::Streaming), "Agent working");
    }

    #[test]
    fn status_badge_pairs_turn_with_session() {
        assert_eq!(
            status_badge_text(TurnState::Idle, "no session"),
            "Ready · no session"
        );
        assert_eq!(
            status_badge_text(TurnState::Streaming, "session 0a1b2c3d"),
            "Agent working · session 0a1b2c3d"
        );
    }

    #[test]
    fn backend_builds_from_default_config() {
        let backend = Backend::from_config(ClientConfig::default()).expect("backend builds");
        assert_eq!(backend.channel_name, agent_chat_session::AGENT_STEP_CHANNEL);
    }
}
