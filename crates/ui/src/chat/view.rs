use std::sync::Arc;

use agent_chat_session::error::TransportSnafu;
use agent_chat_session::{
    AgentService, ChannelMessage, EventChannel, KeyOutcome, SessionViewModel, StartRequest,
    TurnState, mount_channel, request_stop,
};
use gpui::*;
use gpui_component::{ActiveTheme, v_flex};
use gpui_tokio_bridge::Tokio;

use crate::app::Backend;
use crate::chat::events::{Stop, Submit, ToggleThought};
use crate::chat::{MessageInput, Transcript};

/// Coordinator between the session view-model, the agent service and the event channel.
///
/// All view-model mutation happens here on the UI thread. Service calls run on the tokio
/// bridge and report back through `this.update`.
pub struct ChatView {
    model: SessionViewModel,
    service: Arc<dyn AgentService>,
    transcript: Entity<Transcript>,
    message_input: Entity<MessageInput>,
    // Owns the subscription; dropping the task releases it.
    channel_task: Option<Task<()>>,
    start_task: Option<Task<()>>,
    rendered_revision: u64,
}

impl ChatView {
    pub fn new(backend: Backend, window: &mut Window, cx: &mut Context<Self>) -> Self {
        let transcript = cx.new(Transcript::new);
        let message_input = cx.new(|cx| MessageInput::new(window, cx));

        cx.subscribe_in(
            &message_input,
            window,
            |this, _, event: &Submit, window, cx| {
                this.handle_submit(event, window, cx);
            },
        )
        .detach();

        cx.subscribe(&message_input, |this, _, _event: &Stop, cx| {
            this.handle_stop(cx);
        })
        .detach();

        cx.subscribe(&transcript, |this, _, event: &ToggleThought, cx| {
            if this.model.toggle_thought(event.step_id) {
                this.sync_children(cx);
            }
        })
        .detach();

        let mut this = Self {
            model: SessionViewModel::new(),
            service: backend.service,
            transcript,
            message_input,
            channel_task: None,
            start_task: None,
            rendered_revision: 0,
        };
        this.subscribe_agent_steps(backend.channel, backend.channel_name, cx);
        this
    }

    pub fn turn(&self) -> TurnState {
        self.model.turn()
    }

    pub fn session_label(&self) -> String {
        match self.model.session_id() {
            Some(session_id) => {
                let full = session_id.as_str();
                format!("session {}", full.get(..8).unwrap_or(full))
            }
            None => "no session".to_string(),
        }
    }

    fn subscribe_agent_steps(
        &mut self,
        channel: Arc<dyn EventChannel>,
        name: String,
        cx: &mut Context<Self>,
    ) {
        let mount = Tokio::spawn(cx, async move { mount_channel(channel.as_ref(), &name).await });

        self.channel_task = Some(cx.spawn(async move |this, cx| {
            let mut subscription = match mount.await {
                Ok(Some(subscription)) => subscription,
                Ok(None) => return,
                Err(error) => {
                    tracing::error!(error = %error, "event channel mount task failed");
                    return;
                }
            };

            while let Some(message) = subscription.recv().await {
                let routed = this.update(cx, |this, cx| {
                    this.handle_channel_message(&message, cx);
                });
                if routed.is_err() {
                    break;
                }
            }
            tracing::debug!(channel = subscription.channel(), "event channel reader stopped");
        }));
    }

    fn handle_channel_message(&mut self, message: &ChannelMessage, cx: &mut Context<Self>) {
        let disposition = self.model.handle_channel_message(message);
        tracing::trace!(?disposition, "agent step event routed");
        self.sync_children(cx);
    }

    fn handle_submit(&mut self, event: &Submit, window: &mut Window, cx: &mut Context<Self>) {
        self.model.set_input(event.content.clone());

        if let KeyOutcome::Submitted(Some(request)) = self.model.key_down(event.key) {
            self.start_turn(request, cx);
        }

        let draft = self.model.input().to_string();
        self.message_input.update(cx, |input, cx| {
            input.sync_value(&draft, window, cx);
        });
        self.sync_children(cx);
    }

    fn start_turn(&mut self, request: StartRequest, cx: &mut Context<Self>) {
        let service = Arc::clone(&self.service);
        let call = Tokio::spawn(cx, async move { service.start(&request).await });

        self.start_task = Some(cx.spawn(async move |this, cx| {
            let outcome = match call.await {
                Ok(outcome) => outcome,
                Err(error) => TransportSnafu {
                    stage: "join-start-call",
                    operation: "start",
                    message: error.to_string(),
                }
                .fail(),
            };

            let _ = this.update(cx, |this, cx| {
                this.model.complete_start(outcome);
                this.start_task = None;
                this.sync_children(cx);
            });
        }));
    }

    fn handle_stop(&mut self, cx: &mut Context<Self>) {
        let Some(session_id) = self.model.stop_target() else {
            return;
        };

        let service = Arc::clone(&self.service);
        // Stop is advisory; the run's terminal event closes the turn.
        Tokio::spawn(cx, async move {
            request_stop(service.as_ref(), &session_id).await;
        })
        .detach();
    }

    /// Pushes view-model changes into the child views.
    fn sync_children(&mut self, cx: &mut Context<Self>) {
        let revision = self.model.revision();
        if revision != self.rendered_revision {
            self.rendered_revision = revision;
            let model = &self.model;
            self.transcript.update(cx, |transcript, cx| {
                transcript.set_content(
                    model.messages(),
                    model.pending_steps(),
                    model.is_loading(),
                    cx,
                );
            });
            let is_loading = self.model.is_loading();
            self.message_input.update(cx, |input, cx| {
                input.set_loading(is_loading, cx);
            });
        }

        if self.model.take_scroll_request() {
            self.transcript.update(cx, |transcript, cx| {
                transcript.request_scroll_to_bottom(cx);
            });
        }

        cx.notify();
    }
}

impl Render for ChatView {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("chat-view")
            .relative()
            .size_full()
            .min_h_0()
            .overflow_hidden()
            .bg(theme.background)
            .child(
                div()
                    .id("chat-view-transcript")
                    .flex_1()
                    .min_h_0()
                    .child(self.transcript.clone()),
            )
            .child(
                div()
                    .id("chat-view-message-input")
                    .flex_shrink_0()
                    .w_full()
                    .border_t_1()
                    .border_color(theme.border)
                    .child(self.message_input.clone()),
            )
    }
}
