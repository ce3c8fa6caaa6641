use agent_chat_session::{Message, Role, Step};
use gpui::prelude::FluentBuilder as _;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    label::Label,
    text::TextView,
    v_flex,
};

use crate::chat::events::ToggleThought;
use crate::chat::scroll_manager::ScrollManager;

const USER_BUBBLE_MAX_WIDTH: Pixels = px(540.);
const USER_BUBBLE_PADDING_X: Pixels = px(14.);
const USER_BUBBLE_PADDING_Y: Pixels = px(10.);
const THOUGHT_INDENT: Pixels = px(22.);
const MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES: usize = 128 * 1024;

/// Read-only rendering of the transcript plus the in-flight step buffer.
pub struct Transcript {
    messages: Vec<Message>,
    pending_steps: Vec<Step>,
    is_loading: bool,
    scroll_manager: ScrollManager,
}

impl EventEmitter<ToggleThought> for Transcript {}

impl Transcript {
    pub fn new(_cx: &mut Context<Self>) -> Self {
        Self {
            messages: Vec::new(),
            pending_steps: Vec::new(),
            is_loading: false,
            scroll_manager: ScrollManager::new(),
        }
    }

    pub fn set_content(
        &mut self,
        messages: &[Message],
        pending_steps: &[Step],
        is_loading: bool,
        cx: &mut Context<Self>,
    ) {
        self.messages = messages.to_vec();
        self.pending_steps = pending_steps.to_vec();
        self.is_loading = is_loading;
        cx.notify();
    }

    pub fn request_scroll_to_bottom(&mut self, cx: &mut Context<Self>) {
        self.scroll_manager.request_scroll_to_bottom();
        cx.notify();
    }

    fn render_message(&self, message: &Message, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let row_id = ElementId::Name(SharedString::from(format!("message-{}", message.id)));

        if message.role == Role::User {
            return v_flex()
                .id(row_id)
                .w_full()
                .items_end()
                .child(
                    div()
                        .max_w(USER_BUBBLE_MAX_WIDTH)
                        .px(USER_BUBBLE_PADDING_X)
                        .py(USER_BUBBLE_PADDING_Y)
                        .rounded_lg()
                        .bg(theme.accent)
                        .text_color(theme.accent_foreground)
                        .child(Label::new(message.content.clone()).text_sm()),
                )
                .into_any_element();
        }

        let is_error = message.is_error();

        v_flex()
            .id(row_id)
            .w_full()
            .gap_2()
            .child(
                Label::new("Agent")
                    .text_xs()
                    .text_color(theme.foreground.opacity(0.5)),
            )
            .when(!message.steps.is_empty(), |column| {
                column.child(self.render_steps(&message.steps, cx))
            })
            .child(
                div()
                    .w_full()
                    .when(is_error, |body| {
                        body.px_3()
                            .py_2()
                            .rounded_md()
                            .border_1()
                            .border_color(theme.danger)
                            .text_color(theme.danger)
                    })
                    .child(self.render_answer(message)),
            )
            .into_any_element()
    }

    fn render_answer(&self, message: &Message) -> AnyElement {
        if message.content.trim().is_empty() {
            return Label::new("(empty response)").text_sm().into_any_element();
        }

        if message.is_error() || message.content.len() > MARKDOWN_SAFE_FALLBACK_THRESHOLD_BYTES {
            return Label::new(message.content.clone())
                .text_sm()
                .into_any_element();
        }

        let markdown_id =
            ElementId::Name(SharedString::from(format!("answer-markdown-{}", message.id)));
        TextView::markdown(markdown_id, message.content.clone())
            .selectable(true)
            .into_any_element()
    }

    fn render_steps(&self, steps: &[Step], cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .w_full()
            .gap_1()
            .pl_2()
            .border_l_2()
            .border_color(theme.border)
            .children(steps.iter().map(|step| self.render_step(step, cx)))
    }

    fn render_step(&self, step: &Step, cx: &Context<Self>) -> AnyElement {
        let theme = cx.theme();
        let step_id = step.id;
        let disclosure_icon = if step.show_thought {
            IconName::ChevronDown
        } else {
            IconName::ChevronRight
        };

        let header = h_flex()
            .w_full()
            .gap_1()
            .items_center()
            .when(step.has_thought(), |row| {
                row.child(
                    Button::new(format!("thought-toggle-{step_id}"))
                        .ghost()
                        .xsmall()
                        .icon(disclosure_icon)
                        .on_click(cx.listener(move |_, _, _window, cx| {
                            cx.emit(ToggleThought { step_id });
                        })),
                )
            })
            .child(
                Label::new(step.header_text.clone())
                    .text_sm()
                    .text_color(theme.muted_foreground),
            );

        let thought = step
            .thought
            .as_ref()
            .filter(|_| step.show_thought)
            .cloned();

        v_flex()
            .id(ElementId::Name(SharedString::from(format!("step-{step_id}"))))
            .w_full()
            .child(header)
            .when_some(thought, |column, thought| {
                column.child(
                    div()
                        .pl(THOUGHT_INDENT)
                        .text_xs()
                        .text_color(theme.muted_foreground)
                        .child(Label::new(thought).text_xs()),
                )
            })
            .into_any_element()
    }

    fn render_pending(&self, cx: &Context<Self>) -> impl IntoElement {
        let theme = cx.theme();

        v_flex()
            .id("pending-steps")
            .w_full()
            .gap_2()
            .when(!self.pending_steps.is_empty(), |column| {
                column.child(self.render_steps(&self.pending_steps, cx))
            })
            .child(
                h_flex()
                    .gap_2()
                    .items_center()
                    .child(div().size(px(8.)).rounded_full().bg(theme.primary))
                    .child(
                        Label::new("Working")
                            .text_xs()
                            .text_color(theme.foreground.opacity(0.65)),
                    ),
            )
    }
}

impl Render for Transcript {
    fn render(&mut self, window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        if self.scroll_manager.has_pending_scroll() {
            cx.on_next_frame(window, |this, _window, cx| {
                if this.scroll_manager.apply_pending_scroll() {
                    cx.notify();
                }
            });
        }

        let rows = self
            .messages
            .iter()
            .map(|message| self.render_message(message, cx))
            .collect::<Vec<_>>();

        div()
            .id("transcript")
            .size_full()
            .min_h_0()
            .overflow_y_scroll()
            .track_scroll(self.scroll_manager.handle())
            .child(
                v_flex()
                    .w_full()
                    .px_4()
                    .py_3()
                    .gap_4()
                    .children(rows)
                    .when(self.is_loading, |column| column.child(self.render_pending(cx))),
            )
    }
}
