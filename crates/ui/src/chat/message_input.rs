use agent_chat_session::{Key, KeyPress};
use gpui::prelude::FluentBuilder;
use gpui::*;
use gpui_component::{
    ActiveTheme, IconName, Sizable,
    button::{Button, ButtonVariants},
    h_flex,
    input::{Input, InputEvent, InputState},
    label::Label,
    v_flex,
};

use crate::chat::events::{Stop, Submit};

pub struct MessageInput {
    input_state: Entity<InputState>,
    is_loading: bool,
    pending_newline: bool,
}

impl EventEmitter<Submit> for MessageInput {}
impl EventEmitter<Stop> for MessageInput {}

impl MessageInput {
    pub fn new(window: &mut Window, cx: &mut Context<Self>) -> Self {
        let input_state = cx.new(|cx| {
            InputState::new(window, cx)
                .placeholder("Ask the agent...")
                .auto_grow(2, 8)
        });

        cx.subscribe_in(
            &input_state,
            window,
            |this, _, event: &InputEvent, window, cx| {
                if let InputEvent::PressEnter { secondary } = event {
                    if *secondary {
                        this.pending_newline = false;
                        return;
                    }

                    if this.pending_newline {
                        // Shift+Enter already inserted its newline; the trailing PressEnter is not a submit.
                        this.pending_newline = false;
                    } else {
                        this.trim_trailing_newline(window, cx);
                        this.emit_submit(KeyPress::enter(), cx);
                    }
                }
            },
        )
        .detach();

        Self {
            input_state,
            is_loading: false,
            pending_newline: false,
        }
    }

    pub fn set_loading(&mut self, loading: bool, cx: &mut Context<Self>) {
        if self.is_loading == loading {
            return;
        }
        self.is_loading = loading;
        if !loading {
            self.pending_newline = false;
        }
        cx.notify();
    }

    /// Mirrors the view-model's draft into the editor when they diverge.
    pub fn sync_value(&mut self, value: &str, window: &mut Window, cx: &mut Context<Self>) {
        if self.input_state.read(cx).value().to_string() == value {
            return;
        }
        self.input_state.update(cx, |state, cx| {
            state.set_value(value.to_string(), window, cx);
        });
        self.pending_newline = false;
    }

    fn handle_key_down(&mut self, event: &KeyDownEvent, window: &mut Window, cx: &mut Context<Self>) {
        let key = if event.keystroke.key == "enter" {
            Key::Enter
        } else {
            Key::Other
        };
        let press = KeyPress::new(key, event.keystroke.modifiers.shift);
        if press.key == Key::Enter && !press.submits() {
            self.pending_newline = true;
            self.input_state.update(cx, |state, cx| {
                state.insert("\n", window, cx);
            });
            cx.notify();
        }
    }

    fn trim_trailing_newline(&mut self, window: &mut Window, cx: &mut Context<Self>) {
        self.input_state.update(cx, |state, cx| {
            let value = state.value().to_string();
            if let Some(trimmed) = value.strip_suffix('\n') {
                state.set_value(trimmed.to_string(), window, cx);
            }
        });
    }

    fn emit_submit(&mut self, key: KeyPress, cx: &mut Context<Self>) {
        let content = self.input_state.read(cx).value().to_string();
        cx.emit(Submit::new(content, key));
    }

    fn handle_stop(&mut self, cx: &mut Context<Self>) {
        if self.is_loading {
            cx.emit(Stop);
        }
    }
}

impl Render for MessageInput {
    fn render(&mut self, _window: &mut Window, cx: &mut Context<Self>) -> impl IntoElement {
        let theme = cx.theme();
        let is_loading = self.is_loading;

        let send = Button::new("send")
            .small()
            .primary()
            .icon(IconName::ArrowUp)
            .child("Send")
            .disabled(is_loading)
            .on_click(cx.listener(|this, _, _window, cx| {
                this.emit_submit(KeyPress::enter(), cx);
            }));

        let controls = h_flex()
            .w_full()
            .gap_2()
            .items_center()
            .justify_end()
            .when(is_loading, |row| {
                row.child(
                    Label::new("Agent is working...")
                        .text_xs()
                        .text_color(theme.muted_foreground),
                )
                .child(
                    Button::new("stop")
                        .small()
                        .danger()
                        .icon(IconName::CircleX)
                        .child("Stop")
                        .on_click(cx.listener(|this, _, _window, cx| {
                            this.handle_stop(cx);
                        })),
                )
            })
            .child(send);

        v_flex()
            .bg(theme.background)
            .gap_2()
            .p_3()
            .child(
                div()
                    .w_full()
                    .px_3()
                    .py_2()
                    .rounded_lg()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.background)
                    .on_key_down(cx.listener(|this, event: &KeyDownEvent, window, cx| {
                        this.handle_key_down(event, window, cx);
                    }))
                    .child(Input::new(&self.input_state).w_full()),
            )
            .child(controls)
    }
}
