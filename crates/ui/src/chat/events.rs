use agent_chat_session::{KeyPress, StepId};

/// Emitted when the user presses a submitting key or clicks Send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submit {
    pub content: String,
    pub key: KeyPress,
}

/// Emitted when the user asks the running agent to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Stop;

/// Emitted when a step's thought disclosure is clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ToggleThought {
    pub step_id: StepId,
}

impl Submit {
    pub fn new(content: impl Into<String>, key: KeyPress) -> Self {
        Self {
            content: content.into(),
            key,
        }
    }
}
