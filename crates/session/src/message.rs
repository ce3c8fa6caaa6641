use serde::{Deserialize, Serialize};

use crate::ids::{MessageId, StepId};

/// Header shown for a step that carries only a thought.
pub const THOUGHT_ONLY_HEADER: &str = "Thought";

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Visual treatment of a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageTone {
    #[default]
    Normal,
    Error,
}

/// One intermediate progress entry of an agent turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub id: StepId,
    pub header_text: String,
    pub thought: Option<String>,
    pub show_thought: bool,
}

impl Step {
    /// Builds a step from raw event fields, or `None` when both are empty or absent.
    pub fn from_parts(id: StepId, utterance: Option<&str>, thought: Option<&str>) -> Option<Self> {
        let utterance = utterance.filter(|value| !value.is_empty());
        let thought = thought.filter(|value| !value.is_empty());
        if utterance.is_none() && thought.is_none() {
            return None;
        }

        Some(Self {
            id,
            header_text: utterance.unwrap_or(THOUGHT_ONLY_HEADER).to_string(),
            thought: thought.map(str::to_string),
            show_thought: false,
        })
    }

    pub fn has_thought(&self) -> bool {
        self.thought.is_some()
    }

    /// Flips the disclosure when `id` matches. Returns whether it matched.
    pub fn toggle_if(&mut self, id: StepId) -> bool {
        if self.id != id {
            return false;
        }
        self.show_thought = !self.show_thought;
        true
    }
}

/// Transcript entry. Immutable after append apart from nested step disclosures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub tone: MessageTone,
    pub content: String,
    pub steps: Vec<Step>,
}

impl Message {
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            tone: MessageTone::Normal,
            content: content.into(),
            steps: Vec::new(),
        }
    }

    pub fn assistant(id: MessageId, content: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            tone: MessageTone::Normal,
            content: content.into(),
            steps,
        }
    }

    pub fn assistant_error(id: MessageId, content: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            tone: MessageTone::Error,
            ..Self::assistant(id, content, steps)
        }
    }

    pub fn is_error(&self) -> bool {
        self.tone == MessageTone::Error
    }

    /// Presentation class list for hosts that style with CSS.
    pub fn class_names(&self) -> &'static str {
        match (self.role, self.tone) {
            (Role::User, _) => "message message-user",
            (Role::Assistant, MessageTone::Normal) => "message message-assistant",
            (Role::Assistant, MessageTone::Error) => "message message-assistant message-error",
        }
    }
}

/// Role/content pair forwarded to the agent service as context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_requires_utterance_or_thought() {
        assert!(Step::from_parts(StepId::new(1), None, None).is_none());
        assert!(Step::from_parts(StepId::new(1), Some(""), Some("")).is_none());

        let thought_only = Step::from_parts(StepId::new(2), None, Some("Checking docs"))
            .expect("thought is present");
        assert_eq!(thought_only.header_text, THOUGHT_ONLY_HEADER);
        assert_eq!(thought_only.thought.as_deref(), Some("Checking docs"));
        assert!(!thought_only.show_thought);

        let utterance_only = Step::from_parts(StepId::new(3), Some("Searching"), Some(""))
            .expect("utterance is present");
        assert_eq!(utterance_only.header_text, "Searching");
        assert!(!utterance_only.has_thought());
    }

    #[test]
    fn class_names_follow_role_and_tone() {
        let user = Message::user(MessageId::new(1), "hi");
        let ok = Message::assistant(MessageId::new(2), "Hello!", Vec::new());
        let failed = Message::assistant_error(MessageId::new(3), "boom", Vec::new());

        assert_eq!(user.class_names(), "message message-user");
        assert_eq!(ok.class_names(), "message message-assistant");
        assert_eq!(
            failed.class_names(),
            "message message-assistant message-error"
        );
        assert!(failed.is_error());
    }

    #[test]
    fn history_entries_serialize_with_lowercase_roles() {
        let history = vec![
            HistoryEntry::new(Role::User, "hi"),
            HistoryEntry::new(Role::Assistant, "Hello!"),
        ];

        let json = serde_json::to_string(&history).expect("history serializes");
        assert_eq!(
            json,
            r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"Hello!"}]"#
        );
    }
}
