use serde::{Deserialize, Deserializer, Serialize, Serializer};
use snafu::ResultExt;

use crate::error::{ChannelResult, DecodeFrameSnafu};

/// Push channel carrying agent progress events.
pub const AGENT_STEP_CHANNEL: &str = "/event/AgentStep__e";

pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_ERROR: &str = "ERROR";
pub const STATUS_COMPLETED: &str = "COMPLETED";

/// Three-way classification of an agent step status.
///
/// `Final` is the explicit default: any status string other than `IN_PROGRESS` or
/// `ERROR`, including a missing one, completes the turn successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StepStatus {
    InProgress,
    Error,
    #[default]
    Final,
}

impl StepStatus {
    pub fn classify(raw: Option<&str>) -> Self {
        match raw {
            Some(STATUS_IN_PROGRESS) => Self::InProgress,
            Some(STATUS_ERROR) => Self::Error,
            _ => Self::Final,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => STATUS_IN_PROGRESS,
            Self::Error => STATUS_ERROR,
            Self::Final => STATUS_COMPLETED,
        }
    }
}

impl Serialize for StepStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StepStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(Self::classify(raw.as_deref()))
    }
}

/// Payload of one `AgentStep__e` platform event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentStepPayload {
    #[serde(rename = "SessionId__c", default)]
    pub session_id: Option<String>,
    #[serde(rename = "Status__c", default)]
    pub status: StepStatus,
    #[serde(rename = "Utterance__c", default)]
    pub utterance: Option<String>,
    #[serde(rename = "Thought__c", default)]
    pub thought: Option<String>,
    #[serde(rename = "Answer__c", default)]
    pub answer: Option<String>,
}

impl AgentStepPayload {
    pub fn in_progress(
        session_id: impl Into<String>,
        utterance: Option<&str>,
        thought: Option<&str>,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            status: StepStatus::InProgress,
            utterance: utterance.map(str::to_string),
            thought: thought.map(str::to_string),
            answer: None,
        }
    }

    pub fn error(session_id: impl Into<String>, answer: Option<&str>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            status: StepStatus::Error,
            answer: answer.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn completed(session_id: impl Into<String>, answer: Option<&str>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            status: StepStatus::Final,
            answer: answer.map(str::to_string),
            ..Self::default()
        }
    }
}

/// Delivery metadata attached by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventMeta {
    #[serde(rename = "replayId", default)]
    pub replay_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EnvelopeData {
    pub payload: AgentStepPayload,
    #[serde(default)]
    pub event: EventMeta,
}

/// Channel message as delivered to subscribers: `{channel, data: {payload, event}}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelMessage {
    #[serde(default)]
    pub channel: String,
    pub data: EnvelopeData,
}

impl ChannelMessage {
    pub fn new(channel: impl Into<String>, payload: AgentStepPayload) -> Self {
        Self {
            channel: channel.into(),
            data: EnvelopeData {
                payload,
                event: EventMeta::default(),
            },
        }
    }

    pub fn payload(&self) -> &AgentStepPayload {
        &self.data.payload
    }

    pub fn from_json(raw: &str) -> ChannelResult<Self> {
        serde_json::from_str(raw).context(DecodeFrameSnafu {
            stage: "decode-channel-message",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_or_missing_status_is_final() {
        assert_eq!(StepStatus::classify(Some("IN_PROGRESS")), StepStatus::InProgress);
        assert_eq!(StepStatus::classify(Some("ERROR")), StepStatus::Error);
        assert_eq!(StepStatus::classify(Some("COMPLETED")), StepStatus::Final);
        assert_eq!(StepStatus::classify(Some("in_progress")), StepStatus::Final);
        assert_eq!(StepStatus::classify(None), StepStatus::Final);
    }

    #[test]
    fn decodes_platform_envelope_with_nulls() {
        let raw = r#"{
            "channel": "/event/AgentStep__e",
            "data": {
                "schema": "ignored",
                "payload": {
                    "SessionId__c": "abc",
                    "Status__c": "IN_PROGRESS",
                    "Utterance__c": null,
                    "Thought__c": "Checking docs",
                    "Answer__c": null,
                    "CreatedDate": "2026-01-01T00:00:00Z"
                },
                "event": { "replayId": 42 }
            }
        }"#;

        let message = ChannelMessage::from_json(raw).expect("envelope decodes");
        assert_eq!(message.channel, AGENT_STEP_CHANNEL);
        assert_eq!(message.data.event.replay_id, Some(42));

        let payload = message.payload();
        assert_eq!(payload.session_id.as_deref(), Some("abc"));
        assert_eq!(payload.status, StepStatus::InProgress);
        assert_eq!(payload.utterance, None);
        assert_eq!(payload.thought.as_deref(), Some("Checking docs"));
    }

    #[test]
    fn null_status_decodes_as_final() {
        let raw = r#"{"data":{"payload":{"SessionId__c":"abc","Status__c":null,"Answer__c":"Done"}}}"#;

        let message = ChannelMessage::from_json(raw).expect("envelope decodes");
        assert_eq!(message.payload().status, StepStatus::Final);
        assert_eq!(message.payload().answer.as_deref(), Some("Done"));
    }

    #[test]
    fn malformed_frame_is_a_decode_error() {
        assert!(ChannelMessage::from_json("{not json").is_err());
    }
}
