use snafu::ResultExt;

use crate::BoxFuture;
use crate::error::{EncodeRequestSnafu, ServiceResult};
use crate::ids::SessionId;
use crate::message::HistoryEntry;

/// Input of the agent service start operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartRequest {
    pub session_id: SessionId,
    pub user_message: String,
    pub history: Vec<HistoryEntry>,
}

impl StartRequest {
    /// History as the JSON array the service expects in `conversationHistoryJson`.
    pub fn conversation_history_json(&self) -> ServiceResult<String> {
        serde_json::to_string(&self.history).context(EncodeRequestSnafu {
            stage: "encode-conversation-history",
            operation: "start",
        })
    }
}

/// Remote agent runner. Progress for a started run arrives on the event channel,
/// not through these calls.
pub trait AgentService: Send + Sync {
    fn start<'a>(&'a self, request: &'a StartRequest) -> BoxFuture<'a, ServiceResult<()>>;
    fn stop<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, ServiceResult<()>>;
}

/// Asks the service to stop a run. Failures are logged and swallowed; the terminal
/// event for the run, if any, still drives the view-model.
pub async fn request_stop(service: &dyn AgentService, session_id: &SessionId) {
    match service.stop(session_id).await {
        Ok(()) => {
            tracing::debug!(session_id = %session_id, "stop requested");
        }
        Err(error) => {
            tracing::warn!(session_id = %session_id, error = %error, "stop request failed");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedService;
    use super::*;
    use crate::error::ServiceError;
    use crate::message::Role;

    #[test]
    fn history_json_is_an_ordered_role_content_array() {
        let request = StartRequest {
            session_id: SessionId::from_bytes([1u8; 16]),
            user_message: "and now?".to_string(),
            history: vec![
                HistoryEntry::new(Role::User, "hi"),
                HistoryEntry::new(Role::Assistant, "Hello!"),
                HistoryEntry::new(Role::User, "and now?"),
            ],
        };

        let json = request.conversation_history_json().expect("encodes");
        let decoded: Vec<HistoryEntry> = serde_json::from_str(&json).expect("decodes");
        assert_eq!(decoded, request.history);
    }

    #[tokio::test]
    async fn stop_failure_is_swallowed() {
        let service = ScriptedService::failing_stop(ServiceError::Transport {
            stage: "send",
            operation: "stop",
            message: "timeout".to_string(),
        });
        let session_id = SessionId::from_bytes([2u8; 16]);

        request_stop(&service, &session_id).await;

        assert_eq!(*service.stopped.lock().expect("lock"), vec![session_id]);
    }
}
