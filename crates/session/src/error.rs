use snafu::Snafu;

/// Fallback text when a failed call carries no usable diagnostic.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SessionError {
    #[snafu(display("failed to draw session id bytes from the OS random source: {source}"))]
    SessionIdEntropy {
        stage: &'static str,
        source: getrandom::Error,
    },
    #[snafu(display("session id '{raw}' is not 32 lowercase hex characters"))]
    InvalidSessionId { stage: &'static str, raw: String },
}

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ChannelError {
    #[snafu(display("failed to subscribe to '{channel}': {message}"))]
    SubscribeFailed {
        stage: &'static str,
        channel: String,
        message: String,
    },
    #[snafu(display("event channel '{channel}' delivery failed: {message}"))]
    Delivery {
        stage: &'static str,
        channel: String,
        message: String,
    },
    #[snafu(display("failed to decode event frame on `{stage}`: {source}"))]
    DecodeFrame {
        stage: &'static str,
        source: serde_json::Error,
    },
}

pub type ChannelResult<T> = Result<T, ChannelError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServiceError {
    #[snafu(display("agent service rejected `{operation}` with status {status}"))]
    Rejected {
        stage: &'static str,
        operation: &'static str,
        status: u16,
        server_message: Option<String>,
    },
    #[snafu(display("agent service call `{operation}` failed: {message}"))]
    Transport {
        stage: &'static str,
        operation: &'static str,
        message: String,
    },
    #[snafu(display("failed to encode `{operation}` request on `{stage}`: {source}"))]
    EncodeRequest {
        stage: &'static str,
        operation: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("{message}"))]
    Session {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("Unknown error"))]
    Unknown { stage: &'static str },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    /// Best-available diagnostic for display: the server-provided message, then the
    /// generic failure text, then [`UNKNOWN_ERROR_MESSAGE`].
    pub fn diagnostic(&self) -> String {
        let server_message = match self {
            Self::Rejected { server_message, .. } => server_message
                .as_deref()
                .map(str::trim)
                .filter(|message| !message.is_empty()),
            _ => None,
        };
        if let Some(message) = server_message {
            return message.to_string();
        }

        let generic = match self {
            Self::Unknown { .. } => String::new(),
            Self::Transport { message, .. } | Self::Session { message, .. } => {
                message.trim().to_string()
            }
            Self::Rejected { .. } | Self::EncodeRequest { .. } => self.to_string(),
        };
        if generic.is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            generic
        }
    }
}

impl From<SessionError> for ServiceError {
    fn from(error: SessionError) -> Self {
        Self::Session {
            stage: "session-error",
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_prefers_server_message() {
        let error = ServiceError::Rejected {
            stage: "start",
            operation: "start",
            status: 500,
            server_message: Some("Agent quota exceeded".to_string()),
        };

        assert_eq!(error.diagnostic(), "Agent quota exceeded");
    }

    #[test]
    fn diagnostic_falls_back_to_generic_then_unknown() {
        let rejected = ServiceError::Rejected {
            stage: "start",
            operation: "start",
            status: 502,
            server_message: Some("   ".to_string()),
        };
        assert_eq!(
            rejected.diagnostic(),
            "agent service rejected `start` with status 502"
        );

        let transport = ServiceError::Transport {
            stage: "send",
            operation: "start",
            message: "connection refused".to_string(),
        };
        assert_eq!(transport.diagnostic(), "connection refused");

        let blank = ServiceError::Transport {
            stage: "send",
            operation: "start",
            message: String::new(),
        };
        assert_eq!(blank.diagnostic(), UNKNOWN_ERROR_MESSAGE);
        assert_eq!(
            ServiceError::Unknown { stage: "start" }.diagnostic(),
            UNKNOWN_ERROR_MESSAGE
        );
    }
}
