use agent_chat_session::error::{RejectedSnafu, TransportSnafu};
use agent_chat_session::{AgentService, BoxFuture, ServiceResult, SessionId, StartRequest};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::config::ClientConfig;
use crate::error::{BuildClientSnafu, TransportResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBody<'a> {
    session_id: &'a str,
    user_message: &'a str,
    conversation_history_json: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StopBody<'a> {
    session_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// Agent service reached over JSON-over-HTTP endpoints.
pub struct HttpAgentService {
    client: Client,
    config: ClientConfig,
}

impl HttpAgentService {
    pub fn new(config: ClientConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context(BuildClientSnafu {
                stage: "build-agent-http-client",
            })?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn post(&self, url: String) -> RequestBuilder {
        let request = self.client.post(url);
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn call<B>(&self, operation: &'static str, url: String, body: &B) -> ServiceResult<()>
    where
        B: Serialize + Sync,
    {
        let response = self
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|source| {
                TransportSnafu {
                    stage: "send-agent-request",
                    operation,
                    message: source.to_string(),
                }
                .build()
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let payload = response.text().await.unwrap_or_default();
        tracing::warn!(
            operation,
            status = status.as_u16(),
            body = %payload,
            "agent service returned an error status"
        );
        RejectedSnafu {
            stage: "agent-http-status",
            operation,
            status: status.as_u16(),
            server_message: server_message(status, &payload),
        }
        .fail()
    }
}

impl AgentService for HttpAgentService {
    fn start<'a>(&'a self, request: &'a StartRequest) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move {
            let body = StartBody {
                session_id: request.session_id.as_str(),
                user_message: &request.user_message,
                conversation_history_json: request.conversation_history_json()?,
            };
            self.call("start", self.config.start_url(), &body).await
        })
    }

    fn stop<'a>(&'a self, session_id: &'a SessionId) -> BoxFuture<'a, ServiceResult<()>> {
        Box::pin(async move {
            let body = StopBody {
                session_id: session_id.as_str(),
            };
            self.call("stop", self.config.stop_url(), &body).await
        })
    }
}

/// Extracts the server-provided message from an error body: a `{"message": ..}`
/// object, or the first such object of an array.
pub fn server_message(status: StatusCode, payload: &str) -> Option<String> {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return status.canonical_reason().map(str::to_string);
    }

    if let Ok(body) = serde_json::from_str::<ErrorBody>(trimmed) {
        return body.message.filter(|message| !message.trim().is_empty());
    }

    if let Ok(bodies) = serde_json::from_str::<Vec<ErrorBody>>(trimmed) {
        return bodies
            .into_iter()
            .find_map(|body| body.message.filter(|message| !message.trim().is_empty()));
    }

    None
}
