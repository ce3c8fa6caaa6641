use std::sync::{Arc, Mutex};
use std::time::Duration;

use agent_chat_session::error::{DeliverySnafu, SubscribeFailedSnafu};
use agent_chat_session::{
    BoxFuture, ChannelError, ChannelMessage, ChannelResult, ErrorListener, EventChannel,
    ReplayFrom, Subscription,
};
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Response};
use snafu::ResultExt;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::error::{BuildClientSnafu, TransportResult};

const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

type ListenerSet = Arc<Mutex<Vec<ErrorListener>>>;

/// Event channel backed by a server-sent events endpoint. Each SSE `data` field holds
/// one channel envelope.
pub struct SseEventChannel {
    client: Client,
    config: ClientConfig,
    listeners: ListenerSet,
}

impl SseEventChannel {
    pub fn new(config: ClientConfig) -> TransportResult<Self> {
        // Only the connect phase is bounded; the stream itself stays open indefinitely.
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .context(BuildClientSnafu {
                stage: "build-event-stream-client",
            })?;
        Ok(Self {
            client,
            config,
            listeners: ListenerSet::default(),
        })
    }

    async fn open(&self, channel: &str, replay: ReplayFrom) -> ChannelResult<Response> {
        let mut request = self
            .client
            .get(self.config.events_url())
            .query(&[
                ("channel", channel.to_string()),
                ("replay", replay.as_i64().to_string()),
            ])
            .header(ACCEPT, EVENT_STREAM_CONTENT_TYPE);
        if let Some(token) = &self.config.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|source| {
            SubscribeFailedSnafu {
                stage: "open-event-stream",
                channel,
                message: source.to_string(),
            }
            .build()
        })?;

        let status = response.status();
        if !status.is_success() {
            return SubscribeFailedSnafu {
                stage: "event-stream-status",
                channel,
                message: format!("server responded with status {}", status.as_u16()),
            }
            .fail();
        }
        Ok(response)
    }
}

impl EventChannel for SseEventChannel {
    fn subscribe<'a>(
        &'a self,
        channel: &'a str,
        replay: ReplayFrom,
    ) -> BoxFuture<'a, ChannelResult<Subscription>> {
        Box::pin(async move {
            let response = self.open(channel, replay).await?;
            let (sender, events) = mpsc::unbounded_channel();
            let reader = tokio::spawn(read_event_stream(
                response,
                channel.to_string(),
                sender,
                Arc::clone(&self.listeners),
            ));
            tracing::info!(channel, replay = replay.as_i64(), "event stream opened");

            Ok(Subscription::new(channel, events, move || reader.abort()))
        })
    }

    fn on_error(&self, listener: ErrorListener) {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(listener);
    }
}

/// Decodes one SSE `data` field. Blank frames are heartbeats and yield `None`.
pub fn decode_frame(channel: &str, data: &str) -> ChannelResult<Option<ChannelMessage>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }

    let mut message = ChannelMessage::from_json(data)?;
    if message.channel.is_empty() {
        message.channel = channel.to_string();
    }
    Ok(Some(message))
}

async fn read_event_stream(
    response: Response,
    channel: String,
    sender: mpsc::UnboundedSender<ChannelMessage>,
    listeners: ListenerSet,
) {
    let mut stream = response.bytes_stream().eventsource();

    while let Some(next) = stream.next().await {
        match next {
            Ok(event) => match decode_frame(&channel, &event.data) {
                Ok(Some(message)) => {
                    if sender.send(message).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(error) => notify(&listeners, &error),
            },
            Err(source) => {
                let error = DeliverySnafu {
                    stage: "read-event-stream",
                    channel: channel.as_str(),
                    message: source.to_string(),
                }
                .build();
                notify(&listeners, &error);
                return;
            }
        }
    }

    let error = DeliverySnafu {
        stage: "event-stream-closed",
        channel: channel.as_str(),
        message: "stream closed by server",
    }
    .build();
    notify(&listeners, &error);
}

fn notify(listeners: &ListenerSet, error: &ChannelError) {
    let listeners = listeners
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone();
    if listeners.is_empty() {
        tracing::warn!(error = %error, "event channel error with no listener registered");
    }
    for listener in listeners {
        listener(error);
    }
}
