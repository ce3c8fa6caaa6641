use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::BoxFuture;
use crate::error::{ChannelError, ChannelResult};
use crate::event::{AGENT_STEP_CHANNEL, ChannelMessage};

/// Starting point for event delivery on a new subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReplayFrom {
    /// Only events published after the subscription is established.
    #[default]
    Tip,
    /// Every event the channel still retains.
    AllRetained,
    /// Events after the given replay id.
    After(i64),
}

impl ReplayFrom {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Tip => -1,
            Self::AllRetained => -2,
            Self::After(replay_id) => replay_id,
        }
    }
}

/// Listener for channel-level delivery errors, registered once per host.
pub type ErrorListener = Arc<dyn Fn(&ChannelError) + Send + Sync>;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Push transport delivering agent step envelopes.
pub trait EventChannel: Send + Sync {
    fn subscribe<'a>(
        &'a self,
        channel: &'a str,
        replay: ReplayFrom,
    ) -> BoxFuture<'a, ChannelResult<Subscription>>;

    /// Registers a listener for delivery errors. Registrations are not tied to any
    /// subscription and live as long as the channel.
    fn on_error(&self, listener: ErrorListener);
}

/// Scoped listener registration. Releasing it, explicitly or by drop,
/// deregisters the listener exactly once.
pub struct Subscription {
    channel: String,
    events: mpsc::UnboundedReceiver<ChannelMessage>,
    release: Option<ReleaseFn>,
}

impl Subscription {
    pub fn new(
        channel: impl Into<String>,
        events: mpsc::UnboundedReceiver<ChannelMessage>,
        release: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            release: Some(Box::new(release)),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChannelMessage> {
        self.events.try_recv().ok()
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            tracing::debug!(channel = %self.channel, "releasing event subscription");
            self.events.close();
            release();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

/// Mount-time wiring for the agent step channel. See [`mount_channel`].
pub async fn mount_agent_steps(channel: &dyn EventChannel) -> Option<Subscription> {
    mount_channel(channel, AGENT_STEP_CHANNEL).await
}

/// Registers a logging error listener and subscribes to `name` from the tip. A failed
/// subscription is logged and yields `None`; the host keeps working without streamed
/// updates.
///
/// Every call adds another listener and listeners are never removed, so mount each
/// channel once per host.
pub async fn mount_channel(channel: &dyn EventChannel, name: &str) -> Option<Subscription> {
    channel.on_error(Arc::new(|error: &ChannelError| {
        tracing::error!(error = %error, "event channel error");
    }));

    match channel.subscribe(name, ReplayFrom::Tip).await {
        Ok(subscription) => {
            tracing::info!(channel = name, "subscribed to agent step events");
            Some(subscription)
        }
        Err(error) => {
            tracing::error!(
                channel = name,
                error = %error,
                "failed to subscribe to agent step events"
            );
            None
        }
    }
}
