use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::BoxFuture;
use crate::channel::{ErrorListener, EventChannel, ReplayFrom, Subscription};
use crate::error::{ChannelError, ChannelResult};
use crate::event::ChannelMessage;

struct Subscriber {
    channel: String,
    sender: mpsc::UnboundedSender<ChannelMessage>,
}

#[derive(Default)]
struct Registry {
    next_subscriber_id: u64,
    next_replay_id: i64,
    subscribers: HashMap<u64, Subscriber>,
    error_listeners: Vec<ErrorListener>,
}

/// In-process broadcast channel. Every subscriber of a channel name receives each
/// published envelope; nothing is retained, so replay options other than the tip
/// behave like the tip.
#[derive(Clone, Default)]
pub struct LocalChannel {
    registry: Arc<Mutex<Registry>>,
}

impl LocalChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers a message to every live subscriber of `message.channel`, stamping a
    /// replay id. Returns the number of subscribers reached.
    pub fn publish(&self, mut message: ChannelMessage) -> usize {
        let mut registry = self.lock();
        registry.next_replay_id += 1;
        message.data.event.replay_id = Some(registry.next_replay_id);

        let mut delivered = 0;
        registry.subscribers.retain(|_, subscriber| {
            if subscriber.channel != message.channel {
                return true;
            }
            // A closed receiver means the subscription was dropped mid-flight.
            if subscriber.sender.send(message.clone()).is_err() {
                return false;
            }
            delivered += 1;
            true
        });
        delivered
    }

    /// Reports a delivery error to every registered listener.
    pub fn report_error(&self, error: &ChannelError) {
        let listeners = self.lock().error_listeners.clone();
        for listener in listeners {
            listener(error);
        }
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.lock()
            .subscribers
            .values()
            .filter(|subscriber| subscriber.channel == channel)
            .count()
    }

    pub fn error_listener_count(&self) -> usize {
        self.lock().error_listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventChannel for LocalChannel {
    fn subscribe<'a>(
        &'a self,
        channel: &'a str,
        replay: ReplayFrom,
    ) -> BoxFuture<'a, ChannelResult<Subscription>> {
        Box::pin(async move {
            let (sender, events) = mpsc::unbounded_channel();
            let subscriber_id = {
                let mut registry = self.lock();
                registry.next_subscriber_id += 1;
                let subscriber_id = registry.next_subscriber_id;
                registry.subscribers.insert(
                    subscriber_id,
                    Subscriber {
                        channel: channel.to_string(),
                        sender,
                    },
                );
                subscriber_id
            };
            tracing::debug!(
                channel,
                subscriber_id,
                replay = replay.as_i64(),
                "local channel subscription registered"
            );

            let registry = Arc::clone(&self.registry);
            Ok(Subscription::new(channel, events, move || {
                registry
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .subscribers
                    .remove(&subscriber_id);
            }))
        })
    }

    fn on_error(&self, listener: ErrorListener) {
        self.lock().error_listeners.push(listener);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::channel::{mount_agent_steps, mount_channel};
    use crate::event::{AGENT_STEP_CHANNEL, AgentStepPayload};

    fn step(session: &str) -> ChannelMessage {
        ChannelMessage::new(
            AGENT_STEP_CHANNEL,
            AgentStepPayload::in_progress(session, Some("Searching"), None),
        )
    }

    #[tokio::test]
    async fn publish_reaches_only_matching_channel_in_order() {
        let bus = LocalChannel::new();
        let mut steps = bus
            .subscribe(AGENT_STEP_CHANNEL, ReplayFrom::Tip)
            .await
            .expect("subscribe");
        let mut other = bus
            .subscribe("/event/Other__e", ReplayFrom::Tip)
            .await
            .expect("subscribe");

        assert_eq!(bus.publish(step("a")), 1);
        assert_eq!(bus.publish(step("b")), 1);

        let first = steps.recv().await.expect("first event");
        let second = steps.recv().await.expect("second event");
        assert_eq!(first.payload().session_id.as_deref(), Some("a"));
        assert_eq!(second.payload().session_id.as_deref(), Some("b"));
        assert!(first.data.event.replay_id < second.data.event.replay_id);
        assert!(other.try_recv().is_none());
    }

    #[tokio::test]
    async fn dropping_subscription_releases_listener() {
        let bus = LocalChannel::new();
        let subscription = mount_agent_steps(&bus).await.expect("mounted");
        assert_eq!(bus.subscriber_count(AGENT_STEP_CHANNEL), 1);

        drop(subscription);

        assert_eq!(bus.subscriber_count(AGENT_STEP_CHANNEL), 0);
        assert_eq!(bus.publish(step("a")), 0);
    }

    #[tokio::test]
    async fn explicit_unsubscribe_releases_once() {
        let bus = LocalChannel::new();
        let subscription = bus
            .subscribe(AGENT_STEP_CHANNEL, ReplayFrom::Tip)
            .await
            .expect("subscribe");
        assert!(subscription.is_active());

        subscription.unsubscribe();
        assert_eq!(bus.subscriber_count(AGENT_STEP_CHANNEL), 0);
    }

    #[tokio::test]
    async fn errors_reach_every_registered_listener() {
        let bus = LocalChannel::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        bus.on_error(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let _subscription = mount_agent_steps(&bus).await.expect("mounted");
        assert_eq!(bus.error_listener_count(), 2);

        bus.report_error(&ChannelError::Delivery {
            stage: "test",
            channel: AGENT_STEP_CHANNEL.to_string(),
            message: "connection reset".to_string(),
        });

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mount_channel_subscribes_to_configured_name() {
        let bus = LocalChannel::new();
        let _subscription = mount_channel(&bus, "/event/Custom__e")
            .await
            .expect("mounted");

        assert_eq!(bus.subscriber_count("/event/Custom__e"), 1);
        assert_eq!(bus.subscriber_count(AGENT_STEP_CHANNEL), 0);
    }

    #[tokio::test]
    async fn each_mount_adds_an_error_listener() {
        let bus = LocalChannel::new();
        let first = mount_agent_steps(&bus).await.expect("mounted");
        drop(first);
        let _second = mount_agent_steps(&bus).await.expect("mounted");

        assert_eq!(bus.subscriber_count(AGENT_STEP_CHANNEL), 1);
        assert_eq!(bus.error_listener_count(), 2);
    }
}
