use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use tracing::debug;

use crate::error::SubscriptionError;

use super::traits::{BrokerHandle, CancellationToken, MessageBroker, PayloadSink};

/// One live broker subscription.
///
/// Dropping it cancels the token, unsubscribes from the broker and discards
/// every queued payload, in that order. After that no payload of this
/// subscription can be read, whatever the broker does.
pub struct TopicSubscription {
    topic: String,
    handle: BrokerHandle,
    rx: Receiver<(u64, String)>,
    token: CancellationToken,
    dropped: Arc<AtomicU64>,
    broker: Arc<dyn MessageBroker>,
}

impl std::fmt::Debug for TopicSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicSubscription")
            .field("topic", &self.topic)
            .field("handle", &self.handle)
            .field("cancelled", &self.token.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl TopicSubscription {
    /// Subscribe to `topic` with a queue of `capacity` payloads.
    pub fn open(
        broker: Arc<dyn MessageBroker>,
        topic: impl Into<String>,
        capacity: usize,
    ) -> Result<Self, SubscriptionError> {
        let topic = topic.into();
        let (tx, rx) = bounded::<(u64, String)>(capacity.max(1));
        let token = CancellationToken::new();
        let dropped = Arc::new(AtomicU64::new(0));

        let sink = PayloadSink::new(&topic, tx, rx.clone(), token.clone(), Arc::clone(&dropped));
        let handle = broker.subscribe(&topic, sink)?;
        debug!(topic = %topic, "topic subscription opened");

        Ok(Self {
            topic,
            handle,
            rx,
            token,
            dropped,
            broker,
        })
    }

    /// The subscribed topic.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The broker's handle for this subscription.
    #[must_use]
    pub const fn handle(&self) -> BrokerHandle {
        self.handle
    }

    /// Next queued payload body, or `None` when empty or cancelled.
    pub fn try_next(&self) -> Option<String> {
        self.try_next_stamped().map(|(_, body)| body)
    }

    /// Next queued payload with the stamp it arrived under.
    pub fn try_next_stamped(&self) -> Option<(u64, String)> {
        if self.token.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Payloads waiting to be read.
    #[must_use]
    pub fn pending(&self) -> usize {
        if self.token.is_cancelled() {
            return 0;
        }
        self.rx.len()
    }

    /// Payloads dropped to make room for newer ones.
    #[must_use]
    pub fn dropped_payloads(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// True once cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel now. Idempotent.
    pub fn cancel(&self) {
        if self.token.is_cancelled() {
            return;
        }
        self.token.cancel();
        self.broker.unsubscribe(self.handle);
        let discarded = self.rx.try_iter().count();
        debug!(topic = %self.topic, discarded, "topic subscription closed");
    }
}

impl Drop for TopicSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
