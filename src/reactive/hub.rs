//! Ordered subscriber registry and the pure event [`Broadcast`] built on it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::{unbounded, Sender};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stream::EventStream;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Next process-wide event stamp. Stamps only grow, so events from
/// different streams can be replayed in the order they happened.
pub(crate) fn next_sequence() -> u64 {
    SEQUENCE.fetch_add(1, Ordering::Relaxed) + 1
}

/// Unique identifier for a stream subscription.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Create a new random subscription id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Subscribers in registration order.
#[derive(Debug)]
pub(crate) struct Registry<T> {
    label: Arc<str>,
    subscribers: Mutex<Vec<(SubscriptionId, Sender<(u64, T)>)>>,
}

impl<T> Registry<T> {
    fn new(label: Arc<str>) -> Self {
        Self {
            label,
            subscribers: Mutex::new(Vec::new()),
        }
    }

    // The list only holds senders; a panic mid-publish cannot leave it torn.
    fn lock(&self) -> MutexGuard<'_, Vec<(SubscriptionId, Sender<(u64, T)>)>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn remove(&self, id: SubscriptionId) {
        self.lock().retain(|(sub, _)| *sub != id);
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Pure event fan-out: every [`publish`](Self::publish) is pushed to the
/// subscribers registered at that instant, in subscription order.
///
/// New subscribers never see past events.
#[derive(Debug)]
pub struct Broadcast<T> {
    registry: Arc<Registry<T>>,
}

impl<T: Clone> Broadcast<T> {
    /// Create a hub; `label` names it in disconnect errors.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        let label: String = label.into();
        Self {
            registry: Arc::new(Registry::new(Arc::from(label))),
        }
    }

    /// Register a new subscriber.
    #[must_use]
    pub fn subscribe(&self) -> EventStream<T> {
        self.subscribe_with(None)
    }

    /// Register a new subscriber whose queue starts with `replay`.
    ///
    /// Callers that need replay atomic with publishes must serialize both
    /// themselves (see [`ValueCell`](super::ValueCell)).
    pub(crate) fn subscribe_with(&self, replay: Option<T>) -> EventStream<T> {
        let (tx, rx) = unbounded::<(u64, T)>();
        if let Some(value) = replay {
            // Receiver is alive in this scope; send cannot fail.
            let _ = tx.send((next_sequence(), value));
        }
        let id = SubscriptionId::new();
        self.registry.lock().push((id, tx));
        EventStream::new(id, Arc::clone(&self.registry.label), rx, Arc::downgrade(&self.registry))
    }

    /// Push `event` to every current subscriber. Returns how many received it.
    ///
    /// Every subscriber sees the same stamp for one publish.
    pub fn publish(&self, event: &T) -> usize {
        let mut subscribers = self.registry.lock();
        let sequence = next_sequence();
        let mut delivered = 0;
        subscribers.retain(|(_, tx)| {
            if tx.send((sequence, event.clone())).is_ok() {
                delivered += 1;
                true
            } else {
                false
            }
        });
        delivered
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_reaches_subscribers_in_order() {
        let hub = Broadcast::<u32>::new("test");
        let a = hub.subscribe();
        let b = hub.subscribe();

        assert_eq!(hub.publish(&1), 2);
        assert_eq!(hub.publish(&2), 2);

        assert_eq!(a.drain(), vec![1, 2]);
        assert_eq!(b.drain(), vec![1, 2]);
    }

    #[test]
    fn stamps_grow_across_hubs() {
        let status = Broadcast::<u32>::new("status");
        let ids = Broadcast::<&str>::new("ids");
        let a = status.subscribe();
        let b = ids.subscribe();

        status.publish(&1);
        ids.publish(&"x");
        status.publish(&2);

        let (first, _) = a.try_recv_stamped().unwrap();
        let (second, _) = b.try_recv_stamped().unwrap();
        let (third, _) = a.try_recv_stamped().unwrap();
        assert!(first < second && second < third);
    }

    #[test]
    fn late_subscriber_sees_no_history() {
        let hub = Broadcast::<u32>::new("test");
        hub.publish(&7);
        let late = hub.subscribe();
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn dropping_stream_unregisters_synchronously() {
        let hub = Broadcast::<u32>::new("test");
        let a = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);
        drop(a);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.publish(&1), 0);
    }

    #[test]
    fn unsubscribe_is_idempotent_and_keeps_queued_events() {
        let hub = Broadcast::<u32>::new("test");
        let a = hub.subscribe();
        hub.publish(&1);
        a.unsubscribe();
        a.unsubscribe();
        hub.publish(&2);
        assert!(a.is_unsubscribed());
        assert_eq!(a.drain(), vec![1]);
    }

    #[test]
    fn recv_timeout_reports_disconnect_after_hub_dropped() {
        let hub = Broadcast::<u32>::new("status");
        let a = hub.subscribe();
        drop(hub);
        let err = a.recv_timeout(std::time::Duration::from_millis(5)).unwrap_err();
        assert!(err.to_string().contains("status"));
    }
}
