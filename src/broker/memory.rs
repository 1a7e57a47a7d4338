//! In-memory broker.
//!
//! Topic fan-out inside one process. Intended for embedded usage, tests, and
//! as a reference implementation of [`MessageBroker`].

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::SubscriptionError;

use super::traits::{BrokerHandle, Delivery, MessageBroker, PayloadSink};

#[derive(Debug)]
struct Route {
    handle: BrokerHandle,
    sink: PayloadSink,
}

#[derive(Debug, Default)]
struct BrokerState {
    routes: Vec<Route>,
    refuse: Option<String>,
}

/// Thread-safe in-memory broker.
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
}

impl InMemoryBroker {
    /// Create a broker with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Routes are only pushed and retained; no half-applied state exists.
    fn lock(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Deliver `body` to every subscriber of `topic`. Returns how many
    /// accepted it. Sinks reporting cancellation are forgotten.
    pub fn publish(&self, topic: &str, body: &str) -> usize {
        let sinks: Vec<PayloadSink> = self
            .lock()
            .routes
            .iter()
            .filter(|r| r.sink.topic() == topic)
            .map(|r| r.sink.clone())
            .collect();

        let mut accepted = 0;
        let mut cancelled = false;
        for sink in &sinks {
            match sink.deliver(body) {
                Delivery::Accepted | Delivery::Evicted => accepted += 1,
                Delivery::Full => {}
                Delivery::Cancelled => cancelled = true,
            }
        }
        if cancelled {
            self.lock().routes.retain(|r| !r.sink.is_cancelled());
        }
        accepted
    }

    /// Make every later `subscribe` fail with `reason`; `None` accepts again.
    pub fn refuse_subscriptions(&self, reason: Option<&str>) {
        self.lock().refuse = reason.map(str::to_string);
    }

    /// Live subscriptions on `topic`.
    #[must_use]
    pub fn live_subscriptions(&self, topic: &str) -> usize {
        self.lock()
            .routes
            .iter()
            .filter(|r| r.sink.topic() == topic && !r.sink.is_cancelled())
            .count()
    }

    /// Topics with at least one live subscription, sorted and deduplicated.
    #[must_use]
    pub fn subscribed_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .lock()
            .routes
            .iter()
            .filter(|r| !r.sink.is_cancelled())
            .map(|r| r.sink.topic().to_string())
            .collect();
        topics.sort();
        topics.dedup();
        topics
    }
}

impl MessageBroker for InMemoryBroker {
    fn subscribe(&self, topic: &str, sink: PayloadSink) -> Result<BrokerHandle, SubscriptionError> {
        let mut state = self.lock();
        if let Some(reason) = state.refuse.as_ref() {
            return Err(SubscriptionError::Refused {
                topic: topic.to_string(),
                reason: reason.clone(),
            });
        }
        let handle = BrokerHandle::new();
        state.routes.push(Route { handle, sink });
        Ok(handle)
    }

    fn unsubscribe(&self, handle: BrokerHandle) {
        self.lock().routes.retain(|r| r.handle != handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::broker::TopicSubscription;

    #[test]
    fn publish_fans_out_per_topic() {
        let broker = Arc::new(InMemoryBroker::new());
        let a1 = TopicSubscription::open(broker.clone(), "a", 4).unwrap();
        let a2 = TopicSubscription::open(broker.clone(), "a", 4).unwrap();
        let b = TopicSubscription::open(broker.clone(), "b", 4).unwrap();

        assert_eq!(broker.publish("a", "x"), 2);
        assert_eq!(a1.try_next().as_deref(), Some("x"));
        assert_eq!(a2.try_next().as_deref(), Some("x"));
        assert_eq!(b.try_next(), None);
        assert_eq!(broker.subscribed_topics(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn refusal_can_be_lifted() {
        let broker = Arc::new(InMemoryBroker::new());
        broker.refuse_subscriptions(Some("down"));
        assert!(TopicSubscription::open(broker.clone(), "a", 4).is_err());
        broker.refuse_subscriptions(None);
        assert!(TopicSubscription::open(broker.clone(), "a", 4).is_ok());
    }

    #[test]
    fn unknown_handle_unsubscribe_is_ignored() {
        let broker = InMemoryBroker::new();
        broker.unsubscribe(BrokerHandle::new());
        assert!(broker.subscribed_topics().is_empty());
    }
}
