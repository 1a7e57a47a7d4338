use std::sync::{Mutex, MutexGuard, PoisonError};

use super::hub::Broadcast;
use super::stream::EventStream;

/// Latest-value cell: subscribers first receive the current value (if any),
/// then every later [`set`](Self::set).
///
/// `set` and `subscribe` hold the same lock, so a subscriber never misses a
/// write nor sees one twice.
#[derive(Debug)]
pub struct ValueCell<T> {
    latest: Mutex<Option<T>>,
    hub: Broadcast<T>,
}

impl<T: Clone> ValueCell<T> {
    /// An empty cell.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            latest: Mutex::new(None),
            hub: Broadcast::new(label),
        }
    }

    /// A cell holding `initial`.
    #[must_use]
    pub fn with_value(label: impl Into<String>, initial: T) -> Self {
        Self {
            latest: Mutex::new(Some(initial)),
            hub: Broadcast::new(label),
        }
    }

    // Holds a plain Option; a poisoned guard still has a whole value.
    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the value and notify current subscribers in subscription order.
    pub fn set(&self, value: T) -> usize {
        let mut latest = self.lock();
        *latest = Some(value.clone());
        self.hub.publish(&value)
    }

    /// Forget the value without notifying anyone.
    pub fn clear(&self) -> Option<T> {
        self.lock().take()
    }

    /// Current value.
    #[must_use]
    pub fn get(&self) -> Option<T> {
        self.lock().clone()
    }

    /// Subscribe, replaying the current value first.
    #[must_use]
    pub fn subscribe(&self) -> EventStream<T> {
        let latest = self.lock();
        self.hub.subscribe_with(latest.clone())
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }
}
