use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};

use crate::error::{SubscriptionError, SyncError, SyncResult};

use super::hub::{Registry, SubscriptionId};

/// A subscriber handle for a [`Broadcast`](super::Broadcast) or [`ValueCell`](super::ValueCell).
///
/// Dropping this stream unregisters it from its hub before returning, so no
/// publish that starts afterwards can reach it.
#[derive(Debug)]
pub struct EventStream<T> {
    subscription_id: SubscriptionId,
    label: Arc<str>,
    rx: Receiver<(u64, T)>,
    registry: Weak<Registry<T>>,
    unregistered: AtomicBool,
}

impl<T> EventStream<T> {
    pub(crate) fn new(
        subscription_id: SubscriptionId,
        label: Arc<str>,
        rx: Receiver<(u64, T)>,
        registry: Weak<Registry<T>>,
    ) -> Self {
        Self {
            subscription_id,
            label,
            rx,
            registry,
            unregistered: AtomicBool::new(false),
        }
    }

    /// The subscription id backing this stream.
    #[must_use]
    pub const fn subscription_id(&self) -> SubscriptionId {
        self.subscription_id
    }

    /// Explicit unregistration.
    ///
    /// Idempotent. Events already queued stay readable; nothing new arrives.
    pub fn unsubscribe(&self) {
        if self.unregistered.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.subscription_id);
        }
    }

    /// Returns true once [`unsubscribe`](Self::unsubscribe) has been called.
    #[must_use]
    pub fn is_unsubscribed(&self) -> bool {
        self.unregistered.load(Ordering::Acquire)
    }

    /// Take the next queued event without waiting.
    pub fn try_recv(&self) -> Option<T> {
        self.try_recv_stamped().map(|(_, event)| event)
    }

    /// Like [`try_recv`](Self::try_recv), with the stamp the event was
    /// published under. Stamps order events across every stream and payload
    /// queue in the process.
    pub fn try_recv_stamped(&self) -> Option<(u64, T)> {
        match self.rx.try_recv() {
            Ok(stamped) => Some(stamped),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Receive the next event, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> SyncResult<T> {
        self.rx.recv_timeout(timeout).map(|(_, event)| event).map_err(|err| match err {
            RecvTimeoutError::Timeout => SyncError::Subscription(SubscriptionError::StreamTimeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            }),
            RecvTimeoutError::Disconnected => SyncError::Subscription(SubscriptionError::Disconnected {
                topic: self.label.to_string(),
            }),
        })
    }

    /// Take every queued event, oldest first.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().map(|(_, event)| event).collect()
    }

    /// Take every queued event and keep only the newest.
    pub fn latest(&self) -> Option<T> {
        self.rx.try_iter().last().map(|(_, event)| event)
    }

    /// Number of events waiting to be read.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

impl<T> Drop for EventStream<T> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
