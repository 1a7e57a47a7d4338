//! Broker client contract and the payload sink handed to it.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::SubscriptionError;
use crate::reactive::hub::next_sequence;

/// Opaque handle the broker returns for one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BrokerHandle(Uuid);

impl BrokerHandle {
    /// Create a new random handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BrokerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Cancellation flag shared between a subscriber and its broker.
///
/// Once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// True once [`cancel`](Self::cancel) has been called on any clone.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of handing one payload to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the subscriber.
    Accepted,
    /// Queued after dropping the oldest queued payload to make room.
    Evicted,
    /// The queue stayed full; this payload was dropped.
    Full,
    /// The subscription is gone; the broker should forget this sink.
    Cancelled,
}

/// Where a broker pushes raw payload bodies for one subscription.
///
/// Each body is stamped on arrival. A full queue sheds its oldest body, so
/// the subscriber always ends up with the newest data.
#[derive(Debug, Clone)]
pub struct PayloadSink {
    topic: Arc<str>,
    tx: Sender<(u64, String)>,
    // Used only to evict the oldest body.
    evict: Receiver<(u64, String)>,
    token: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl PayloadSink {
    pub(crate) fn new(
        topic: &str,
        tx: Sender<(u64, String)>,
        evict: Receiver<(u64, String)>,
        token: CancellationToken,
        dropped: Arc<AtomicU64>,
    ) -> Self {
        Self {
            topic: Arc::from(topic),
            tx,
            evict,
            token,
            dropped,
        }
    }

    /// Topic this sink was opened for.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// True once the subscriber cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Queue one payload body without blocking.
    pub fn deliver(&self, body: impl Into<String>) -> Delivery {
        if self.token.is_cancelled() {
            return Delivery::Cancelled;
        }
        let stamped = (next_sequence(), body.into());
        let stamped = match self.tx.try_send(stamped) {
            Ok(()) => return Delivery::Accepted,
            Err(TrySendError::Full(stamped)) => stamped,
            Err(TrySendError::Disconnected(_)) => return Delivery::Cancelled,
        };

        if self.evict.try_recv().is_ok() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(topic = %self.topic, "payload queue full; dropping oldest payload");
        }
        match self.tx.try_send(stamped) {
            Ok(()) => Delivery::Evicted,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(topic = %self.topic, "payload queue full; dropping payload");
                Delivery::Full
            }
            Err(TrySendError::Disconnected(_)) => Delivery::Cancelled,
        }
    }
}

/// Message-broker client.
///
/// Implementations push payload bodies for `topic` into the sink until
/// `unsubscribe` is called or the sink reports [`Delivery::Cancelled`].
pub trait MessageBroker: Send + Sync {
    /// Start delivering `topic` to `sink`.
    fn subscribe(&self, topic: &str, sink: PayloadSink) -> Result<BrokerHandle, SubscriptionError>;

    /// Stop delivering for `handle`. Unknown handles are ignored.
    fn unsubscribe(&self, handle: BrokerHandle);
}
