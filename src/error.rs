//! Error types for gridsync.
//!
//! All errors are strongly typed using thiserror so callers can match on the
//! exact failure. Only store failures escape the sync pump; subscription
//! refusals and malformed payloads are counted and logged instead.

use thiserror::Error;

/// Validation errors that occur during input validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Store key cannot be empty")]
    EmptyStoreKey,

    #[error("Simulation id cannot be empty")]
    EmptySimulationId,

    #[error("Invalid topic segment '{segment}': only ASCII letters, digits, '_' and '-' are allowed")]
    InvalidTopicSegment {
        segment: String,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        reason: String,
    },
}

/// Broker-level failures to subscribe or deliver.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("Subscription to '{topic}' refused: {reason}")]
    Refused {
        topic: String,
        reason: String,
    },

    #[error("Stream disconnected: {topic}")]
    Disconnected {
        topic: String,
    },

    #[error("No event received within {duration_ms}ms")]
    StreamTimeout {
        duration_ms: u64,
    },
}

/// Snapshot store failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Poisoned lock: {context}")]
    PoisonedLock {
        context: &'static str,
    },
}

/// A payload the reducer could not interpret.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedPayload {
    #[error("Failed to decode payload from '{topic}': {message}")]
    Decode {
        topic: String,
        message: String,
    },

    #[error("Payload rejected: {reason}")]
    Rejected {
        reason: String,
    },
}

/// Top-level error type for gridsync.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Subscription error: {0}")]
    Subscription(#[from] SubscriptionError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] MalformedPayload),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SyncError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a subscription error.
    #[must_use]
    pub const fn is_subscription(&self) -> bool {
        matches!(self, Self::Subscription(_))
    }

    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if a payload could not be interpreted.
    #[must_use]
    pub const fn is_malformed_payload(&self) -> bool {
        matches!(self, Self::MalformedPayload(_))
    }

    /// Returns true if retrying the same call could succeed.
    ///
    /// Refused subscriptions are not retried here; a new simulation id is the
    /// retry path.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Subscription(e) => matches!(e, SubscriptionError::StreamTimeout { .. }),
            Self::Validation(_) | Self::Store(_) | Self::MalformedPayload(_) | Self::Internal { .. } => false,
        }
    }
}

/// Result type alias for gridsync operations.
pub type SyncResult<T> = Result<T, SyncError>;
