//! Derived per-topic metric records.

use serde::{Deserialize, Serialize};

/// The summary one topic payload reduces to.
///
/// `count == -1` is the sentinel for "not yet computed", distinct from a
/// genuine zero.
///
/// # Examples
///
/// ```
/// use gridsync::AggregateRecord;
///
/// let fresh = AggregateRecord::sentinel();
/// assert!(fresh.is_sentinel());
///
/// let none_violating = AggregateRecord::new(0, 0, "2024-01-01 00:00:00");
/// assert!(!none_violating.is_sentinel());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateRecord {
    /// Number of entries in the payload.
    pub count: i64,
    /// Number of entries whose value is exactly zero.
    pub count_at_zero: i64,
    /// Simulation output time the payload belongs to, already formatted.
    pub timestamp: String,
}

impl AggregateRecord {
    /// Value used for "not yet computed".
    pub const SENTINEL_COUNT: i64 = -1;

    /// Creates a record.
    #[must_use]
    pub fn new(count: i64, count_at_zero: i64, timestamp: impl Into<String>) -> Self {
        Self {
            count,
            count_at_zero,
            timestamp: timestamp.into(),
        }
    }

    /// The reset record: `{count: -1, countAtZero: -1, timestamp: ""}`.
    #[must_use]
    pub const fn sentinel() -> Self {
        Self {
            count: Self::SENTINEL_COUNT,
            count_at_zero: Self::SENTINEL_COUNT,
            timestamp: String::new(),
        }
    }

    /// True when this record means "no data yet".
    #[must_use]
    pub const fn is_sentinel(&self) -> bool {
        self.count == Self::SENTINEL_COUNT
    }

    /// `None` for the sentinel, the record otherwise.
    #[must_use]
    pub fn into_present(self) -> Option<Self> {
        if self.is_sentinel() {
            None
        } else {
            Some(self)
        }
    }
}

impl Default for AggregateRecord {
    fn default() -> Self {
        Self::sentinel()
    }
}
