//! Abstract snapshot store contract.
//!
//! The lifecycle facade reaches the store only through this trait, so tests
//! and embedders can inject their own backend.

use crate::error::SyncResult;
use crate::reactive::EventStream;

use super::snapshot::SnapshotValue;

/// Process-wide key → latest value store.
///
/// # Contract
/// - One latest value per key; no history.
/// - `set` is visible to every current and future `select` before it returns.
/// - Absent values (see [`SnapshotValue::is_absent`]) are never stored.
pub trait SnapshotStore: Send + Sync {
    /// Stream of values for `key`, replaying the current one first.
    fn select(&self, key: &str) -> SyncResult<EventStream<SnapshotValue>>;

    /// Current value for `key`.
    fn get(&self, key: &str) -> SyncResult<Option<SnapshotValue>>;

    /// Replace the value for `key`. Returns false when the value was absent
    /// and nothing was written.
    fn set(&self, key: &str, value: SnapshotValue) -> SyncResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Compile-time test: ensure the trait is object-safe
    fn _assert_snapshot_store_object_safe(_: &dyn SnapshotStore) {}
}
