//! In-memory keyed reactive store.
//!
//! Each key owns a [`ValueCell`], so writes to one key are atomic and never
//! contend with subscribers of another. The key map itself is behind an
//! `RwLock` and only written when a key is first seen.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::error::{StoreError, SyncResult, ValidationError};
use crate::reactive::{EventStream, ValueCell};

use super::snapshot::SnapshotValue;
use super::traits::SnapshotStore;

fn lock_err(context: &'static str) -> StoreError {
    StoreError::PoisonedLock { context }
}

fn validate_key(key: &str) -> Result<(), ValidationError> {
    if key.trim().is_empty() {
        return Err(ValidationError::EmptyStoreKey);
    }
    Ok(())
}

/// Thread-safe keyed store of latest values.
#[derive(Debug)]
pub struct KeyedStore<V> {
    cells: RwLock<HashMap<String, Arc<ValueCell<V>>>>,
}

impl<V> Default for KeyedStore<V> {
    fn default() -> Self {
        Self {
            cells: RwLock::new(HashMap::new()),
        }
    }
}

impl<V: Clone> KeyedStore<V> {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self, key: &str) -> SyncResult<Arc<ValueCell<V>>> {
        validate_key(key)?;
        {
            let cells = self.cells.read().map_err(|_| lock_err("store.cell.read"))?;
            if let Some(cell) = cells.get(key) {
                return Ok(Arc::clone(cell));
            }
        }
        let mut cells = self.cells.write().map_err(|_| lock_err("store.cell.write"))?;
        let cell = cells
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(ValueCell::new(key)));
        Ok(Arc::clone(cell))
    }

    /// Stream of values for `key`: the current value (if any), then every
    /// later write.
    pub fn select(&self, key: &str) -> SyncResult<EventStream<V>> {
        Ok(self.cell(key)?.subscribe())
    }

    /// Replace the value for `key`, notifying subscribers in subscription order.
    pub fn set(&self, key: &str, value: V) -> SyncResult<()> {
        let delivered = self.cell(key)?.set(value);
        trace!(key, delivered, "store set");
        Ok(())
    }

    /// Like [`set`](Self::set), but `None` is a no-op. Returns whether a
    /// value was written.
    pub fn set_optional(&self, key: &str, value: Option<V>) -> SyncResult<bool> {
        match value {
            Some(v) => {
                self.set(key, v)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current value for `key`.
    pub fn get(&self, key: &str) -> SyncResult<Option<V>> {
        validate_key(key)?;
        let cells = self.cells.read().map_err(|_| lock_err("store.get"))?;
        Ok(cells.get(key).and_then(|cell| cell.get()))
    }

    /// Discard the value for `key` without notifying. Subscribers stay
    /// registered and see the next write.
    pub fn remove(&self, key: &str) -> SyncResult<Option<V>> {
        validate_key(key)?;
        let cells = self.cells.read().map_err(|_| lock_err("store.remove"))?;
        Ok(cells.get(key).and_then(|cell| cell.clear()))
    }

    /// Keys currently holding a value, sorted.
    pub fn keys(&self) -> SyncResult<Vec<String>> {
        let cells = self.cells.read().map_err(|_| lock_err("store.keys"))?;
        let mut out: Vec<String> = cells
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|(k, _)| k.clone())
            .collect();
        out.sort();
        Ok(out)
    }

    /// Number of keys currently holding a value.
    pub fn len(&self) -> SyncResult<usize> {
        Ok(self.keys()?.len())
    }

    /// True when no key holds a value.
    pub fn is_empty(&self) -> SyncResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Live subscribers on `key`.
    pub fn subscriber_count(&self, key: &str) -> SyncResult<usize> {
        validate_key(key)?;
        let cells = self.cells.read().map_err(|_| lock_err("store.subscriber_count"))?;
        Ok(cells.get(key).map_or(0, |cell| cell.subscriber_count()))
    }
}

impl SnapshotStore for KeyedStore<SnapshotValue> {
    fn select(&self, key: &str) -> SyncResult<EventStream<SnapshotValue>> {
        KeyedStore::select(self, key)
    }

    fn get(&self, key: &str) -> SyncResult<Option<SnapshotValue>> {
        KeyedStore::get(self, key)
    }

    fn set(&self, key: &str, value: SnapshotValue) -> SyncResult<bool> {
        let value = if value.is_absent() { None } else { Some(value) };
        self.set_optional(key, value)
    }
}
