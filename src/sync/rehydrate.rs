use tracing::debug;

use crate::aggregate::AggregateRecord;
use crate::error::SyncResult;
use crate::lifecycle::SimulationLifecycle;
use crate::store::SnapshotValue;

/// Reads the last known aggregate for a remounted view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RehydrationReader {
    store_key: String,
}

impl RehydrationReader {
    /// Reader for `store_key`.
    #[must_use]
    pub fn new(store_key: impl Into<String>) -> Self {
        Self {
            store_key: store_key.into(),
        }
    }

    /// The key read.
    #[must_use]
    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    /// Last stored aggregate, if the client is still inside an active
    /// simulation and the stored value is real data.
    ///
    /// The sentinel and non-aggregate values read as `None`.
    pub fn read(&self, lifecycle: &dyn SimulationLifecycle) -> SyncResult<Option<AggregateRecord>> {
        if !lifecycle.is_client_still_in_active_simulation() {
            return Ok(None);
        }
        let value = lifecycle.read_snapshot(&self.store_key)?;
        Ok(match value {
            Some(SnapshotValue::Aggregate(record)) => record.into_present(),
            Some(SnapshotValue::Json(_)) => {
                debug!(key = %self.store_key, "snapshot value is not an aggregate; ignoring");
                None
            }
            None => None,
        })
    }
}
