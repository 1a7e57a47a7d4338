use tracing::info;

use crate::aggregate::AggregateRecord;
use crate::error::SyncResult;
use crate::lifecycle::{SimulationLifecycle, SimulationStatus};
use crate::reactive::EventStream;
use crate::store::SnapshotValue;

/// Writes the sentinel aggregate whenever a simulation this client owns
/// enters `Starting`.
///
/// The status stream has no replay, so subscribing again never re-fires a
/// past transition.
#[derive(Debug)]
pub struct ResetOnRestart {
    store_key: String,
    statuses: EventStream<SimulationStatus>,
    // A transition read ahead of a payload that must be applied first.
    held: Option<(u64, SimulationStatus)>,
}

impl ResetOnRestart {
    /// Watch `statuses` and reset `store_key`.
    #[must_use]
    pub fn new(store_key: impl Into<String>, statuses: EventStream<SimulationStatus>) -> Self {
        Self {
            store_key: store_key.into(),
            statuses,
            held: None,
        }
    }

    /// Handle every queued transition. Returns how many resets were written.
    pub fn process_pending(&mut self, lifecycle: &dyn SimulationLifecycle) -> SyncResult<usize> {
        self.process_before(lifecycle, u64::MAX)
    }

    /// Handle the queued transitions stamped before `sequence`; later ones
    /// stay queued.
    pub fn process_before(&mut self, lifecycle: &dyn SimulationLifecycle, sequence: u64) -> SyncResult<usize> {
        let mut resets = 0;
        while let Some((stamp, status)) = self.held.take().or_else(|| self.statuses.try_recv_stamped()) {
            if stamp >= sequence {
                self.held = Some((stamp, status));
                break;
            }
            if status != SimulationStatus::Starting || !lifecycle.client_owns_active_simulation() {
                continue;
            }
            lifecycle.write_snapshot(&self.store_key, SnapshotValue::Aggregate(AggregateRecord::sentinel()))?;
            info!(key = %self.store_key, "simulation starting; aggregate reset");
            resets += 1;
        }
        Ok(resets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::lifecycle::SessionLifecycle;
    use crate::store::{keys, KeyedStore};

    fn session() -> SessionLifecycle {
        SessionLifecycle::new(Arc::new(KeyedStore::<SnapshotValue>::new())).unwrap()
    }

    fn stored(s: &SessionLifecycle) -> AggregateRecord {
        s.read_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS)
            .unwrap()
            .and_then(|v| v.as_aggregate().cloned())
            .unwrap()
    }

    #[test]
    fn owned_start_resets_previous_value() {
        let s = session();
        let mut reset = ResetOnRestart::new(keys::TOTAL_VOLTAGE_VIOLATIONS, s.status_stream());
        s.write_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS, AggregateRecord::new(9, 1, "t").into())
            .unwrap();

        s.start_simulation("1", true).unwrap();
        assert_eq!(reset.process_pending(&s).unwrap(), 1);
        assert_eq!(stored(&s), AggregateRecord::sentinel());
    }

    #[test]
    fn foreign_start_leaves_value() {
        let s = session();
        let mut reset = ResetOnRestart::new(keys::TOTAL_VOLTAGE_VIOLATIONS, s.status_stream());
        s.write_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS, AggregateRecord::new(9, 1, "t").into())
            .unwrap();

        s.start_simulation("1", false).unwrap();
        assert_eq!(reset.process_pending(&s).unwrap(), 0);
        assert_eq!(stored(&s).count, 9);
    }

    #[test]
    fn other_transitions_do_not_reset() {
        let s = session();
        s.start_simulation("1", true).unwrap();
        let mut reset = ResetOnRestart::new(keys::TOTAL_VOLTAGE_VIOLATIONS, s.status_stream());
        s.write_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS, AggregateRecord::new(4, 0, "t").into())
            .unwrap();

        for status in [
            SimulationStatus::Started,
            SimulationStatus::Paused,
            SimulationStatus::Resumed,
            SimulationStatus::Stopped,
        ] {
            s.set_status(status).unwrap();
        }
        assert_eq!(reset.process_pending(&s).unwrap(), 0);
        assert_eq!(stored(&s).count, 4);
    }

    #[test]
    fn later_transitions_wait_for_the_bound() {
        let s = session();
        s.start_simulation("1", true).unwrap();
        let mut reset = ResetOnRestart::new(keys::TOTAL_VOLTAGE_VIOLATIONS, s.status_stream());
        s.write_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS, AggregateRecord::new(4, 0, "t").into())
            .unwrap();

        s.set_status(SimulationStatus::Starting).unwrap();
        assert_eq!(reset.process_before(&s, 0).unwrap(), 0);
        assert_eq!(stored(&s).count, 4);

        assert_eq!(reset.process_pending(&s).unwrap(), 1);
        assert_eq!(stored(&s), AggregateRecord::sentinel());
    }

    #[test]
    fn resubscribing_does_not_refire_past_start() {
        let s = session();
        s.start_simulation("1", true).unwrap();
        s.write_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS, AggregateRecord::new(4, 0, "t").into())
            .unwrap();

        let mut reset = ResetOnRestart::new(keys::TOTAL_VOLTAGE_VIOLATIONS, s.status_stream());
        assert_eq!(reset.process_pending(&s).unwrap(), 0);
        assert_eq!(stored(&s).count, 4);
    }
}
