//! The narrow lifecycle interface the sync core consumes.

use crate::error::SyncResult;
use crate::reactive::EventStream;
use crate::store::SnapshotValue;

use super::status::{SimulationId, SimulationStatus};

/// Simulation lifecycle as seen by one client session.
///
/// The status state machine and the notion of "who started the simulation"
/// live behind this trait; the sync core only observes them.
pub trait SimulationLifecycle: Send + Sync {
    /// Current simulation id, replayed on subscribe. Emits on every change,
    /// including a change back to the empty id.
    fn simulation_id_stream(&self) -> EventStream<SimulationId>;

    /// Status transitions from the moment of subscription on. No replay.
    fn status_stream(&self) -> EventStream<SimulationStatus>;

    /// True iff this session started the currently active simulation.
    fn client_owns_active_simulation(&self) -> bool;

    /// True while this session is inside a simulation that has not stopped.
    fn is_client_still_in_active_simulation(&self) -> bool;

    /// Simulation time of the latest output, in epoch seconds.
    fn output_timestamp(&self) -> Option<i64>;

    /// Stored snapshot value for `key`.
    fn read_snapshot(&self, key: &str) -> SyncResult<Option<SnapshotValue>>;

    /// Replace the snapshot value for `key`. Returns false for absent values.
    fn write_snapshot(&self, key: &str, value: SnapshotValue) -> SyncResult<bool>;

    /// Stream of snapshot values for `key`, replaying the current one first.
    fn select_snapshot(&self, key: &str) -> SyncResult<EventStream<SnapshotValue>>;
}
