//! In-process lifecycle for one dashboard session.
//!
//! Drives the id and status streams the sync core watches and answers the
//! ownership questions. The platform-facing state machine feeds it through
//! the `start_simulation` / `set_status` / `end_simulation` calls.

use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{StoreError, SyncResult, ValidationError};
use crate::reactive::{Broadcast, EventStream, ValueCell};
use crate::store::{SimulationSnapshot, SnapshotStore, SnapshotValue};

use super::facade::SimulationLifecycle;
use super::status::{SimulationId, SimulationStatus};

#[derive(Debug, Clone)]
struct ActiveSimulation {
    id: SimulationId,
    owned_by_client: bool,
    status: SimulationStatus,
}

#[derive(Debug, Default)]
struct SessionState {
    active: Option<ActiveSimulation>,
    output_timestamp: Option<i64>,
}

/// Session-scoped [`SimulationLifecycle`] backed by an injected snapshot store.
pub struct SessionLifecycle {
    store: Arc<dyn SnapshotStore>,
    simulation_id: ValueCell<SimulationId>,
    statuses: Broadcast<SimulationStatus>,
    state: RwLock<SessionState>,
}

impl std::fmt::Debug for SessionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionLifecycle")
            .field("simulation_id", &self.simulation_id.get())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl SessionLifecycle {
    /// Create a session over `store`, seeding it with the default snapshot.
    pub fn new(store: Arc<dyn SnapshotStore>) -> SyncResult<Self> {
        let session = Self {
            store,
            simulation_id: ValueCell::with_value("simulationId", SimulationId::none()),
            statuses: Broadcast::new("simulationStatus"),
            state: RwLock::new(SessionState::default()),
        };
        session.apply_snapshot(&SimulationSnapshot::default())?;
        Ok(session)
    }

    /// The injected store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    fn with_state<R>(&self, context: &'static str, f: impl FnOnce(&mut SessionState) -> R) -> SyncResult<R> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::PoisonedLock { context })?;
        Ok(f(&mut state))
    }

    /// A simulation was requested. Emits the id, then `Starting`.
    pub fn start_simulation(&self, id: impl Into<SimulationId>, initiated_by_client: bool) -> SyncResult<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptySimulationId.into());
        }
        self.with_state("session.start", |state| {
            state.active = Some(ActiveSimulation {
                id: id.clone(),
                owned_by_client: initiated_by_client,
                status: SimulationStatus::Starting,
            });
            state.output_timestamp = None;
        })?;
        debug!(simulation_id = %id, initiated_by_client, "simulation starting");
        self.simulation_id.set(id);
        self.statuses.publish(&SimulationStatus::Starting);
        Ok(())
    }

    /// Join a simulation another client is already running.
    pub fn join_simulation(&self, id: impl Into<SimulationId>) -> SyncResult<()> {
        let id = id.into();
        if id.is_empty() {
            return Err(ValidationError::EmptySimulationId.into());
        }
        self.with_state("session.join", |state| {
            state.active = Some(ActiveSimulation {
                id: id.clone(),
                owned_by_client: false,
                status: SimulationStatus::Started,
            });
        })?;
        debug!(simulation_id = %id, "joined simulation");
        self.simulation_id.set(id);
        Ok(())
    }

    /// Record a status transition and publish it.
    pub fn set_status(&self, status: SimulationStatus) -> SyncResult<()> {
        self.with_state("session.status", |state| {
            if let Some(active) = state.active.as_mut() {
                active.status = status;
            }
        })?;
        self.statuses.publish(&status);
        Ok(())
    }

    /// Simulation time of the newest output, in epoch seconds.
    pub fn set_output_timestamp(&self, epoch_seconds: i64) -> SyncResult<()> {
        self.with_state("session.output_timestamp", |state| {
            state.output_timestamp = Some(epoch_seconds);
        })
    }

    /// Hand the active simulation to or from this session.
    pub fn set_ownership(&self, owned_by_client: bool) -> SyncResult<()> {
        self.with_state("session.ownership", |state| {
            if let Some(active) = state.active.as_mut() {
                active.owned_by_client = owned_by_client;
            }
        })
    }

    /// The simulation ended or the client left it. Emits the empty id, then
    /// `Stopped`.
    pub fn end_simulation(&self) -> SyncResult<()> {
        let ended = self.with_state("session.end", |state| {
            state.output_timestamp = None;
            state.active.take()
        })?;
        if let Some(active) = ended {
            debug!(simulation_id = %active.id, "simulation ended");
        }
        self.simulation_id.set(SimulationId::none());
        self.statuses.publish(&SimulationStatus::Stopped);
        Ok(())
    }

    /// Write every entry of `snapshot` into the store. Returns how many keys
    /// were written.
    pub fn apply_snapshot(&self, snapshot: &SimulationSnapshot) -> SyncResult<usize> {
        let mut written = 0;
        for (key, value) in snapshot.entries() {
            if self.store.set(key, value)? {
                written += 1;
            }
        }
        Ok(written)
    }

    /// Id of the active simulation, empty when none.
    #[must_use]
    pub fn active_simulation_id(&self) -> SimulationId {
        self.state
            .read()
            .ok()
            .and_then(|state| state.active.as_ref().map(|a| a.id.clone()))
            .unwrap_or_default()
    }
}

impl SimulationLifecycle for SessionLifecycle {
    fn simulation_id_stream(&self) -> EventStream<SimulationId> {
        self.simulation_id.subscribe()
    }

    fn status_stream(&self) -> EventStream<SimulationStatus> {
        self.statuses.subscribe()
    }

    fn client_owns_active_simulation(&self) -> bool {
        // Fail closed on a poisoned lock.
        self.state
            .read()
            .map(|state| state.active.as_ref().is_some_and(|a| a.owned_by_client))
            .unwrap_or(false)
    }

    fn is_client_still_in_active_simulation(&self) -> bool {
        self.state
            .read()
            .map(|state| state.active.as_ref().is_some_and(|a| a.status.is_live()))
            .unwrap_or(false)
    }

    fn output_timestamp(&self) -> Option<i64> {
        self.state.read().ok().and_then(|state| state.output_timestamp)
    }

    fn read_snapshot(&self, key: &str) -> SyncResult<Option<SnapshotValue>> {
        self.store.get(key)
    }

    fn write_snapshot(&self, key: &str, value: SnapshotValue) -> SyncResult<bool> {
        self.store.set(key, value)
    }

    fn select_snapshot(&self, key: &str) -> SyncResult<EventStream<SnapshotValue>> {
        self.store.select(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::aggregate::AggregateRecord;
    use crate::store::{keys, KeyedStore};

    fn session() -> SessionLifecycle {
        SessionLifecycle::new(Arc::new(KeyedStore::<SnapshotValue>::new())).unwrap()
    }

    #[test]
    fn new_session_seeds_sentinel_violations() {
        let s = session();
        let value = s.read_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS).unwrap().unwrap();
        assert_eq!(value.as_aggregate(), Some(&AggregateRecord::sentinel()));
        assert!(!s.is_client_still_in_active_simulation());
        assert!(!s.client_owns_active_simulation());
    }

    #[test]
    fn start_emits_id_then_starting() {
        let s = session();
        let ids = s.simulation_id_stream();
        let statuses = s.status_stream();
        assert_eq!(ids.try_recv(), Some(SimulationId::none()));

        s.start_simulation("123", true).unwrap();

        assert_eq!(ids.try_recv(), Some(SimulationId::from("123")));
        assert_eq!(statuses.try_recv(), Some(SimulationStatus::Starting));
        assert!(s.client_owns_active_simulation());
        assert!(s.is_client_still_in_active_simulation());
        assert_eq!(s.active_simulation_id().as_str(), "123");
    }

    #[test]
    fn status_stream_does_not_replay() {
        let s = session();
        s.start_simulation("1", true).unwrap();
        let late = s.status_stream();
        assert_eq!(late.try_recv(), None);
    }

    #[test]
    fn stopped_status_leaves_active_simulation() {
        let s = session();
        s.start_simulation("1", true).unwrap();
        s.set_status(SimulationStatus::Stopped).unwrap();
        assert!(!s.is_client_still_in_active_simulation());
    }

    #[test]
    fn end_clears_id_and_ownership() {
        let s = session();
        s.start_simulation("1", true).unwrap();
        s.set_output_timestamp(1_700_000_000).unwrap();
        let ids = s.simulation_id_stream();
        let _ = ids.drain();

        s.end_simulation().unwrap();

        assert_eq!(ids.try_recv(), Some(SimulationId::none()));
        assert!(!s.client_owns_active_simulation());
        assert_eq!(s.output_timestamp(), None);
    }

    #[test]
    fn observer_does_not_own_joined_simulation() {
        let s = session();
        s.join_simulation("remote").unwrap();
        assert!(s.is_client_still_in_active_simulation());
        assert!(!s.client_owns_active_simulation());

        s.set_ownership(true).unwrap();
        assert!(s.client_owns_active_simulation());
    }

    #[test]
    fn empty_id_is_rejected() {
        let s = session();
        assert!(s.start_simulation("", true).unwrap_err().is_validation());
    }

    #[test]
    fn apply_snapshot_writes_present_entries() {
        let s = session();
        let snapshot = SimulationSnapshot {
            voltage_violations: AggregateRecord::new(2, 1, "t"),
            ..SimulationSnapshot::default()
        };
        let written = s.apply_snapshot(&snapshot).unwrap();
        assert_eq!(written, 3);
        let value = s.read_snapshot(keys::TOTAL_VOLTAGE_VIOLATIONS).unwrap().unwrap();
        assert_eq!(value.as_aggregate().map(|r| r.count), Some(2));
    }
}
