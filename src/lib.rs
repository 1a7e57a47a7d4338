//! # gridsync - Lifecycle-gated metric synchronization for grid simulations
//!
//! gridsync keeps a derived metric (the voltage-violation count by default)
//! in step with a per-simulation broker topic. Payloads arrive only while the
//! simulation is active and was started by this client; each one is reduced
//! to an [`AggregateRecord`] and written to a keyed snapshot store, so a view
//! that remounts shows the last value straight away.
//!
//! ## Core Concepts
//!
//! - **SimulationLifecycle**: the current simulation id, status transitions, ownership
//! - **SnapshotStore**: reactive keyed store shared by all views
//! - **MessageBroker**: topic subscriptions with synchronous cancellation
//! - **TopicMetricSync**: the engine tying the three together for one metric
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gridsync::{
//!     InMemoryBroker, KeyedStore, SessionLifecycle, SnapshotValue, SyncConfig, TopicMetricSync,
//!     VoltageViolationMetric,
//! };
//!
//! # fn main() -> gridsync::SyncResult<()> {
//! let store = Arc::new(KeyedStore::<SnapshotValue>::new());
//! let session = Arc::new(SessionLifecycle::new(store)?);
//! let broker = Arc::new(InMemoryBroker::new());
//!
//! let mut sync = TopicMetricSync::new(
//!     VoltageViolationMetric::new(),
//!     session.clone(),
//!     broker.clone(),
//!     SyncConfig::default(),
//! )?;
//! sync.attach()?;
//!
//! session.start_simulation("123", true)?;
//! sync.process_pending()?;
//!
//! broker.publish(
//!     "/topic/goss.gridappsd.simulation.voltage_violation.123.output",
//!     r#"{"m1": 1.07, "m2": 0}"#,
//! );
//! sync.process_pending()?;
//!
//! let current = sync.current_aggregate().expect("one payload applied");
//! assert_eq!((current.count, current.count_at_zero), (2, 1));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod broker;
pub mod error;
pub mod lifecycle;
pub mod reactive;
pub mod store;
pub mod sync;

pub use aggregate::AggregateRecord;
pub use broker::{InMemoryBroker, MessageBroker, PayloadSink, TopicSubscription, TopicTemplate};
pub use error::{MalformedPayload, StoreError, SubscriptionError, SyncError, SyncResult, ValidationError};
pub use lifecycle::{SessionLifecycle, SimulationId, SimulationLifecycle, SimulationStatus};
pub use reactive::EventStream;
pub use store::{keys, KeyedStore, SimulationSnapshot, SnapshotStore, SnapshotValue};
pub use sync::{
    MetricUpdate, PumpReport, RehydrationReader, ResetOnRestart, SyncConfig, SyncStats, TopicMetric, TopicMetricSync,
    VoltageViolationMetric,
};
