//! Topic → aggregate → store synchronization.
//!
//! [`TopicMetricSync`] is the engine; [`RehydrationReader`] and
//! [`ResetOnRestart`] are the two store-side behaviors it composes.

/// Sync tuning.
pub mod config;
/// Metric definitions and the voltage-violation reducer.
pub mod metric;
/// Read-on-mount.
pub mod rehydrate;
/// Sentinel reset on simulation start.
pub mod reset;
/// The sync engine.
pub mod topic_sync;

pub use config::SyncConfig;
pub use metric::{ReduceContext, TopicMetric, VoltageViolationMetric};
pub use rehydrate::RehydrationReader;
pub use reset::ResetOnRestart;
pub use topic_sync::{MetricUpdate, PumpReport, SyncStats, TopicMetricSync};
