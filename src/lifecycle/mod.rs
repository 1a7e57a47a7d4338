//! Simulation lifecycle collaborator.
//!
//! The sync core depends on [`SimulationLifecycle`] only. [`SessionLifecycle`]
//! is the in-process implementation used by embedders and tests.

/// The facade trait.
pub mod facade;
/// Session-scoped implementation.
pub mod session;
/// Simulation id and status types.
pub mod status;

pub use facade::SimulationLifecycle;
pub use session::SessionLifecycle;
pub use status::{SimulationId, SimulationStatus};
