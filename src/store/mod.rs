//! Keyed snapshot storage.
//!
//! The store is the only channel between the telemetry pipeline and views of
//! the same metric that mount independently. It is created once per session
//! and handed around as `Arc<dyn SnapshotStore>`.

mod keyed;
mod snapshot;
mod traits;

pub use keyed::KeyedStore;
pub use snapshot::{keys, SimulationSnapshot, SnapshotValue};
pub use traits::SnapshotStore;
