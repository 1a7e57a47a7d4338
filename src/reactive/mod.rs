//! In-process push streams.
//!
//! Everything here is synchronous: publishing hands the event to every
//! subscriber queue before returning, and dropping an [`EventStream`]
//! unregisters it before returning. Consumers read their queues when they
//! are next scheduled, which keeps the whole pipeline on one logical thread.

/// Latest-value cell with replay.
pub mod cell;
/// Subscriber registry and pure event broadcast.
pub mod hub;
/// Subscriber stream handle.
pub mod stream;

pub use cell::ValueCell;
pub use hub::{Broadcast, SubscriptionId};
pub use stream::EventStream;
