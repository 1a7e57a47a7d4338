//! Message-broker boundary.
//!
//! The transport itself is out of scope; the core talks to it through
//! [`MessageBroker`] and owns each subscription as a [`TopicSubscription`].

mod memory;
mod subscription;
mod topic;
mod traits;

pub use memory::InMemoryBroker;
pub use subscription::TopicSubscription;
pub use topic::{
    voltage_violation_topic, TopicTemplate, VOLTAGE_VIOLATION_TOPIC_PREFIX, VOLTAGE_VIOLATION_TOPIC_SUFFIX,
};
pub use traits::{BrokerHandle, CancellationToken, Delivery, MessageBroker, PayloadSink};
