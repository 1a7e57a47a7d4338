//! Topic name templates.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::lifecycle::SimulationId;

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("topic segment pattern is valid"))
}

/// A per-simulation topic family: `<prefix>.<simulation id>.<suffix>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicTemplate {
    /// Everything before the simulation id.
    pub prefix: String,
    /// Everything after the simulation id.
    pub suffix: String,
}

impl TopicTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    /// Topic name for `id`.
    ///
    /// # Errors
    ///
    /// `EmptySimulationId` for the empty id; `InvalidTopicSegment` when the
    /// id contains anything that would change the topic's structure.
    pub fn render(&self, id: &SimulationId) -> Result<String, ValidationError> {
        if id.is_empty() {
            return Err(ValidationError::EmptySimulationId);
        }
        if !segment_pattern().is_match(id.as_str()) {
            return Err(ValidationError::InvalidTopicSegment {
                segment: id.to_string(),
            });
        }
        Ok(format!("{}.{}.{}", self.prefix, id, self.suffix))
    }
}

/// Prefix of the voltage-violation topic family.
pub const VOLTAGE_VIOLATION_TOPIC_PREFIX: &str = "/topic/goss.gridappsd.simulation.voltage_violation";
/// Suffix of the voltage-violation topic family.
pub const VOLTAGE_VIOLATION_TOPIC_SUFFIX: &str = "output";

/// The voltage-violation topic family.
#[must_use]
pub fn voltage_violation_topic() -> TopicTemplate {
    TopicTemplate::new(VOLTAGE_VIOLATION_TOPIC_PREFIX, VOLTAGE_VIOLATION_TOPIC_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_voltage_violation_topic() {
        let topic = voltage_violation_topic().render(&SimulationId::from("123")).unwrap();
        assert_eq!(topic, "/topic/goss.gridappsd.simulation.voltage_violation.123.output");
    }

    #[test]
    fn rejects_ids_that_break_topic_structure() {
        let template = TopicTemplate::new("p", "s");
        for bad in ["a.b", "a/b", "a b", "*", "#"] {
            let err = template.render(&SimulationId::from(bad)).unwrap_err();
            assert!(matches!(err, ValidationError::InvalidTopicSegment { .. }), "{bad}");
        }
        assert_eq!(
            template.render(&SimulationId::none()).unwrap_err(),
            ValidationError::EmptySimulationId
        );
    }

    #[test]
    fn accepts_numeric_and_dashed_ids() {
        let template = TopicTemplate::new("p", "s");
        assert_eq!(template.render(&SimulationId::from("run-42_b")).unwrap(), "p.run-42_b.s");
    }
}
