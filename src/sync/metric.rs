//! Metric definitions: which topic, which store key, and how a payload
//! reduces to an [`AggregateRecord`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;

use crate::aggregate::AggregateRecord;
use crate::broker::{voltage_violation_topic, TopicTemplate};
use crate::error::MalformedPayload;
use crate::lifecycle::SimulationId;
use crate::store::keys;

/// What a reducer knows besides the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReduceContext<'a> {
    /// Simulation the payload belongs to.
    pub simulation_id: &'a SimulationId,
    /// Formatted simulation output time; empty when unknown.
    pub output_timestamp: &'a str,
}

/// A per-simulation derived metric.
pub trait TopicMetric: Send {
    /// Decoded payload type.
    type Payload: DeserializeOwned;

    /// Topic family the payloads arrive on.
    fn topic(&self) -> &TopicTemplate;

    /// Store key the aggregate is kept under.
    fn store_key(&self) -> &str;

    /// Reduce one payload. Errors drop the payload and keep the previous
    /// aggregate.
    fn reduce(&self, payload: Self::Payload, ctx: &ReduceContext<'_>) -> Result<AggregateRecord, MalformedPayload>;
}

/// Voltage violations: payload maps device mRID → violating value.
#[derive(Debug, Clone)]
pub struct VoltageViolationMetric {
    topic: TopicTemplate,
    store_key: String,
}

impl Default for VoltageViolationMetric {
    fn default() -> Self {
        Self {
            topic: voltage_violation_topic(),
            store_key: keys::TOTAL_VOLTAGE_VIOLATIONS.to_string(),
        }
    }
}

impl VoltageViolationMetric {
    /// The standard voltage-violation metric.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Same reducer on a different topic family or key.
    #[must_use]
    pub fn with_topic(topic: TopicTemplate, store_key: impl Into<String>) -> Self {
        Self {
            topic,
            store_key: store_key.into(),
        }
    }
}

impl TopicMetric for VoltageViolationMetric {
    type Payload = BTreeMap<String, f64>;

    fn topic(&self) -> &TopicTemplate {
        &self.topic
    }

    fn store_key(&self) -> &str {
        &self.store_key
    }

    #[allow(clippy::float_cmp)]
    fn reduce(&self, payload: Self::Payload, ctx: &ReduceContext<'_>) -> Result<AggregateRecord, MalformedPayload> {
        let count = i64::try_from(payload.len()).map_err(|_| MalformedPayload::Rejected {
            reason: "violation map too large".to_string(),
        })?;
        let at_zero = payload.values().filter(|v| **v == 0.0).count();
        // at_zero <= len, which already fit.
        let count_at_zero = i64::try_from(at_zero).unwrap_or(count);
        Ok(AggregateRecord::new(count, count_at_zero, ctx.output_timestamp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(id: &'a SimulationId) -> ReduceContext<'a> {
        ReduceContext {
            simulation_id: id,
            output_timestamp: "2024-05-01 12:00:00",
        }
    }

    #[test]
    fn counts_violations_and_zeros() {
        let id = SimulationId::from("123");
        let payload: BTreeMap<String, f64> =
            serde_json::from_str(r#"{"d1": 5, "d2": 0, "d3": 0.0}"#).unwrap();

        let record = VoltageViolationMetric::new().reduce(payload, &ctx(&id)).unwrap();
        assert_eq!(record, AggregateRecord::new(3, 2, "2024-05-01 12:00:00"));
    }

    #[test]
    fn empty_payload_is_a_genuine_zero() {
        let id = SimulationId::from("123");
        let record = VoltageViolationMetric::new().reduce(BTreeMap::new(), &ctx(&id)).unwrap();
        assert_eq!(record.count, 0);
        assert!(!record.is_sentinel());
    }

    #[test]
    fn non_numeric_values_fail_to_decode() {
        let parsed: Result<BTreeMap<String, f64>, _> = serde_json::from_str(r#"{"d1": "high"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn default_metric_targets_voltage_violation_key() {
        let metric = VoltageViolationMetric::new();
        assert_eq!(metric.store_key(), "totalVoltageViolations");
        assert_eq!(metric.topic().suffix, "output");
    }
}
