//! Snapshot values and the per-session simulation snapshot.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::aggregate::AggregateRecord;

/// Well-known snapshot keys shared by producers and views.
pub mod keys {
    /// Voltage-violation aggregate.
    pub const TOTAL_VOLTAGE_VIOLATIONS: &str = "totalVoltageViolations";
    /// Topology model of the active feeder.
    pub const TOPOLOGY_MODEL: &str = "topologyModel";
    /// Serialized view state.
    pub const STATE_STORE: &str = "stateStore";
    /// Alarm list.
    pub const ALARMS: &str = "alarms";
    /// Active simulation descriptor.
    pub const ACTIVE_SIMULATION: &str = "activeSimulation";
    /// Chart models for measurement plots.
    pub const MEASUREMENT_CHART_MODELS: &str = "measurementChartModels";
    /// Latest raw simulation output.
    pub const SIMULATION_OUTPUT: &str = "simulationOutput";
}

/// A value held under one snapshot key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SnapshotValue {
    /// A derived metric record.
    Aggregate(AggregateRecord),
    /// Any other snapshot payload.
    Json(JsonValue),
}

impl SnapshotValue {
    /// True for values that stand for "nothing"; these are never stored.
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Json(JsonValue::Null))
    }

    /// The aggregate record, if this is one.
    #[must_use]
    pub const fn as_aggregate(&self) -> Option<&AggregateRecord> {
        match self {
            Self::Aggregate(record) => Some(record),
            Self::Json(_) => None,
        }
    }
}

impl From<AggregateRecord> for SnapshotValue {
    fn from(record: AggregateRecord) -> Self {
        Self::Aggregate(record)
    }
}

impl From<JsonValue> for SnapshotValue {
    fn from(value: JsonValue) -> Self {
        Self::Json(value)
    }
}

/// Everything a dashboard session keeps for the active simulation.
///
/// Handed from one client to another when a viewer joins, and seeded into the
/// store at session start.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationSnapshot {
    #[serde(default)]
    pub topology_model: Option<JsonValue>,
    #[serde(default)]
    pub state_store: Option<JsonValue>,
    #[serde(default)]
    pub voltage_violations: AggregateRecord,
    #[serde(default)]
    pub alarms: Vec<JsonValue>,
    #[serde(default)]
    pub active_simulation: Option<JsonValue>,
    #[serde(default)]
    pub measurement_chart_models: Vec<JsonValue>,
    #[serde(default)]
    pub simulation_output: Option<JsonValue>,
}

impl Default for SimulationSnapshot {
    fn default() -> Self {
        Self {
            topology_model: None,
            state_store: None,
            voltage_violations: AggregateRecord::sentinel(),
            alarms: Vec::new(),
            active_simulation: None,
            measurement_chart_models: Vec::new(),
            simulation_output: None,
        }
    }
}

impl SimulationSnapshot {
    /// Key/value pairs to write into a store. Unset optionals are skipped.
    #[must_use]
    pub fn entries(&self) -> Vec<(&'static str, SnapshotValue)> {
        let mut out = vec![
            (
                keys::TOTAL_VOLTAGE_VIOLATIONS,
                SnapshotValue::Aggregate(self.voltage_violations.clone()),
            ),
            (keys::ALARMS, SnapshotValue::Json(JsonValue::Array(self.alarms.clone()))),
            (
                keys::MEASUREMENT_CHART_MODELS,
                SnapshotValue::Json(JsonValue::Array(self.measurement_chart_models.clone())),
            ),
        ];

        let optionals = [
            (keys::TOPOLOGY_MODEL, &self.topology_model),
            (keys::STATE_STORE, &self.state_store),
            (keys::ACTIVE_SIMULATION, &self.active_simulation),
            (keys::SIMULATION_OUTPUT, &self.simulation_output),
        ];
        for (key, value) in optionals {
            if let Some(v) = value.as_ref().filter(|v| !v.is_null()) {
                out.push((key, SnapshotValue::Json(v.clone())));
            }
        }

        out
    }
}
