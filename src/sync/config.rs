use serde::{Deserialize, Serialize};

use crate::error::{SyncResult, ValidationError};

fn default_payload_queue_capacity() -> usize {
    1024
}

fn default_timestamp_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

fn default_max_payloads_per_pump() -> usize {
    256
}

/// Tuning for one [`TopicMetricSync`](super::TopicMetricSync).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Max payloads queued between the broker and the pump. Overflow drops
    /// the oldest queued payload.
    #[serde(default = "default_payload_queue_capacity")]
    pub payload_queue_capacity: usize,
    /// chrono format for the aggregate timestamp.
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,
    /// Payloads handled per `process_pending` call; the rest wait for the
    /// next call.
    #[serde(default = "default_max_payloads_per_pump")]
    pub max_payloads_per_pump: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            payload_queue_capacity: default_payload_queue_capacity(),
            timestamp_format: default_timestamp_format(),
            max_payloads_per_pump: default_max_payloads_per_pump(),
        }
    }
}

impl SyncConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        let cfg: Self = serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig {
            reason: format!("invalid sync config: {e}"),
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.payload_queue_capacity == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "payload_queue_capacity must be at least 1".to_string(),
            });
        }
        if self.max_payloads_per_pump == 0 {
            return Err(ValidationError::InvalidConfig {
                reason: "max_payloads_per_pump must be at least 1".to_string(),
            });
        }
        if self.timestamp_format.trim().is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: "timestamp_format cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = SyncConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.payload_queue_capacity, 1024);
    }

    #[test]
    fn partial_json_takes_defaults() {
        let cfg = SyncConfig::from_json_str(r#"{"payload_queue_capacity": 8}"#).unwrap();
        assert_eq!(cfg.payload_queue_capacity, 8);
        assert_eq!(cfg.timestamp_format, "%Y-%m-%d %H:%M:%S");
        assert_eq!(cfg.max_payloads_per_pump, 256);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let err = SyncConfig::from_json_str(r#"{"payload_queue_capacity": 0}"#).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("payload_queue_capacity"));
    }

    #[test]
    fn garbage_json_is_rejected() {
        assert!(SyncConfig::from_json_str("not json").unwrap_err().is_validation());
    }
}
