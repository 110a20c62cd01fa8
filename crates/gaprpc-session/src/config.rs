use std::path::Path;
use std::time::Duration;

use gaprpc_frame::DEFAULT_MAX_PAYLOAD;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RpcError};

/// Session tuning.
///
/// Loads from JSON with durations in milliseconds; missing keys keep
/// their defaults:
///
/// ```json
/// { "response_timeout_ms": 3000, "event_queue_capacity": 1024 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Bound on the wait for each response. Default: 1500 ms.
    #[serde(rename = "response_timeout_ms", with = "millis")]
    pub response_timeout: Duration,
    /// Events buffered between the reader and the event thread. When full,
    /// new events are dropped. Default: 256.
    pub event_queue_capacity: usize,
    /// Calls queued for the worker before callers block. Default: 64.
    pub call_queue_capacity: usize,
    /// Largest frame payload accepted or sent. Default: 4096.
    pub max_payload_size: usize,
    /// How often an idle reader checks for shutdown. Default: 50 ms.
    #[serde(rename = "poll_interval_ms", with = "millis")]
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_millis(1500),
            event_queue_capacity: 256,
            call_queue_capacity: 64,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.response_timeout.is_zero() {
            return Err(RpcError::InvalidConfig("response_timeout_ms must be > 0".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(RpcError::InvalidConfig("poll_interval_ms must be > 0".into()));
        }
        if self.event_queue_capacity == 0 || self.call_queue_capacity == 0 {
            return Err(RpcError::InvalidConfig("queue capacities must be > 0".into()));
        }
        if self.max_payload_size == 0 || self.max_payload_size > gaprpc_frame::MAX_WIRE_PAYLOAD {
            return Err(RpcError::InvalidConfig(format!(
                "max_payload_size must be in 1..={}",
                gaprpc_frame::MAX_WIRE_PAYLOAD
            )));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.response_timeout, Duration::from_millis(1500));
        assert_eq!(config.event_queue_capacity, 256);
        assert_eq!(config.call_queue_capacity, 64);
        assert_eq!(config.max_payload_size, 4096);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SessionConfig::from_json_str(r#"{"response_timeout_ms": 250}"#).unwrap();
        assert_eq!(config.response_timeout, Duration::from_millis(250));
        assert_eq!(config.event_queue_capacity, 256);
    }

    #[test]
    fn json_round_trip() {
        let config = SessionConfig {
            event_queue_capacity: 8,
            ..SessionConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"response_timeout_ms\":1500"));
        assert_eq!(SessionConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn rejects_unknown_keys_and_zero_values() {
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"response_timeout": 5}"#),
            Err(RpcError::Json(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"response_timeout_ms": 0}"#),
            Err(RpcError::InvalidConfig(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"call_queue_capacity": 0}"#),
            Err(RpcError::InvalidConfig(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = std::env::temp_dir().join(format!("gaprpc-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("session.json");
        std::fs::write(&path, r#"{"max_payload_size": 512}"#).unwrap();

        let config = SessionConfig::from_json_file(&path).unwrap();
        assert_eq!(config.max_payload_size, 512);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
