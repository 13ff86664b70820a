//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default time a session waits for a server to attach.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_millis(1500);

/// Construction-time settings for a [`ClientSession`](crate::ClientSession).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    /// Stable session identifier.
    pub id: String,

    /// How long `start` waits for `configure_server`.
    #[serde(
        rename = "startupTimeoutMs",
        with = "duration_ms",
        default = "default_startup_timeout"
    )]
    pub startup_timeout: Duration,
}

const fn default_startup_timeout() -> Duration {
    DEFAULT_STARTUP_TIMEOUT
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

impl SessionConfig {
    /// Config with the given id and the default startup timeout.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_default_has_random_id() {
        let a = SessionConfig::default();
        let b = SessionConfig::default();
        assert_ne!(a.id, b.id);
        assert_eq!(a.startup_timeout, DEFAULT_STARTUP_TIMEOUT);
    }

    #[test]
    fn test_timeout_serialized_as_millis() {
        let config = SessionConfig::new("editor-1").with_startup_timeout(Duration::from_secs(2));
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value, json!({ "id": "editor-1", "startupTimeoutMs": 2000 }));
    }

    #[test]
    fn test_oversized_timeout_saturates() {
        let config = SessionConfig::new("editor-1").with_startup_timeout(Duration::MAX);
        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["startupTimeoutMs"], json!(u64::MAX));
    }

    #[test]
    fn test_missing_timeout_uses_default() {
        let config: SessionConfig = serde_json::from_value(json!({ "id": "editor-1" })).unwrap();
        assert_eq!(config.startup_timeout, DEFAULT_STARTUP_TIMEOUT);
    }
}
