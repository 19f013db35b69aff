//! Service configuration.

use crate::coordinator::{CoordinatorConfig, RetryLadder};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default maximum upload size (1 MiB).
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024;

/// Default result time-to-live (1 hour).
pub const DEFAULT_RESULT_TTL_SECS: i64 = 60 * 60;

/// Configuration for [`DocumentService`](crate::service::DocumentService).
///
/// # Examples
///
/// ```rust
/// use scangate::service::ServiceConfig;
/// use std::time::Duration;
///
/// let config = ServiceConfig::new()
///     .with_version("1.4.2")
///     .with_max_upload_size(8 * 1024 * 1024)
///     .with_result_ttl(chrono::Duration::hours(24))
///     .with_scan_concurrency(16)
///     .with_attempt_timeout(Duration::from_secs(10));
/// assert_eq!(config.scan.capacity, 16);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Version string reported by health checks.
    pub version: String,

    /// Free-text information reported by health checks.
    pub information: String,

    /// Largest accepted declared upload size, in bytes.
    pub max_upload_size: u64,

    /// How long analyzed documents are kept. Zero or negative keeps them forever.
    #[serde(with = "ttl_secs")]
    pub result_ttl: chrono::Duration,

    /// Scan coordination settings.
    pub scan: CoordinatorConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            version: "dev".to_string(),
            information: "scangate".to_string(),
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
            result_ttl: chrono::Duration::seconds(DEFAULT_RESULT_TTL_SECS),
            scan: CoordinatorConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the version string.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the information string.
    pub fn with_information(mut self, information: impl Into<String>) -> Self {
        self.information = information.into();
        self
    }

    /// Sets the maximum upload size.
    pub fn with_max_upload_size(mut self, size: u64) -> Self {
        self.max_upload_size = size;
        self
    }

    /// Sets the result time-to-live.
    pub fn with_result_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.result_ttl = ttl;
        self
    }

    /// Sets the number of concurrent scans.
    pub fn with_scan_concurrency(mut self, capacity: usize) -> Self {
        self.scan = self.scan.with_capacity(capacity);
        self
    }

    /// Sets the retry ladder.
    pub fn with_retry_ladder(mut self, ladder: RetryLadder) -> Self {
        self.scan = self.scan.with_ladder(ladder);
        self
    }

    /// Sets the per-attempt scan deadline.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.scan = self.scan.with_attempt_timeout(timeout);
        self
    }
}

/// Serializes a `std::time::Duration` as whole milliseconds.
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Serializes a signed `chrono::Duration` as whole seconds.
mod ttl_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(ttl: &chrono::Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ttl.num_seconds().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<chrono::Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = i64::deserialize(deserializer)?;
        chrono::Duration::try_seconds(secs)
            .ok_or_else(|| serde::de::Error::custom("result_ttl out of range"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.version, "dev");
        assert_eq!(config.max_upload_size, 1_048_576);
        assert_eq!(config.result_ttl, chrono::Duration::hours(1));
        assert_eq!(config.scan.capacity, 128);
        assert_eq!(config.scan.attempt_timeout, Duration::from_secs(30));
        assert_eq!(config.scan.ladder.attempts(), 6);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{ "version": "2.0.0", "result_ttl": -1, "scan": { "capacity": 4, "ladder": { "steps": [1, 2] }, "attempt_timeout": 1500 } }"#,
        )
        .unwrap();

        assert_eq!(config.version, "2.0.0");
        assert_eq!(config.information, "scangate");
        assert_eq!(config.result_ttl, chrono::Duration::seconds(-1));
        assert_eq!(config.scan.capacity, 4);
        assert_eq!(config.scan.ladder.attempts(), 2);
        assert_eq!(config.scan.attempt_timeout, Duration::from_millis(1500));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = ServiceConfig::new().with_scan_concurrency(0);
        assert_eq!(config.scan.capacity, 1);

        let json = serde_json::to_string(&config).unwrap();
        let back: ServiceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
