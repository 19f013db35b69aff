//! Error types for the scangate library.
//!
//! Each external capability has its own error enum so adapters can report
//! failures precisely; [`ServiceError`] is what callers of the facade see.
//! The library never panics; all errors are returned as `Result` values.

use std::time::Duration;
use thiserror::Error;

/// Errors raised by the scan engine capability.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scanning engine is unavailable or not responding.
    #[error("engine '{engine}' is unavailable: {reason}")]
    EngineUnavailable {
        /// Name of the engine that is unavailable.
        engine: String,
        /// Human-readable reason for unavailability.
        reason: String,
    },

    /// The scan attempt exceeded its deadline.
    #[error("scan timed out after {elapsed:?} on engine '{engine}'")]
    Timeout {
        /// Name of the engine that timed out.
        engine: String,
        /// How long the attempt ran before timing out.
        elapsed: Duration,
    },

    /// Failed to connect to, or talk with, the scanning engine.
    #[error("connection to engine '{engine}' failed: {message}")]
    ConnectionFailed {
        /// Name of the engine.
        engine: String,
        /// Error message describing the failure.
        message: String,
    },

    /// The engine answered with something that is neither clean nor infected.
    #[error("ambiguous response from engine '{engine}': {details}")]
    AmbiguousResponse {
        /// Name of the engine.
        engine: String,
        /// The raw response or a description of it.
        details: String,
    },

    /// Reading the payload stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if a later attempt could plausibly succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration { .. })
    }

    /// Returns the engine name if this error is associated with one.
    pub fn engine(&self) -> Option<&str> {
        match self {
            Self::EngineUnavailable { engine, .. }
            | Self::Timeout { engine, .. }
            | Self::ConnectionFailed { engine, .. }
            | Self::AmbiguousResponse { engine, .. } => Some(engine),
            _ => None,
        }
    }

    /// Creates an `EngineUnavailable` error.
    pub fn engine_unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(engine: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            engine: engine.into(),
            elapsed,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors raised by a binary store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No bytes are stored under this id.
    #[error("no binary data stored for id {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// The id is not a valid document id.
    #[error("invalid document id: {id:?}")]
    InvalidId {
        /// The offending id.
        id: String,
    },

    /// Writing the payload failed.
    #[error("failed to save binary data for id {id}: {reason}")]
    SaveFailed {
        /// The id being written.
        id: String,
        /// Reason for the failure.
        reason: String,
    },

    /// The store cannot be reached.
    #[error("binary store is unavailable: {reason}")]
    Unavailable {
        /// Reason for unavailability.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Returns `true` if the error means "nothing stored under that id".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }
}

/// Errors raised by a metadata store.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// No document matches the lookup.
    #[error("document not found: {key}")]
    NotFound {
        /// The id or hash that was looked up.
        key: String,
    },

    /// A document with this id already exists.
    #[error("document already exists: {id}")]
    AlreadyExists {
        /// The colliding id.
        id: String,
    },

    /// The document already left `pending`; its verdict is final.
    #[error("document {id} already has a verdict")]
    AlreadyAnalyzed {
        /// The document id.
        id: String,
    },

    /// The store cannot be reached.
    #[error("metadata store is unavailable: {reason}")]
    Unavailable {
        /// Reason for unavailability.
        reason: String,
    },

    /// A query or write failed for another reason.
    #[error("metadata query failed: {reason}")]
    Query {
        /// Description of the failure.
        reason: String,
    },
}

impl MetadataError {
    /// Returns `true` if no document matched.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if the write collided with an existing id.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Creates a `NotFound` error.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates an `Unavailable` error.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Creates a `Query` error.
    pub fn query(reason: impl Into<String>) -> Self {
        Self::Query {
            reason: reason.into(),
        }
    }
}

/// The error type returned by [`DocumentService`](crate::service::DocumentService).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The supplied id is not shaped like a document id.
    #[error("invalid document id: {id:?}")]
    InvalidId {
        /// The rejected id.
        id: String,
    },

    /// The upload carries no bytes.
    #[error("the uploaded payload is empty")]
    EmptyPayload,

    /// The upload exceeds the configured limit.
    #[error("payload size {size} bytes exceeds maximum {max} bytes")]
    PayloadTooLarge {
        /// Declared size in bytes.
        size: u64,
        /// Maximum allowed size in bytes.
        max: u64,
    },

    /// No document exists under this id.
    #[error("document not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// One or more dependencies failed their health check.
    #[error("service unhealthy: {}", failures.join("; "))]
    Unhealthy {
        /// One entry per failing dependency.
        failures: Vec<String>,
    },

    /// Reading or spooling the upload stream failed.
    #[error("upload transfer failed: {0}")]
    Transport(#[from] std::io::Error),

    /// A binary store operation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A metadata store operation failed.
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// The service was assembled incorrectly.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ServiceError {
    /// Returns `true` for errors caused by the request itself.
    ///
    /// Validation errors are raised before any side effect happens.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidId { .. } | Self::EmptyPayload | Self::PayloadTooLarge { .. }
        )
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// A specialized `Result` type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// A specialized `Result` type for binary store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A specialized `Result` type for metadata store operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_is_recoverable() {
        let timeout = ScanError::timeout("clamav", Duration::from_secs(30));
        assert!(timeout.is_recoverable());

        let config = ScanError::configuration("no socket configured");
        assert!(!config.is_recoverable());
    }

    #[test]
    fn test_scan_error_engine() {
        let err = ScanError::engine_unavailable("clamav", "service not running");
        assert_eq!(err.engine(), Some("clamav"));

        let io_err = ScanError::Io(std::io::Error::other("broken pipe"));
        assert_eq!(io_err.engine(), None);
    }

    #[test]
    fn test_service_error_validation() {
        assert!(ServiceError::EmptyPayload.is_validation());
        assert!(ServiceError::InvalidId { id: "x".into() }.is_validation());
        assert!(!ServiceError::from(MetadataError::unavailable("down")).is_validation());
    }

    #[test]
    fn test_unhealthy_lists_every_failure() {
        let err = ServiceError::Unhealthy {
            failures: vec!["binary store: down".into(), "scan engine: down".into()],
        };
        let text = err.to_string();
        assert!(text.contains("binary store"));
        assert!(text.contains("scan engine"));
    }

    #[test]
    fn test_payload_too_large_display() {
        let err = ServiceError::PayloadTooLarge {
            size: 100_000_000,
            max: 1_048_576,
        };
        assert!(err.to_string().contains("100000000"));
        assert!(err.to_string().contains("1048576"));
    }
}
