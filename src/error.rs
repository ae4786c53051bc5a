//! Error types for the cache service.
//!
//! Every variant carries a stable machine-readable [`code`](CacheError::code)
//! and is recoverable: callers are expected to retry or fall back to the
//! source of truth rather than treat cache failures as fatal.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur in the cache service.
#[derive(Error, Debug)]
pub enum CacheError {
    // =========================================================================
    // Configuration errors - raised before any I/O, never partially applied
    // =========================================================================
    /// Key contains characters outside `[A-Za-z0-9_.-]` or is empty
    #[error("invalid cache key {key:?}: keys must be non-empty and contain only alphanumerics, '-', '_' or '.'")]
    InvalidKey { key: String },

    /// Expiry duration was zero or not representable
    #[error("invalid expiry: duration must be positive")]
    InvalidExpiry,

    /// Size ceiling was zero
    #[error("invalid max cache size: byte ceiling must be positive")]
    InvalidMaxSize,

    /// Value cannot be represented as JSON
    #[error("unsupported value type {type_name}: not representable as JSON")]
    UnsupportedValue { type_name: &'static str },

    // =========================================================================
    // Read errors
    // =========================================================================
    /// Underlying storage failed while reading a key
    #[error("read failed for key {key}: {reason}")]
    ReadFailed { key: String, reason: String },

    /// Payload present but not decodable
    #[error("failed to deserialize cached value for key {key}")]
    DeserializeFailed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Record detected as corrupt
    #[error("corrupted cache data for key {key}")]
    CorruptedData { key: String },

    // =========================================================================
    // Write errors
    // =========================================================================
    /// Underlying storage failed while writing a key
    #[error("write failed for key {key}: {reason}")]
    WriteFailed { key: String, reason: String },

    /// Value could not be encoded
    #[error("failed to serialize value for key {key}")]
    SerializeFailed {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Storage reported no space left
    #[error("storage full while writing key {key}")]
    StorageFull { key: String },

    // =========================================================================
    // Management errors - clear / cleanup / statistics / size computation
    // =========================================================================
    /// A maintenance operation failed, wrapping the underlying cause
    #[error("cache management operation '{operation}' failed")]
    Management {
        operation: &'static str,
        #[source]
        source: Box<CacheError>,
    },

    // =========================================================================
    // Timeout errors - defined for instrumentation layers; the service
    // itself never imposes deadlines
    // =========================================================================
    /// Operation exceeded a caller-imposed deadline
    #[error("cache operation '{operation}' timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },
}

impl CacheError {
    /// Wrap an error from a maintenance path (statistics, cleanup, size
    /// computation) so callers can tell it apart from direct I/O failures.
    pub fn management(operation: &'static str, source: CacheError) -> Self {
        CacheError::Management {
            operation,
            source: Box::new(source),
        }
    }

    /// Stable machine-readable code for logging and matching.
    pub fn code(&self) -> &'static str {
        match self {
            CacheError::InvalidKey { .. } => "invalid_key",
            CacheError::InvalidExpiry => "invalid_expiry",
            CacheError::InvalidMaxSize => "invalid_max_size",
            CacheError::UnsupportedValue { .. } => "unsupported_value",
            CacheError::ReadFailed { .. } => "read_failed",
            CacheError::DeserializeFailed { .. } => "deserialize_failed",
            CacheError::CorruptedData { .. } => "corrupted_data",
            CacheError::WriteFailed { .. } => "write_failed",
            CacheError::SerializeFailed { .. } => "serialize_failed",
            CacheError::StorageFull { .. } => "storage_full",
            CacheError::Management { .. } => "management_failed",
            CacheError::Timeout { .. } => "timeout",
        }
    }

    /// Whether a caller may retry or fall back after this error.
    ///
    /// Always true: the cache is an accelerator, never the source of truth.
    pub fn is_recoverable(&self) -> bool {
        true
    }

    /// True for validation errors raised before any I/O.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidKey { .. }
                | CacheError::InvalidExpiry
                | CacheError::InvalidMaxSize
                | CacheError::UnsupportedValue { .. }
        )
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        let err = CacheError::InvalidKey {
            key: "bad key".to_string(),
        };
        assert_eq!(err.code(), "invalid_key");
        assert_eq!(CacheError::InvalidExpiry.code(), "invalid_expiry");
        assert_eq!(CacheError::InvalidMaxSize.code(), "invalid_max_size");
    }

    #[test]
    fn test_every_error_is_recoverable() {
        let errors = vec![
            CacheError::InvalidKey {
                key: "k".to_string(),
            },
            CacheError::InvalidExpiry,
            CacheError::CorruptedData {
                key: "k".to_string(),
            },
            CacheError::ReadFailed {
                key: "k".to_string(),
                reason: "io".to_string(),
            },
        ];
        for err in errors {
            assert!(err.is_recoverable());
        }
    }

    #[test]
    fn test_management_wraps_cause() {
        let inner = CacheError::ReadFailed {
            key: "k".to_string(),
            reason: "disk gone".to_string(),
        };
        let err = CacheError::management("statistics", inner);
        assert_eq!(err.code(), "management_failed");
        let msg = format!("{}", err);
        assert!(msg.contains("statistics"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_configuration_classification() {
        assert!(CacheError::InvalidExpiry.is_configuration());
        assert!(!CacheError::CorruptedData {
            key: "k".to_string()
        }
        .is_configuration());
    }
}
