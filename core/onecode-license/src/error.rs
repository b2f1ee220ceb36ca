//! Error types for the licensing module.

use onecode_storage::StorageError;
use onecode_types::LicenseCode;
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// A required field is missing or malformed. Raised before any
    /// storage access.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The admin credential did not match.
    #[error("admin credential rejected")]
    Unauthorized,

    /// A mutation targeted a code that does not exist.
    #[error("license code not found: {0}")]
    NotFound(LicenseCode),

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Process configuration is unusable (e.g. a blank secret).
    #[error("configuration error: {0}")]
    Config(String),

    /// Activation cache file could not be read or written.
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<onecode_types::Error> for LicenseError {
    fn from(err: onecode_types::Error) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
