//! Core type definitions for the onecode license registry.
//!
//! This crate defines the identifiers shared by every layer:
//! - [`LicenseCode`]: the canonical (trimmed, upper-cased) license string
//! - [`MachineId`]: the opaque device fingerprint supplied by a client
//!
//! Both types validate on construction, so anything holding one can
//! assume it is non-empty and within length bounds.

mod ids;

pub use ids::{LicenseCode, MachineId, MAX_CODE_LEN, MAX_MACHINE_ID_LEN};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("missing {0}")]
    Empty(&'static str),

    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
}
