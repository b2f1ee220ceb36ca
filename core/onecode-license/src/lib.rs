//! Licensing core for onecode: one code, one device.
//!
//! This crate handles:
//! - Deterministic license code generation (HMAC-SHA256 over a seed)
//! - The [`Registry`]: first-use binding, conflict detection, unbind,
//!   and the admin query operations
//! - Admin credential checks in constant time
//! - Client probe helpers: a stable device fingerprint and an advisory
//!   on-disk activation cache
//!
//! # Binding protocol
//!
//! A code starts unbound. The first `verify` with a machine ID binds it;
//! later calls from the same machine succeed without changing anything,
//! and calls from any other machine are refused until an admin unbinds
//! the code. The bind is one conditional storage update, so concurrent
//! first activations resolve to exactly one winner.

mod admin;
mod cache;
mod device;
mod error;
mod generator;
mod registry;

pub use admin::AdminKey;
pub use cache::{
    ActivationCache, CachedActivation, DEFAULT_OFFLINE_GRACE_DAYS, MAX_OFFLINE_GRACE_DAYS,
};
pub use device::{DeviceFingerprint, DeviceInfo};
pub use error::{LicenseError, LicenseResult};
pub use generator::{CodeGenerator, CODE_LEN};
pub use registry::{
    BatchIssued, Issued, Page, Registry, Verification, DEFAULT_PAGE_LIMIT, MAX_BATCH,
    MAX_PAGE_LIMIT,
};
