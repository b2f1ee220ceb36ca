//! HTTP service and admin client for the onecode license registry.
//!
//! The service is a thin JSON layer over [`onecode_license::Registry`]:
//! handlers parse the body, run the registry call on the blocking pool,
//! and map [`onecode_license::LicenseError`] onto HTTP statuses through
//! [`ApiError`]. The same request/response types are used by
//! [`AdminClient`], so the CLI and the server cannot drift apart.

pub mod activation;
pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod shutdown;

pub use activation::{offline_grace, ActivationStatus};
pub use api::build_router;
pub use client::{AdminClient, ClientError};
pub use config::{ServerArgs, StoreKind};
pub use error::{ApiError, ErrorResponse};
pub use shutdown::shutdown_signal;
