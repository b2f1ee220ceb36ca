//! Advisory activation cache for the client probe.
//!
//! After a successful online verify the probe writes the code and the
//! machine ID to a small JSON file. When the server cannot be reached,
//! the cache lets the probe keep working for a grace period. Nothing
//! stops a user from editing the file; the registry stays the source of
//! truth and a definitive online rejection clears the cache.

use crate::error::LicenseResult;
use chrono::{DateTime, Duration, Utc};
use onecode_types::{LicenseCode, MachineId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default number of days a cached activation is honored offline.
pub const DEFAULT_OFFLINE_GRACE_DAYS: i64 = 7;

/// Longest offline grace accepted from configuration.
pub const MAX_OFFLINE_GRACE_DAYS: i64 = 3650;

/// A cached successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedActivation {
    pub code: LicenseCode,
    pub machine_id: MachineId,
    /// When the server reported the binding.
    pub activated_at: Option<DateTime<Utc>>,
    /// When the probe last verified online.
    pub verified_at: DateTime<Utc>,
}

/// File-backed activation cache.
#[derive(Debug, Clone)]
pub struct ActivationCache {
    path: PathBuf,
}

impl ActivationCache {
    /// Uses an explicit cache file.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Uses `<user cache dir>/onecode/activation.json`, if the platform
    /// has a cache directory.
    #[must_use]
    pub fn default_location() -> Option<Self> {
        dirs::cache_dir().map(|dir| Self::at(dir.join("onecode").join("activation.json")))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the cache. A missing file is `Ok(None)`.
    pub fn load(&self) -> LicenseResult<Option<CachedActivation>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the cache, creating parent directories.
    pub fn save(&self, entry: &CachedActivation) -> LicenseResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(entry)?)?;
        debug!(path = %self.path.display(), "activation cache written");
        Ok(())
    }

    /// Removes the cache. A missing file is not an error.
    pub fn clear(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the cached activation if it belongs to `machine_id` and was
    /// verified within `grace` of `now`.
    pub fn validate_offline(
        &self,
        machine_id: &MachineId,
        grace: Duration,
        now: DateTime<Utc>,
    ) -> LicenseResult<Option<CachedActivation>> {
        let Some(entry) = self.load()? else {
            return Ok(None);
        };
        if &entry.machine_id != machine_id {
            debug!("cached activation belongs to another machine");
            return Ok(None);
        }
        if now.signed_duration_since(entry.verified_at) > grace {
            debug!("cached activation is past its offline grace");
            return Ok(None);
        }
        Ok(Some(entry))
    }
}
