//! Client-side activation check with an offline fallback.
//!
//! The server is asked first. A valid answer refreshes the local cache,
//! a definitive rejection removes it, and only an unreachable server
//! lets a recent cached activation stand in for the online answer.

use crate::client::{AdminClient, ClientError, ClientResult};
use chrono::{Duration, Utc};
use onecode_license::{ActivationCache, CachedActivation, MAX_OFFLINE_GRACE_DAYS};
use onecode_types::{LicenseCode, MachineId};
use tracing::{debug, info, warn};

/// Result of [`AdminClient::check_activation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationStatus {
    /// The server accepted the code for this machine; the cache was refreshed.
    Online {
        message: Option<String>,
        cached: CachedActivation,
    },
    /// The server was unreachable and a cached activation was honored.
    Offline(CachedActivation),
    /// The server refused the code; the cache was cleared.
    Rejected { reason: String },
    /// The server was unreachable and no usable cached activation exists.
    Unavailable { error: String },
}

impl ActivationStatus {
    /// True if the license may be used.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Online { .. } | Self::Offline(_))
    }
}

/// Converts a day count into a grace period, refusing values outside
/// `0..=MAX_OFFLINE_GRACE_DAYS`.
pub fn offline_grace(days: i64) -> ClientResult<Duration> {
    if !(0..=MAX_OFFLINE_GRACE_DAYS).contains(&days) {
        return Err(ClientError::Invalid(format!(
            "offline grace must be between 0 and {MAX_OFFLINE_GRACE_DAYS} days"
        )));
    }
    Duration::try_days(days)
        .ok_or_else(|| ClientError::Invalid(format!("offline grace out of range: {days}")))
}

impl AdminClient {
    /// Verifies `code` for `machine_id`, falling back to `cache` when the
    /// server cannot be reached.
    ///
    /// Server errors other than a rejection are returned as-is. A 400
    /// also clears the cache, since the server will never accept the
    /// cached request.
    pub async fn check_activation(
        &self,
        cache: &ActivationCache,
        code: &str,
        machine_id: &str,
        grace_days: i64,
    ) -> ClientResult<ActivationStatus> {
        let grace = offline_grace(grace_days)?;
        let code = LicenseCode::parse(code).map_err(|e| ClientError::Invalid(e.to_string()))?;
        let machine_id =
            MachineId::parse(machine_id).map_err(|e| ClientError::Invalid(e.to_string()))?;

        match self.verify(code.as_str(), machine_id.as_str()).await {
            Ok(resp) if resp.valid => {
                let now = Utc::now();
                let activated_at = cache
                    .load()
                    .ok()
                    .flatten()
                    .filter(|prev| prev.code == code && prev.machine_id == machine_id)
                    .and_then(|prev| prev.activated_at)
                    .unwrap_or(now);
                let cached = CachedActivation {
                    code,
                    machine_id,
                    activated_at: Some(activated_at),
                    verified_at: now,
                };
                cache.save(&cached)?;
                info!(code = %cached.code, "activation verified online");
                Ok(ActivationStatus::Online {
                    message: resp.message,
                    cached,
                })
            }
            Ok(resp) => {
                cache.clear()?;
                let reason = resp.reason.unwrap_or_else(|| "unknown reason".to_string());
                warn!(code = %code, reason = %reason, "activation rejected");
                Ok(ActivationStatus::Rejected { reason })
            }
            Err(ClientError::Network(e)) => {
                debug!(error = %e, "server unreachable, consulting activation cache");
                match cache.validate_offline(&machine_id, grace, Utc::now())? {
                    Some(entry) if entry.code == code => Ok(ActivationStatus::Offline(entry)),
                    _ => Ok(ActivationStatus::Unavailable {
                        error: e.to_string(),
                    }),
                }
            }
            Err(e) => {
                if matches!(e, ClientError::Api { status: 400, .. }) {
                    cache.clear()?;
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_bounds() {
        assert_eq!(offline_grace(7).unwrap(), Duration::days(7));
        assert_eq!(offline_grace(0).unwrap(), Duration::zero());
        assert!(matches!(offline_grace(-1), Err(ClientError::Invalid(_))));
        assert!(matches!(
            offline_grace(999_999_999_999_999),
            Err(ClientError::Invalid(_))
        ));
    }
}
