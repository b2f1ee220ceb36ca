//! Device fingerprinting for the client probe.
//!
//! Generates a stable identifier for this machine, sent as `machineId`
//! when verifying a code. The registry treats it as opaque.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::env;

/// Information about the current device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Operating system name.
    pub os_name: String,
    /// Hostname.
    pub hostname: String,
    /// CPU architecture.
    pub arch: String,
}

impl DeviceInfo {
    /// Collects information about the current device.
    #[must_use]
    pub fn collect() -> Self {
        Self {
            os_name: env::consts::OS.to_string(),
            hostname: get_hostname(),
            arch: env::consts::ARCH.to_string(),
        }
    }
}

/// A stable fingerprint formatted as `HW-XXXX-XXXX-XXXX`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceFingerprint {
    id: String,
}

impl DeviceFingerprint {
    /// Generates the fingerprint of the current device.
    ///
    /// Survives reboots; changes if the hostname, user, or platform
    /// machine ID change.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_components(&collect_hardware_ids())
    }

    /// Derives a fingerprint from explicit identifier components.
    #[must_use]
    pub fn from_components<S: AsRef<str>>(components: &[S]) -> Self {
        let mut hasher = Sha256::new();
        for (i, part) in components.iter().enumerate() {
            if i > 0 {
                hasher.update(b"|");
            }
            hasher.update(part.as_ref().as_bytes());
        }
        let hex = hex::encode_upper(&hasher.finalize()[..6]);

        Self {
            id: format!("HW-{}-{}-{}", &hex[0..4], &hex[4..8], &hex[8..12]),
        }
    }

    /// Returns the fingerprint string.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Validates that this fingerprint matches the current device.
    #[must_use]
    pub fn matches_current(&self) -> bool {
        self.id == Self::generate().id
    }
}

/// Collects hardware identifiers for fingerprinting.
fn collect_hardware_ids() -> Vec<String> {
    let mut ids = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        get_hostname(),
    ];

    if let Some(machine_id) = get_machine_id() {
        ids.push(machine_id);
    }

    if let Ok(user) = env::var("USER").or_else(|_| env::var("USERNAME")) {
        ids.push(user);
    }

    ids
}

fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Platform machine identifier, where one is cheaply available.
fn get_machine_id() -> Option<String> {
    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|output| {
                output
                    .lines()
                    .find(|l| l.contains("IOPlatformUUID"))
                    .and_then(|l| l.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_is_hw_triplet() {
        let fp = DeviceFingerprint::from_components(&["linux", "x86_64", "box"]);
        let id = fp.id();
        assert_eq!(id.len(), "HW-XXXX-XXXX-XXXX".len());
        assert!(id.starts_with("HW-"));
        assert_eq!(id.matches('-').count(), 3);
        assert!(id[3..]
            .chars()
            .all(|c| c == '-' || c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }

    #[test]
    fn component_boundaries_matter() {
        let a = DeviceFingerprint::from_components(&["ab", "c"]);
        let b = DeviceFingerprint::from_components(&["a", "bc"]);
        assert_ne!(a, b);
    }
}
