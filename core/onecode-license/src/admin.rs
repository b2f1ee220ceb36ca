//! Shared admin credential.

use crate::error::{LicenseError, LicenseResult};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The admin credential, kept only as a SHA-256 digest.
///
/// Candidates are hashed and compared in constant time, so neither the
/// content nor the length of the real key leaks through timing.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AdminKey {
    digest: [u8; 32],
}

impl std::fmt::Debug for AdminKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminKey")
            .field("digest", &"[REDACTED]")
            .finish()
    }
}

impl AdminKey {
    /// Creates the credential. Blank keys are refused.
    pub fn new(key: &str) -> LicenseResult<Self> {
        if key.trim().is_empty() {
            return Err(LicenseError::Config(
                "admin key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            digest: Sha256::digest(key.as_bytes()).into(),
        })
    }

    /// Returns true if `candidate` equals the configured key.
    #[must_use]
    pub fn verify(&self, candidate: &str) -> bool {
        let presented: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        presented[..].ct_eq(&self.digest[..]).into()
    }

    /// Checks an optional presented credential.
    ///
    /// # Errors
    ///
    /// Returns [`LicenseError::Unauthorized`] when the credential is
    /// missing or wrong.
    pub fn authorize(&self, candidate: Option<&str>) -> LicenseResult<()> {
        match candidate {
            Some(c) if self.verify(c) => Ok(()),
            _ => Err(LicenseError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_exact_key_only() {
        let key = AdminKey::new("s3cret-admin").unwrap();
        assert!(key.verify("s3cret-admin"));
        assert!(!key.verify("s3cret-admin "));
        assert!(!key.verify("S3CRET-ADMIN"));
        assert!(!key.verify(""));
    }

    #[test]
    fn authorize_missing_is_unauthorized() {
        let key = AdminKey::new("k").unwrap();
        assert!(matches!(key.authorize(None), Err(LicenseError::Unauthorized)));
        assert!(matches!(
            key.authorize(Some("wrong")),
            Err(LicenseError::Unauthorized)
        ));
        assert!(key.authorize(Some("k")).is_ok());
    }

    #[test]
    fn blank_key_rejected() {
        assert!(matches!(AdminKey::new(""), Err(LicenseError::Config(_))));
        assert!(matches!(AdminKey::new(" \t"), Err(LicenseError::Config(_))));
    }

    #[test]
    fn debug_redacts() {
        let key = AdminKey::new("visible?").unwrap();
        assert!(!format!("{key:?}").contains("visible"));
    }
}
