//! Deterministic license code generation.
//!
//! `code = upper(hex(HMAC-SHA256(secret, seed))[..10])`
//!
//! The same secret and seed always yield the same code. Truncation to
//! 40 bits means collisions are possible in principle; a colliding seed
//! maps onto the existing record.

use crate::error::{LicenseError, LicenseResult};
use hmac::{Hmac, Mac};
use onecode_types::LicenseCode;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Number of characters in a generated code.
pub const CODE_LEN: usize = 10;

/// Keyed code generator holding the server secret.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CodeGenerator {
    secret: Vec<u8>,
}

impl std::fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

impl CodeGenerator {
    /// Creates a generator. The secret must not be blank.
    pub fn new(secret: impl AsRef<[u8]>) -> LicenseResult<Self> {
        let secret = secret.as_ref();
        if secret.iter().all(u8::is_ascii_whitespace) {
            return Err(LicenseError::Config(
                "code generation secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    /// Derives the code for `seed`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the seed is empty.
    pub fn generate(&self, seed: &str) -> LicenseResult<LicenseCode> {
        if seed.is_empty() {
            return Err(LicenseError::Validation("missing seed".to_string()));
        }

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| LicenseError::Config(format!("invalid secret: {e}")))?;
        mac.update(seed.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());

        Ok(LicenseCode::parse(&digest[..CODE_LEN])?)
    }

    /// Builds a practically unique seed for batch issuance from the
    /// current time, the position in the batch, and random jitter.
    #[must_use]
    pub fn batch_seed(index: u32) -> String {
        let millis = chrono::Utc::now().timestamp_millis();
        let jitter = rand::thread_rng().next_u64();
        format!("batch_{millis}_{index}_{jitter}")
    }
}
