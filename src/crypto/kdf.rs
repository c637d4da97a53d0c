//! Password hashing using Argon2id.
//!
//! Argon2id is a memory-hard KDF that protects stored password hashes
//! against brute-force and GPU-based attacks.  Parameters are
//! configurable via `Argon2Params` (loaded from `credvault.toml` or
//! sensible defaults).

use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use super::salt::Salt;
use crate::errors::{CredVaultError, Result};

/// Length of the derived hash in bytes (256 bits).
const HASH_LEN: usize = 32;

/// Minimum safe memory cost in KiB (8 MB).
const MIN_MEMORY_KIB: u32 = 8_192;

/// Configurable Argon2id parameters.
///
/// These map 1:1 to the fields in `Settings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Params {
    /// Memory cost in KiB (default: 65 536 = 64 MB).
    pub memory_kib: u32,
    /// Number of iterations (default: 3).
    pub iterations: u32,
    /// Parallelism lanes (default: 4).
    pub parallelism: u32,
}

impl Default for Argon2Params {
    fn default() -> Self {
        Self {
            memory_kib: 65_536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

impl Argon2Params {
    /// Reject dangerously weak settings before they reach Argon2.
    pub fn validate(&self) -> Result<()> {
        if self.memory_kib < MIN_MEMORY_KIB {
            return Err(CredVaultError::KeyDerivationFailed(format!(
                "Argon2 memory_kib must be at least {MIN_MEMORY_KIB} (got {})",
                self.memory_kib
            )));
        }
        if self.iterations < 1 {
            return Err(CredVaultError::KeyDerivationFailed(
                "Argon2 iterations must be at least 1".into(),
            ));
        }
        if self.parallelism < 1 {
            return Err(CredVaultError::KeyDerivationFailed(
                "Argon2 parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Hashes and verifies user passwords against their per-user salt.
#[derive(Debug, Clone, Copy, Default)]
pub struct PasswordHasher {
    params: Argon2Params,
}

impl PasswordHasher {
    /// Build a hasher, enforcing minimum Argon2 parameters.
    pub fn new(params: Argon2Params) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &Argon2Params {
        &self.params
    }

    /// Hash `password` with `salt`, returning the base64 digest.
    ///
    /// The same password + salt + params always produce the same hash.
    pub fn hash(&self, password: &[u8], salt: &Salt) -> Result<String> {
        let salt_bytes = salt.decode()?;

        let params = Params::new(
            self.params.memory_kib,
            self.params.iterations,
            self.params.parallelism,
            Some(HASH_LEN),
        )
        .map_err(|e| CredVaultError::KeyDerivationFailed(format!("invalid Argon2 params: {e}")))?;

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut out = [0u8; HASH_LEN];
        argon2
            .hash_password_into(password, &salt_bytes, &mut out)
            .map_err(|e| {
                CredVaultError::KeyDerivationFailed(format!("Argon2id hashing failed: {e}"))
            })?;

        let encoded = BASE64.encode(out);
        out.zeroize();
        Ok(encoded)
    }

    /// Check `password` against a stored hash in constant time.
    pub fn verify(&self, password: &[u8], salt: &Salt, expected_hash: &str) -> Result<bool> {
        let actual = self.hash(password, salt)?;
        Ok(actual.as_bytes().ct_eq(expected_hash.as_bytes()).into())
    }
}
