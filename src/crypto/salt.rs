//! Per-user password salts.
//!
//! A salt is 24 bytes straight from the operating system's CSPRNG,
//! carried around as a standard base64 string so it can live inside
//! the serialized credential tree.  If the OS cannot supply entropy we
//! refuse to mint a salt at all.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::TryRngCore;
use serde::{Deserialize, Serialize};

use crate::errors::{CredVaultError, Result};

/// Number of random bytes in every salt.
pub const SALT_LEN: usize = 24;

/// An opaque, transport-safe (base64) salt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Salt(String);

impl Salt {
    /// Wrap an already-encoded salt string.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The base64 text as stored in the credential file.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode back to raw bytes for feeding into the password hasher.
    pub fn decode(&self) -> Result<Vec<u8>> {
        BASE64
            .decode(&self.0)
            .map_err(|e| CredVaultError::InvalidFormat(format!("salt is not valid base64: {e}")))
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate a fresh salt from the OS random source.
///
/// Fails with `EntropyFailure` when the OS RNG reports an error.
pub fn new_salt() -> Result<Salt> {
    let mut bytes = [0u8; SALT_LEN];
    fill_secure(&mut bytes)?;
    Ok(Salt(BASE64.encode(bytes)))
}

/// Fill `buf` from the OS CSPRNG, mapping failures to `EntropyFailure`.
pub fn fill_secure(buf: &mut [u8]) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| CredVaultError::EntropyFailure(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn salt_decodes_to_24_bytes() {
        let salt = new_salt().unwrap();
        assert_eq!(salt.decode().unwrap().len(), SALT_LEN);
        // 24 bytes -> 32 base64 chars, no padding.
        assert_eq!(salt.as_str().len(), 32);
    }

    #[test]
    fn ten_thousand_salts_are_distinct() {
        let salts: HashSet<Salt> = (0..10_000).map(|_| new_salt().unwrap()).collect();
        assert_eq!(salts.len(), 10_000);
    }

    #[test]
    fn bad_base64_is_a_format_error() {
        let salt = Salt::from_encoded("not base64!!");
        assert!(matches!(salt.decode(), Err(CredVaultError::InvalidFormat(_))));
    }

    #[test]
    fn serializes_as_plain_string() {
        let salt = Salt::from_encoded("AAAA");
        assert_eq!(serde_json::to_string(&salt).unwrap(), "\"AAAA\"");
    }
}
