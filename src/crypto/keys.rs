//! Master-secret handling and key derivation using HKDF-SHA256.
//!
//! The hosting environment supplies one 32-byte master secret through a
//! `KeySource`.  From it we derive the AES key that seals the credential
//! file, so the raw master secret never touches the cipher directly.
//! The store asks its source for the key on every encode/decode and
//! drops it right after; nothing keeps key bytes alive in between.

use std::fmt;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{CredVaultError, Result};

/// Length of the master secret and of derived sub-keys (256 bits).
pub const KEY_LEN: usize = 32;

/// HKDF `info` for the credential-file encryption key.
const STORE_KEY_INFO: &[u8] = b"credvault-store-key";

/// Derive the credential-file encryption key from the master secret.
pub fn derive_store_key(master_key: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    hkdf_derive(master_key, STORE_KEY_INFO)
}

/// Run HKDF-SHA256 expand with the given `info`.
///
/// The extract step is skipped (zero salt) because the master secret is
/// already uniformly random.
fn hkdf_derive(ikm: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, ikm);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, &mut okm[..])
        .map_err(|e| CredVaultError::KeyDerivationFailed(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A wrapper around a 32-byte master key that automatically zeroes
/// its memory when dropped.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct MasterKey {
    bytes: [u8; KEY_LEN],
}

impl MasterKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Build a key from a slice, checking the length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CredVaultError::KeySourceError(format!(
                "master key must be exactly {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self::new(arr))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Derive the credential-file encryption key from this master key.
    pub fn derive_store_key(&self) -> Result<Zeroizing<[u8; KEY_LEN]>> {
        derive_store_key(&self.bytes)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Supplies the process-wide master secret.
///
/// Implementations are injected into the credential store; the store
/// calls `master_key` whenever it needs to seal or open the file.
pub trait KeySource: Send + Sync {
    fn master_key(&self) -> Result<MasterKey>;

    /// Short human-readable description for logs (never the key).
    fn describe(&self) -> String;
}

/// An in-memory master key, for embedding and tests.
pub struct StaticKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl StaticKey {
    pub fn new(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }
}

impl KeySource for StaticKey {
    fn master_key(&self) -> Result<MasterKey> {
        Ok(MasterKey::new(*self.bytes))
    }

    fn describe(&self) -> String {
        "static key".to_string()
    }
}

/// Reads the master key from a 32-byte keyfile on every request.
#[derive(Debug, Clone)]
pub struct KeyfileSource {
    path: PathBuf,
}

impl KeyfileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeySource for KeyfileSource {
    fn master_key(&self) -> Result<MasterKey> {
        let bytes = Zeroizing::new(super::keyfile::load_keyfile(&self.path)?);
        MasterKey::from_slice(&bytes)
    }

    fn describe(&self) -> String {
        format!("keyfile {}", self.path.display())
    }
}

/// Reads a base64-encoded master key from an environment variable.
///
/// Handy for CI and containers where mounting a keyfile is awkward.
#[derive(Debug, Clone)]
pub struct EnvKeySource {
    var: String,
}

impl EnvKeySource {
    /// Default variable name consulted by the CLI.
    pub const DEFAULT_VAR: &'static str = "CREDVAULT_MASTER_KEY";

    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Returns `true` if the variable is set and non-empty.
    pub fn is_present(&self) -> bool {
        std::env::var(&self.var).is_ok_and(|v| !v.is_empty())
    }
}

impl KeySource for EnvKeySource {
    fn master_key(&self) -> Result<MasterKey> {
        let encoded = Zeroizing::new(std::env::var(&self.var).map_err(|_| {
            CredVaultError::KeySourceError(format!("environment variable {} is not set", self.var))
        })?);
        let decoded = Zeroizing::new(BASE64.decode(encoded.trim()).map_err(|e| {
            CredVaultError::KeySourceError(format!("{} is not valid base64: {e}", self.var))
        })?);
        MasterKey::from_slice(&decoded)
    }

    fn describe(&self) -> String {
        format!("environment variable {}", self.var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_key_is_deterministic_and_differs_from_master() {
        let master = MasterKey::new([0x42; KEY_LEN]);
        let a = master.derive_store_key().unwrap();
        let b = master.derive_store_key().unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *master.as_bytes());
    }

    #[test]
    fn different_masters_give_different_store_keys() {
        let a = derive_store_key(&[0x01; KEY_LEN]).unwrap();
        let b = derive_store_key(&[0x02; KEY_LEN]).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(MasterKey::from_slice(&[0u8; 31]).is_err());
        assert!(MasterKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn debug_does_not_leak_bytes() {
        let key = MasterKey::new([0xAB; KEY_LEN]);
        assert_eq!(format!("{key:?}"), "MasterKey(..)");
    }

    #[test]
    fn env_source_decodes_base64() {
        let var = "CREDVAULT_TEST_KEY_ENV_SOURCE";
        std::env::set_var(var, BASE64.encode([0x07u8; KEY_LEN]));
        let source = EnvKeySource::new(var);
        assert!(source.is_present());
        assert_eq!(source.master_key().unwrap().as_bytes(), &[0x07u8; KEY_LEN]);
        std::env::remove_var(var);
        assert!(!source.is_present());
        assert!(source.master_key().is_err());
    }

    #[test]
    fn env_source_rejects_short_key() {
        let var = "CREDVAULT_TEST_KEY_SHORT";
        std::env::set_var(var, BASE64.encode([0x07u8; 8]));
        assert!(EnvKeySource::new(var).master_key().is_err());
        std::env::remove_var(var);
    }
}
