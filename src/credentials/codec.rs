//! Encrypted credential file format.
//!
//! A credential file has this layout:
//!
//! ```text
//! [CRED: 4 bytes][version: 1 byte][nonce: 12 bytes][AES-256-GCM ciphertext + 16-byte tag]
//! ```
//!
//! - **Magic** (`CRED`): identifies the file as a CredVault credential file.
//! - **Version**: format version (currently `1`).
//! - **Nonce / ciphertext**: the JSON-serialized `CredentialSet`, sealed
//!   with a key derived from the injected master secret.  Magic and
//!   version are passed as associated data, so every byte of the file
//!   is covered by the authentication tag.

use std::sync::Arc;

use zeroize::Zeroizing;

use super::user::CredentialSet;
use crate::crypto::encryption::{self, NONCE_LEN, TAG_LEN};
use crate::crypto::keys::KeySource;
use crate::errors::{CredVaultError, Result};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic bytes at the start of every credential file.
const MAGIC: &[u8; 4] = b"CRED";

/// Current binary format version.
pub const CURRENT_VERSION: u8 = 1;

/// Fixed-size prefix: 4 (magic) + 1 (version).
const PREFIX_LEN: usize = 5;

/// Smallest possible file: prefix + nonce + tag (empty plaintext).
const MIN_LEN: usize = PREFIX_LEN + NONCE_LEN + TAG_LEN;

// ---------------------------------------------------------------------------
// CredentialCodec
// ---------------------------------------------------------------------------

/// Turns a `CredentialSet` into sealed bytes and back.
///
/// The codec holds a handle to the key source, not the key: the master
/// secret is fetched for each call and wiped when the call returns.
#[derive(Clone)]
pub struct CredentialCodec {
    keys: Arc<dyn KeySource>,
}

impl CredentialCodec {
    pub fn new(keys: Arc<dyn KeySource>) -> Self {
        Self { keys }
    }

    /// Description of the key source, for logs.
    pub fn key_description(&self) -> String {
        self.keys.describe()
    }

    /// Serialize and seal `set`.
    pub fn encode(&self, set: &CredentialSet) -> Result<Vec<u8>> {
        let plaintext = Zeroizing::new(
            serde_json::to_vec(set)
                .map_err(|e| CredVaultError::InvalidFormat(format!("serialize users: {e}")))?,
        );

        let master = self.keys.master_key()?;
        let store_key = master.derive_store_key()?;

        let mut prefix = [0u8; PREFIX_LEN];
        prefix[..4].copy_from_slice(MAGIC);
        prefix[4] = CURRENT_VERSION;

        let sealed = encryption::encrypt(&store_key[..], &plaintext, &prefix)?;

        let mut buf = Vec::with_capacity(PREFIX_LEN + sealed.len());
        buf.extend_from_slice(&prefix);
        buf.extend_from_slice(&sealed);
        Ok(buf)
    }

    /// Open and parse a sealed credential file.
    ///
    /// Envelope problems and malformed plaintext are `InvalidFormat`;
    /// anything the cipher refuses to authenticate is `DecryptionFailed`.
    pub fn decode(&self, data: &[u8]) -> Result<CredentialSet> {
        if data.len() < MIN_LEN {
            return Err(CredVaultError::InvalidFormat(
                "file too small to be a credential file".into(),
            ));
        }

        if &data[0..4] != MAGIC {
            return Err(CredVaultError::InvalidFormat(
                "missing CRED magic bytes".into(),
            ));
        }

        let version = data[4];
        if version != CURRENT_VERSION {
            return Err(CredVaultError::InvalidFormat(format!(
                "unsupported version {version}, expected {CURRENT_VERSION}"
            )));
        }

        let (prefix, sealed) = data.split_at(PREFIX_LEN);

        let master = self.keys.master_key()?;
        let store_key = master.derive_store_key()?;
        let plaintext = Zeroizing::new(encryption::decrypt(&store_key[..], sealed, prefix)?);

        let set: CredentialSet = serde_json::from_slice(&plaintext)
            .map_err(|e| CredVaultError::InvalidFormat(format!("users JSON: {e}")))?;
        set.validate()?;

        Ok(set)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
