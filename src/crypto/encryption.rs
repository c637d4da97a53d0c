//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce and
//! prepends it to the ciphertext.  `decrypt` splits the nonce back out
//! before decrypting.  Both take associated data (`aad`) that is
//! authenticated but not encrypted, so a caller can bind a plaintext
//! header to the ciphertext.
//!
//! Layout of the returned byte buffer:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};

use super::salt::fill_secure;
use crate::errors::{CredVaultError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Encrypt `plaintext` with a 32-byte `key`, authenticating `aad` too.
///
/// Returns the nonce prepended to the ciphertext (nonce || ciphertext).
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| CredVaultError::EncryptionFailed(format!("invalid key length: {e}")))?;

    // A failing OS RNG surfaces as EntropyFailure, same as salts.
    let mut nonce_bytes = [0u8; NONCE_LEN];
    fill_secure(&mut nonce_bytes)?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CredVaultError::EncryptionFailed(format!("encryption error: {e}")))?;

    // Prepend the nonce so the caller only needs to store one blob.
    let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(output)
}

/// Decrypt data that was produced by `encrypt` with the same `aad`.
///
/// Any authentication failure (wrong key, flipped bit, different aad)
/// comes back as `DecryptionFailed`.
pub fn decrypt(key: &[u8], ciphertext_with_nonce: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if ciphertext_with_nonce.len() < NONCE_LEN + TAG_LEN {
        return Err(CredVaultError::DecryptionFailed);
    }

    let (nonce_bytes, ciphertext) = ciphertext_with_nonce.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CredVaultError::DecryptionFailed)?;

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CredVaultError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_aad() {
        let key = [0x11u8; 32];
        let ct = encrypt(&key, b"users", b"header").unwrap();
        assert_eq!(ct.len(), NONCE_LEN + 5 + TAG_LEN);
        assert_eq!(decrypt(&key, &ct, b"header").unwrap(), b"users");
    }

    #[test]
    fn each_call_prepends_a_fresh_nonce() {
        let key = [0x44u8; 32];
        let a = encrypt(&key, b"same", b"").unwrap();
        let b = encrypt(&key, b"same", b"").unwrap();
        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_eq!(decrypt(&key, &a, b"").unwrap(), b"same");
        assert_eq!(decrypt(&key, &b, b"").unwrap(), b"same");
    }

    #[test]
    fn different_aad_fails() {
        let key = [0x22u8; 32];
        let ct = encrypt(&key, b"users", b"header-a").unwrap();
        assert!(matches!(
            decrypt(&key, &ct, b"header-b"),
            Err(CredVaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn short_input_fails() {
        let key = [0x33u8; 32];
        assert!(matches!(
            decrypt(&key, &[0u8; NONCE_LEN + TAG_LEN - 1], b""),
            Err(CredVaultError::DecryptionFailed)
        ));
    }

    #[test]
    fn invalid_key_length_is_rejected() {
        assert!(matches!(
            encrypt(&[0u8; 16], b"x", b""),
            Err(CredVaultError::EncryptionFailed(_))
        ));
    }
}
