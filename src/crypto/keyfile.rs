//! Keyfile holding the master secret for a credential store.
//!
//! A keyfile is 32 random bytes.  It is written once with owner-only
//! permissions and read back by `KeyfileSource` whenever the store
//! needs to seal or open the credential file.

use std::fs;
use std::path::Path;

use super::keys::KEY_LEN;
use super::salt::fill_secure;
use crate::errors::{CredVaultError, Result};

/// Generate a new random keyfile and write it to `path`.
///
/// Refuses to overwrite an existing keyfile, since that would make the
/// credential file it protects unreadable.
pub fn generate_keyfile(path: &Path) -> Result<Vec<u8>> {
    if path.exists() {
        return Err(CredVaultError::KeySourceError(format!(
            "keyfile already exists at {}",
            path.display()
        )));
    }

    let mut keyfile = vec![0u8; KEY_LEN];
    fill_secure(&mut keyfile)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| {
                CredVaultError::KeySourceError(format!("cannot create keyfile directory: {e}"))
            })?;
        }
    }

    fs::write(path, &keyfile)
        .map_err(|e| CredVaultError::KeySourceError(format!("failed to write keyfile: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms).map_err(|e| {
            CredVaultError::KeySourceError(format!("failed to set keyfile permissions: {e}"))
        })?;
    }

    Ok(keyfile)
}

/// Load a keyfile from disk and validate its length.
pub fn load_keyfile(path: &Path) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(CredVaultError::KeySourceError(format!(
            "keyfile not found at {}",
            path.display()
        )));
    }

    let data = fs::read(path)
        .map_err(|e| CredVaultError::KeySourceError(format!("failed to read keyfile: {e}")))?;

    if data.len() != KEY_LEN {
        return Err(CredVaultError::KeySourceError(format!(
            "keyfile must be exactly {} bytes, got {}",
            KEY_LEN,
            data.len()
        )));
    }

    Ok(data)
}
