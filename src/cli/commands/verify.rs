//! `credvault verify` — check a password without changing anything.

use crate::cli::output;
use crate::cli::{open_store, prompt_password, Cli};
use crate::errors::{CredVaultError, Result};

/// Execute the `verify` command.
pub fn execute(cli: &Cli, username: &str) -> Result<()> {
    let (settings, store) = open_store(cli)?;
    let hasher = settings.password_hasher()?;

    // Copy the record out so the Argon2 work runs outside the store lock.
    let user = store
        .view(|users| users.get(username).cloned())?
        .ok_or_else(|| CredVaultError::UserNotFound(username.to_string()))?;

    let password = prompt_password(&format!("Password for {username}"))?;

    if hasher.verify(password.as_bytes(), &user.salt, &user.password_hash)? {
        output::success(&format!("Password for '{username}' is correct"));
        Ok(())
    } else {
        Err(CredVaultError::WrongPassword(username.to_string()))
    }
}
