//! `credvault passwd` — reset a user's password (and salt).

use crate::cli::output;
use crate::audit::Action;
use crate::cli::{commit, open_store, prompt_new_password, Cli};
use crate::errors::{CredVaultError, Result};

/// Execute the `passwd` command.
pub fn execute(cli: &Cli, username: &str) -> Result<()> {
    let (settings, store) = open_store(cli)?;
    let hasher = settings.password_hasher()?;

    if !store.view(|users| users.contains(username))? {
        return Err(CredVaultError::UserNotFound(username.to_string()));
    }

    let password = prompt_new_password(username)?;
    commit(&store, Action::ResetPassword, Some(username), |users| {
        users.set_password(username, password.as_bytes(), &hasher)?;
        Ok(None)
    })?;

    output::success(&format!("Password for '{username}' updated"));

    Ok(())
}
