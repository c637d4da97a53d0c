//! `credvault add` — add a user with a freshly salted password.

use crate::cli::output;
use crate::audit::Action;
use crate::cli::{commit, open_store, prompt_new_password, Cli};
use crate::credentials::validate_username;
use crate::errors::{CredVaultError, Result};

/// Execute the `add` command.
pub fn execute(cli: &Cli, username: &str, role: &str) -> Result<()> {
    validate_username(username)?;

    let (settings, store) = open_store(cli)?;
    let hasher = settings.password_hasher()?;

    // Fail fast on duplicates before asking for a password.
    if store.view(|users| users.contains(username))? {
        return Err(CredVaultError::UserAlreadyExists(username.to_string()));
    }

    let password = prompt_new_password(username)?;

    let total = commit(&store, Action::AddUser, Some(username), |users| {
        users.add_user(username, password.as_bytes(), role, &hasher)?;
        Ok(Some(format!("role={role}")))
    })?;

    output::success(&format!(
        "User '{username}' added with role '{role}' ({total} total)"
    ));

    Ok(())
}
