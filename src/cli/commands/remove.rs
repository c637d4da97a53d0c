//! `credvault remove` — delete a user.

use dialoguer::Confirm;

use crate::cli::output;
use crate::audit::Action;
use crate::cli::{commit, open_store, Cli};
use crate::errors::{CredVaultError, Result};

/// Execute the `remove` command.
pub fn execute(cli: &Cli, username: &str, force: bool) -> Result<()> {
    // Unless --force is set, ask for confirmation before deleting.
    if !force {
        let confirmed = Confirm::new()
            .with_prompt(format!("Remove user '{username}'?"))
            .default(false)
            .interact()
            .map_err(|e| CredVaultError::CommandFailed(format!("confirm prompt: {e}")))?;

        if !confirmed {
            output::info("Cancelled.");
            return Ok(());
        }
    }

    let (_settings, store) = open_store(cli)?;
    let remaining = commit(&store, Action::RemoveUser, Some(username), |users| {
        let removed = users.remove_user(username)?;
        Ok(Some(format!("role was {}", removed.role)))
    })?;

    output::success(&format!("Removed user '{username}' ({remaining} left)"));

    Ok(())
}
