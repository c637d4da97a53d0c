//! `credvault role` — change a user's role.

use crate::audit::Action;
use crate::cli::output;
use crate::cli::{commit, open_store, Cli};
use crate::errors::Result;

/// Execute the `role` command.
pub fn execute(cli: &Cli, username: &str, role: &str) -> Result<()> {
    let (_settings, store) = open_store(cli)?;

    commit(&store, Action::ChangeRole, Some(username), |users| {
        let previous = users
            .get(username)
            .map(|u| u.role.clone())
            .unwrap_or_default();
        users.set_role(username, role)?;
        Ok(Some(format!("{previous} -> {role}")))
    })?;

    output::success(&format!("User '{username}' is now '{role}'"));

    Ok(())
}
