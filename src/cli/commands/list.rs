//! `credvault list` — display all users in a table.

use crate::cli::output;
use crate::cli::{open_store, Cli};
use crate::errors::Result;

/// Execute the `list` command.
pub fn execute(cli: &Cli) -> Result<()> {
    let (_settings, store) = open_store(cli)?;

    store.view(|users| {
        output::info(&format!(
            "{} — {} user(s)",
            store.path().display(),
            users.len()
        ));
        output::print_users_table(users);
    })?;

    Ok(())
}
