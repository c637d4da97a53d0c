//! `credvault keygen` — generate a new random keyfile.

use std::path::PathBuf;

use crate::cli::output;
use crate::cli::{app_root, Cli};
use crate::config::Settings;
use crate::crypto::keyfile::generate_keyfile;
use crate::errors::Result;

/// Execute the `keygen` command.
pub fn execute(cli: &Cli, path: Option<&str>) -> Result<()> {
    let root = app_root(cli)?;

    let path = match path {
        Some(p) => PathBuf::from(p),
        None => Settings::load(&root)?.keyfile_path(&root),
    };

    generate_keyfile(&path)?;

    output::success(&format!("Keyfile generated at {}", path.display()));
    output::warning("Keep this file secret! Anyone with it can decrypt the credential file.");

    Ok(())
}
