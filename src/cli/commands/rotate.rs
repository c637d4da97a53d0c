//! `credvault rotate-key` — re-encrypt the credential file under a new keyfile.
//!
//! The file is opened with the current master key and written back
//! sealed with the new one.  `keyfile` in `credvault.toml` is then
//! pointed at the new keyfile.  The old keyfile is left in place.

use std::path::PathBuf;
use std::sync::Arc;

use crate::audit::{Action, Event};
use crate::cli::output;
use crate::cli::{app_root, open_store, record, Cli};
use crate::config::Settings;
use crate::crypto::keyfile::generate_keyfile;
use crate::crypto::keys::{EnvKeySource, KeyfileSource};
use crate::errors::{CredVaultError, Result};

/// Execute the `rotate-key` command.
pub fn execute(cli: &Cli, new_keyfile: &str) -> Result<()> {
    let root = app_root(cli)?;
    let (settings, store) = open_store(cli)?;

    let new_path = PathBuf::from(new_keyfile);
    let new_path = if new_path.is_absolute() {
        new_path
    } else {
        std::env::current_dir()?.join(new_path)
    };

    if new_path == settings.keyfile_path(&root) {
        return Err(CredVaultError::CommandFailed(format!(
            "{} is already the configured keyfile",
            new_path.display()
        )));
    }

    if new_path.exists() {
        output::info(&format!("Using existing keyfile at {}", new_path.display()));
    } else {
        generate_keyfile(&new_path)?;
        output::success(&format!("Keyfile generated at {}", new_path.display()));
    }

    store.rotate_key(Arc::new(KeyfileSource::new(&new_path)))?;
    let count = store.view(|users| users.len())?;
    record(
        &store,
        &Event::new(Action::RotateKey, None, count)
            .with_note(Some(format!("keyfile {}", new_path.display()))),
    );
    output::success(&format!("Credential file re-encrypted ({count} users)"));

    // The file is already sealed with the new key; from here on a
    // failure only leaves the config stale.
    if let Err(e) = Settings::store_keyfile(&root, &new_path) {
        output::warning(&format!(
            "could not update {}: {e}. Set `keyfile = \"{}\"` there by hand.",
            Settings::FILE_NAME,
            new_path.display()
        ));
        return Err(e);
    }
    output::success(&format!(
        "{} now points at {}",
        Settings::FILE_NAME,
        new_path.display()
    ));

    if EnvKeySource::new(EnvKeySource::DEFAULT_VAR).is_present() {
        output::warning(&format!(
            "{} is set and takes precedence over the keyfile; unset it before the next command.",
            EnvKeySource::DEFAULT_VAR
        ));
    }
    output::tip("Keep the old keyfile until you have a backup sealed with the new one.");

    Ok(())
}
