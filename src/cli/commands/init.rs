//! `credvault init` — create the keyfile and an empty credential file.

use crate::cli::output;
use crate::audit::Action;
use crate::cli::{app_root, commit, key_source, prompt_new_password, Cli};
use crate::config::Settings;
use crate::credentials::{validate_username, CredentialStore};
use crate::crypto::keyfile::generate_keyfile;
use crate::crypto::keys::EnvKeySource;
use crate::errors::{CredVaultError, Result};

/// Role given to the account created with `--admin`.
const ADMIN_ROLE: &str = "admin";

/// Execute the `init` command.
pub fn execute(cli: &Cli, admin: Option<&str>) -> Result<()> {
    let root = app_root(cli)?;
    let settings = Settings::load(&root)?;
    let auth_path = settings.auth_file_path(&root);

    // 1. Never clobber an existing credential file.
    if auth_path.exists() {
        output::tip("Use `credvault add` to add users to the existing file.");
        return Err(CredVaultError::CommandFailed(format!(
            "credential file already exists at {}",
            auth_path.display()
        )));
    }

    // 2. Make sure a master key is available.
    if EnvKeySource::new(EnvKeySource::DEFAULT_VAR).is_present() {
        output::info(&format!(
            "Using master key from {}.",
            EnvKeySource::DEFAULT_VAR
        ));
    } else {
        let keyfile = settings.keyfile_path(&root);
        if keyfile.exists() {
            output::info(&format!("Using existing keyfile at {}", keyfile.display()));
        } else {
            generate_keyfile(&keyfile)?;
            output::success(&format!("Keyfile generated at {}", keyfile.display()));
            output::warning("Keep this file secret and backed up — without it the users are lost.");
        }
    }

    // 3. Validate and prompt before touching the store.
    let hasher = settings.password_hasher()?;
    let admin_password = match admin {
        Some(name) => {
            validate_username(name)?;
            Some(prompt_new_password(name)?)
        }
        None => None,
    };

    // 4. Write the (possibly empty) credential file.
    let store = CredentialStore::new(&auth_path, key_source(&settings, &root));
    commit(&store, Action::Init, admin, |users| {
        if let (Some(name), Some(pw)) = (admin, &admin_password) {
            users.add_user(name, pw.as_bytes(), ADMIN_ROLE, &hasher)?;
        }
        Ok(admin.map(|_| format!("role={ADMIN_ROLE}")))
    })?;

    output::success(&format!("Credential file created at {}", auth_path.display()));
    if let Some(name) = admin {
        output::success(&format!("Administrator '{name}' added"));
    }

    output::tip("Run `credvault add <USERNAME>` to add a user.");
    output::tip("Run `credvault list` to see all users.");

    Ok(())
}
