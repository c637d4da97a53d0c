//! CLI module — Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use zeroize::Zeroizing;

use crate::audit::{Action, Event};
use crate::config::Settings;
use crate::credentials::{CredentialSet, CredentialStore};
use crate::crypto::keys::{EnvKeySource, KeySource, KeyfileSource};
use crate::errors::{CredVaultError, Result};

/// Minimum password length to prevent trivially weak passwords.
const MIN_PASSWORD_LEN: usize = 8;

/// Environment variable consulted before prompting for a password.
const PASSWORD_ENV: &str = "CREDVAULT_PASSWORD";

/// CredVault CLI: encrypted credential store for system users.
#[derive(Parser)]
#[command(
    name = "credvault",
    about = "Encrypted credential store for system users",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Application root; `~` in configured paths expands to this (default: .)
    #[arg(long, default_value = ".", global = true)]
    pub root: String,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Create the keyfile and an empty credential file
    Init {
        /// Also create an administrator account with this username
        #[arg(long)]
        admin: Option<String>,
    },

    /// Generate a new random keyfile
    Keygen {
        /// Path for the keyfile (default: the configured keyfile)
        path: Option<String>,
    },

    /// Add a user
    Add {
        /// Username (e.g. alice)
        username: String,
        /// Role to assign
        #[arg(short, long, default_value = crate::credentials::DEFAULT_ROLE)]
        role: String,
    },

    /// Remove a user
    Remove {
        /// Username
        username: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// List all users
    List,

    /// Reset a user's password
    Passwd {
        /// Username
        username: String,
    },

    /// Change a user's role
    Role {
        /// Username
        username: String,
        /// New role
        role: String,
    },

    /// Check a password against the stored hash
    Verify {
        /// Username
        username: String,
    },

    /// Re-encrypt the credential file under a new keyfile
    RotateKey {
        /// Path to the new keyfile (generated if it does not exist)
        new_keyfile: String,
    },

    /// Show committed credential changes, newest first
    Audit {
        /// Number of entries to show
        #[arg(long, default_value_t = 50)]
        last: usize,
        /// Only entries newer than this: 30m, 24h, 7d, 2w or an RFC 3339 time
        #[arg(long)]
        since: Option<String>,
        /// Only entries about this user
        #[arg(long)]
        user: Option<String>,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve `--root` to an absolute application root.
pub fn app_root(cli: &Cli) -> Result<PathBuf> {
    let root = PathBuf::from(&cli.root);
    if root.is_absolute() {
        Ok(root)
    } else {
        Ok(std::env::current_dir()?.join(root))
    }
}

/// Pick the master-key source: `CREDVAULT_MASTER_KEY` if set, otherwise
/// the configured keyfile.
pub fn key_source(settings: &Settings, root: &std::path::Path) -> Arc<dyn KeySource> {
    let env = EnvKeySource::new(EnvKeySource::DEFAULT_VAR);
    if env.is_present() {
        Arc::new(env)
    } else {
        Arc::new(KeyfileSource::new(settings.keyfile_path(root)))
    }
}

/// Load settings and open the credential store for this invocation.
pub fn open_store(cli: &Cli) -> Result<(Settings, CredentialStore)> {
    let root = app_root(cli)?;
    let settings = Settings::load(&root)?;
    let store = CredentialStore::new(settings.auth_file_path(&root), key_source(&settings, &root));
    Ok((settings, store))
}

/// Get an existing password, from `CREDVAULT_PASSWORD` or a prompt.
///
/// Returns `Zeroizing<String>` so the password is wiped from memory on drop.
pub fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            return Ok(Zeroizing::new(pw));
        }
    }

    let pw = dialoguer::Password::new()
        .with_prompt(prompt)
        .interact()
        .map_err(|e| CredVaultError::CommandFailed(format!("password prompt: {e}")))?;
    Ok(Zeroizing::new(pw))
}

/// Prompt for a new password with confirmation.
///
/// Also respects `CREDVAULT_PASSWORD` for scripted/CI usage.
/// Enforces a minimum password length.
pub fn prompt_new_password(username: &str) -> Result<Zeroizing<String>> {
    if let Ok(pw) = std::env::var(PASSWORD_ENV) {
        if !pw.is_empty() {
            check_password_strength(&pw)?;
            return Ok(Zeroizing::new(pw));
        }
    }

    loop {
        let password = Zeroizing::new(
            dialoguer::Password::new()
                .with_prompt(format!("New password for {username}"))
                .with_confirmation("Confirm password", "Passwords do not match, try again")
                .interact()
                .map_err(|e| CredVaultError::CommandFailed(format!("password prompt: {e}")))?,
        );

        if let Err(e) = check_password_strength(&password) {
            output::warning(&format!("{e}. Try again."));
            continue;
        }

        return Ok(password);
    }
}

fn check_password_strength(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CredVaultError::CommandFailed(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Apply a change through `store` and, once it is on disk, add it to
/// the audit trail.
///
/// `f` returns the note to record with the change.  Returns the number
/// of users after the change.
pub fn commit<F>(
    store: &CredentialStore,
    action: Action,
    subject: Option<&str>,
    f: F,
) -> Result<usize>
where
    F: FnOnce(&mut CredentialSet) -> Result<Option<String>>,
{
    let (note, users_after) = store.modify(|users| {
        let note = f(users)?;
        Ok((note, users.len()))
    })?;

    record(store, &Event::new(action, subject, users_after).with_note(note));
    Ok(users_after)
}

/// Append `event` to the audit trail of `store`'s credential file.
///
/// The change is already on disk, so a trail that cannot be written is
/// logged and otherwise ignored.
pub fn record(store: &CredentialStore, event: &Event) {
    #[cfg(feature = "audit-log")]
    {
        let appended = crate::audit::AuditTrail::open(store.path()).and_then(|t| t.append(event));
        if let Err(e) = appended {
            tracing::warn!(action = %event.action, error = %e, "audit entry not recorded");
        }
    }

    #[cfg(not(feature = "audit-log"))]
    let _ = (store, event);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_are_rejected() {
        assert!(check_password_strength("short").is_err());
        assert!(check_password_strength("long-enough").is_ok());
    }

    #[test]
    fn password_length_counts_characters() {
        // Eight characters, more than eight bytes.
        assert!(check_password_strength("éééééééé").is_ok());
        assert!(check_password_strength("éééé").is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn root_defaults_to_current_dir() {
        let cli = Cli::parse_from(["credvault", "list"]);
        let root = app_root(&cli).unwrap();
        assert!(root.is_absolute());
    }

    #[test]
    fn add_defaults_role() {
        let cli = Cli::parse_from(["credvault", "add", "alice"]);
        match cli.command {
            Commands::Add { username, role } => {
                assert_eq!(username, "alice");
                assert_eq!(role, "user");
            }
            _ => panic!("expected add"),
        }
    }
}
