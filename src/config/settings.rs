use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::crypto::kdf::{Argon2Params, PasswordHasher};
use crate::errors::{CredVaultError, Result};

/// Token in configured paths that stands for the application root.
pub const ROOT_TOKEN: &str = "~";

/// Application-level configuration, loaded from `credvault.toml`.
///
/// Every field has a sensible default so CredVault works out-of-the-box
/// without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Credential file location; `~` is replaced by the application root.
    #[serde(default = "default_auth_file")]
    pub auth_file: String,

    /// Keyfile holding the master secret; `~` as above.
    #[serde(default = "default_keyfile")]
    pub keyfile: String,

    /// Argon2 memory cost in KiB for password hashing (default: 64 MB).
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,

    /// Argon2 iteration count (default: 3).
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,

    /// Argon2 parallelism degree (default: 4).
    #[serde(default = "default_argon2_parallelism")]
    pub argon2_parallelism: u32,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_auth_file() -> String {
    "~/auth.vault".to_string()
}

fn default_keyfile() -> String {
    "~/.credvault/keyfile".to_string()
}

fn default_argon2_memory_kib() -> u32 {
    65_536 // 64 MB
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    4
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            auth_file: default_auth_file(),
            keyfile: default_keyfile(),
            argon2_memory_kib: default_argon2_memory_kib(),
            argon2_iterations: default_argon2_iterations(),
            argon2_parallelism: default_argon2_parallelism(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the application root.
    pub const FILE_NAME: &'static str = "credvault.toml";

    /// Load settings from `<app_root>/credvault.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(app_root: &Path) -> Result<Self> {
        let config_path = app_root.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            CredVaultError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Point `keyfile` in `<app_root>/credvault.toml` at `keyfile`.
    ///
    /// Other keys in the file are kept (comments are not).  A keyfile
    /// under `app_root` is written as `~/...` so the config stays valid
    /// if the application directory moves.
    pub fn store_keyfile(app_root: &Path, keyfile: &Path) -> Result<()> {
        let config_path = app_root.join(Self::FILE_NAME);

        let mut table = if config_path.exists() {
            std::fs::read_to_string(&config_path)?
                .parse::<toml::Table>()
                .map_err(|e| {
                    CredVaultError::ConfigError(format!(
                        "Failed to parse {}: {e}",
                        config_path.display()
                    ))
                })?
        } else {
            toml::Table::new()
        };

        let value = match keyfile.strip_prefix(app_root) {
            Ok(rel) => format!("{ROOT_TOKEN}/{}", rel.display()),
            Err(_) => keyfile.display().to_string(),
        };
        table.insert("keyfile".into(), toml::Value::String(value));

        let contents = toml::to_string(&table).map_err(|e| {
            CredVaultError::ConfigError(format!("Failed to write {}: {e}", config_path.display()))
        })?;
        std::fs::write(&config_path, contents)?;
        Ok(())
    }

    /// Absolute path of the credential file.
    pub fn auth_file_path(&self, app_root: &Path) -> PathBuf {
        resolve_path(app_root, &self.auth_file)
    }

    /// Absolute path of the master keyfile.
    pub fn keyfile_path(&self, app_root: &Path) -> PathBuf {
        resolve_path(app_root, &self.keyfile)
    }

    /// Convert the Argon2 settings into crypto-layer params.
    pub fn argon2_params(&self) -> Argon2Params {
        Argon2Params {
            memory_kib: self.argon2_memory_kib,
            iterations: self.argon2_iterations,
            parallelism: self.argon2_parallelism,
        }
    }

    /// Build a password hasher from the configured params.
    pub fn password_hasher(&self) -> Result<PasswordHasher> {
        PasswordHasher::new(self.argon2_params())
    }
}

/// Expand every `~` in `template` to `app_root`.
///
/// Relative results are anchored at `app_root` so the outcome is always
/// absolute when `app_root` is.  This lets the credential file live
/// outside the application directory (`/etc/app/auth.vault`) or inside
/// it (`~/data/auth.vault`).
pub fn resolve_path(app_root: &Path, template: &str) -> PathBuf {
    let root = app_root.to_string_lossy();
    let expanded = PathBuf::from(template.replace(ROOT_TOKEN, &root));
    if expanded.is_absolute() {
        expanded
    } else {
        app_root.join(expanded)
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.auth_file, "~/auth.vault");
        assert_eq!(s.keyfile, "~/.credvault/keyfile");
        assert_eq!(s.argon2_memory_kib, 65_536);
        assert_eq!(s.argon2_iterations, 3);
        assert_eq!(s.argon2_parallelism, 4);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.auth_file, "~/auth.vault");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        let config = r#"
auth_file = "/var/lib/app/auth.vault"
keyfile = "~/secrets/master.key"
argon2_memory_kib = 131072
argon2_iterations = 5
argon2_parallelism = 8
"#;
        fs::write(tmp.path().join(Settings::FILE_NAME), config).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.auth_file, "/var/lib/app/auth.vault");
        assert_eq!(settings.keyfile, "~/secrets/master.key");
        assert_eq!(settings.argon2_memory_kib, 131_072);
        assert_eq!(settings.argon2_iterations, 5);
        assert_eq!(settings.argon2_parallelism, 8);
    }

    #[test]
    fn load_uses_defaults_for_missing_fields() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(Settings::FILE_NAME),
            "auth_file = \"~/users.vault\"\n",
        )
        .unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.auth_file, "~/users.vault");
        assert_eq!(settings.keyfile, "~/.credvault/keyfile");
        assert_eq!(settings.argon2_iterations, 3);
    }

    #[test]
    fn load_errors_on_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(Settings::FILE_NAME), "not valid {{toml").unwrap();
        assert!(Settings::load(tmp.path()).is_err());
    }

    #[test]
    fn root_token_is_replaced() {
        let s = Settings::default();
        let root = Path::new("/srv/app");
        assert_eq!(s.auth_file_path(root), PathBuf::from("/srv/app/auth.vault"));
        assert_eq!(
            s.keyfile_path(root),
            PathBuf::from("/srv/app/.credvault/keyfile")
        );
    }

    #[test]
    fn absolute_path_outside_root_is_kept() {
        let root = Path::new("/srv/app");
        assert_eq!(
            resolve_path(root, "/etc/app/auth.vault"),
            PathBuf::from("/etc/app/auth.vault")
        );
    }

    #[test]
    fn relative_path_is_anchored_at_root() {
        let root = Path::new("/srv/app");
        assert_eq!(
            resolve_path(root, "data/auth.vault"),
            PathBuf::from("/srv/app/data/auth.vault")
        );
    }

    #[test]
    fn store_keyfile_keeps_other_settings() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(Settings::FILE_NAME),
            "auth_file = \"/var/lib/app/auth.vault\"\nargon2_iterations = 5\n",
        )
        .unwrap();

        Settings::store_keyfile(tmp.path(), &tmp.path().join("keys/new.key")).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.keyfile, "~/keys/new.key");
        assert_eq!(settings.auth_file, "/var/lib/app/auth.vault");
        assert_eq!(settings.argon2_iterations, 5);
        assert_eq!(settings.keyfile_path(tmp.path()), tmp.path().join("keys/new.key"));
    }

    #[test]
    fn store_keyfile_creates_config_and_keeps_outside_paths() {
        let tmp = TempDir::new().unwrap();
        Settings::store_keyfile(tmp.path(), Path::new("/etc/credvault/master.key")).unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.keyfile, "/etc/credvault/master.key");
        assert_eq!(settings.auth_file, "~/auth.vault");
    }

    #[test]
    fn password_hasher_rejects_weak_config() {
        let s = Settings {
            argon2_memory_kib: 16,
            ..Settings::default()
        };
        assert!(s.password_hasher().is_err());
    }
}
