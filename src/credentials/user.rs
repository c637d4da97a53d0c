//! `UserRecord` and `CredentialSet`, the in-memory credential tree.
//!
//! A `CredentialSet` serializes as a single `users` container holding an
//! ordered list of records:
//!
//! ```json
//! { "users": [ { "username": "root", "password_hash": "...", ... } ] }
//! ```
//!
//! Usernames are unique within a set.  Every record gets its own salt,
//! minted when the record is created and again whenever its password is
//! reset.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::kdf::PasswordHasher;
use crate::crypto::salt::{new_salt, Salt, SALT_LEN};
use crate::errors::{CredVaultError, Result};

/// Role given to users added without an explicit one.
pub const DEFAULT_ROLE: &str = "user";

/// Maximum username length in bytes.
const MAX_USERNAME_LEN: usize = 64;

/// A single user and their hashed credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,

    /// Argon2id digest of the password, base64.
    pub password_hash: String,

    /// Per-user salt mixed into `password_hash`.
    pub salt: Salt,

    pub role: String,

    /// Extra permission attributes, opaque to the store.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The full, ordered list of users held by a credential store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSet {
    users: Vec<UserRecord>,
}

impl CredentialSet {
    /// A fresh `users` container with no records.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Iterate records in stored order.
    pub fn iter(&self) -> impl Iterator<Item = &UserRecord> {
        self.users.iter()
    }

    pub fn usernames(&self) -> Vec<&str> {
        self.users.iter().map(|u| u.username.as_str()).collect()
    }

    pub fn get(&self, username: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.username == username)
    }

    pub fn contains(&self, username: &str) -> bool {
        self.get(username).is_some()
    }

    fn get_mut(&mut self, username: &str) -> Result<&mut UserRecord> {
        self.users
            .iter_mut()
            .find(|u| u.username == username)
            .ok_or_else(|| CredVaultError::UserNotFound(username.to_string()))
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Append a new user with a freshly salted password hash.
    pub fn add_user(
        &mut self,
        username: &str,
        password: &[u8],
        role: &str,
        hasher: &PasswordHasher,
    ) -> Result<()> {
        validate_username(username)?;
        if self.contains(username) {
            return Err(CredVaultError::UserAlreadyExists(username.to_string()));
        }

        let salt = new_salt()?;
        let password_hash = hasher.hash(password, &salt)?;
        let now = Utc::now();

        self.users.push(UserRecord {
            username: username.to_string(),
            password_hash,
            salt,
            role: role.to_string(),
            attributes: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        });
        Ok(())
    }

    /// Append a prebuilt record, e.g. one migrated from another store.
    ///
    /// The record's salt must be full strength and not already used by
    /// another record in the set.
    pub fn insert_record(&mut self, record: UserRecord) -> Result<()> {
        validate_username(&record.username)?;
        if self.contains(&record.username) {
            return Err(CredVaultError::UserAlreadyExists(record.username));
        }
        check_salt(&record)?;
        if self.users.iter().any(|u| u.salt == record.salt) {
            return Err(CredVaultError::InvalidFormat(format!(
                "salt of user '{}' is already used by another user",
                record.username
            )));
        }
        self.users.push(record);
        Ok(())
    }

    /// Remove a user, returning the record that was dropped.
    pub fn remove_user(&mut self, username: &str) -> Result<UserRecord> {
        let idx = self
            .users
            .iter()
            .position(|u| u.username == username)
            .ok_or_else(|| CredVaultError::UserNotFound(username.to_string()))?;
        Ok(self.users.remove(idx))
    }

    /// Reset a user's password.  A new salt is minted for the new hash.
    pub fn set_password(
        &mut self,
        username: &str,
        password: &[u8],
        hasher: &PasswordHasher,
    ) -> Result<()> {
        let user = self.get_mut(username)?;
        let salt = new_salt()?;
        user.password_hash = hasher.hash(password, &salt)?;
        user.salt = salt;
        user.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_role(&mut self, username: &str, role: &str) -> Result<()> {
        let user = self.get_mut(username)?;
        user.role = role.to_string();
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Set (or with `None`, clear) one permission attribute.
    pub fn set_attribute(&mut self, username: &str, key: &str, value: Option<&str>) -> Result<()> {
        let user = self.get_mut(username)?;
        match value {
            Some(v) => {
                user.attributes.insert(key.to_string(), v.to_string());
            }
            None => {
                user.attributes.remove(key);
            }
        }
        user.updated_at = Utc::now();
        Ok(())
    }

    /// Check a password against the stored hash.
    ///
    /// Unknown users are an error, not `false`, so callers can tell a
    /// typo in the username from a wrong password.
    pub fn verify_password(
        &self,
        username: &str,
        password: &[u8],
        hasher: &PasswordHasher,
    ) -> Result<bool> {
        let user = self
            .get(username)
            .ok_or_else(|| CredVaultError::UserNotFound(username.to_string()))?;
        hasher.verify(password, &user.salt, &user.password_hash)
    }

    // ------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------

    /// Structural checks applied to every decoded set: unique usernames,
    /// full-length salts, and no salt shared between two records.
    pub(crate) fn validate(&self) -> Result<()> {
        let mut names = HashSet::with_capacity(self.users.len());
        let mut salts = HashSet::with_capacity(self.users.len());
        for user in &self.users {
            if !names.insert(user.username.as_str()) {
                return Err(CredVaultError::InvalidFormat(format!(
                    "duplicate user '{}'",
                    user.username
                )));
            }
            check_salt(user)?;
            if !salts.insert(&user.salt) {
                return Err(CredVaultError::InvalidFormat(format!(
                    "salt of user '{}' is shared with another user",
                    user.username
                )));
            }
        }
        Ok(())
    }
}

/// Reject a record whose salt is not valid base64 or is shorter than
/// `SALT_LEN` bytes.
fn check_salt(user: &UserRecord) -> Result<()> {
    let len = user.salt.decode()?.len();
    if len < SALT_LEN {
        return Err(CredVaultError::InvalidFormat(format!(
            "salt of user '{}' is {len} bytes, need at least {SALT_LEN}",
            user.username
        )));
    }
    Ok(())
}

/// Validate that a username is safe.
///
/// Allowed: ASCII letters, digits, underscores, hyphens, periods, `@`.
/// Must be non-empty and at most 64 characters.
pub fn validate_username(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CredVaultError::InvalidUsername(
            "username cannot be empty".into(),
        ));
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(CredVaultError::InvalidUsername(format!(
            "username cannot exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'.' | b'@'))
    {
        return Err(CredVaultError::InvalidUsername(format!(
            "'{name}' contains invalid characters — only ASCII letters, digits, '_', '-', '.' and '@' are allowed"
        )));
    }
    Ok(())
}
