//! Cryptographic primitives for CredVault.
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption (`encryption`)
//! - Per-user salt generation from the OS CSPRNG (`salt`)
//! - Argon2id password hashing (`kdf`)
//! - Master-key sources and HKDF store-key derivation (`keys`)
//! - Keyfile generation and loading (`keyfile`)

pub mod encryption;
pub mod kdf;
pub mod keyfile;
pub mod keys;
pub mod salt;

// Re-export the most commonly used items so callers can write:
//   use crate::crypto::{new_salt, PasswordHasher, KeySource, ...};
pub use encryption::{decrypt, encrypt};
pub use kdf::{Argon2Params, PasswordHasher};
pub use keyfile::{generate_keyfile, load_keyfile};
pub use keys::{EnvKeySource, KeySource, KeyfileSource, MasterKey, StaticKey};
pub use salt::{new_salt, Salt};
