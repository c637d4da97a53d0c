//! CredVault: a single-writer, cached, encrypted credential store.
//!
//! The entry point is [`credentials::CredentialStore`], which serializes
//! every read and modification of the user list through one exclusive
//! section and keeps the file on disk sealed with AES-256-GCM.

pub mod audit;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod crypto;
pub mod errors;

pub use credentials::{CredentialSet, CredentialStore, UserRecord};
pub use errors::{CredVaultError, Result};
