//! Credentials module — the encrypted user store.
//!
//! This module provides:
//! - `UserRecord` and `CredentialSet`, the in-memory user tree (`user`)
//! - The sealed on-disk format (`codec`)
//! - The pluggable I/O layer (`storage`)
//! - `CredentialStore`, the cached single-writer store (`store`)

pub mod codec;
pub mod storage;
pub mod store;
pub mod user;

// Re-export the most commonly used items.
pub use codec::CredentialCodec;
pub use storage::{FsStorage, Storage};
pub use store::CredentialStore;
pub use user::{validate_username, CredentialSet, UserRecord, DEFAULT_ROLE};
