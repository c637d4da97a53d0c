//! Integration tests for salts, key sources and the sealed file format.

use std::collections::HashSet;
use std::sync::Arc;

use credvault::credentials::{CredentialCodec, CredentialSet};
use credvault::crypto::salt::SALT_LEN;
use credvault::crypto::{
    generate_keyfile, new_salt, Argon2Params, KeySource, KeyfileSource, PasswordHasher, StaticKey,
};
use credvault::errors::CredVaultError;
use tempfile::TempDir;

fn fast_hasher() -> PasswordHasher {
    PasswordHasher::new(Argon2Params {
        memory_kib: 8_192,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

fn sample_set() -> CredentialSet {
    let hasher = fast_hasher();
    let mut set = CredentialSet::new();
    set.add_user("root", b"hunter2-hunter2", "admin", &hasher)
        .unwrap();
    set.add_user("svc.backup", b"another-password", "user", &hasher)
        .unwrap();
    set.set_attribute("svc.backup", "shell", Some("/usr/sbin/nologin"))
        .unwrap();
    set
}

// ---------------------------------------------------------------------------
// Salts
// ---------------------------------------------------------------------------

#[test]
fn salts_decode_to_full_length_and_do_not_repeat() {
    let mut seen = HashSet::new();
    for _ in 0..1_000 {
        let salt = new_salt().unwrap();
        assert_eq!(salt.decode().unwrap().len(), SALT_LEN);
        assert!(seen.insert(salt), "salt repeated");
    }
}

#[test]
fn each_user_gets_a_distinct_salt() {
    let set = sample_set();
    let root = set.get("root").unwrap();
    let backup = set.get("svc.backup").unwrap();
    assert_ne!(root.salt, backup.salt);
}

#[test]
fn same_password_hashes_differently_per_user() {
    let hasher = fast_hasher();
    let mut set = CredentialSet::new();
    set.add_user("a", b"shared-password", "user", &hasher).unwrap();
    set.add_user("b", b"shared-password", "user", &hasher).unwrap();
    assert_ne!(
        set.get("a").unwrap().password_hash,
        set.get("b").unwrap().password_hash
    );
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

#[test]
fn keyfile_source_round_trips_through_codec() {
    let dir = TempDir::new().unwrap();
    let keyfile = dir.path().join("keys").join("master.key");
    generate_keyfile(&keyfile).unwrap();

    let keys: Arc<dyn KeySource> = Arc::new(KeyfileSource::new(&keyfile));
    let codec = CredentialCodec::new(keys);

    let set = sample_set();
    let bytes = codec.encode(&set).unwrap();
    assert_eq!(&bytes[..4], b"CRED");
    assert_eq!(codec.decode(&bytes).unwrap(), set);
}

#[test]
fn plaintext_does_not_leak_into_sealed_bytes() {
    let codec = CredentialCodec::new(Arc::new(StaticKey::new([9; 32])));
    let bytes = codec.encode(&sample_set()).unwrap();
    let haystack = String::from_utf8_lossy(&bytes);
    assert!(!haystack.contains("svc.backup"));
    assert!(!haystack.contains("users"));
}

#[test]
fn encoding_twice_uses_fresh_nonces() {
    let codec = CredentialCodec::new(Arc::new(StaticKey::new([9; 32])));
    let set = sample_set();
    assert_ne!(codec.encode(&set).unwrap(), codec.encode(&set).unwrap());
}

#[test]
fn truncated_file_is_invalid_format() {
    let codec = CredentialCodec::new(Arc::new(StaticKey::new([9; 32])));
    let bytes = codec.encode(&sample_set()).unwrap();

    assert!(matches!(
        codec.decode(&bytes[..10]),
        Err(CredVaultError::InvalidFormat(_))
    ));
    assert!(matches!(
        codec.decode(&bytes[..bytes.len() - 1]),
        Err(CredVaultError::DecryptionFailed)
    ));
}

#[test]
fn future_version_is_rejected() {
    let codec = CredentialCodec::new(Arc::new(StaticKey::new([9; 32])));
    let mut bytes = codec.encode(&sample_set()).unwrap();
    bytes[4] = 2;
    assert!(matches!(
        codec.decode(&bytes),
        Err(CredVaultError::InvalidFormat(_))
    ));
}

#[test]
fn missing_keyfile_is_a_key_source_error() {
    let dir = TempDir::new().unwrap();
    let codec = CredentialCodec::new(Arc::new(KeyfileSource::new(dir.path().join("absent"))));
    assert!(codec.encode(&CredentialSet::new()).is_err());
}

#[test]
fn generate_keyfile_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let keyfile = dir.path().join("master.key");
    let first = generate_keyfile(&keyfile).unwrap();
    assert!(generate_keyfile(&keyfile).is_err());
    assert_eq!(std::fs::read(&keyfile).unwrap(), first);
}
