use thiserror::Error;

/// All errors that can occur in CredVault.
#[derive(Debug, Error)]
pub enum CredVaultError {
    // --- Crypto errors ---
    #[error("Secure random source unavailable: {0}")]
    EntropyFailure(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("Decryption failed — wrong key or corrupted credential file")]
    DecryptionFailed,

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Key source error: {0}")]
    KeySourceError(String),

    // --- Credential store errors ---
    #[error("Invalid credential file format: {0}")]
    InvalidFormat(String),

    #[error("Credential store re-entered from inside its own critical section")]
    ReentrantAccess,

    #[error("User '{0}' not found")]
    UserNotFound(String),

    #[error("User '{0}' already exists")]
    UserAlreadyExists(String),

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    ConfigError(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Wrong password for user '{0}'")]
    WrongPassword(String),

    #[error("Audit error: {0}")]
    AuditError(String),
}

/// Convenience type alias for CredVault results.
pub type Result<T> = std::result::Result<T, CredVaultError>;
