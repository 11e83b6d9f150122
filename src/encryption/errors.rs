//! Encryption error types

use thiserror::Error;

/// Errors that can occur during encryption operations
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("Secure random number generator unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong key, corrupted ciphertext or iv, or a tag mismatch. The message is
    /// deliberately generic so callers cannot tell these apart.
    #[error("Decryption failed")]
    DecryptionFailed,

    #[error("Invalid key descriptor: {0}")]
    InvalidKeyDescriptor(String),

    #[error("Base64 decode error: {0}")]
    Base64Error(#[from] base64::DecodeError),

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl EncryptionError {
    /// True for failures that mean "this key cannot open this record".
    pub fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::DecryptionFailed)
    }
}

/// Result type alias for encryption operations
pub type EncryptionResult<T> = Result<T, EncryptionError>;
