use thiserror::Error;

use crate::encryption::EncryptionError;
use crate::storage::{ImportError, MigrationError, StorageError};

/// Errors surfaced at the session boundary
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cryptography unavailable: {0}")]
    CryptoUnavailable(String),

    #[error("Decryption failed")]
    DecryptionFailure,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session lost, unlock again to continue")]
    SessionLost,

    #[error("Session is locked")]
    Locked,

    #[error("Another unlock attempt is in progress")]
    UnlockInProgress,

    #[error("No note at position {0}")]
    NoteNotFound(usize),

    #[error("Encryption error: {0}")]
    Encryption(EncryptionError),

    #[error("Import failed: {0}")]
    Import(#[from] ImportError),
}

impl SessionError {
    /// Failures the caller cannot recover from by retrying
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CryptoUnavailable(_))
    }
}

impl From<EncryptionError> for SessionError {
    fn from(e: EncryptionError) -> Self {
        match e {
            EncryptionError::CryptoUnavailable(msg) => Self::CryptoUnavailable(msg),
            EncryptionError::DecryptionFailed => Self::DecryptionFailure,
            other => Self::Encryption(other),
        }
    }
}

impl From<MigrationError> for SessionError {
    fn from(e: MigrationError) -> Self {
        match e {
            MigrationError::Storage(e) => e.into(),
            MigrationError::Encryption(e) => e.into(),
        }
    }
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;
