//! Encryption module for note records
//!
//! This module provides:
//! - AES-256-GCM authenticated encryption
//! - PBKDF2-HMAC-SHA256 password-based key derivation
//! - Exportable key descriptors for session resume
//! - Note sealing in the whole-record and per-field layouts

pub mod crypto;
pub mod errors;
pub mod models;
pub mod records;

// Re-export commonly used types
pub use crypto::{
    decrypt, decrypt_json, decrypt_text, derive_key, encrypt, encrypt_json, encrypt_text,
    generate_nonce, generate_salt, KDF_ITERATIONS, SALT_SIZE,
};
pub use errors::{EncryptionError, EncryptionResult};
pub use models::{EncryptedPayload, EncryptionKey, KeyDescriptor, KEY_ALGORITHM, NONCE_SIZE};
pub use records::{decrypt_record, encrypt_note, encrypt_note_per_field, verify_key};
