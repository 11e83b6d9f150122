//! Cryptographic operations for encryption/decryption

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

use super::errors::{EncryptionError, EncryptionResult};
use super::models::{EncryptedPayload, EncryptionKey, KEY_SIZE, NONCE_SIZE};

/// Salt size in bytes
pub const SALT_SIZE: usize = 16;

/// PBKDF2 iteration count for password-derived keys
pub const KDF_ITERATIONS: u32 = 100_000;

/// Fill a buffer from the OS random number generator.
fn fill_random(buf: &mut [u8]) -> EncryptionResult<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| EncryptionError::CryptoUnavailable(e.to_string()))
}

/// Generate a random salt for key derivation, hex-encoded
pub fn generate_salt() -> EncryptionResult<String> {
    let mut salt = [0u8; SALT_SIZE];
    fill_random(&mut salt)?;
    Ok(hex::encode(salt))
}

/// Generate a random nonce for encryption
pub fn generate_nonce() -> EncryptionResult<[u8; NONCE_SIZE]> {
    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut nonce)?;
    Ok(nonce)
}

/// Derive an encryption key from a password using PBKDF2-HMAC-SHA256.
///
/// Deterministic in `(password, salt, iterations)`; records encrypted under a
/// key stay readable only as long as all three are unchanged.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> EncryptionKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    EncryptionKey::new(key)
}

/// Encrypt data using AES-256-GCM with a fresh random nonce
pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> EncryptionResult<EncryptedPayload> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

    let nonce_bytes = generate_nonce()?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    // AES-GCM appends the 16-byte auth tag to the ciphertext
    let data = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| EncryptionError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedPayload {
        iv: nonce_bytes.to_vec(),
        data,
    })
}

/// Decrypt data using AES-256-GCM.
///
/// Every failure mode (bad iv length, wrong key, tampered bytes) collapses to
/// `DecryptionFailed`.
pub fn decrypt(payload: &EncryptedPayload, key: &EncryptionKey) -> EncryptionResult<Vec<u8>> {
    if payload.iv.len() != NONCE_SIZE {
        log::debug!(
            "Rejecting payload with nonce of {} bytes (expected {})",
            payload.iv.len(),
            NONCE_SIZE
        );
        return Err(EncryptionError::DecryptionFailed);
    }

    let cipher =
        Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| EncryptionError::DecryptionFailed)?;
    let nonce = Nonce::from_slice(&payload.iv);

    cipher
        .decrypt(nonce, payload.data.as_slice())
        .map_err(|_| EncryptionError::DecryptionFailed)
}

/// Encrypt a UTF-8 string as-is
pub fn encrypt_text(text: &str, key: &EncryptionKey) -> EncryptionResult<EncryptedPayload> {
    encrypt(text.as_bytes(), key)
}

/// Decrypt a payload produced by [`encrypt_text`]
pub fn decrypt_text(payload: &EncryptedPayload, key: &EncryptionKey) -> EncryptionResult<String> {
    let plaintext = decrypt(payload, key)?;
    String::from_utf8(plaintext).map_err(|_| EncryptionError::DecryptionFailed)
}

/// Encrypt a JSON-serializable value
pub fn encrypt_json<T: serde::Serialize>(
    value: &T,
    key: &EncryptionKey,
) -> EncryptionResult<EncryptedPayload> {
    let json = serde_json::to_vec(value)?;
    encrypt(&json, key)
}

/// Decrypt and deserialize a JSON value
pub fn decrypt_json<T: serde::de::DeserializeOwned>(
    payload: &EncryptedPayload,
    key: &EncryptionKey,
) -> EncryptionResult<T> {
    let plaintext = decrypt(payload, key)?;
    let value: T = serde_json::from_slice(&plaintext)?;
    Ok(value)
}
