//! Encryption data models

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64_URL, Engine};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::errors::{EncryptionError, EncryptionResult};

/// JWK algorithm name for the record cipher
pub const KEY_ALGORITHM: &str = "A256GCM";

/// Key size in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Nonce size in bytes for AES-GCM
pub const NONCE_SIZE: usize = 12;

/// One AEAD output: the nonce and the ciphertext with its appended tag.
///
/// Both are serialized as JSON arrays of numbers, which is how existing
/// stores hold them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub iv: Vec<u8>,
    pub data: Vec<u8>,
}

/// Encryption key with secure memory handling
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    /// The 256-bit key
    key: [u8; KEY_SIZE],
}

impl EncryptionKey {
    /// Create a new encryption key from raw bytes
    pub fn new(key: [u8; KEY_SIZE]) -> Self {
        Self { key }
    }

    /// Get the key bytes
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Export the key as a JWK descriptor for the session area
    pub fn to_descriptor(&self) -> KeyDescriptor {
        KeyDescriptor {
            kty: "oct".to_string(),
            k: BASE64_URL.encode(self.key),
            alg: KEY_ALGORITHM.to_string(),
            ext: true,
            key_ops: vec!["encrypt".to_string(), "decrypt".to_string()],
        }
    }

    /// Import a key from a JWK descriptor
    pub fn from_descriptor(descriptor: &KeyDescriptor) -> EncryptionResult<Self> {
        if descriptor.kty != "oct" {
            return Err(EncryptionError::InvalidKeyDescriptor(format!(
                "unsupported key type '{}'",
                descriptor.kty
            )));
        }
        if descriptor.alg != KEY_ALGORITHM {
            return Err(EncryptionError::InvalidKeyDescriptor(format!(
                "unsupported algorithm '{}'",
                descriptor.alg
            )));
        }

        let mut raw = BASE64_URL.decode(descriptor.k.as_bytes())?;
        if raw.len() != KEY_SIZE {
            let len = raw.len();
            raw.zeroize();
            return Err(EncryptionError::InvalidKeyDescriptor(format!(
                "expected {} key bytes, got {}",
                KEY_SIZE, len
            )));
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&raw);
        raw.zeroize();
        Ok(Self::new(key))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Exported key in JSON Web Key form.
///
/// Lives only in the session area so a restarted process can resume an
/// unexpired session without asking for the password again.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct KeyDescriptor {
    pub kty: String,
    pub k: String,
    pub alg: String,
    #[serde(default)]
    pub ext: bool,
    #[serde(default)]
    pub key_ops: Vec<String>,
}

impl std::fmt::Debug for KeyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyDescriptor")
            .field("kty", &self.kty)
            .field("k", &"[REDACTED]")
            .field("alg", &self.alg)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_roundtrip() {
        let key = EncryptionKey::new([7u8; KEY_SIZE]);
        let descriptor = key.to_descriptor();
        assert_eq!(descriptor.kty, "oct");
        assert_eq!(descriptor.alg, "A256GCM");

        let json = serde_json::to_string(&descriptor).unwrap();
        let parsed: KeyDescriptor = serde_json::from_str(&json).unwrap();
        let restored = EncryptionKey::from_descriptor(&parsed).unwrap();
        assert_eq!(restored.as_bytes(), key.as_bytes());
    }

    #[test]
    fn test_descriptor_rejects_short_key() {
        let mut descriptor = EncryptionKey::new([1u8; KEY_SIZE]).to_descriptor();
        descriptor.k = BASE64_URL.encode([1u8; 16]);
        assert!(matches!(
            EncryptionKey::from_descriptor(&descriptor),
            Err(EncryptionError::InvalidKeyDescriptor(_))
        ));
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = EncryptionKey::new([9u8; KEY_SIZE]);
        let out = format!("{:?} {:?}", key, key.to_descriptor());
        assert!(out.contains("REDACTED"));
        assert!(!out.contains(&BASE64_URL.encode([9u8; KEY_SIZE])));
    }
}
