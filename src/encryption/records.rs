//! Note-level sealing on top of the raw cipher.
//!
//! Writes always use the whole-record layout. Reads accept both layouts so
//! stores written by older versions stay readable until their next save.

use chrono::{TimeZone, Utc};

use super::crypto::{decrypt_json, decrypt_text, encrypt_json, encrypt_text};
use super::errors::{EncryptionError, EncryptionResult};
use super::models::EncryptionKey;
use crate::storage::{Category, Note, RecordBody, StoredRecord};

/// Seal a note (minus its id) as a single whole-record payload
pub fn encrypt_note(note: &Note, key: &EncryptionKey) -> EncryptionResult<RecordBody> {
    let payload = encrypt_json(&note.without_id(), key)?;
    Ok(RecordBody::Whole(payload))
}

/// Seal title and content separately, keeping category and last use in clear
pub fn encrypt_note_per_field(
    title: &str,
    content: &str,
    category: Category,
    last_used: i64,
    key: &EncryptionKey,
) -> EncryptionResult<RecordBody> {
    Ok(RecordBody::PerField {
        title: encrypt_text(title, key)?,
        content: encrypt_text(content, key)?,
        category,
        last_used,
    })
}

/// Open a record body of either layout
pub fn decrypt_body(body: &RecordBody, key: &EncryptionKey) -> EncryptionResult<Note> {
    match body {
        RecordBody::Whole(payload) => {
            // A payload that authenticates but does not parse is treated as
            // corruption, same as a tag mismatch.
            decrypt_json::<Note>(payload, key).map_err(|e| match e {
                EncryptionError::JsonError(_) => EncryptionError::DecryptionFailed,
                other => other,
            })
        }
        RecordBody::PerField {
            title,
            content,
            category,
            last_used,
        } => Ok(Note {
            id: None,
            title: decrypt_text(title, key)?,
            content: decrypt_text(content, key)?,
            category: *category,
            last_used_at: Utc
                .timestamp_millis_opt(*last_used)
                .single()
                .unwrap_or_default(),
        }),
    }
}

/// Open a stored record, carrying its store id onto the note
pub fn decrypt_record(record: &StoredRecord, key: &EncryptionKey) -> EncryptionResult<Note> {
    let mut note = decrypt_body(&record.body, key)?;
    note.id = Some(record.id);
    Ok(note)
}

/// Cheapest check that `key` opens `record`: used to verify a password.
pub fn verify_key(record: &StoredRecord, key: &EncryptionKey) -> bool {
    let result = match &record.body {
        RecordBody::Whole(payload) => super::crypto::decrypt(payload, key).map(|_| ()),
        RecordBody::PerField { title, .. } => super::crypto::decrypt(title, key).map(|_| ()),
    };
    result.is_ok()
}
