//! Plaintext export and import of the decrypted collection.
//!
//! Exports are written from the in-memory cache and never contain record ids.

use serde_json::Value;
use thiserror::Error;

use super::models::{Category, Note};
use chrono::{TimeZone, Utc};

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid format: expected a JSON array of notes")]
    NotAnArray,
}

/// Export format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    /// Default file name for this format
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Json => "shortcuts.json",
            Self::Markdown => "shortcuts.md",
        }
    }
}

pub fn export(notes: &[Note], format: ExportFormat) -> Result<String, serde_json::Error> {
    match format {
        ExportFormat::Json => export_json(notes),
        ExportFormat::Markdown => Ok(export_markdown(notes)),
    }
}

/// Pretty-printed JSON array of notes without ids
pub fn export_json(notes: &[Note]) -> Result<String, serde_json::Error> {
    let stripped: Vec<Note> = notes.iter().map(Note::without_id).collect();
    serde_json::to_string_pretty(&stripped)
}

pub fn export_markdown(notes: &[Note]) -> String {
    let mut md = String::from("# My Shortcuts\n\n");
    for note in notes {
        md.push_str(&format!(
            "## {} [{}]\n\n{}\n\n---\n\n",
            note.title,
            note.category.stored_name(),
            note.content
        ));
    }
    md
}

/// Parse an exported JSON array.
///
/// Entries without a non-empty title and content are skipped. A missing or
/// unknown category becomes `Other`.
pub fn import_json(text: &str) -> Result<Vec<Note>, ImportError> {
    let value: Value = serde_json::from_str(text)?;
    let entries = match value {
        Value::Array(entries) => entries,
        _ => return Err(ImportError::NotAnArray),
    };

    let mut notes = Vec::with_capacity(entries.len());
    for entry in &entries {
        let title = entry.get("title").and_then(Value::as_str).unwrap_or("");
        let content = entry.get("content").and_then(Value::as_str).unwrap_or("");
        if title.is_empty() || content.is_empty() {
            log::debug!("Import: skipping entry without title or content");
            continue;
        }

        let category = entry
            .get("category")
            .cloned()
            .and_then(|c| serde_json::from_value::<Category>(c).ok())
            .unwrap_or_default();

        let mut note = Note::new(title, content, category);
        if let Some(ms) = entry.get("lastUsed").and_then(Value::as_i64) {
            if let Some(at) = Utc.timestamp_millis_opt(ms).single() {
                note.last_used_at = at;
            }
        }
        notes.push(note);
    }

    if notes.len() < entries.len() {
        log::info!(
            "Import: kept {} of {} entries",
            notes.len(),
            entries.len()
        );
    }
    Ok(notes)
}
