//! Durable local key/value settings.
//!
//! Holds what must be readable before unlocking: the key-derivation salt and
//! the plaintext slot left behind by pre-encryption versions.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use super::models::LegacyNote;
use super::record_store::{Result, StorageError};

/// Setting holding the hex-encoded salt
pub const SALT_KEY: &str = "snapnotes_salt";

/// Setting holding legacy plaintext notes as a JSON array
pub const LEGACY_NOTES_KEY: &str = "shortcuts";

/// Salt used by installs that encrypted notes before salts were generated
pub const LEGACY_STATIC_SALT: &str = "SnapNotes_Fixed_Salt_V2";

/// Get the settings file path
pub fn settings_path(data_dir: &Path) -> PathBuf {
    data_dir.join("settings.json")
}

/// Parsed legacy slot
#[derive(Debug, Clone, Default)]
pub struct LegacySlot {
    pub notes: Vec<LegacyNote>,
    /// Entries that were not a note object with string title and content
    pub skipped: usize,
}

/// String settings persisted as one JSON object
pub struct LocalSettings {
    path: PathBuf,
    values: RwLock<BTreeMap<String, String>>,
}

impl LocalSettings {
    /// Load settings from `data_dir`, starting empty when the file is missing
    pub fn open(data_dir: &Path) -> Result<Self> {
        let path = settings_path(data_dir);
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.read_values().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read_values().contains_key(key)
    }

    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<()> {
        let mut values = self.write_values();
        values.insert(key.to_string(), value.into());
        self.persist(&values)
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        let mut values = self.write_values();
        if values.remove(key).is_some() {
            self.persist(&values)?;
        }
        Ok(())
    }

    /// Run a settings update on the blocking pool, for use from async code
    pub async fn update_blocking<F>(self: &Arc<Self>, f: F) -> Result<()>
    where
        F: FnOnce(&LocalSettings) -> Result<()> + Send + 'static,
    {
        let settings = Arc::clone(self);
        tokio::task::spawn_blocking(move || f(&settings))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }

    // ===== Typed accessors =====

    pub fn salt(&self) -> Option<String> {
        self.get(SALT_KEY)
    }

    pub fn set_salt(&self, salt: &str) -> Result<()> {
        self.set(SALT_KEY, salt)
    }

    pub fn clear_salt(&self) -> Result<()> {
        self.remove(SALT_KEY)
    }

    pub fn has_legacy_notes(&self) -> bool {
        self.contains(LEGACY_NOTES_KEY)
    }

    /// Parse the legacy plaintext slot, if present.
    ///
    /// The slot must be a JSON array. Entries that do not parse as a note are
    /// counted in `skipped` instead of failing the whole slot.
    pub fn legacy_notes(&self) -> Result<Option<LegacySlot>> {
        let Some(raw) = self.get(LEGACY_NOTES_KEY) else {
            return Ok(None);
        };
        let entries: Vec<serde_json::Value> = serde_json::from_str(&raw)?;

        let mut slot = LegacySlot::default();
        for entry in entries {
            match serde_json::from_value::<LegacyNote>(entry) {
                Ok(note) => slot.notes.push(note),
                Err(e) => {
                    log::warn!("Skipping unreadable legacy note: {}", e);
                    slot.skipped += 1;
                }
            }
        }
        Ok(Some(slot))
    }

    pub fn set_legacy_notes(&self, notes: &[LegacyNote]) -> Result<()> {
        let raw = serde_json::to_string(notes)?;
        self.set(LEGACY_NOTES_KEY, raw)
    }

    pub fn remove_legacy_notes(&self) -> Result<()> {
        self.remove(LEGACY_NOTES_KEY)
    }

    fn read_values(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
        self.values.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_values(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, String>> {
        self.values.write().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(values)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, content)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Category;
    use tempfile::TempDir;

    #[test]
    fn test_salt_persists() {
        let temp = TempDir::new().unwrap();
        {
            let settings = LocalSettings::open(temp.path()).unwrap();
            assert!(settings.salt().is_none());
            settings.set_salt("00ff").unwrap();
        }

        let settings = LocalSettings::open(temp.path()).unwrap();
        assert_eq!(settings.salt().as_deref(), Some("00ff"));

        settings.clear_salt().unwrap();
        let settings = LocalSettings::open(temp.path()).unwrap();
        assert!(settings.salt().is_none());
    }

    #[test]
    fn test_legacy_slot_roundtrip() {
        let temp = TempDir::new().unwrap();
        let settings = LocalSettings::open(temp.path()).unwrap();
        assert!(settings.legacy_notes().unwrap().is_none());

        settings
            .set(
                LEGACY_NOTES_KEY,
                r#"[{"title":"A","content":"B","category":"Urgent"},{"title":"C","content":"D"}]"#,
            )
            .unwrap();
        assert!(settings.has_legacy_notes());

        let slot = settings.legacy_notes().unwrap().unwrap();
        assert_eq!(slot.skipped, 0);
        let notes = slot.notes;
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].category, Some(Category::Urgent));
        assert!(notes[1].category.is_none());
        assert!(notes[1].last_used.is_none());

        settings.remove_legacy_notes().unwrap();
        assert!(!settings.has_legacy_notes());
    }

    #[test]
    fn test_bad_entries_are_skipped_not_fatal() {
        let temp = TempDir::new().unwrap();
        let settings = LocalSettings::open(temp.path()).unwrap();
        settings
            .set(
                LEGACY_NOTES_KEY,
                r#"[{"title":"A","content":"a","category":"Travail"},
                    {"title":"B","content":"b","category":""},
                    {"title":"C","content":"c","category":"Misc"},
                    "stray string",
                    {"content":"no title"}]"#,
            )
            .unwrap();

        let slot = settings.legacy_notes().unwrap().unwrap();
        assert_eq!(slot.notes.len(), 3);
        assert_eq!(slot.skipped, 2);
        assert_eq!(slot.notes[0].category, Some(Category::Work));
        assert!(slot.notes[1].category.is_none());
        assert!(slot.notes[2].category.is_none());
    }

    #[test]
    fn test_malformed_legacy_slot_is_an_error() {
        let temp = TempDir::new().unwrap();
        let settings = LocalSettings::open(temp.path()).unwrap();
        settings.set(LEGACY_NOTES_KEY, "not json").unwrap();
        assert!(settings.legacy_notes().is_err());
        // The slot itself is untouched
        assert!(settings.has_legacy_notes());
    }
}
