//! One-time migration of plaintext notes into the encrypted record store.
//!
//! Versions before encryption kept notes as a JSON array in the settings file.
//! On the first unlock that finds this slot, the notes are sealed with the
//! session key and inserted as records, then the slot is removed.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::models::now_millis;
use super::record_store::{RecordStore, StorageError};
use super::settings::LocalSettings;
use crate::encryption::{encrypt_note_per_field, EncryptionError, EncryptionKey};

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Storage error during migration: {0}")]
    Storage(#[from] StorageError),

    #[error("Encryption error during migration: {0}")]
    Encryption(#[from] EncryptionError),
}

/// What a migration call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum MigrationOutcome {
    /// No legacy slot exists
    NoLegacyData,
    /// Legacy data exists but the encrypted store already has records, so the
    /// legacy slot is left where it is
    SkippedStorePopulated,
    /// The legacy slot could not be parsed and was left untouched
    SkippedUnreadable,
    /// Legacy notes were encrypted and stored, and the slot removed.
    /// `skipped` entries were not notes and are gone with the slot.
    Migrated { count: usize, skipped: usize },
}

impl MigrationOutcome {
    pub fn migrated_count(&self) -> usize {
        match self {
            Self::Migrated { count, .. } => *count,
            _ => 0,
        }
    }
}

/// Migrate legacy plaintext notes into `store` (idempotent).
///
/// - No legacy slot: nothing to do.
/// - Store already populated: the slot is kept and nothing is written.
/// - Otherwise every note is encrypted before anything is inserted. If an
///   insert fails, records inserted so far are deleted and the slot is kept.
/// - The slot is removed only after every insert succeeded.
///
/// Entries that are not notes at all are skipped and counted. Missing, empty
/// or unknown categories become `Other`.
pub async fn migrate_if_needed(
    store: &dyn RecordStore,
    settings: &Arc<LocalSettings>,
    key: &EncryptionKey,
) -> Result<MigrationOutcome, MigrationError> {
    if !settings.has_legacy_notes() {
        return Ok(MigrationOutcome::NoLegacyData);
    }

    if !store.is_empty().await? {
        log::info!("Migration: encrypted store already populated, leaving legacy data in place");
        return Ok(MigrationOutcome::SkippedStorePopulated);
    }

    let slot = match settings.legacy_notes() {
        Ok(Some(slot)) => slot,
        Ok(None) => return Ok(MigrationOutcome::NoLegacyData),
        Err(e) => {
            log::warn!("Migration: legacy notes unreadable, skipping: {}", e);
            return Ok(MigrationOutcome::SkippedUnreadable);
        }
    };

    // Encrypt everything up front so a crypto failure writes nothing
    let fallback_last_used = now_millis().timestamp_millis();
    let mut bodies = Vec::with_capacity(slot.notes.len());
    for note in &slot.notes {
        bodies.push(encrypt_note_per_field(
            &note.title,
            &note.content,
            note.category.unwrap_or_default(),
            note.last_used.unwrap_or(fallback_last_used),
            key,
        )?);
    }

    let mut inserted = Vec::with_capacity(bodies.len());
    for body in bodies {
        match store.add(body).await {
            Ok(id) => inserted.push(id),
            Err(e) => {
                log::error!(
                    "Migration: insert failed after {} records, rolling back: {}",
                    inserted.len(),
                    e
                );
                for id in inserted {
                    if let Err(rollback_err) = store.delete(id).await {
                        log::warn!("Migration: rollback of record {} failed: {}", id, rollback_err);
                    }
                }
                return Err(e.into());
            }
        }
    }

    settings
        .update_blocking(|settings| settings.remove_legacy_notes())
        .await?;
    if slot.skipped > 0 {
        log::warn!("Migration: {} legacy entries were not notes and were dropped", slot.skipped);
    }
    log::info!("Migration: {} legacy notes encrypted", inserted.len());

    Ok(MigrationOutcome::Migrated {
        count: inserted.len(),
        skipped: slot.skipped,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::encryption::{decrypt_record, derive_key};
    use crate::storage::{
        Category, LegacyNote, MemoryRecordStore, RecordBody, RecordSchema, StoredRecord,
    };
    use crate::storage::record_store::Result as StoreResult;

    fn key() -> EncryptionKey {
        derive_key("pw", b"migration-salt", 1_000)
    }

    fn legacy(n: usize) -> Vec<LegacyNote> {
        (0..n)
            .map(|i| LegacyNote {
                title: format!("Title {}", i),
                content: format!("Content {}", i),
                category: if i == 0 { Some(Category::Work) } else { None },
                last_used: if i == 0 { Some(1_650_000_000_000) } else { None },
            })
            .collect()
    }

    /// Store whose `add` fails after a fixed number of successes
    struct FailingStore {
        inner: MemoryRecordStore,
        allowed_adds: AtomicUsize,
    }

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn get_all(&self) -> StoreResult<Vec<StoredRecord>> {
            self.inner.get_all().await
        }

        async fn add(&self, body: RecordBody) -> StoreResult<u64> {
            if self.allowed_adds.load(Ordering::SeqCst) == 0 {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            self.allowed_adds.fetch_sub(1, Ordering::SeqCst);
            self.inner.add(body).await
        }

        async fn put(&self, record: StoredRecord) -> StoreResult<()> {
            self.inner.put(record).await
        }

        async fn delete(&self, id: u64) -> StoreResult<()> {
            self.inner.delete(id).await
        }

        async fn clear(&self) -> StoreResult<()> {
            self.inner.clear().await
        }
    }

    #[tokio::test]
    async fn test_no_legacy_data() {
        let temp = TempDir::new().unwrap();
        let settings = Arc::new(LocalSettings::open(temp.path()).unwrap());
        let store = MemoryRecordStore::new();

        let outcome = migrate_if_needed(&store, &settings, &key()).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::NoLegacyData);
        assert!(store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_migrates_once_then_noop() {
        let temp = TempDir::new().unwrap();
        let settings = Arc::new(LocalSettings::open(temp.path()).unwrap());
        settings.set_legacy_notes(&legacy(3)).unwrap();
        let store = MemoryRecordStore::new();

        let outcome = migrate_if_needed(&store, &settings, &key()).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated { count: 3, skipped: 0 });
        assert!(!settings.has_legacy_notes());

        let records = store.get_all().await.unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.body.schema() == RecordSchema::PerField));

        let first = decrypt_record(&records[0], &key()).unwrap();
        assert_eq!(first.title, "Title 0");
        assert_eq!(first.category, Category::Work);
        assert_eq!(first.last_used_at.timestamp_millis(), 1_650_000_000_000);

        let second = decrypt_record(&records[1], &key()).unwrap();
        assert_eq!(second.category, Category::Other);
        assert!(second.last_used_at.timestamp_millis() > 1_650_000_000_000);

        let again = migrate_if_needed(&store, &settings, &key()).await.unwrap();
        assert_eq!(again, MigrationOutcome::NoLegacyData);
        assert_eq!(store.get_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_populated_store_leaves_legacy_untouched() {
        let temp = TempDir::new().unwrap();
        let settings = Arc::new(LocalSettings::open(temp.path()).unwrap());
        settings.set_legacy_notes(&legacy(2)).unwrap();
        let store = MemoryRecordStore::new();
        store
            .add(encrypt_note_per_field("x", "y", Category::Other, 0, &key()).unwrap())
            .await
            .unwrap();

        let outcome = migrate_if_needed(&store, &settings, &key()).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::SkippedStorePopulated);
        assert!(settings.has_legacy_notes());
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_failure_rolls_back_and_keeps_legacy() {
        let temp = TempDir::new().unwrap();
        let settings = Arc::new(LocalSettings::open(temp.path()).unwrap());
        settings.set_legacy_notes(&legacy(4)).unwrap();
        let store = FailingStore {
            inner: MemoryRecordStore::new(),
            allowed_adds: AtomicUsize::new(2),
        };

        let result = migrate_if_needed(&store, &settings, &key()).await;
        assert!(matches!(result, Err(MigrationError::Storage(_))));
        assert!(store.is_empty().await.unwrap());
        assert_eq!(settings.legacy_notes().unwrap().unwrap().notes.len(), 4);
    }

    #[tokio::test]
    async fn test_odd_categories_do_not_block_migration() {
        let temp = TempDir::new().unwrap();
        let settings = Arc::new(LocalSettings::open(temp.path()).unwrap());
        settings
            .set(
                crate::storage::settings::LEGACY_NOTES_KEY,
                r#"[{"title":"A","content":"a","category":"Travail"},
                    {"title":"B","content":"b","category":""},
                    {"title":"C","content":"c","category":"Divers"},
                    42]"#,
            )
            .unwrap();
        let store = MemoryRecordStore::new();

        let outcome = migrate_if_needed(&store, &settings, &key()).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::Migrated { count: 3, skipped: 1 });
        assert!(!settings.has_legacy_notes());

        let categories: Vec<Category> = store
            .get_all()
            .await
            .unwrap()
            .iter()
            .map(|r| decrypt_record(r, &key()).unwrap().category)
            .collect();
        assert_eq!(categories, vec![Category::Work, Category::Other, Category::Other]);
    }

    #[tokio::test]
    async fn test_unreadable_legacy_slot_is_skipped() {
        let temp = TempDir::new().unwrap();
        let settings = Arc::new(LocalSettings::open(temp.path()).unwrap());
        settings
            .set(crate::storage::settings::LEGACY_NOTES_KEY, "{broken")
            .unwrap();
        let store = MemoryRecordStore::new();

        let outcome = migrate_if_needed(&store, &settings, &key()).await.unwrap();
        assert_eq!(outcome, MigrationOutcome::SkippedUnreadable);
        assert!(settings.has_legacy_notes());
    }
}
