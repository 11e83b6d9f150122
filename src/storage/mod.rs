pub mod export;
pub mod migration;
mod models;
mod record_store;
pub mod settings;

pub use export::{ExportFormat, ImportError};
pub use migration::{migrate_if_needed, MigrationError, MigrationOutcome};
pub use models::*;
pub use record_store::{FileRecordStore, MemoryRecordStore, RecordStore, StorageError};
pub use settings::LocalSettings;
