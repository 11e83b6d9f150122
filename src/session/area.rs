//! Session-scoped key/value area.
//!
//! Holds the exported key descriptor and the last-activity timestamp so that
//! a restarted process can resume an unexpired session. The file-backed area
//! lives in the per-login runtime directory, which does not survive a reboot.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, TimeZone, Utc};

use crate::encryption::KeyDescriptor;
use crate::storage::StorageError;

/// Entry holding the exported key descriptor (JWK JSON)
pub const KEY_DESCRIPTOR_KEY: &str = "snapnotes_key";

/// Entry holding the last-activity time in epoch milliseconds
pub const LAST_ACTIVE_KEY: &str = "snapnotes_last_active";

type Result<T> = std::result::Result<T, StorageError>;

pub trait SessionArea: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    /// Remove every entry
    fn clear(&self) -> Result<()>;
}

/// Session area that lives and dies with the process
#[derive(Debug, Default)]
pub struct MemorySessionArea {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemorySessionArea {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SessionArea for MemorySessionArea {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.values().clear();
        Ok(())
    }
}

/// Session area stored as a private JSON file
#[derive(Debug)]
pub struct FileSessionArea {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSessionArea {
    pub const FILE_NAME: &'static str = "snapnotes-session.json";

    pub fn new(session_dir: &Path) -> Self {
        Self {
            path: session_dir.join(Self::FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = zeroize::Zeroizing::new(serde_json::to_string(values)?);
        let tmp_path = self.path.with_extension("json.tmp");

        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        // Owner-only from creation: the file holds the exported key
        #[cfg(unix)]
        {
            use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
            options.mode(0o600);
            if tmp_path.exists() {
                fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
            }
        }

        let mut file = options.open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut values = self.read()?;
        f(&mut values);
        self.write(&values)
    }
}

impl SessionArea for FileSessionArea {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        Ok(self.read()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }

    fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ===== Typed entries =====

pub fn write_descriptor(area: &dyn SessionArea, descriptor: &KeyDescriptor) -> Result<()> {
    let json = zeroize::Zeroizing::new(serde_json::to_string(descriptor)?);
    area.set(KEY_DESCRIPTOR_KEY, &json)
}

pub fn read_descriptor(area: &dyn SessionArea) -> Result<Option<KeyDescriptor>> {
    match area.get(KEY_DESCRIPTOR_KEY)? {
        Some(raw) => {
            let raw = zeroize::Zeroizing::new(raw);
            Ok(Some(serde_json::from_str(&raw)?))
        }
        None => Ok(None),
    }
}

pub fn write_last_active(area: &dyn SessionArea, at: DateTime<Utc>) -> Result<()> {
    area.set(LAST_ACTIVE_KEY, &at.timestamp_millis().to_string())
}

/// Last activity, `None` when absent or unparsable
pub fn read_last_active(area: &dyn SessionArea) -> Result<Option<DateTime<Utc>>> {
    let raw = area.get(LAST_ACTIVE_KEY)?;
    Ok(raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single()))
}
