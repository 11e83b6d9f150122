//! Application configuration, read from `config.toml`.
//!
//! Every field is optional in the file; missing ones take the defaults below.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encryption::KDF_ITERATIONS;
use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::storage::StorageError;

const APP_DIR: &str = "snapnotes";
const CONFIG_FILE: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where records and settings live (default: local data dir)
    pub data_dir: Option<PathBuf>,
    /// Where the session file lives (default: runtime dir, else temp dir)
    pub session_dir: Option<PathBuf>,
    /// Inactivity timeout in seconds
    pub session_timeout_secs: u64,
    /// How often the inactivity check runs, in seconds
    pub inactivity_poll_secs: u64,
    /// Undo snapshots kept
    pub history_limit: usize,
    /// PBKDF2 iterations; lowering it makes existing stores unreadable
    pub kdf_iterations: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            session_dir: None,
            session_timeout_secs: 15 * 60,
            inactivity_poll_secs: 60,
            history_limit: DEFAULT_HISTORY_LIMIT,
            kdf_iterations: KDF_ITERATIONS,
        }
    }
}

impl AppConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults if absent
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`; a missing file yields the defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        log::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn data_dir(&self) -> Result<PathBuf, StorageError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|p| p.join(APP_DIR))
                .ok_or(StorageError::DataDirNotFound),
        }
    }

    pub fn session_dir(&self) -> PathBuf {
        match &self.session_dir {
            Some(dir) => dir.clone(),
            None => dirs::runtime_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join(APP_DIR),
        }
    }
}
