//! Encrypted local storage for short text notes.
//!
//! Notes are sealed with AES-256-GCM under a key derived from the user's
//! password, kept in a local record store, and only ever held in plaintext
//! while a session is unlocked.

pub mod config;
pub mod encryption;
pub mod history;
pub mod notes;
pub mod session;
pub mod storage;

pub use config::AppConfig;
pub use session::{SessionError, SessionManager, UnlockResult};
pub use storage::{Category, Note};
