//! Session manager: owns the live key and the unlocked state.
//!
//! Every read or write of note data goes through here. The key exists only
//! while the session is unlocked and is dropped (and zeroized) on lock,
//! logout, expiry, or full reset.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use zeroize::Zeroizing;

use super::area::{self, FileSessionArea, SessionArea, KEY_DESCRIPTOR_KEY};
use super::clock::{Clock, SystemClock};
use super::errors::{SessionError, SessionResult};
use super::throttle::UnlockThrottle;
use super::watchdog::InactivityWatch;
use crate::config::AppConfig;
use crate::encryption::{
    decrypt_record, derive_key, encrypt_note, generate_salt, verify_key, EncryptionError,
    EncryptionKey, KDF_ITERATIONS,
};
use crate::history::{HistoryLog, DEFAULT_HISTORY_LIMIT};
use crate::notes;
use crate::storage::settings::LEGACY_STATIC_SALT;
use crate::storage::{
    export, migrate_if_needed, FileRecordStore, LocalSettings, MigrationOutcome, Note,
    RecordStore, StorageError, StoredRecord,
};

/// Generic message for a rejected password
pub const INCORRECT_PASSWORD: &str = "Incorrect password";

/// Default inactivity timeout (15 minutes)
const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Default inactivity poll period
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

const EVENT_CAPACITY: usize = 16;

/// Tunables for a session manager
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub history_limit: usize,
    pub kdf_iterations: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_SESSION_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            history_limit: DEFAULT_HISTORY_LIMIT,
            kdf_iterations: KDF_ITERATIONS,
        }
    }
}

impl From<&AppConfig> for SessionConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.session_timeout_secs),
            poll_interval: Duration::from_secs(config.inactivity_poll_secs.max(1)),
            history_limit: config.history_limit,
            kdf_iterations: config.kdf_iterations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Locked,
    Unlocking,
    Unlocked,
    Expired,
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LockReason {
    Manual,
    Logout,
    Expired,
    SessionLost,
    Reset,
}

/// Notifications for whoever renders the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Unlocked,
    Expired,
    Locked(LockReason),
    Saved { count: usize },
}

/// Outcome of an unlock attempt.
///
/// A wrong password is not an error: it comes back with `success: false`,
/// a generic message and the delay the next attempt will incur.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationOutcome>,
}

impl UnlockResult {
    fn unlocked(migration: Option<MigrationOutcome>) -> Self {
        Self {
            success: true,
            retry_delay_ms: None,
            message: None,
            migration,
        }
    }

    fn rejected(message: &str, retry_delay: Option<Duration>) -> Self {
        Self {
            success: false,
            retry_delay_ms: retry_delay.map(|d| d.as_millis() as u64),
            message: Some(message.to_string()),
            migration: None,
        }
    }
}

/// Snapshot of the session for status displays
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub state: SessionState,
    pub note_count: usize,
    pub last_active_at: Option<DateTime<Utc>>,
    pub failed_attempts: u32,
    pub can_undo: bool,
    pub can_redo: bool,
}

/// First of the two confirmations a full reset needs
#[derive(Debug)]
#[must_use]
pub struct FirstConfirmation {
    _private: (),
}

impl FirstConfirmation {
    /// Second, explicit confirmation
    pub fn confirm(self) -> FinalConfirmation {
        FinalConfirmation { _private: () }
    }
}

/// Proof that both reset confirmations were given
#[derive(Debug)]
#[must_use]
pub struct FinalConfirmation {
    _private: (),
}

/// Which session-area entries a lock removes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AreaScope {
    Everything,
    KeyOnly,
}

struct SessionInner {
    state: SessionState,
    key: Option<EncryptionKey>,
    last_active_at: Option<DateTime<Utc>>,
    cache: Vec<Note>,
    history: HistoryLog,
    throttle: UnlockThrottle,
}

impl SessionInner {
    fn unlocked_key(&self) -> SessionResult<EncryptionKey> {
        match (&self.state, &self.key) {
            (SessionState::Unlocked, Some(key)) => Ok(key.clone()),
            _ => Err(SessionError::Locked),
        }
    }

    fn clear_secrets(&mut self) {
        self.key = None;
        self.last_active_at = None;
        self.cache.clear();
        self.history.clear();
    }
}

struct Shared {
    config: SessionConfig,
    store: Arc<dyn RecordStore>,
    settings: Arc<LocalSettings>,
    area: Arc<dyn SessionArea>,
    clock: Arc<dyn Clock>,
    inner: Mutex<SessionInner>,
    // Single-flight gate for everything that rewrites the store
    save_gate: tokio::sync::Mutex<()>,
    watch: Mutex<Option<InactivityWatch>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Shared {
    fn inner(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn stop_watch(&self) {
        let previous = self
            .watch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        drop(previous);
    }

    fn start_watch(self: &Arc<Self>) {
        let weak: Weak<Shared> = Arc::downgrade(self);
        let watch = InactivityWatch::spawn(self.config.poll_interval, move || {
            let Some(shared) = weak.upgrade() else {
                return false;
            };
            match shared.check_expiry() {
                Ok(expired) => !expired,
                Err(e) => {
                    log::error!("Inactivity check failed: {}", e);
                    true
                }
            }
        });

        let previous = self
            .watch
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(watch);
        drop(previous);
    }

    fn check_expiry(&self) -> SessionResult<bool> {
        let now = self.clock.now();
        {
            let mut inner = self.inner();
            let expired = inner.state == SessionState::Unlocked
                && inner
                    .last_active_at
                    .map(|at| idle_exceeds(now, at, self.config.timeout))
                    .unwrap_or(true);
            if !expired {
                return Ok(false);
            }
            inner.state = SessionState::Expired;
        }

        log::info!("Session expired after inactivity");
        self.emit(SessionEvent::Expired);
        self.end_session(LockReason::Expired, AreaScope::Everything)?;
        Ok(true)
    }

    /// Drop the key and every plaintext copy, then clear the session area
    fn end_session(&self, reason: LockReason, scope: AreaScope) -> SessionResult<()> {
        let was_active = {
            let mut inner = self.inner();
            let was_active = inner.key.is_some();
            inner.clear_secrets();
            inner.state = SessionState::Locked;
            was_active
        };
        self.stop_watch();

        let cleared = match scope {
            AreaScope::Everything => self.area.clear(),
            AreaScope::KeyOnly => self.area.remove(KEY_DESCRIPTOR_KEY),
        };

        if was_active {
            log::info!("Session locked ({:?})", reason);
            self.emit(SessionEvent::Locked(reason));
        }
        cleared.map_err(Into::into)
    }

    fn touch(&self) -> SessionResult<()> {
        let now = self.clock.now();
        {
            let mut inner = self.inner();
            if inner.state != SessionState::Unlocked {
                return Ok(());
            }
            inner.last_active_at = Some(now);
        }
        area::write_last_active(self.area.as_ref(), now)?;
        Ok(())
    }
}

fn idle_exceeds(now: DateTime<Utc>, last_active: DateTime<Utc>, timeout: Duration) -> bool {
    let idle = now.signed_duration_since(last_active);
    match chrono::Duration::from_std(timeout) {
        Ok(limit) => idle > limit,
        Err(_) => false,
    }
}

/// Key from an unexpired session area entry. Anything stale or unusable
/// clears the area.
fn stored_session_key(shared: &Shared) -> SessionResult<Option<EncryptionKey>> {
    let descriptor = match area::read_descriptor(shared.area.as_ref()) {
        Ok(Some(descriptor)) => descriptor,
        Ok(None) => return Ok(None),
        Err(e) => {
            log::warn!("Discarding unreadable session: {}", e);
            shared.area.clear()?;
            return Ok(None);
        }
    };

    let fresh = area::read_last_active(shared.area.as_ref())?
        .map(|at| !idle_exceeds(shared.clock.now(), at, shared.config.timeout))
        .unwrap_or(false);
    if !fresh {
        log::info!("Stored session expired");
        shared.area.clear()?;
        return Ok(None);
    }

    match EncryptionKey::from_descriptor(&descriptor) {
        Ok(key) => Ok(Some(key)),
        Err(e) => {
            log::warn!("Discarding invalid session key: {}", e);
            shared.area.clear()?;
            Ok(None)
        }
    }
}

fn decrypt_all(records: &[StoredRecord], key: &EncryptionKey) -> Vec<Note> {
    records
        .iter()
        .filter_map(|record| match decrypt_record(record, key) {
            Ok(note) => Some(note),
            Err(e) => {
                log::warn!("Skipping record {}: {}", record.id, e);
                None
            }
        })
        .collect()
}

/// Resets the Unlocking state if an unlock is abandoned midway
struct UnlockingGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl UnlockingGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for UnlockingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut inner = self.shared.inner();
            if inner.state == SessionState::Unlocking {
                inner.state = SessionState::Locked;
            }
        }
    }
}

/// Manages the encrypted collection for one user
pub struct SessionManager {
    shared: Arc<Shared>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        store: Arc<dyn RecordStore>,
        settings: Arc<LocalSettings>,
        area: Arc<dyn SessionArea>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let history = HistoryLog::new(config.history_limit);
        Self {
            shared: Arc::new(Shared {
                config,
                store,
                settings,
                area,
                clock,
                inner: Mutex::new(SessionInner {
                    state: SessionState::Locked,
                    key: None,
                    last_active_at: None,
                    cache: Vec::new(),
                    history,
                    throttle: UnlockThrottle::new(),
                }),
                save_gate: tokio::sync::Mutex::new(()),
                watch: Mutex::new(None),
                events,
            }),
        }
    }

    /// Manager over the on-disk store, settings and session file named by `config`
    pub fn open(config: &AppConfig) -> SessionResult<Self> {
        let data_dir = config.data_dir()?;
        let session_dir = config.session_dir();
        log::debug!("Opening store in {:?}", data_dir);

        let settings = LocalSettings::open(&data_dir)?;
        Ok(Self::new(
            SessionConfig::from(config),
            Arc::new(FileRecordStore::new(&data_dir)),
            Arc::new(settings),
            Arc::new(FileSessionArea::new(&session_dir)),
            Arc::new(SystemClock),
        ))
    }

    /// Run settings or session-file I/O on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> SessionResult<T>
    where
        F: FnOnce(&Shared) -> SessionResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || f(&shared))
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?
    }

    pub fn config(&self) -> &SessionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> SessionState {
        self.shared.inner().state
    }

    pub fn is_unlocked(&self) -> bool {
        self.state() == SessionState::Unlocked
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.shared.inner();
        SessionStatus {
            state: inner.state,
            note_count: inner.cache.len(),
            last_active_at: inner.last_active_at,
            failed_attempts: inner.throttle.failures(),
            can_undo: inner.history.can_undo(),
            can_redo: inner.history.can_redo(),
        }
    }

    // ========================
    // Unlock / resume
    // ========================

    /// Verify `password` and open the session.
    ///
    /// The derived key is accepted if it decrypts the first stored record, or
    /// unconditionally when the store is empty. From the fourth consecutive
    /// attempt on, the attempt is delayed first. Surrounding whitespace in
    /// the password is ignored.
    pub async fn unlock(&self, password: &str) -> SessionResult<UnlockResult> {
        let shared = &self.shared;
        let password = password.trim();
        if password.is_empty() {
            return Ok(UnlockResult::rejected("Password required", None));
        }

        let delay = {
            let mut inner = shared.inner();
            match inner.state {
                SessionState::Unlocked => {
                    return Ok(UnlockResult {
                        message: Some("Already unlocked".to_string()),
                        ..UnlockResult::unlocked(None)
                    })
                }
                SessionState::Unlocking => return Err(SessionError::UnlockInProgress),
                SessionState::Locked | SessionState::Expired => {}
            }
            inner.state = SessionState::Unlocking;
            inner.throttle.delay_before_next()
        };
        let mut guard = UnlockingGuard {
            shared,
            armed: true,
        };

        if let Some(delay) = delay {
            log::info!("Delaying unlock attempt by {:?}", delay);
            tokio::time::sleep(delay).await;
        }

        let records = shared.store.get_all().await?;
        let (salt, fresh_salt) = match shared.settings.salt() {
            Some(salt) => (salt, false),
            None if !records.is_empty() => {
                log::info!("No stored salt, using the legacy static salt");
                (LEGACY_STATIC_SALT.to_string(), false)
            }
            None => (generate_salt()?, true),
        };

        let iterations = shared.config.kdf_iterations;
        if iterations == 0 {
            return Err(EncryptionError::KeyDerivationFailed(
                "iteration count must be positive".to_string(),
            )
            .into());
        }
        let password = Zeroizing::new(password.to_string());
        let kdf_salt = salt.clone();
        let key = tokio::task::spawn_blocking(move || {
            derive_key(&password, kdf_salt.as_bytes(), iterations)
        })
        .await
        .map_err(|e| SessionError::CryptoUnavailable(e.to_string()))?;

        if let Some(sample) = records.first() {
            if !verify_key(sample, &key) {
                let retry = {
                    let mut inner = shared.inner();
                    inner.throttle.record_failure();
                    inner.state = SessionState::Locked;
                    log::warn!(
                        "Unlock failed ({} consecutive)",
                        inner.throttle.failures()
                    );
                    inner.throttle.delay_before_next()
                };
                guard.disarm();
                return Ok(UnlockResult::rejected(INCORRECT_PASSWORD, retry));
            }
        }

        shared.inner().throttle.reset();
        if fresh_salt {
            let new_salt = salt.clone();
            shared
                .settings
                .update_blocking(move |settings| settings.set_salt(&new_salt))
                .await?;
            log::info!("Generated salt for a new store");
        }

        let opened = self.open_session(key, true).await;
        guard.disarm();
        match opened {
            Ok(migration) => {
                log::info!("Session unlocked");
                Ok(UnlockResult::unlocked(migration))
            }
            Err(e) => {
                log::error!("Unlock aborted: {}", e);
                let _ = shared.end_session(LockReason::SessionLost, AreaScope::Everything);
                Err(e)
            }
        }
    }

    /// Resume an unexpired session from the session area, without a password.
    ///
    /// Returns whether the session is now unlocked. A stale or unusable
    /// descriptor is cleared.
    pub async fn resume(&self) -> SessionResult<bool> {
        let shared = &self.shared;
        let state = shared.inner().state;
        match state {
            SessionState::Unlocked => return Ok(true),
            SessionState::Unlocking => return Err(SessionError::UnlockInProgress),
            SessionState::Locked | SessionState::Expired => {}
        }

        let Some(key) = self.blocking(stored_session_key).await? else {
            return Ok(false);
        };

        let records = shared.store.get_all().await?;
        if let Some(sample) = records.first() {
            if !verify_key(sample, &key) {
                log::warn!("Stored session key does not match the store");
                self.blocking(|shared| Ok(shared.area.clear()?)).await?;
                return Ok(false);
            }
        }

        shared.inner().state = SessionState::Unlocking;
        let mut guard = UnlockingGuard {
            shared,
            armed: true,
        };
        let opened = self.open_session(key, false).await;
        guard.disarm();
        match opened {
            Ok(_) => {
                log::info!("Session resumed");
                Ok(true)
            }
            Err(e) => {
                let _ = shared.end_session(LockReason::SessionLost, AreaScope::Everything);
                Err(e)
            }
        }
    }

    /// Common tail of unlock and resume: persist the session, migrate, load
    async fn open_session(
        &self,
        key: EncryptionKey,
        migrate: bool,
    ) -> SessionResult<Option<MigrationOutcome>> {
        let shared = &self.shared;
        let now = shared.clock.now();
        let descriptor = key.to_descriptor();
        self.blocking(move |shared| {
            area::write_descriptor(shared.area.as_ref(), &descriptor)?;
            area::write_last_active(shared.area.as_ref(), now)?;
            Ok(())
        })
        .await?;

        let migration = if migrate {
            let _gate = shared.save_gate.lock().await;
            let outcome = migrate_if_needed(shared.store.as_ref(), &shared.settings, &key).await?;
            Some(outcome)
        } else {
            None
        };

        let records = shared.store.get_all().await?;
        let notes = decrypt_all(&records, &key);

        {
            let mut inner = shared.inner();
            inner.state = SessionState::Unlocked;
            inner.key = Some(key);
            inner.last_active_at = Some(now);
            inner.history.reset_with(notes.clone());
            inner.cache = notes;
        }
        shared.start_watch();
        shared.emit(SessionEvent::Unlocked);
        Ok(migration)
    }

    // ========================
    // Lock / logout / expiry
    // ========================

    /// Lock the session and clear the whole session area
    pub fn lock(&self) -> SessionResult<()> {
        self.shared
            .end_session(LockReason::Manual, AreaScope::Everything)
    }

    /// Lock the session and forget the exported key
    pub fn logout(&self) -> SessionResult<()> {
        self.shared.end_session(LockReason::Logout, AreaScope::KeyOnly)
    }

    /// Refresh the last-activity time
    pub fn record_activity(&self) -> SessionResult<()> {
        self.shared.touch()
    }

    /// Lock if the session has been idle past the timeout.
    ///
    /// Returns whether the session expired on this call.
    pub fn check_expiry(&self) -> SessionResult<bool> {
        self.shared.check_expiry()
    }

    // ========================
    // Data
    // ========================

    /// Cached notes from the last load or save
    pub fn notes(&self) -> SessionResult<Vec<Note>> {
        let inner = self.shared.inner();
        if inner.state != SessionState::Unlocked {
            return Err(SessionError::Locked);
        }
        Ok(inner.cache.clone())
    }

    /// Decrypt every stored record. Records that fail to open are skipped.
    pub async fn load(&self) -> SessionResult<Vec<Note>> {
        let key = self.shared.inner().unlocked_key()?;
        let records = self.shared.store.get_all().await?;
        let notes = decrypt_all(&records, &key);

        let mut inner = self.shared.inner();
        if inner.state == SessionState::Unlocked {
            inner.cache = notes.clone();
        }
        Ok(notes)
    }

    /// Encrypt and persist `notes` as the whole collection.
    ///
    /// Returns the notes with their new store ids. Without a key the session
    /// is forced locked and `SessionLost` is returned.
    pub async fn save(&self, notes: Vec<Note>) -> SessionResult<Vec<Note>> {
        let _gate = self.shared.save_gate.lock().await;
        self.persist(notes).await
    }

    /// Save path, with the gate already held
    async fn persist(&self, notes: Vec<Note>) -> SessionResult<Vec<Note>> {
        let shared = &self.shared;
        let key = shared.inner().unlocked_key();
        let key = match key {
            Ok(key) => key,
            Err(_) => {
                log::warn!("Save requested without an active session");
                shared.end_session(LockReason::SessionLost, AreaScope::Everything)?;
                return Err(SessionError::SessionLost);
            }
        };

        // Encrypt everything before the store is touched
        let bodies = notes
            .iter()
            .map(|note| encrypt_note(note, &key))
            .collect::<Result<Vec<_>, _>>()?;
        let ids = shared.store.replace_all(bodies).await?;

        let saved: Vec<Note> = notes
            .into_iter()
            .zip(ids)
            .map(|(mut note, id)| {
                note.id = Some(id);
                note
            })
            .collect();

        {
            let mut inner = shared.inner();
            if inner.state == SessionState::Unlocked {
                inner.cache = saved.clone();
                inner.history.push(saved.clone());
            }
        }
        self.blocking(|shared| shared.touch()).await?;
        shared.emit(SessionEvent::Saved { count: saved.len() });
        Ok(saved)
    }

    /// Set a note's last use to now and save, as copying it does
    pub async fn mark_used(&self, index: usize) -> SessionResult<Note> {
        let _gate = self.shared.save_gate.lock().await;
        let mut notes = self.notes()?;
        let used = notes::touch(&mut notes, index)
            .cloned()
            .ok_or(SessionError::NoteNotFound(index))?;
        let saved = self.persist(notes).await?;
        Ok(saved.get(index).cloned().unwrap_or(used))
    }

    /// Replace the collection with the notes parsed from an export
    pub async fn import_json(&self, text: &str) -> SessionResult<Vec<Note>> {
        let notes = export::import_json(text)?;
        self.save(notes).await
    }

    pub fn can_undo(&self) -> bool {
        self.shared.inner().history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.shared.inner().history.can_redo()
    }

    /// Restore the previous snapshot through the save path
    pub async fn undo(&self) -> SessionResult<Option<Vec<Note>>> {
        self.restore(true).await
    }

    /// Restore the next snapshot through the save path
    pub async fn redo(&self) -> SessionResult<Option<Vec<Note>>> {
        self.restore(false).await
    }

    async fn restore(&self, backward: bool) -> SessionResult<Option<Vec<Note>>> {
        let _gate = self.shared.save_gate.lock().await;
        let snapshot = {
            let mut inner = self.shared.inner();
            if inner.state != SessionState::Unlocked {
                return Err(SessionError::Locked);
            }
            let snapshot = if backward {
                inner.history.undo()
            } else {
                inner.history.redo()
            };
            match snapshot {
                Some(snapshot) => {
                    inner.history.begin_restore();
                    snapshot
                }
                None => return Ok(None),
            }
        };

        let result = self.persist(snapshot).await;

        let mut inner = self.shared.inner();
        inner.history.end_restore();
        match result {
            Ok(saved) => Ok(Some(saved)),
            Err(e) => {
                // Put the cursor back where the visible state still is
                if backward {
                    inner.history.redo();
                } else {
                    inner.history.undo();
                }
                Err(e)
            }
        }
    }

    // ========================
    // Full reset
    // ========================

    /// Start a full data reset. Nothing happens until both confirmations
    /// are given and passed to [`SessionManager::full_reset`].
    pub fn begin_full_reset(&self) -> FirstConfirmation {
        FirstConfirmation { _private: () }
    }

    /// Erase every record, the salt, the legacy slot and the session.
    ///
    /// Irreversible: the next unlock starts a new store.
    pub async fn full_reset(&self, _confirmed: FinalConfirmation) -> SessionResult<()> {
        let shared = &self.shared;
        let _gate = shared.save_gate.lock().await;

        {
            let mut inner = shared.inner();
            inner.clear_secrets();
            inner.throttle.reset();
            inner.state = SessionState::Locked;
        }
        shared.stop_watch();

        shared.store.clear().await?;
        self.blocking(|shared| {
            shared.settings.clear_salt()?;
            shared.settings.remove_legacy_notes()?;
            shared.area.clear()?;
            Ok(())
        })
        .await?;

        log::warn!("All notes and session data erased");
        shared.emit(SessionEvent::Locked(LockReason::Reset));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::area::{read_descriptor, MemorySessionArea, LAST_ACTIVE_KEY};
    use crate::session::clock::ManualClock;
    use crate::storage::{Category, MemoryRecordStore, RecordBody};
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    struct Fixture {
        manager: SessionManager,
        store: Arc<MemoryRecordStore>,
        settings: Arc<LocalSettings>,
        area: Arc<MemorySessionArea>,
        clock: Arc<ManualClock>,
        _temp: TempDir,
    }

    fn test_config() -> SessionConfig {
        SessionConfig {
            kdf_iterations: 1_000,
            ..SessionConfig::default()
        }
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryRecordStore::new());
        let settings = Arc::new(LocalSettings::open(temp.path()).unwrap());
        let area = Arc::new(MemorySessionArea::new());
        let clock = Arc::new(ManualClock::default());
        let manager = SessionManager::new(
            test_config(),
            store.clone(),
            settings.clone(),
            area.clone(),
            clock.clone(),
        );
        Fixture {
            manager,
            store,
            settings,
            area,
            clock,
            _temp: temp,
        }
    }

    fn note(title: &str) -> Note {
        Note::new(title, format!("{} content", title), Category::Other)
    }

    #[tokio::test]
    async fn test_first_unlock_accepts_and_creates_salt() {
        let f = fixture();
        assert_eq!(f.manager.state(), SessionState::Locked);

        let result = f.manager.unlock("abc123").await.unwrap();
        assert!(result.success);
        assert_eq!(result.migration, Some(MigrationOutcome::NoLegacyData));
        assert!(f.manager.is_unlocked());

        let salt = f.settings.salt().unwrap();
        assert_eq!(salt.len(), 32);
        assert!(read_descriptor(f.area.as_ref()).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_wrong_password_rejected_after_first_save() {
        let f = fixture();
        f.manager.unlock("right").await.unwrap();
        f.manager.save(vec![note("a")]).await.unwrap();
        f.manager.lock().unwrap();

        let result = f.manager.unlock("wrong").await.unwrap();
        assert!(!result.success);
        assert_eq!(result.message.as_deref(), Some(INCORRECT_PASSWORD));
        assert_eq!(result.retry_delay_ms, None);
        assert_eq!(f.manager.state(), SessionState::Locked);
        assert_eq!(f.manager.status().failed_attempts, 1);

        assert!(f.manager.unlock("right").await.unwrap().success);
        assert_eq!(f.manager.status().failed_attempts, 0);
        assert_eq!(f.manager.notes().unwrap()[0].title, "a");
    }

    #[tokio::test]
    async fn test_empty_password_does_not_count() {
        let f = fixture();
        let result = f.manager.unlock("").await.unwrap();
        assert!(!result.success);
        assert_eq!(f.manager.status().failed_attempts, 0);
        assert_eq!(f.manager.state(), SessionState::Locked);
    }

    #[tokio::test]
    async fn test_save_assigns_ids_and_pushes_history() {
        let f = fixture();
        f.manager.unlock("pw").await.unwrap();
        assert!(!f.manager.can_undo());

        let saved = f.manager.save(vec![note("a"), note("b")]).await.unwrap();
        assert!(saved.iter().all(|n| n.id.is_some()));
        assert_eq!(f.store.get_all().await.unwrap().len(), 2);
        assert!(f.manager.can_undo());

        let loaded = f.manager.load().await.unwrap();
        assert_eq!(loaded, saved);
    }

    #[tokio::test]
    async fn test_save_while_locked_is_session_lost() {
        let f = fixture();
        let err = f.manager.save(vec![note("a")]).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionLost));
        assert!(f.store.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_undo_redo_restore_through_save() {
        let f = fixture();
        f.manager.unlock("pw").await.unwrap();
        f.manager.save(vec![note("a")]).await.unwrap();
        f.manager.save(vec![note("a"), note("b")]).await.unwrap();

        let restored = f.manager.undo().await.unwrap().unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(f.store.get_all().await.unwrap().len(), 1);
        assert!(f.manager.can_redo());

        let again = f.manager.redo().await.unwrap().unwrap();
        assert_eq!(again.len(), 2);
        assert!(!f.manager.can_redo());

        // Undo to the unlock-time snapshot, then a new save drops the redo branch
        f.manager.undo().await.unwrap();
        f.manager.undo().await.unwrap();
        assert!(f.manager.notes().unwrap().is_empty());
        assert_eq!(f.manager.undo().await.unwrap(), None);

        f.manager.save(vec![note("c")]).await.unwrap();
        assert!(!f.manager.can_redo());
    }

    #[tokio::test]
    async fn test_lock_clears_area_logout_keeps_last_active() {
        let f = fixture();
        f.manager.unlock("pw").await.unwrap();
        f.manager.logout().unwrap();
        assert!(read_descriptor(f.area.as_ref()).unwrap().is_none());
        assert!(f.area.get(LAST_ACTIVE_KEY).unwrap().is_some());
        assert!(matches!(f.manager.notes(), Err(SessionError::Locked)));

        f.manager.unlock("pw").await.unwrap();
        f.manager.lock().unwrap();
        assert!(f.area.get(LAST_ACTIVE_KEY).unwrap().is_none());
        assert!(!f.manager.can_undo());
    }

    #[tokio::test]
    async fn test_expiry_after_sixteen_minutes() {
        let f = fixture();
        let mut events = f.manager.subscribe();
        f.manager.unlock("pw").await.unwrap();
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Unlocked);

        f.clock.advance(chrono::Duration::minutes(14));
        assert!(!f.manager.check_expiry().unwrap());

        f.manager.record_activity().unwrap();
        f.clock.advance(chrono::Duration::minutes(16));
        assert!(f.manager.check_expiry().unwrap());
        assert_eq!(f.manager.state(), SessionState::Locked);
        assert!(read_descriptor(f.area.as_ref()).unwrap().is_none());

        assert_eq!(events.recv().await.unwrap(), SessionEvent::Expired);
        assert_eq!(
            events.recv().await.unwrap(),
            SessionEvent::Locked(LockReason::Expired)
        );
    }

    #[tokio::test]
    async fn test_resume_within_timeout() {
        let f = fixture();
        f.manager.unlock("pw").await.unwrap();
        f.manager.save(vec![note("kept")]).await.unwrap();

        let second = SessionManager::new(
            test_config(),
            f.store.clone(),
            f.settings.clone(),
            f.area.clone(),
            f.clock.clone(),
        );
        f.clock.advance(chrono::Duration::minutes(5));
        assert!(second.resume().await.unwrap());
        assert_eq!(second.notes().unwrap()[0].title, "kept");
    }

    #[tokio::test]
    async fn test_resume_after_timeout_clears_area() {
        let f = fixture();
        f.manager.unlock("pw").await.unwrap();

        let second = SessionManager::new(
            test_config(),
            f.store.clone(),
            f.settings.clone(),
            f.area.clone(),
            f.clock.clone(),
        );
        f.clock.advance(chrono::Duration::minutes(16));
        assert!(!second.resume().await.unwrap());
        assert!(read_descriptor(f.area.as_ref()).unwrap().is_none());
        assert_eq!(second.state(), SessionState::Locked);
    }

    #[tokio::test]
    async fn test_mark_used_updates_and_saves() {
        let f = fixture();
        f.manager.unlock("pw").await.unwrap();
        let mut old = note("a");
        old.last_used_at = DateTime::<Utc>::default();
        f.manager.save(vec![old]).await.unwrap();

        let used = f.manager.mark_used(0).await.unwrap();
        assert!(used.last_used_at.timestamp_millis() > 0);
        assert_eq!(f.manager.load().await.unwrap()[0].last_used_at, used.last_used_at);
        assert!(matches!(
            f.manager.mark_used(5).await,
            Err(SessionError::NoteNotFound(5))
        ));
    }

    #[tokio::test]
    async fn test_full_reset_returns_to_first_run() {
        let f = fixture();
        f.manager.unlock("old").await.unwrap();
        f.manager.save(vec![note("a")]).await.unwrap();

        let first = f.manager.begin_full_reset();
        f.manager.full_reset(first.confirm()).await.unwrap();

        assert_eq!(f.manager.state(), SessionState::Locked);
        assert!(f.store.is_empty().await.unwrap());
        assert!(f.settings.salt().is_none());

        // Any password opens the fresh store
        assert!(f.manager.unlock("new").await.unwrap().success);
        assert!(f.manager.notes().unwrap().is_empty());
    }

    /// Store with switchable write failures. `replace_all` uses the trait's
    /// clear-then-add default so unserialized saves would interleave.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryRecordStore,
        fail_writes: AtomicBool,
    }

    impl FlakyStore {
        fn check(&self) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::other("disk full")));
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl RecordStore for FlakyStore {
        async fn get_all(&self) -> Result<Vec<StoredRecord>, StorageError> {
            self.inner.get_all().await
        }

        async fn add(&self, body: RecordBody) -> Result<u64, StorageError> {
            self.check()?;
            tokio::task::yield_now().await;
            self.inner.add(body).await
        }

        async fn put(&self, record: StoredRecord) -> Result<(), StorageError> {
            self.check()?;
            self.inner.put(record).await
        }

        async fn delete(&self, id: u64) -> Result<(), StorageError> {
            self.check()?;
            self.inner.delete(id).await
        }

        async fn clear(&self) -> Result<(), StorageError> {
            self.check()?;
            tokio::task::yield_now().await;
            self.inner.clear().await
        }
    }

    fn flaky_manager(store: Arc<FlakyStore>, temp: &TempDir) -> SessionManager {
        SessionManager::new(
            test_config(),
            store,
            Arc::new(LocalSettings::open(temp.path()).unwrap()),
            Arc::new(MemorySessionArea::new()),
            Arc::new(ManualClock::default()),
        )
    }

    fn titles(notes: &[Note]) -> Vec<String> {
        notes.iter().map(|n| n.title.clone()).collect()
    }

    #[tokio::test]
    async fn test_failed_save_keeps_cache_and_history() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FlakyStore::default());
        let manager = flaky_manager(store.clone(), &temp);
        manager.unlock("pw").await.unwrap();
        manager.save(vec![note("a")]).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = manager.save(vec![note("a"), note("b")]).await.unwrap_err();
        assert!(matches!(err, SessionError::Storage(_)));
        assert!(manager.is_unlocked());
        assert_eq!(titles(&manager.notes().unwrap()), vec!["a"]);
        assert!(manager.can_undo());
        assert!(!manager.can_redo());

        // A failed undo leaves the cursor where the visible state is
        assert!(manager.undo().await.is_err());
        assert_eq!(titles(&manager.notes().unwrap()), vec!["a"]);
        assert!(manager.can_undo());
        assert!(!manager.can_redo());

        store.fail_writes.store(false, Ordering::SeqCst);
        assert!(manager.undo().await.unwrap().unwrap().is_empty());
        assert!(manager.can_redo());

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(manager.redo().await.is_err());
        assert!(manager.notes().unwrap().is_empty());
        assert!(manager.can_redo());
        assert!(!manager.can_undo());

        store.fail_writes.store(false, Ordering::SeqCst);
        let redone = manager.redo().await.unwrap().unwrap();
        assert_eq!(titles(&redone), vec!["a"]);
        assert_eq!(store.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_saves_do_not_interleave() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(FlakyStore::default());
        let manager = flaky_manager(store.clone(), &temp);
        manager.unlock("pw").await.unwrap();

        let first = vec![note("a"), note("b"), note("c")];
        let second = vec![note("x"), note("y")];
        let (r1, r2) = tokio::join!(manager.save(first), manager.save(second));
        r1.unwrap();
        r2.unwrap();

        let stored = manager.load().await.unwrap();
        let stored_titles = titles(&stored);
        assert!(
            stored_titles == vec!["a", "b", "c"] || stored_titles == vec!["x", "y"],
            "mixed collection {:?}",
            stored_titles
        );
        assert_eq!(titles(&manager.notes().unwrap()), stored_titles);
    }

    #[tokio::test]
    async fn test_zero_iterations_is_rejected() {
        let temp = TempDir::new().unwrap();
        let manager = SessionManager::new(
            SessionConfig {
                kdf_iterations: 0,
                ..SessionConfig::default()
            },
            Arc::new(MemoryRecordStore::new()),
            Arc::new(LocalSettings::open(temp.path()).unwrap()),
            Arc::new(MemorySessionArea::new()),
            Arc::new(ManualClock::default()),
        );

        let err = manager.unlock("pw").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Encryption(EncryptionError::KeyDerivationFailed(_))
        ));
        assert_eq!(manager.state(), SessionState::Locked);
    }

    #[tokio::test]
    async fn test_password_whitespace_is_ignored() {
        let f = fixture();
        f.manager.unlock("  pw ").await.unwrap();
        f.manager.save(vec![note("a")]).await.unwrap();
        f.manager.lock().unwrap();

        assert!(f.manager.unlock("pw").await.unwrap().success);
        f.manager.lock().unwrap();
        assert!(!f.manager.unlock("   ").await.unwrap().success);
        assert_eq!(f.manager.status().failed_attempts, 0);
    }
}
