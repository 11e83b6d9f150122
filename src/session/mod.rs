//! Session lifecycle: unlock, resume, expiry and lock
//!
//! This module provides:
//! - The session state machine owning the live key
//! - Backoff between failed unlock attempts
//! - The session area holding the exported key for resume
//! - The periodic inactivity check

pub mod area;
pub mod clock;
pub mod errors;
pub mod manager;
pub mod throttle;
pub mod watchdog;

pub use area::{FileSessionArea, MemorySessionArea, SessionArea};
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::{SessionError, SessionResult};
pub use manager::{
    FinalConfirmation, FirstConfirmation, LockReason, SessionConfig, SessionEvent,
    SessionManager, SessionState, SessionStatus, UnlockResult, INCORRECT_PASSWORD,
};
pub use throttle::UnlockThrottle;
pub use watchdog::InactivityWatch;
