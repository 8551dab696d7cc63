//! Session State and Feed Status
//!
//! `SessionState` is the per-connection state machine; `FeedStatus` is the
//! shared, lock-light view of a feed that the consumer can poll while the
//! supervisor task updates it.

use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};

// =============================================================================
// Session State
// =============================================================================

/// Lifecycle state of one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Handshake in progress.
    Connecting,
    /// Connected and subscribed.
    Open,
    /// Orderly close in progress.
    Closing,
    /// Terminal.
    Closed,
}

impl SessionState {
    /// Check if `self -> next` is a legal transition.
    ///
    /// `Connecting -> Closed` covers an immediate connect failure and
    /// `Open -> Closed` an abrupt network failure.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Open | Self::Closed)
                | (Self::Open, Self::Closing | Self::Closed)
                | (Self::Closing, Self::Closed)
        )
    }

    /// Label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Feed Status
// =============================================================================

/// Tracks the state of one feed across its sessions.
#[derive(Debug)]
pub struct FeedStatus {
    state: parking_lot::RwLock<SessionState>,
    last_opened_at: parking_lot::RwLock<Option<DateTime<Utc>>>,
    last_error: parking_lot::RwLock<Option<String>>,
    sessions_started: AtomicU64,
    attempt_count: AtomicU32,
    trades_received: AtomicU64,
    decode_errors: AtomicU64,
    venue_notices: AtomicU64,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedStatus {
    /// Create a status for a feed that has not connected yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: parking_lot::RwLock::new(SessionState::Closed),
            last_opened_at: parking_lot::RwLock::new(None),
            last_error: parking_lot::RwLock::new(None),
            sessions_started: AtomicU64::new(0),
            attempt_count: AtomicU32::new(0),
            trades_received: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            venue_notices: AtomicU64::new(0),
        }
    }

    /// Set the current session state.
    pub fn set_state(&self, state: SessionState) {
        *self.state.write() = state;
        if state == SessionState::Open {
            *self.last_opened_at.write() = Some(Utc::now());
            *self.last_error.write() = None;
        }
    }

    /// Record the most recent fault.
    pub fn set_error(&self, message: String) {
        *self.last_error.write() = Some(message);
    }

    /// Increment the sessions counter.
    pub fn increment_sessions(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Mirror the supervisor's attempt count.
    pub fn set_attempt_count(&self, attempts: u32) {
        self.attempt_count.store(attempts, Ordering::Relaxed);
    }

    /// Increment delivered trades.
    pub fn increment_trades(&self) {
        self.trades_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment decode failures.
    pub fn increment_decode_errors(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment venue control frames.
    pub fn increment_notices(&self) {
        self.venue_notices.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Get the number of sessions started.
    #[must_use]
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started.load(Ordering::Relaxed)
    }

    /// Get the supervisor's attempt count.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::Relaxed)
    }

    /// Take a consistent-enough copy of every field.
    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            state: *self.state.read(),
            last_opened_at: *self.last_opened_at.read(),
            last_error: self.last_error.read().clone(),
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            attempt_count: self.attempt_count.load(Ordering::Relaxed),
            trades_received: self.trades_received.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            venue_notices: self.venue_notices.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a [`FeedStatus`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSnapshot {
    /// Session state.
    pub state: SessionState,
    /// When the last session reached `Open`.
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Last transport fault, cleared when a session opens.
    pub last_error: Option<String>,
    /// Sessions started since the feed began.
    pub sessions_started: u64,
    /// Consecutive failed sessions.
    pub attempt_count: u32,
    /// Trades delivered to the consumer.
    pub trades_received: u64,
    /// Frames that failed to decode.
    pub decode_errors: u64,
    /// Venue control frames received.
    pub venue_notices: u64,
}
