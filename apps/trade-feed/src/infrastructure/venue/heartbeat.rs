//! Heartbeat Monitor
//!
//! Detects silently dead connections through periodic pings. Any inbound
//! frame counts as proof of life; a ping left unanswered for longer than
//! `pong_timeout` fails the session so the supervisor can reconnect.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

/// Configuration for heartbeat behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between ping messages.
    pub ping_interval: Duration,
    /// Timeout for any response before the connection is considered dead.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(20),
            pong_timeout: Duration::from_secs(20),
        }
    }
}

impl HeartbeatConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(ping_interval: Duration, pong_timeout: Duration) -> Self {
        Self {
            ping_interval,
            pong_timeout,
        }
    }
}

/// What the session should do on a heartbeat tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatAction {
    /// Send a ping frame.
    SendPing,
    /// No response within the timeout; the connection is dead.
    TimedOut(Duration),
}

/// Per-connection heartbeat state, polled from the session's receive loop.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    config: HeartbeatConfig,
    interval: Interval,
    waiting_since: Option<Instant>,
}

impl HeartbeatMonitor {
    /// Create a monitor whose first tick fires one interval from now.
    #[must_use]
    pub fn new(config: HeartbeatConfig) -> Self {
        let mut interval =
            tokio::time::interval_at(Instant::now() + config.ping_interval, config.ping_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            config,
            interval,
            waiting_since: None,
        }
    }

    /// Record that a frame arrived from the venue.
    pub fn record_activity(&mut self) {
        self.waiting_since = None;
    }

    /// Check if a ping is outstanding.
    #[must_use]
    pub const fn is_waiting(&self) -> bool {
        self.waiting_since.is_some()
    }

    /// Wait for the next tick and decide what to do.
    pub async fn tick(&mut self) -> HeartbeatAction {
        self.interval.tick().await;

        match self.waiting_since {
            Some(sent) if sent.elapsed() >= self.config.pong_timeout => {
                tracing::warn!(
                    elapsed_secs = sent.elapsed().as_secs(),
                    timeout_secs = self.config.pong_timeout.as_secs(),
                    "Heartbeat timeout detected"
                );
                HeartbeatAction::TimedOut(self.config.pong_timeout)
            }
            Some(_) => HeartbeatAction::SendPing,
            None => {
                self.waiting_since = Some(Instant::now());
                HeartbeatAction::SendPing
            }
        }
    }
}
