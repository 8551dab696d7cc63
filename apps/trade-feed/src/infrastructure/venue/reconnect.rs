//! Reconnection Policy
//!
//! Implements exponential backoff with jitter for WebSocket reconnection.
//! The supervisor owns one policy for its whole lifetime and consults it
//! every time a session closes.
//!
//! # Algorithm
//!
//! - A session that stayed open for at least `stable_duration` resets the
//!   attempt count to zero; any other close increments it
//! - The nominal delay is `base_delay * 2^attempt_count`, capped at
//!   `max_delay`
//! - The delay actually waited is the nominal delay with up to
//!   `±jitter_factor` randomization, never above `max_delay`

use std::time::Duration;

use rand::Rng;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Delay for attempt count zero.
    pub base_delay: Duration,
    /// Maximum delay between reconnection attempts.
    pub max_delay: Duration,
    /// Jitter factor as a fraction (e.g., 0.2 = ±20% randomization).
    pub jitter_factor: f64,
    /// Uptime after which a close no longer counts as a failed attempt.
    pub stable_duration: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.2,
            stable_duration: Duration::from_secs(30),
        }
    }
}

impl ReconnectConfig {
    /// Create a new configuration with custom values.
    #[must_use]
    pub const fn new(
        base_delay: Duration,
        max_delay: Duration,
        jitter_factor: f64,
        stable_duration: Duration,
    ) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter_factor,
            stable_duration,
        }
    }
}

/// Reconnection policy implementing exponential backoff with jitter.
///
/// # Example
///
/// ```rust
/// use trade_feed::infrastructure::venue::reconnect::{ReconnectConfig, ReconnectPolicy};
/// use std::time::Duration;
///
/// let mut policy = ReconnectPolicy::new(ReconnectConfig::default());
///
/// // A session that never opened
/// let delay = policy.on_session_closed(None);
/// assert_eq!(policy.attempt_count(), 1);
/// assert!(delay <= Duration::from_secs(60));
///
/// // A session that stayed up for a minute
/// policy.on_session_closed(Some(Duration::from_secs(60)));
/// assert_eq!(policy.attempt_count(), 0);
/// ```
#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    attempt_count: u32,
    next_delay: Duration,
}

impl ReconnectPolicy {
    /// Create a new reconnection policy.
    #[must_use]
    pub const fn new(config: ReconnectConfig) -> Self {
        let base_delay = config.base_delay;
        Self {
            config,
            attempt_count: 0,
            next_delay: base_delay,
        }
    }

    /// Record a closed session and return the delay to wait before the next.
    ///
    /// `open_for` is how long the session stayed open, or `None` if it
    /// never reached the open state.
    pub fn on_session_closed(&mut self, open_for: Option<Duration>) -> Duration {
        match open_for {
            Some(uptime) if uptime >= self.config.stable_duration => self.reset(),
            _ => self.attempt_count = self.attempt_count.saturating_add(1),
        }

        self.next_delay = self.nominal_delay();
        self.apply_jitter(self.next_delay)
    }

    /// Reset the policy after a stable connection.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.next_delay = self.config.base_delay;
    }

    /// Get the current attempt count.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Nominal delay (before jitter) computed by the last close.
    #[must_use]
    pub const fn next_delay(&self) -> Duration {
        self.next_delay
    }

    /// Policy configuration.
    #[must_use]
    pub const fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    fn nominal_delay(&self) -> Duration {
        2u32.checked_pow(self.attempt_count)
            .and_then(|factor| self.config.base_delay.checked_mul(factor))
            .map_or(self.config.max_delay, |delay| delay.min(self.config.max_delay))
    }

    /// Apply jitter to a duration.
    fn apply_jitter(&self, duration: Duration) -> Duration {
        if self.config.jitter_factor <= 0.0 || duration.is_zero() {
            return duration;
        }

        let jitter: f64 = rand::rng()
            .random_range(-self.config.jitter_factor..=self.config.jitter_factor);
        // Saturates near Duration::MAX
        Duration::try_from_secs_f64(duration.as_secs_f64() * (1.0 + jitter).max(0.0))
            .map_or(self.config.max_delay, |jittered| jittered.min(self.config.max_delay))
    }
}
