//! Feed Configuration Settings
//!
//! Configuration types for the trade feed, built programmatically or loaded
//! from environment variables.

use std::time::Duration;

use crate::domain::streaming::DEFAULT_QUOTE_SUFFIX;
use crate::domain::subscription::SubscriptionManager;
use crate::infrastructure::venue::heartbeat::HeartbeatConfig;
use crate::infrastructure::venue::reconnect::ReconnectConfig;
use crate::infrastructure::venue::session::SessionConfig;

/// Default venue endpoint.
pub const DEFAULT_ENDPOINT_URL: &str = "wss://stream.binance.us:9443/ws";

/// Default channel set.
pub const DEFAULT_CHANNELS: &str = "ethusdt@trade";

/// Complete configuration for one feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    /// Venue WebSocket endpoint (`ws://` or `wss://`).
    pub endpoint_url: String,
    /// Channels to subscribe to, in order.
    pub channels: Vec<String>,
    /// Quote currency suffix stripped to derive the base currency.
    pub quote_suffix: String,
    /// Backoff delay for attempt count zero.
    pub backoff_base: Duration,
    /// Backoff cap.
    pub backoff_max: Duration,
    /// Backoff jitter as a fraction of the delay.
    pub jitter_factor: f64,
    /// Uptime after which a disconnect resets the backoff.
    pub stable_duration: Duration,
    /// Upper bound on the connect handshake.
    pub connect_timeout: Duration,
    /// Upper bound on the orderly close during shutdown.
    pub close_timeout: Duration,
    /// Client heartbeat, `None` to disable.
    pub heartbeat: Option<HeartbeatConfig>,
}

impl FeedConfig {
    /// Create a configuration with default tuning.
    #[must_use]
    pub fn new<I, S>(endpoint_url: impl Into<String>, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reconnect = ReconnectConfig::default();
        Self {
            endpoint_url: endpoint_url.into(),
            channels: channels.into_iter().map(Into::into).collect(),
            quote_suffix: DEFAULT_QUOTE_SUFFIX.to_string(),
            backoff_base: reconnect.base_delay,
            backoff_max: reconnect.max_delay,
            jitter_factor: reconnect.jitter_factor,
            stable_duration: reconnect.stable_duration,
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
            heartbeat: Some(HeartbeatConfig::default()),
        }
    }

    /// Set the quote currency suffix.
    #[must_use]
    pub fn with_quote_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.quote_suffix = suffix.into();
        self
    }

    /// Set the backoff base and cap.
    #[must_use]
    pub const fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }

    /// Set the backoff jitter factor.
    #[must_use]
    pub const fn with_jitter_factor(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Set the stable duration.
    #[must_use]
    pub const fn with_stable_duration(mut self, stable_duration: Duration) -> Self {
        self.stable_duration = stable_duration;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the close timeout.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set or disable the heartbeat.
    #[must_use]
    pub fn with_heartbeat(mut self, heartbeat: Option<HeartbeatConfig>) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an empty value or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparseable numeric values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Same as [`FeedConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let endpoint_url = non_empty(&lookup, "TRADE_FEED_URL")?
            .unwrap_or_else(|| DEFAULT_ENDPOINT_URL.to_string());
        let channels = non_empty(&lookup, "TRADE_FEED_CHANNELS")?
            .unwrap_or_else(|| DEFAULT_CHANNELS.to_string());

        let mut config = Self::new(endpoint_url, channels.split(',').map(str::trim));

        if let Some(suffix) = non_empty(&lookup, "TRADE_FEED_QUOTE_SUFFIX")? {
            config.quote_suffix = suffix;
        }

        config.backoff_base =
            parse_duration_millis(&lookup, "TRADE_FEED_BACKOFF_BASE_MS", config.backoff_base);
        config.backoff_max =
            parse_duration_secs(&lookup, "TRADE_FEED_BACKOFF_MAX_SECS", config.backoff_max);
        config.jitter_factor = parse_f64(&lookup, "TRADE_FEED_JITTER", config.jitter_factor);
        config.stable_duration =
            parse_duration_secs(&lookup, "TRADE_FEED_STABLE_SECS", config.stable_duration);
        config.connect_timeout = parse_duration_secs(
            &lookup,
            "TRADE_FEED_CONNECT_TIMEOUT_SECS",
            config.connect_timeout,
        );

        let heartbeat = HeartbeatConfig::default();
        let ping_interval = parse_duration_secs(
            &lookup,
            "TRADE_FEED_HEARTBEAT_INTERVAL_SECS",
            heartbeat.ping_interval,
        );
        let pong_timeout = parse_duration_secs(
            &lookup,
            "TRADE_FEED_HEARTBEAT_TIMEOUT_SECS",
            heartbeat.pong_timeout,
        );
        // Zero disables the heartbeat
        config.heartbeat = (!ping_interval.is_zero() && !pong_timeout.is_zero())
            .then(|| HeartbeatConfig::new(ping_interval, pong_timeout));

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the feed cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.endpoint_url.trim();
        if url.is_empty() {
            return Err(ConfigError::EmptyValue("endpoint_url".to_string()));
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidUrl(url.to_string()));
        }

        if SubscriptionManager::with_channels(&self.channels).is_empty() {
            return Err(ConfigError::NoChannels);
        }

        if self.backoff_base.is_zero() {
            return Err(ConfigError::InvalidBackoff(
                "backoff base must be positive".to_string(),
            ));
        }
        if self.backoff_max < self.backoff_base {
            return Err(ConfigError::InvalidBackoff(format!(
                "backoff max {:?} is below base {:?}",
                self.backoff_max, self.backoff_base
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidJitter(self.jitter_factor));
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("connect_timeout".to_string()));
        }
        if let Some(heartbeat) = &self.heartbeat
            && (heartbeat.ping_interval.is_zero() || heartbeat.pong_timeout.is_zero())
        {
            return Err(ConfigError::InvalidTimeout("heartbeat".to_string()));
        }

        Ok(())
    }

    /// Reconnect policy settings.
    #[must_use]
    pub const fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig::new(
            self.backoff_base,
            self.backoff_max,
            self.jitter_factor,
            self.stable_duration,
        )
    }

    /// Per-session connection settings.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            url: self.endpoint_url.trim().to_string(),
            connect_timeout: self.connect_timeout,
            close_timeout: self.close_timeout,
            heartbeat: self.heartbeat.clone(),
        }
    }
}

/// Settings for the process around the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Prometheus metrics port (0 = no listener).
    pub metrics_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { metrics_port: 9090 }
    }
}

impl ServerSettings {
    /// Load server settings from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load server settings from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            metrics_port: parse_u16(
                &lookup,
                "TRADE_FEED_METRICS_PORT",
                Self::default().metrics_port,
            ),
        }
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Setting has an empty value.
    #[error("{0} cannot be empty")]
    EmptyValue(String),
    /// Endpoint is not a WebSocket URL.
    #[error("endpoint must be a ws:// or wss:// URL, got {0}")]
    InvalidUrl(String),
    /// No usable channel configured.
    #[error("at least one channel is required")]
    NoChannels,
    /// Backoff settings are inconsistent.
    #[error("invalid backoff: {0}")]
    InvalidBackoff(String),
    /// Jitter factor outside `[0, 1]`.
    #[error("jitter factor must be within [0, 1], got {0}")]
    InvalidJitter(f64),
    /// A timeout or interval is zero.
    #[error("{0} must be positive")]
    InvalidTimeout(String),
}

fn non_empty<F>(lookup: &F, key: &str) -> Result<Option<String>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
        Some(value) => Ok(Some(value.trim().to_string())),
        None => Ok(None),
    }
}

fn parse_u16<F>(lookup: &F, key: &str, default: u16) -> u16
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_f64<F>(lookup: &F, key: &str, default: f64) -> f64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_from_empty_environment() {
        let config = FeedConfig::from_lookup(env(&[])).unwrap();

        assert_eq!(config.endpoint_url, DEFAULT_ENDPOINT_URL);
        assert_eq!(config.channels, vec!["ethusdt@trade"]);
        assert_eq!(config.quote_suffix, "USDT");
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.backoff_max, Duration::from_secs(60));
        assert_eq!(config.stable_duration, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.heartbeat, Some(HeartbeatConfig::default()));
    }

    #[test]
    fn environment_overrides() {
        let config = FeedConfig::from_lookup(env(&[
            ("TRADE_FEED_URL", "wss://example.test/ws"),
            ("TRADE_FEED_CHANNELS", "btcusdt@trade, ethusdt@trade ,solusdt@trade"),
            ("TRADE_FEED_QUOTE_SUFFIX", "USD"),
            ("TRADE_FEED_BACKOFF_BASE_MS", "250"),
            ("TRADE_FEED_BACKOFF_MAX_SECS", "10"),
            ("TRADE_FEED_STABLE_SECS", "5"),
            ("TRADE_FEED_HEARTBEAT_INTERVAL_SECS", "0"),
        ]))
        .unwrap();

        assert_eq!(config.endpoint_url, "wss://example.test/ws");
        assert_eq!(
            config.channels,
            vec!["btcusdt@trade", "ethusdt@trade", "solusdt@trade"]
        );
        assert_eq!(config.quote_suffix, "USD");
        assert_eq!(config.backoff_base, Duration::from_millis(250));
        assert_eq!(config.backoff_max, Duration::from_secs(10));
        assert_eq!(config.stable_duration, Duration::from_secs(5));
        assert!(config.heartbeat.is_none());
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let config =
            FeedConfig::from_lookup(env(&[("TRADE_FEED_BACKOFF_MAX_SECS", "soon")])).unwrap();
        assert_eq!(config.backoff_max, Duration::from_secs(60));
    }

    #[test]
    fn empty_url_is_rejected() {
        let error = FeedConfig::from_lookup(env(&[("TRADE_FEED_URL", "  ")])).unwrap_err();
        assert_eq!(error, ConfigError::EmptyValue("TRADE_FEED_URL".to_string()));
    }

    #[test]
    fn http_url_is_rejected() {
        let config = FeedConfig::new("https://example.test", ["ethusdt@trade"]);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn blank_channels_are_rejected() {
        let config = FeedConfig::new("wss://example.test/ws", [" ", ""]);
        assert_eq!(config.validate(), Err(ConfigError::NoChannels));
    }

    #[test]
    fn inverted_backoff_is_rejected() {
        let config = FeedConfig::new("wss://example.test/ws", ["ethusdt@trade"])
            .with_backoff(Duration::from_secs(10), Duration::from_secs(1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackoff(_))
        ));
    }

    #[test]
    fn zero_backoff_base_is_rejected() {
        let config = FeedConfig::new("wss://example.test/ws", ["ethusdt@trade"])
            .with_backoff(Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBackoff(_))
        ));
    }

    #[test]
    fn jitter_out_of_range_is_rejected() {
        let config =
            FeedConfig::new("wss://example.test/ws", ["ethusdt@trade"]).with_jitter_factor(1.5);
        assert_eq!(config.validate(), Err(ConfigError::InvalidJitter(1.5)));
    }

    #[test]
    fn zero_heartbeat_interval_is_rejected() {
        let config = FeedConfig::new("wss://example.test/ws", ["ethusdt@trade"]).with_heartbeat(
            Some(HeartbeatConfig::new(Duration::ZERO, Duration::from_secs(1))),
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidTimeout("heartbeat".to_string()))
        );
    }

    #[test]
    fn derived_configs() {
        let config = FeedConfig::new(" ws://localhost:9000/ws ", ["ethusdt@trade"])
            .with_backoff(Duration::from_millis(100), Duration::from_secs(2))
            .with_stable_duration(Duration::from_secs(3));

        let reconnect = config.reconnect_config();
        assert_eq!(reconnect.base_delay, Duration::from_millis(100));
        assert_eq!(reconnect.max_delay, Duration::from_secs(2));
        assert_eq!(reconnect.stable_duration, Duration::from_secs(3));

        let session = config.session_config();
        assert_eq!(session.url, "ws://localhost:9000/ws");
        assert_eq!(session.connect_timeout, Duration::from_secs(10));
    }

    #[test]
    fn server_settings_metrics_port() {
        assert_eq!(ServerSettings::from_lookup(env(&[])).metrics_port, 9090);
        assert_eq!(
            ServerSettings::from_lookup(env(&[("TRADE_FEED_METRICS_PORT", "0")])).metrics_port,
            0
        );
    }
}
