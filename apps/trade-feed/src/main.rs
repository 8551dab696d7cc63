//! Trade Feed Binary
//!
//! Streams trades for the configured channels and logs each one.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin trade-feed
//! ```
//!
//! # Environment Variables
//!
//! - `TRADE_FEED_URL`: Venue endpoint (default: `wss://stream.binance.us:9443/ws`)
//! - `TRADE_FEED_CHANNELS`: Comma-separated channels (default: `ethusdt@trade`)
//! - `TRADE_FEED_QUOTE_SUFFIX`: Quote currency suffix (default: USDT)
//! - `TRADE_FEED_BACKOFF_BASE_MS`: Reconnect backoff base (default: 1000)
//! - `TRADE_FEED_BACKOFF_MAX_SECS`: Reconnect backoff cap (default: 60)
//! - `TRADE_FEED_JITTER`: Backoff jitter fraction (default: 0.2)
//! - `TRADE_FEED_STABLE_SECS`: Uptime that resets the backoff (default: 30)
//! - `TRADE_FEED_CONNECT_TIMEOUT_SECS`: Connect timeout (default: 10)
//! - `TRADE_FEED_HEARTBEAT_INTERVAL_SECS`: Ping interval, 0 disables (default: 20)
//! - `TRADE_FEED_HEARTBEAT_TIMEOUT_SECS`: Pong timeout, 0 disables (default: 20)
//! - `TRADE_FEED_METRICS_PORT`: Prometheus port, 0 disables (default: 9090)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log filter (default: `trade_feed=info`)

use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use trade_feed::infrastructure::telemetry;
use trade_feed::{FeedConfig, FeedError, ServerSettings, init_metrics, start};

/// Upper bound on waiting for the feed to release its connection.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("rustls crypto provider already installed"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!("Starting trade feed");

    let server = ServerSettings::from_env();
    if server.metrics_port > 0 {
        init_metrics(server.metrics_port).context("failed to start metrics exporter")?;
        tracing::info!(port = server.metrics_port, "Prometheus metrics listening");
    }

    let config = FeedConfig::from_env().context("invalid feed configuration")?;
    log_config(&config);

    let handle = start(config).context("failed to start feed")?;

    handle.on_trade(|trade| {
        tracing::info!(
            symbol = trade.symbol(),
            base = trade.base_currency(),
            price = %trade.price(),
            quantity = %trade.quantity(),
            event_time = %trade.event_time(),
            "{} price: {}",
            trade.base_currency(),
            trade.price()
        );
    });
    handle.on_error(|error| match error {
        FeedError::VenueNotice(notice) if !notice.is_error() => {
            tracing::debug!(%notice, "Venue notice");
        }
        other => tracing::warn!(error = %other, "Feed error"),
    });

    await_shutdown().await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.stop())
        .await
        .is_err()
    {
        tracing::warn!(
            timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
            "Feed did not stop in time"
        );
    }

    let status = handle.status();
    tracing::info!(
        sessions = status.sessions_started,
        trades = status.trades_received,
        decode_errors = status.decode_errors,
        "Trade feed stopped"
    );
    Ok(())
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        for dir in cwd.ancestors().skip(1) {
            let env_path = dir.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &FeedConfig) {
    tracing::info!(
        url = %config.endpoint_url,
        channels = ?config.channels,
        quote_suffix = %config.quote_suffix,
        "Configuration loaded"
    );
    tracing::debug!(
        backoff_base_ms = u64::try_from(config.backoff_base.as_millis()).unwrap_or(u64::MAX),
        backoff_max_secs = config.backoff_max.as_secs(),
        stable_secs = config.stable_duration.as_secs(),
        heartbeat = config.heartbeat.is_some(),
        "Reconnect settings"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
