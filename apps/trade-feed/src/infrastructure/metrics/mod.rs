//! Prometheus Metrics Module
//!
//! Exposes feed metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Messages**: Trades delivered, decode failures, venue notices
//! - **Connections**: Sessions started, open connection gauge, transport errors
//! - **Reconnects**: Reconnect count and scheduled backoff delays
//!
//! # Integration
//!
//! The recording functions go through the `metrics` facade and are no-ops
//! until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder.
///
/// With a non-zero `listen_port` the exporter serves `/metrics` on
/// `0.0.0.0:<listen_port>`; with zero the recorder is installed without a
/// listener and metrics can be read through [`render_metrics`].
///
/// # Errors
///
/// Returns an error if a recorder is already installed or the listener
/// cannot be started.
pub fn init_metrics(listen_port: u16) -> Result<(), BuildError> {
    let builder = PrometheusBuilder::new();

    if listen_port == 0 {
        let handle = builder.install_recorder()?;
        let _ = PROMETHEUS_HANDLE.set(handle);
    } else {
        builder
            .with_http_listener(SocketAddr::from(([0, 0, 0, 0], listen_port)))
            .install()?;
    }

    register_metrics();
    Ok(())
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` unless the recorder was installed without a listener.
#[must_use]
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(PrometheusHandle::render)
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    // Message counters
    describe_counter!(
        "trade_feed_trades_received_total",
        "Total trade records delivered to the consumer"
    );
    describe_counter!(
        "trade_feed_decode_errors_total",
        "Total inbound frames that failed to decode"
    );
    describe_counter!(
        "trade_feed_venue_notices_total",
        "Total venue control frames (acks and errors)"
    );

    // Connection metrics
    describe_counter!(
        "trade_feed_sessions_started_total",
        "Total connection sessions started"
    );
    describe_gauge!(
        "trade_feed_connection_open",
        "1 while a venue connection is open, 0 otherwise"
    );
    describe_counter!(
        "trade_feed_transport_errors_total",
        "Total transport errors by type"
    );

    // Reconnects
    describe_counter!(
        "trade_feed_reconnects_total",
        "Total reconnections scheduled by the supervisor"
    );
    describe_histogram!(
        "trade_feed_reconnect_delay_seconds",
        "Backoff delay waited before each reconnection"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for decode failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailure {
    /// Payload was not a JSON object.
    Malformed,
    /// Required field absent.
    MissingField,
    /// Numeric field invalid.
    InvalidNumber,
}

impl DecodeFailure {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::MissingField => "missing_field",
            Self::InvalidNumber => "invalid_number",
        }
    }
}

/// Record a trade delivered to the consumer.
pub fn record_trade() {
    counter!("trade_feed_trades_received_total").increment(1);
}

/// Record a decode failure.
pub fn record_decode_error(kind: DecodeFailure) {
    counter!(
        "trade_feed_decode_errors_total",
        "kind" => kind.as_str()
    )
    .increment(1);
}

/// Record a venue control frame.
pub fn record_venue_notice(is_error: bool) {
    counter!(
        "trade_feed_venue_notices_total",
        "kind" => if is_error { "error" } else { "ack" }
    )
    .increment(1);
}

/// Record a session start.
pub fn record_session_started() {
    counter!("trade_feed_sessions_started_total").increment(1);
}

/// Update the open-connection gauge.
pub fn set_connection_open(open: bool) {
    gauge!("trade_feed_connection_open").set(if open { 1.0 } else { 0.0 });
}

/// Record a transport error.
pub fn record_transport_error(error_type: &'static str) {
    counter!(
        "trade_feed_transport_errors_total",
        "error_type" => error_type
    )
    .increment(1);
}

/// Record a scheduled reconnection and its delay.
pub fn record_reconnect(delay: Duration) {
    counter!("trade_feed_reconnects_total").increment(1);
    histogram!("trade_feed_reconnect_delay_seconds").record(delay.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================
