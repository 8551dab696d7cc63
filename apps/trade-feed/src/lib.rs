#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Trade Feed - Resilient Venue Trade Stream Client
//!
//! Maintains one WebSocket connection to a market-data venue, subscribes to
//! a set of `<symbol>@trade` channels and hands normalized trade records to
//! a consumer callback. Disconnects are retried forever with exponential
//! backoff; only an explicit stop ends the feed.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core streaming types
//!   - `streaming`: Normalized trade records and decode errors
//!   - `notice`: Venue acknowledgements and venue errors
//!   - `subscription`: Channel set and subscribe requests
//!
//! - **Application**: Port definitions
//!   - `ports`: Transport connector/connection, session observer, errors
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `venue`: Decoder, session, supervisor, WebSocket connector, feed handle
//!   - `config`: Configuration from code or environment
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Tracing subscriber and OTLP export
//!
//! # Data Flow
//!
//! ```text
//! Supervisor ──► Session ──► subscribe ──► Venue WS
//!                   │
//!                   ▼
//!             inbound frames ──► Decoder ──► on_trade / on_error
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core streaming types with no external dependencies.
pub mod domain;

/// Application layer - Port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::notice::VenueNotice;
pub use domain::streaming::{DEFAULT_QUOTE_SUFFIX, DecodeError, TradeRecord, base_currency};
pub use domain::subscription::{
    RequestIdSequence, SubscriptionManager, SubscriptionRequest, build_subscription_request,
};

// Ports
pub use application::ports::{
    CloseInfo, FeedError, InboundFrame, OutboundFrame, SessionObserver, StreamConnection,
    StreamConnector, TransportError,
};

// Venue adapter
pub use infrastructure::venue::{
    DecodedFrame, FeedHandle, FeedSnapshot, HeartbeatConfig, ReconnectConfig, ReconnectPolicy,
    SessionState, TradeDecoder, TungsteniteConnector, start, start_with_connector,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, FeedConfig, ServerSettings};

// Metrics
pub use infrastructure::metrics::{init_metrics, render_metrics};

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
