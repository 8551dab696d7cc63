//! Port Interfaces
//!
//! Defines the interfaces (ports) between the feed core and the outside
//! world following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `StreamConnector` / `StreamConnection`: one physical streaming
//!   connection to the venue
//!
//! ## Driver Ports (Inbound)
//!
//! - `SessionObserver`: lifecycle and data callbacks raised by a session

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::notice::VenueNotice;
use crate::domain::streaming::{DecodeError, TradeRecord};

// =============================================================================
// Errors
// =============================================================================

/// Transport-level failures. Always recoverable by reconnecting.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connection was not established within the connect timeout.
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Sending a frame failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading from the connection failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// The stream ended without a close frame.
    #[error("connection dropped without close frame")]
    Disconnected,

    /// No pong or inbound frame within the heartbeat timeout.
    #[error("heartbeat timeout after {0:?}")]
    HeartbeatTimeout(Duration),
}

impl TransportError {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::ConnectTimeout(_) => "connect_timeout",
            Self::Send(_) => "send",
            Self::Receive(_) => "receive",
            Self::Disconnected => "disconnected",
            Self::HeartbeatTimeout(_) => "heartbeat_timeout",
        }
    }
}

/// Events delivered to a feed's error observer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// A payload could not be decoded; the stream continues.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The connection failed; the supervisor reconnects.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Informational venue control frame (subscription ack or venue error).
    #[error("venue notice: {0}")]
    VenueNotice(VenueNotice),
}

impl FeedError {
    /// Check if this event is informational rather than a fault.
    #[must_use]
    pub const fn is_informational(&self) -> bool {
        matches!(self, Self::VenueNotice(_))
    }
}

// =============================================================================
// Transport Ports
// =============================================================================

/// Close code and reason reported by a close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close status code.
    pub code: u16,
    /// Close reason text (may be empty).
    pub reason: String,
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.reason)
        }
    }
}

/// Frames read from a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// UTF-8 text payload.
    Text(String),
    /// Binary payload.
    Binary(Vec<u8>),
    /// Ping from the venue; must be answered with a pong.
    Ping(Vec<u8>),
    /// Pong answering one of our pings.
    Pong(Vec<u8>),
    /// Close frame from the venue.
    Close(Option<CloseInfo>),
}

/// Frames written to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// UTF-8 text payload.
    Text(String),
    /// Heartbeat ping.
    Ping(Vec<u8>),
    /// Reply to a venue ping.
    Pong(Vec<u8>),
}

/// Opens physical streaming connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Open a connection to `url`.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Connect` if the handshake fails.
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError>;
}

/// One open physical connection. Dropping it releases the socket.
#[async_trait]
pub trait StreamConnection: Send {
    /// Send a frame and flush it.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Send` if the write fails.
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError>;

    /// Read the next frame. `None` means the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>>;

    /// Start an orderly close by sending a close frame.
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Send` if the close frame cannot be written.
    async fn close(&mut self) -> Result<(), TransportError>;
}

// =============================================================================
// Session Observer
// =============================================================================

/// Callbacks raised by a connection session.
///
/// Ordering: `on_open` precedes any `on_trade`; trades arrive in wire
/// order; `on_close` fires exactly once and is always last. All methods run
/// on the session's I/O task and must not block.
pub trait SessionObserver: Send + Sync {
    /// The connection is open and the subscribe request has been sent.
    fn on_open(&self, session_id: u64) {
        let _ = session_id;
    }

    /// A trade was decoded.
    fn on_trade(&self, trade: TradeRecord);

    /// A decode failure, transport failure or venue notice occurred.
    fn on_error(&self, error: FeedError);

    /// The session reached `Closed`.
    fn on_close(&self, close: Option<CloseInfo>) {
        let _ = close;
    }
}
