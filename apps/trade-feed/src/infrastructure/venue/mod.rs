//! Venue WebSocket Adapter
//!
//! Everything needed to keep one trade subscription alive against the
//! venue's streaming endpoint.
//!
//! - `codec` / `messages`: wire format and trade decoding
//! - `session`: one physical connection, from connect to close
//! - `supervisor`: reconnect loop with exponential backoff
//! - `heartbeat` / `reconnect`: liveness and retry policies
//! - `connector`: `tokio-tungstenite` transport
//! - `feed`: consumer-facing handle

pub mod codec;
pub mod connector;
pub mod feed;
pub mod heartbeat;
pub mod messages;
pub mod reconnect;
pub mod session;
pub mod status;
pub mod supervisor;

pub use codec::{DecodedFrame, TradeDecoder};
pub use connector::TungsteniteConnector;
pub use feed::{FeedHandle, start, start_with_connector};
pub use heartbeat::HeartbeatConfig;
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use session::{ConnectionSession, SessionConfig, SessionReport};
pub use status::{FeedSnapshot, FeedStatus, SessionState};
pub use supervisor::{Supervisor, SupervisorExit};
