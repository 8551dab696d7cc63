//! Venue WebSocket Message Types
//!
//! Wire format types for the venue's trade stream.
//!
//! # Message Types
//!
//! ## Data Frames
//! - Trade event: one executed trade on a subscribed `<symbol>@trade` channel
//!
//! ## Control Frames
//! - Subscription ack: `{"result":null,"id":1}`
//! - Venue error: `{"code":2,"msg":"Invalid request"}`, optionally with `id`
//! - Wrapped venue error: `{"error":{"code":2,"msg":"Invalid request"},"id":1}`
//!   or `{"error":"Invalid request"}`
//!
//! Control frames never carry the trade fields `p`, `q` or `T`.

use serde::Deserialize;
use serde_json::Value;

use crate::domain::notice::VenueNotice;

// =============================================================================
// Trade Event Fields
// =============================================================================

/// Symbol field (string, e.g. `"ETHUSDT"`).
pub const FIELD_SYMBOL: &str = "s";

/// Price field (numeric string, e.g. `"2500.50"`).
pub const FIELD_PRICE: &str = "p";

/// Quantity field (numeric string, e.g. `"0.1234"`).
pub const FIELD_QUANTITY: &str = "q";

/// Event time field (integer milliseconds since the Unix epoch).
pub const FIELD_EVENT_TIME: &str = "T";

/// Fields whose presence marks a frame as a trade event.
pub const TRADE_FIELDS: [&str; 3] = [FIELD_PRICE, FIELD_QUANTITY, FIELD_EVENT_TIME];

/// Keys whose presence marks a frame as a control frame.
pub const CONTROL_FIELDS: [&str; 5] = ["id", "result", "error", "code", "msg"];

// =============================================================================
// Control Frames
// =============================================================================

/// Raw control frame as sent by the venue.
///
/// Every field is kept as loose JSON so that any object without trade
/// fields can be read as a control frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ControlFrame {
    /// Echo of the request id, if any.
    #[serde(default)]
    pub id: Option<Value>,

    /// Result of a successful request (usually `null`).
    #[serde(default)]
    pub result: Option<Value>,

    /// Wrapped error: a `{code, msg}` object or a bare message.
    #[serde(default)]
    pub error: Option<Value>,

    /// Top-level venue error code.
    #[serde(default)]
    pub code: Option<Value>,

    /// Top-level venue error message.
    #[serde(default)]
    pub msg: Option<Value>,
}

impl From<ControlFrame> for VenueNotice {
    fn from(frame: ControlFrame) -> Self {
        let request_id = frame.id.as_ref().and_then(Value::as_u64);

        match (frame.error, frame.code, frame.msg) {
            (Some(Value::Object(body)), _, _) => Self::Error {
                request_id,
                code: body.get("code").and_then(Value::as_i64),
                message: body.get("msg").map(message_text).unwrap_or_default(),
            },
            (Some(error), _, _) => Self::Error {
                request_id,
                code: None,
                message: message_text(&error),
            },
            (None, None, None) => Self::Ack { request_id },
            (None, code, msg) => Self::Error {
                request_id,
                code: code.as_ref().and_then(Value::as_i64),
                message: msg.as_ref().map(message_text).unwrap_or_default(),
            },
        }
    }
}

fn message_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
