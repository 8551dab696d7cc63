//! Trade Stream Codec
//!
//! Decodes venue text frames into normalized `TradeRecord`s.
//!
//! Decoding is pure and never panics. Every failure is a typed
//! [`DecodeError`] carrying the offending payload so the caller can log it
//! and move on to the next frame.
//!
//! # Frame Classification
//!
//! - Objects carrying `p`, `q` or `T` are trade events
//! - Objects carrying none of those but an `id`, `result`, `error`, `code`
//!   or `msg` key are control frames (subscription acks, venue errors)
//! - Everything else is decoded as a trade and fails with `MissingField`
//!
//! Frames from the venue's combined-stream endpoint arrive wrapped as
//! `{"stream":"ethusdt@trade","data":{...}}`; the envelope is unwrapped
//! before classification when `data` is an object.

use std::str::FromStr;

use chrono::DateTime;
use rust_decimal::Decimal;
use serde_json::{Map, Value};

use crate::domain::notice::VenueNotice;
use crate::domain::streaming::{DEFAULT_QUOTE_SUFFIX, DecodeError, TradeRecord};

use super::messages::{
    CONTROL_FIELDS, ControlFrame, FIELD_EVENT_TIME, FIELD_PRICE, FIELD_QUANTITY, FIELD_SYMBOL,
    TRADE_FIELDS,
};

/// A successfully classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFrame {
    /// Trade event.
    Trade(TradeRecord),
    /// Control frame (ack or venue error).
    Notice(VenueNotice),
}

/// JSON decoder for the venue trade stream.
#[derive(Debug, Clone)]
pub struct TradeDecoder {
    quote_suffix: String,
}

impl Default for TradeDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_SUFFIX)
    }
}

impl TradeDecoder {
    /// Create a decoder that strips `quote_suffix` to derive base currencies.
    #[must_use]
    pub fn new(quote_suffix: impl Into<String>) -> Self {
        Self {
            quote_suffix: quote_suffix.into(),
        }
    }

    /// Quote suffix used for base-currency derivation.
    #[must_use]
    pub fn quote_suffix(&self) -> &str {
        &self.quote_suffix
    }

    /// Decode a trade event.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload`, `MissingField` or `InvalidNumericField`.
    pub fn decode(&self, payload: &str) -> Result<TradeRecord, DecodeError> {
        let object = parse_object(payload)?;
        self.decode_trade(&object, payload)
    }

    /// Classify and decode a text frame.
    ///
    /// # Errors
    ///
    /// Returns a `DecodeError` if the frame is neither a valid trade nor a
    /// control frame.
    pub fn decode_frame(&self, payload: &str) -> Result<DecodedFrame, DecodeError> {
        let object = parse_object(payload)?;

        if is_control_frame(&object) {
            let frame: ControlFrame =
                serde_json::from_value(Value::Object(object)).map_err(|e| {
                    DecodeError::MalformedPayload {
                        reason: format!("invalid control frame: {e}"),
                        payload: payload.to_string(),
                    }
                })?;
            return Ok(DecodedFrame::Notice(frame.into()));
        }

        self.decode_trade(&object, payload).map(DecodedFrame::Trade)
    }

    /// Classify and decode a binary frame holding UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` if the bytes are not UTF-8, otherwise as
    /// [`Self::decode_frame`].
    pub fn decode_frame_bytes(&self, data: &[u8]) -> Result<DecodedFrame, DecodeError> {
        match std::str::from_utf8(data) {
            Ok(text) => self.decode_frame(text),
            Err(e) => Err(DecodeError::MalformedPayload {
                reason: format!("binary frame is not UTF-8: {e}"),
                payload: String::from_utf8_lossy(data).into_owned(),
            }),
        }
    }

    fn decode_trade(
        &self,
        object: &Map<String, Value>,
        payload: &str,
    ) -> Result<TradeRecord, DecodeError> {
        let price = required(object, FIELD_PRICE, payload)?;
        let quantity = required(object, FIELD_QUANTITY, payload)?;
        let event_time = required(object, FIELD_EVENT_TIME, payload)?;
        let symbol = required(object, FIELD_SYMBOL, payload)?;

        let Some(symbol) = symbol.as_str() else {
            return Err(DecodeError::MalformedPayload {
                reason: format!("field `{FIELD_SYMBOL}` is not a string"),
                payload: payload.to_string(),
            });
        };

        let price = non_negative_decimal(price, FIELD_PRICE, payload)?;
        let quantity = non_negative_decimal(quantity, FIELD_QUANTITY, payload)?;
        let event_time = timestamp_millis(event_time, payload)?;

        TradeRecord::new(symbol, &self.quote_suffix, price, quantity, event_time).ok_or_else(
            || DecodeError::InvalidNumericField {
                field: FIELD_PRICE,
                reason: "negative value".to_string(),
                payload: payload.to_string(),
            },
        )
    }
}

fn parse_object(payload: &str) -> Result<Map<String, Value>, DecodeError> {
    let value: Value =
        serde_json::from_str(payload.trim()).map_err(|e| DecodeError::MalformedPayload {
            reason: e.to_string(),
            payload: payload.to_string(),
        })?;

    match value {
        Value::Object(mut object) => {
            let enveloped = object.contains_key("stream")
                && matches!(object.get("data"), Some(Value::Object(_)));
            if enveloped && let Some(Value::Object(inner)) = object.remove("data") {
                return Ok(inner);
            }
            Ok(object)
        }
        other => Err(DecodeError::MalformedPayload {
            reason: format!("expected JSON object, got {}", json_kind(&other)),
            payload: payload.to_string(),
        }),
    }
}

fn is_control_frame(object: &Map<String, Value>) -> bool {
    !TRADE_FIELDS.iter().any(|field| object.contains_key(*field))
        && CONTROL_FIELDS.iter().any(|field| object.contains_key(*field))
}

fn required<'a>(
    object: &'a Map<String, Value>,
    field: &'static str,
    payload: &str,
) -> Result<&'a Value, DecodeError> {
    match object.get(field) {
        Some(Value::Null) | None => Err(DecodeError::MissingField {
            field,
            payload: payload.to_string(),
        }),
        Some(value) => Ok(value),
    }
}

fn non_negative_decimal(
    value: &Value,
    field: &'static str,
    payload: &str,
) -> Result<Decimal, DecodeError> {
    let invalid = |reason: String| DecodeError::InvalidNumericField {
        field,
        reason,
        payload: payload.to_string(),
    };

    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        other => return Err(invalid(format!("expected number, got {}", json_kind(other)))),
    };

    let parsed = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| invalid(format!("`{text}` is not a number")))?;

    if parsed < Decimal::ZERO {
        return Err(invalid(format!("`{text}` is negative")));
    }

    Ok(parsed)
}

fn timestamp_millis(value: &Value, payload: &str) -> Result<DateTime<chrono::Utc>, DecodeError> {
    value
        .as_i64()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| DecodeError::InvalidNumericField {
            field: FIELD_EVENT_TIME,
            reason: format!("`{value}` is not a millisecond timestamp"),
            payload: payload.to_string(),
        })
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
