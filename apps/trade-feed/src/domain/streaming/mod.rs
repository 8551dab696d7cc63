//! Market Data Streaming Types
//!
//! Core domain type for executed trades. `TradeRecord` is codec-agnostic
//! and is the canonical representation handed to feed consumers;
//! `DecodeError` is what a codec reports when a payload is not one.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Default quote-currency suffix stripped from symbols.
pub const DEFAULT_QUOTE_SUFFIX: &str = "USDT";

// =============================================================================
// Trade Record
// =============================================================================

/// A single executed trade, normalized from a venue trade event.
///
/// Price and quantity are never negative. The record is immutable: fields
/// are only readable through accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeRecord {
    symbol: String,
    base_currency: String,
    price: Decimal,
    quantity: Decimal,
    event_time: DateTime<Utc>,
}

impl TradeRecord {
    /// Build a trade record, deriving the base currency from `symbol`.
    ///
    /// Returns `None` if `price` or `quantity` is negative.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        quote_suffix: &str,
        price: Decimal,
        quantity: Decimal,
        event_time: DateTime<Utc>,
    ) -> Option<Self> {
        if price < Decimal::ZERO || quantity < Decimal::ZERO {
            return None;
        }

        let symbol = symbol.into();
        let base_currency = base_currency(&symbol, quote_suffix);

        Some(Self {
            symbol,
            base_currency,
            price,
            quantity,
            event_time,
        })
    }

    /// Venue symbol, e.g. `ETHUSDT`.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Base currency label, e.g. `ETH` for `ETHUSDT`.
    #[must_use]
    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Trade price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Trade quantity.
    #[must_use]
    pub const fn quantity(&self) -> Decimal {
        self.quantity
    }

    /// Event time on the venue clock (millisecond precision).
    #[must_use]
    pub const fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }
}

// =============================================================================
// Decode Errors
// =============================================================================

/// Maximum payload characters shown in error messages.
const PREVIEW_CHARS: usize = 120;

/// Failure to turn a venue payload into a [`TradeRecord`].
///
/// Always recoverable; the stream continues with the next payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not a JSON object.
    #[error("malformed payload ({reason}): {}", preview(.payload))]
    MalformedPayload {
        /// Why parsing failed.
        reason: String,
        /// Raw payload.
        payload: String,
    },

    /// A required trade field is absent.
    #[error("missing field `{field}`: {}", preview(.payload))]
    MissingField {
        /// Wire name of the missing field.
        field: &'static str,
        /// Raw payload.
        payload: String,
    },

    /// A numeric field is not a valid non-negative number.
    #[error("invalid numeric field `{field}` ({reason}): {}", preview(.payload))]
    InvalidNumericField {
        /// Wire name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
        /// Raw payload.
        payload: String,
    },
}

impl DecodeError {
    /// Raw payload that failed to decode.
    #[must_use]
    pub fn payload(&self) -> &str {
        match self {
            Self::MalformedPayload { payload, .. }
            | Self::MissingField { payload, .. }
            | Self::InvalidNumericField { payload, .. } => payload,
        }
    }
}

fn preview(payload: &str) -> String {
    if payload.chars().count() <= PREVIEW_CHARS {
        payload.to_string()
    } else {
        let head: String = payload.chars().take(PREVIEW_CHARS).collect();
        format!("{head}...")
    }
}

/// Derive the base currency label from a symbol.
///
/// The symbol is uppercased and a trailing `quote_suffix` (matched
/// case-insensitively) is removed. Symbols without the suffix, or that
/// consist only of the suffix, come back uppercased and otherwise intact.
#[must_use]
pub fn base_currency(symbol: &str, quote_suffix: &str) -> String {
    let upper = symbol.to_uppercase();
    let suffix = quote_suffix.to_uppercase();

    if suffix.is_empty() {
        return upper;
    }

    match upper.strip_suffix(suffix.as_str()) {
        Some(base) if !base.is_empty() => base.to_string(),
        _ => upper,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn base_currency_strips_suffix() {
        assert_eq!(base_currency("ETHUSDT", "USDT"), "ETH");
        assert_eq!(base_currency("btcusdt", "USDT"), "BTC");
        assert_eq!(base_currency("solusdc", "usdc"), "SOL");
    }

    #[test]
    fn base_currency_without_suffix_is_unchanged() {
        assert_eq!(base_currency("BTCUSD", "USDT"), "BTCUSD");
        assert_eq!(base_currency("ethbtc", "USDT"), "ETHBTC");
    }

    #[test]
    fn base_currency_keeps_bare_suffix_symbol() {
        assert_eq!(base_currency("USDT", "USDT"), "USDT");
        assert_eq!(base_currency("ETHUSDT", ""), "ETHUSDT");
    }

    #[test]
    fn trade_record_accessors() {
        let trade = TradeRecord::new(
            "ETHUSDT",
            DEFAULT_QUOTE_SUFFIX,
            dec("2500.50"),
            dec("0.1234"),
            at(1_700_000_000_000),
        )
        .unwrap();

        assert_eq!(trade.symbol(), "ETHUSDT");
        assert_eq!(trade.base_currency(), "ETH");
        assert_eq!(trade.price(), dec("2500.50"));
        assert_eq!(trade.quantity(), dec("0.1234"));
        assert_eq!(trade.event_time().to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn trade_record_rejects_negative_values() {
        let now = at(0);
        assert!(TradeRecord::new("ETHUSDT", "USDT", dec("-1"), dec("1"), now).is_none());
        assert!(TradeRecord::new("ETHUSDT", "USDT", dec("1"), dec("-0.5"), now).is_none());
    }

    #[test]
    fn trade_record_accepts_zero() {
        let trade = TradeRecord::new("ETHUSDT", "USDT", dec("0"), dec("0"), at(0));
        assert!(trade.is_some());
    }
}
