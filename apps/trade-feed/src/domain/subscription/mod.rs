//! Subscription Management Types
//!
//! Domain types for the venue subscription handshake.
//!
//! # Design
//!
//! The subscription manager tracks:
//! - The ordered, de-duplicated set of channels a feed subscribes to
//! - The request id sequence for subscribe requests
//!
//! Every physical connection sends exactly one `SubscriptionRequest`
//! built from the manager. Ids are drawn from a per-feed sequence that
//! starts at 1 and increases by one per session, so a reconnected session
//! sends id 2, the next id 3, and so on.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Serialize, Serializer, ser::SerializeStruct};

// =============================================================================
// Types
// =============================================================================

/// Subscribe method name on the wire.
pub const SUBSCRIBE_METHOD: &str = "SUBSCRIBE";

/// A channel name, `<symbol>@<streamType>` (e.g. `ethusdt@trade`).
pub type Channel = String;

// =============================================================================
// Subscription Request
// =============================================================================

/// Subscribe control frame sent once per physical connection.
///
/// # Wire Format (JSON)
/// ```json
/// {"method":"SUBSCRIBE","params":["btcusdt@trade","ethusdt@trade"],"id":1}
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRequest {
    channels: Vec<Channel>,
    request_id: u64,
}

impl SubscriptionRequest {
    /// Method name, always `SUBSCRIBE`.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        SUBSCRIBE_METHOD
    }

    /// Channels in subscription order.
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Request id.
    #[must_use]
    pub const fn request_id(&self) -> u64 {
        self.request_id
    }

    /// Serialize to the JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Serialize for SubscriptionRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("SubscriptionRequest", 3)?;
        state.serialize_field("method", SUBSCRIBE_METHOD)?;
        state.serialize_field("params", &self.channels)?;
        state.serialize_field("id", &self.request_id)?;
        state.end()
    }
}

/// Build a subscribe request from an ordered channel list.
///
/// Pure construction; channels are taken as given.
#[must_use]
pub fn build_subscription_request(channels: &[Channel], request_id: u64) -> SubscriptionRequest {
    SubscriptionRequest {
        channels: channels.to_vec(),
        request_id,
    }
}

// =============================================================================
// Request Id Sequence
// =============================================================================

/// Monotonic request id source owned by a single feed.
#[derive(Debug)]
pub struct RequestIdSequence {
    next: AtomicU64,
}

impl Default for RequestIdSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestIdSequence {
    /// Create a sequence whose first id is 1.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Take the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Peek at the id the next call will return.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Subscription Manager
// =============================================================================

/// Holds the channel set for one feed and builds subscribe requests.
///
/// Channels are lower-cased on insert and kept in first-seen order.
/// Adding a channel that is already present is a no-op. The manager does
/// not check that the venue knows a channel; the venue reports that with
/// an error frame.
#[derive(Debug, Default)]
pub struct SubscriptionManager {
    channels: Vec<Channel>,
    request_ids: RequestIdSequence,
}

impl SubscriptionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager pre-populated with `channels`.
    #[must_use]
    pub fn with_channels<I, S>(channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut manager = Self::new();
        manager.add_channels(channels);
        manager
    }

    /// Add channels, returning how many were new.
    pub fn add_channels<I, S>(&mut self, channels: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = 0;

        for channel in channels {
            let normalized = channel.as_ref().trim().to_lowercase();
            if normalized.is_empty() || self.channels.contains(&normalized) {
                continue;
            }
            self.channels.push(normalized);
            added += 1;
        }

        added
    }

    /// Configured channels in subscription order.
    #[must_use]
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Check if no channels are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Build the request for a new session, consuming one request id.
    #[must_use]
    pub fn next_request(&self) -> SubscriptionRequest {
        build_subscription_request(&self.channels, self.request_ids.next_id())
    }
}
