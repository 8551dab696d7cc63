//! Venue Notices
//!
//! Informational events the venue sends on the trade stream: subscription
//! acknowledgements and venue-side errors. Neither ends a session.

use std::fmt;

/// Informational venue event surfaced to the error observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueNotice {
    /// The venue accepted a request.
    Ack {
        /// Request id the venue acknowledged.
        request_id: Option<u64>,
    },
    /// The venue rejected a request or reported a problem.
    Error {
        /// Request id the error refers to.
        request_id: Option<u64>,
        /// Venue error code.
        code: Option<i64>,
        /// Venue error message.
        message: String,
    },
}

impl VenueNotice {
    /// Check if the venue reported an error.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Request id this notice refers to.
    #[must_use]
    pub const fn request_id(&self) -> Option<u64> {
        match self {
            Self::Ack { request_id } | Self::Error { request_id, .. } => *request_id,
        }
    }
}

impl fmt::Display for VenueNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ack { request_id } => match request_id {
                Some(id) => write!(f, "request {id} acknowledged"),
                None => write!(f, "request acknowledged"),
            },
            Self::Error {
                request_id,
                code,
                message,
            } => {
                write!(f, "venue error")?;
                if let Some(code) = code {
                    write!(f, " {code}")?;
                }
                if let Some(id) = request_id {
                    write!(f, " for request {id}")?;
                }
                write!(f, ": {message}")
            }
        }
    }
}
