//! Domain Layer - Core streaming types and business logic.
//!
//! This layer contains the trade record and the subscription handshake
//! types. Nothing here performs I/O.

/// Normalized trade records and decode errors.
pub mod streaming;

/// Venue acknowledgements and venue-side errors.
pub mod notice;

/// Channel set and subscribe request construction.
pub mod subscription;
