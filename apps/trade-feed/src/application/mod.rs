//! Application Layer - Port definitions.
//!
//! This layer defines how the feed core talks to the transport and to the
//! consumer, without naming any concrete adapter.

/// Port interfaces for the transport and session observers.
pub mod ports;
