//! Configuration Module
//!
//! Feed configuration, loaded from the environment or built in code.

mod settings;

pub use settings::{ConfigError, DEFAULT_CHANNELS, DEFAULT_ENDPOINT_URL, FeedConfig, ServerSettings};
