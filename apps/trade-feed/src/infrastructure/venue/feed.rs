//! Consumer-Facing Feed Handle
//!
//! [`start`] validates a [`FeedConfig`], spawns a supervisor task on the
//! current Tokio runtime and returns a [`FeedHandle`]. Callbacks are
//! registered on the handle and may be swapped at any time; events that
//! arrive while no callback is registered are dropped.
//!
//! ```no_run
//! # async fn demo() -> Result<(), trade_feed::ConfigError> {
//! use trade_feed::{FeedConfig, start};
//!
//! let handle = start(FeedConfig::new("wss://stream.binance.us:9443/ws", ["ethusdt@trade"]))?;
//! handle.on_trade(|trade| println!("{} {}", trade.base_currency(), trade.price()));
//! handle.on_error(|error| eprintln!("{error}"));
//!
//! // ...
//! handle.stop().await;
//! # Ok(())
//! # }
//! ```

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{FeedError, SessionObserver, StreamConnector};
use crate::domain::streaming::TradeRecord;
use crate::domain::subscription::SubscriptionManager;
use crate::infrastructure::config::{ConfigError, FeedConfig};

use super::codec::TradeDecoder;
use super::connector::TungsteniteConnector;
use super::reconnect::ReconnectPolicy;
use super::status::{FeedSnapshot, FeedStatus};
use super::supervisor::{Supervisor, SupervisorExit};

type TradeCallback = Arc<dyn Fn(TradeRecord) + Send + Sync>;
type ErrorCallback = Arc<dyn Fn(FeedError) + Send + Sync>;

/// Consumer callbacks, shared between the handle and the session task.
#[derive(Default)]
struct Callbacks {
    on_trade: parking_lot::RwLock<Option<TradeCallback>>,
    on_error: parking_lot::RwLock<Option<ErrorCallback>>,
}

impl SessionObserver for Callbacks {
    fn on_trade(&self, trade: TradeRecord) {
        let callback = self.on_trade.read().clone();
        if let Some(callback) = callback {
            guarded("on_trade", || callback(trade));
        }
    }

    fn on_error(&self, error: FeedError) {
        let callback = self.on_error.read().clone();
        if let Some(callback) = callback {
            guarded("on_error", || callback(error));
        }
    }
}

/// A panicking consumer callback must not take the receive task down.
fn guarded(name: &'static str, f: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(f)).is_err() {
        tracing::error!(callback = name, "Consumer callback panicked");
    }
}

/// Handle to a running feed.
///
/// Dropping the handle requests shutdown without waiting for it.
pub struct FeedHandle {
    callbacks: Arc<Callbacks>,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
    task: tokio::sync::Mutex<Option<JoinHandle<SupervisorExit>>>,
}

/// Start a feed over WebSocket.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn start(config: FeedConfig) -> Result<FeedHandle, ConfigError> {
    start_with_connector(config, Arc::new(TungsteniteConnector))
}

/// Start a feed over a custom transport.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns an error if the configuration is invalid.
pub fn start_with_connector(
    config: FeedConfig,
    connector: Arc<dyn StreamConnector>,
) -> Result<FeedHandle, ConfigError> {
    config.validate()?;

    let callbacks = Arc::new(Callbacks::default());
    let status = Arc::new(FeedStatus::new());
    let cancel = CancellationToken::new();

    let supervisor = Supervisor::new(
        config.session_config(),
        SubscriptionManager::with_channels(&config.channels),
        TradeDecoder::new(config.quote_suffix.clone()),
        ReconnectPolicy::new(config.reconnect_config()),
        connector,
        Arc::clone(&callbacks) as Arc<dyn SessionObserver>,
        Arc::clone(&status),
        cancel.clone(),
    );
    let task = tokio::spawn(supervisor.run());

    Ok(FeedHandle {
        callbacks,
        status,
        cancel,
        task: tokio::sync::Mutex::new(Some(task)),
    })
}

impl FeedHandle {
    /// Register the trade callback, replacing any previous one.
    pub fn on_trade<F>(&self, callback: F)
    where
        F: Fn(TradeRecord) + Send + Sync + 'static,
    {
        *self.callbacks.on_trade.write() = Some(Arc::new(callback));
    }

    /// Register the error callback, replacing any previous one.
    ///
    /// Receives decode failures, transport failures and venue notices.
    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(FeedError) + Send + Sync + 'static,
    {
        *self.callbacks.on_error.write() = Some(Arc::new(callback));
    }

    /// Current feed status.
    #[must_use]
    pub fn status(&self) -> FeedSnapshot {
        self.status.snapshot()
    }

    /// Check if shutdown has been requested.
    #[must_use]
    pub fn is_stopping(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop the feed and wait for the connection to be released.
    ///
    /// Idempotent; concurrent callers all return after the supervisor has
    /// exited.
    pub async fn stop(&self) {
        self.cancel.cancel();

        let mut task = self.task.lock().await;
        if let Some(handle) = task.take() {
            match handle.await {
                Ok(exit) => tracing::info!(
                    sessions = exit.sessions,
                    attempt_count = exit.attempt_count,
                    "Feed stopped"
                ),
                Err(e) => tracing::error!(error = %e, "Feed supervisor task failed"),
            }
        }
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::{StreamConnection, TransportError};

    struct Refusing;

    #[async_trait]
    impl StreamConnector for Refusing {
        async fn connect(&self, _url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
            Err(TransportError::Connect("refused".to_string()))
        }
    }

    fn config() -> FeedConfig {
        FeedConfig::new("ws://venue.test/ws", ["ethusdt@trade"]).with_heartbeat(None)
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let result = start_with_connector(
            FeedConfig::new("ws://venue.test/ws", Vec::<String>::new()),
            Arc::new(Refusing),
        );
        assert!(matches!(result, Err(ConfigError::NoChannels)));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let handle = start_with_connector(config(), Arc::new(Refusing)).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        handle.stop().await;
        handle.stop().await;

        assert!(handle.is_stopping());
        assert!(handle.status().sessions_started >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_errors_reach_error_callback() {
        let handle = start_with_connector(config(), Arc::new(Refusing)).unwrap();
        let errors = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&errors);
        handle.on_error(move |error| {
            assert!(matches!(error, FeedError::Transport(_)));
            seen.fetch_add(1, Ordering::SeqCst);
        });

        // Attempts at 0s, 2s, 6s
        tokio::time::sleep(std::time::Duration::from_secs(7)).await;
        handle.stop().await;

        assert!(errors.load(Ordering::SeqCst) >= 2);
    }

    fn explode(_error: FeedError) {
        panic!("consumer bug");
    }

    #[test]
    fn panicking_callback_is_contained() {
        let callbacks = Callbacks::default();
        *callbacks.on_error.write() = Some(Arc::new(explode));

        callbacks.on_error(FeedError::Transport(TransportError::Disconnected));
    }
}
