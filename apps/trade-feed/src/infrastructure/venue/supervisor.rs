//! Feed Supervisor
//!
//! Keeps one logical subscription alive across physical disconnects. The
//! supervisor runs sessions back to back, one at a time, and waits out the
//! reconnect policy's delay between them. It only stops when its
//! cancellation token fires; connection failures are retried forever.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::ports::{SessionObserver, StreamConnector};
use crate::domain::subscription::SubscriptionManager;
use crate::infrastructure::metrics;

use super::codec::TradeDecoder;
use super::reconnect::ReconnectPolicy;
use super::session::{ConnectionSession, SessionConfig};
use super::status::FeedStatus;

/// Summary returned when a supervisor stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorExit {
    /// Sessions created over the supervisor's lifetime.
    pub sessions: u64,
    /// Attempt count at the time of shutdown.
    pub attempt_count: u32,
}

/// Owns the session lifecycle and the retry state for one feed.
pub struct Supervisor {
    session_config: SessionConfig,
    subscriptions: SubscriptionManager,
    decoder: Arc<TradeDecoder>,
    policy: ReconnectPolicy,
    connector: Arc<dyn StreamConnector>,
    observer: Arc<dyn SessionObserver>,
    status: Arc<FeedStatus>,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor. Nothing connects until [`Supervisor::run`].
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_config: SessionConfig,
        subscriptions: SubscriptionManager,
        decoder: TradeDecoder,
        policy: ReconnectPolicy,
        connector: Arc<dyn StreamConnector>,
        observer: Arc<dyn SessionObserver>,
        status: Arc<FeedStatus>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            session_config,
            subscriptions,
            decoder: Arc::new(decoder),
            policy,
            connector,
            observer,
            status,
            cancel,
        }
    }

    /// Run sessions until cancelled.
    pub async fn run(mut self) -> SupervisorExit {
        let mut sessions: u64 = 0;

        tracing::info!(
            url = %self.session_config.url,
            channels = ?self.subscriptions.channels(),
            "Feed supervisor started"
        );

        while !self.cancel.is_cancelled() {
            sessions += 1;
            let session = ConnectionSession::new(
                sessions,
                self.session_config.clone(),
                self.subscriptions.next_request(),
                Arc::clone(&self.decoder),
                Arc::clone(&self.observer),
                Arc::clone(&self.status),
            );

            let report = session.run(self.connector.as_ref(), &self.cancel).await;
            if report.shutdown || self.cancel.is_cancelled() {
                break;
            }

            let delay = self.policy.on_session_closed(report.open_duration());
            self.status.set_attempt_count(self.policy.attempt_count());
            metrics::record_reconnect(delay);

            tracing::info!(
                session_id = report.session_id,
                attempt = self.policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting"
            );

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        tracing::info!(sessions, "Feed supervisor stopped");

        SupervisorExit {
            sessions,
            attempt_count: self.policy.attempt_count(),
        }
    }
}
