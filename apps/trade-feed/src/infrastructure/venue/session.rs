//! Connection Session
//!
//! One session owns exactly one physical connection, from the connect
//! attempt to the final close. It sends the subscribe request as soon as
//! the connection opens, decodes inbound frames in arrival order and turns
//! every fault into an observer callback. It never retries; that is the
//! supervisor's job.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    CloseInfo, FeedError, InboundFrame, OutboundFrame, SessionObserver, StreamConnection,
    StreamConnector, TransportError,
};
use crate::domain::streaming::DecodeError;
use crate::domain::subscription::SubscriptionRequest;
use crate::infrastructure::metrics::{self, DecodeFailure};

use super::codec::{DecodedFrame, TradeDecoder};
use super::heartbeat::{HeartbeatAction, HeartbeatConfig, HeartbeatMonitor};
use super::status::{FeedStatus, SessionState};

/// Connection parameters shared by every session of a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Venue endpoint.
    pub url: String,
    /// Upper bound on the connect handshake.
    pub connect_timeout: Duration,
    /// Upper bound on the orderly close on shutdown.
    pub close_timeout: Duration,
    /// Client heartbeat, `None` to disable.
    pub heartbeat: Option<HeartbeatConfig>,
}

impl SessionConfig {
    /// Create a configuration with default timeouts and heartbeat.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            close_timeout: Duration::from_secs(5),
            heartbeat: Some(HeartbeatConfig::default()),
        }
    }
}

/// Outcome of one finished session, handed back to the supervisor.
#[derive(Debug, Clone)]
pub struct SessionReport {
    /// Session sequence number within the feed.
    pub session_id: u64,
    /// Id of the subscribe request this session sent (or would have sent).
    pub request_id: u64,
    /// When the session reached `Open`.
    pub opened_at: Option<Instant>,
    /// When the session left `Open`, before any close handshake.
    pub left_open_at: Option<Instant>,
    /// When the session reached `Closed`.
    pub closed_at: Instant,
    /// Close frame received from the venue.
    pub close: Option<CloseInfo>,
    /// Transport fault that ended the session.
    pub error: Option<TransportError>,
    /// The session ended because shutdown was requested.
    pub shutdown: bool,
    /// Trades delivered during the session.
    pub trades: u64,
    /// Frames that failed to decode during the session.
    pub decode_errors: u64,
}

impl SessionReport {
    fn new(session_id: u64, request_id: u64) -> Self {
        Self {
            session_id,
            request_id,
            opened_at: None,
            left_open_at: None,
            closed_at: Instant::now(),
            close: None,
            error: None,
            shutdown: false,
            trades: 0,
            decode_errors: 0,
        }
    }

    /// How long the session stayed open, `None` if it never opened.
    ///
    /// Time spent in `Closing` does not count.
    #[must_use]
    pub fn open_duration(&self) -> Option<Duration> {
        let left = self.left_open_at.unwrap_or(self.closed_at);
        self.opened_at
            .map(|opened| left.saturating_duration_since(opened))
    }
}

/// Why the receive loop stopped.
enum Exit {
    Shutdown,
    Remote(Option<CloseInfo>),
    Failed(TransportError),
}

/// One event picked by the receive loop's `select!`.
enum LoopEvent {
    Shutdown,
    Heartbeat(HeartbeatAction),
    Frame(Option<Result<InboundFrame, TransportError>>),
}

/// A single-use connection attempt.
pub struct ConnectionSession {
    id: u64,
    config: SessionConfig,
    request: SubscriptionRequest,
    decoder: Arc<TradeDecoder>,
    observer: Arc<dyn SessionObserver>,
    status: Arc<FeedStatus>,
    state: SessionState,
    left_open_at: Option<Instant>,
}

impl ConnectionSession {
    /// Create a session in the `Connecting` state.
    #[must_use]
    pub fn new(
        id: u64,
        config: SessionConfig,
        request: SubscriptionRequest,
        decoder: Arc<TradeDecoder>,
        observer: Arc<dyn SessionObserver>,
        status: Arc<FeedStatus>,
    ) -> Self {
        Self {
            id,
            config,
            request,
            decoder,
            observer,
            status,
            state: SessionState::Connecting,
            left_open_at: None,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Run the session to completion.
    ///
    /// Returns once the connection has been released and `on_close` has
    /// fired. Cancellation is honored while connecting and while open.
    pub async fn run(
        mut self,
        connector: &dyn StreamConnector,
        cancel: &CancellationToken,
    ) -> SessionReport {
        let mut report = SessionReport::new(self.id, self.request.request_id());
        self.status.set_state(SessionState::Connecting);
        self.status.increment_sessions();
        metrics::record_session_started();

        tracing::info!(
            session_id = self.id,
            url = %self.config.url,
            "Connecting to venue"
        );

        let connect = tokio::time::timeout(
            self.config.connect_timeout,
            connector.connect(&self.config.url),
        );
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = connect => Some(result),
        };

        let connection = match outcome {
            None => {
                tracing::info!(session_id = self.id, "Shutdown requested while connecting");
                report.shutdown = true;
                self.transition(SessionState::Closed);
                return self.finish(report);
            }
            Some(Ok(Ok(connection))) => connection,
            Some(Ok(Err(error))) => {
                self.fail(&mut report, error);
                return self.finish(report);
            }
            Some(Err(_elapsed)) => {
                let timeout = self.config.connect_timeout;
                self.fail(&mut report, TransportError::ConnectTimeout(timeout));
                return self.finish(report);
            }
        };

        self.run_open(connection, cancel, &mut report).await;
        self.finish(report)
    }

    /// Drive an established connection until it closes.
    async fn run_open(
        &mut self,
        mut connection: Box<dyn StreamConnection>,
        cancel: &CancellationToken,
        report: &mut SessionReport,
    ) {
        self.transition(SessionState::Open);
        report.opened_at = Some(Instant::now());
        metrics::set_connection_open(true);

        // The subscribe frame must be flushed before the first read
        if let Err(error) = self.send_subscribe(connection.as_mut()).await {
            self.fail(report, error);
            return;
        }
        self.observer.on_open(self.id);

        let exit = self.receive_loop(connection.as_mut(), cancel, report).await;

        match exit {
            Exit::Shutdown => {
                tracing::info!(session_id = self.id, "Shutdown requested, closing connection");
                report.shutdown = true;
                self.transition(SessionState::Closing);
                self.close_bounded(connection.as_mut()).await;
                self.transition(SessionState::Closed);
            }
            Exit::Remote(close) => {
                tracing::info!(
                    session_id = self.id,
                    close = ?close.as_ref().map(ToString::to_string),
                    "Venue closed connection"
                );
                self.transition(SessionState::Closing);
                self.close_bounded(connection.as_mut()).await;
                self.transition(SessionState::Closed);
                report.close = close;
            }
            Exit::Failed(error) => self.fail(report, error),
        }

        drop(connection);
    }

    async fn send_subscribe(
        &self,
        connection: &mut dyn StreamConnection,
    ) -> Result<(), TransportError> {
        let json = self
            .request
            .to_json()
            .map_err(|e| TransportError::Send(format!("failed to serialize subscribe: {e}")))?;

        tracing::debug!(
            session_id = self.id,
            request_id = self.request.request_id(),
            channels = ?self.request.channels(),
            "Sending subscribe request"
        );

        connection.send(OutboundFrame::Text(json)).await?;

        tracing::info!(
            session_id = self.id,
            request_id = self.request.request_id(),
            channel_count = self.request.channels().len(),
            "Subscribe request sent"
        );
        Ok(())
    }

    async fn receive_loop(
        &self,
        connection: &mut dyn StreamConnection,
        cancel: &CancellationToken,
        report: &mut SessionReport,
    ) -> Exit {
        let mut heartbeat = self.config.heartbeat.clone().map(HeartbeatMonitor::new);

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => LoopEvent::Shutdown,
                action = next_heartbeat(heartbeat.as_mut()) => LoopEvent::Heartbeat(action),
                frame = connection.next_frame() => LoopEvent::Frame(frame),
            };

            match event {
                LoopEvent::Shutdown => return Exit::Shutdown,
                LoopEvent::Heartbeat(HeartbeatAction::SendPing) => {
                    if let Err(error) = connection.send(OutboundFrame::Ping(Vec::new())).await {
                        return Exit::Failed(error);
                    }
                }
                LoopEvent::Heartbeat(HeartbeatAction::TimedOut(timeout)) => {
                    return Exit::Failed(TransportError::HeartbeatTimeout(timeout));
                }
                LoopEvent::Frame(None) => return Exit::Failed(TransportError::Disconnected),
                LoopEvent::Frame(Some(Err(error))) => return Exit::Failed(error),
                LoopEvent::Frame(Some(Ok(frame))) => {
                    if let Some(monitor) = heartbeat.as_mut() {
                        monitor.record_activity();
                    }

                    match frame {
                        InboundFrame::Text(text) => {
                            self.dispatch(self.decoder.decode_frame(&text), report);
                        }
                        InboundFrame::Binary(data) => {
                            self.dispatch(self.decoder.decode_frame_bytes(&data), report);
                        }
                        InboundFrame::Ping(data) => {
                            if let Err(error) = connection.send(OutboundFrame::Pong(data)).await {
                                return Exit::Failed(error);
                            }
                        }
                        InboundFrame::Pong(_) => {}
                        InboundFrame::Close(close) => return Exit::Remote(close),
                    }
                }
            }
        }
    }

    fn dispatch(&self, decoded: Result<DecodedFrame, DecodeError>, report: &mut SessionReport) {
        match decoded {
            Ok(DecodedFrame::Trade(trade)) => {
                report.trades += 1;
                self.status.increment_trades();
                metrics::record_trade();
                self.observer.on_trade(trade);
            }
            Ok(DecodedFrame::Notice(notice)) => {
                if notice.is_error() {
                    tracing::warn!(session_id = self.id, %notice, "Venue reported an error");
                } else {
                    tracing::info!(session_id = self.id, %notice, "Venue notice");
                }
                self.status.increment_notices();
                metrics::record_venue_notice(notice.is_error());
                self.observer.on_error(FeedError::VenueNotice(notice));
            }
            Err(error) => {
                tracing::warn!(session_id = self.id, %error, "Failed to decode venue frame");
                report.decode_errors += 1;
                self.status.increment_decode_errors();
                metrics::record_decode_error(decode_failure(&error));
                self.observer.on_error(FeedError::Decode(error));
            }
        }
    }

    async fn close_bounded(&self, connection: &mut dyn StreamConnection) {
        match tokio::time::timeout(self.config.close_timeout, connection.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::debug!(session_id = self.id, error = %e, "Close handshake failed");
            }
            Err(_) => {
                tracing::debug!(session_id = self.id, "Close handshake timed out");
            }
        }
    }

    /// Report a transport fault and move straight to `Closed`.
    fn fail(&mut self, report: &mut SessionReport, error: TransportError) {
        tracing::warn!(
            session_id = self.id,
            state = %self.state,
            error = %error,
            "Session failed"
        );
        metrics::record_transport_error(error.kind());
        self.status.set_error(error.to_string());
        self.observer.on_error(FeedError::Transport(error.clone()));
        self.transition(SessionState::Closed);
        report.error = Some(error);
    }

    fn transition(&mut self, next: SessionState) {
        if !self.state.can_transition_to(next) {
            tracing::debug!(
                session_id = self.id,
                from = %self.state,
                to = %next,
                "Ignoring illegal session transition"
            );
            return;
        }

        tracing::debug!(session_id = self.id, from = %self.state, to = %next, "Session transition");
        if self.state == SessionState::Open {
            self.left_open_at = Some(Instant::now());
        }
        self.state = next;
        self.status.set_state(next);
    }

    fn finish(self, mut report: SessionReport) -> SessionReport {
        report.closed_at = Instant::now();
        report.left_open_at = self.left_open_at;
        if report.opened_at.is_some() {
            metrics::set_connection_open(false);
        }

        tracing::info!(
            session_id = self.id,
            open_secs = report.open_duration().map(|d| d.as_secs_f64()),
            trades = report.trades,
            decode_errors = report.decode_errors,
            "Session closed"
        );

        self.observer.on_close(report.close.clone());
        report
    }
}

async fn next_heartbeat(monitor: Option<&mut HeartbeatMonitor>) -> HeartbeatAction {
    match monitor {
        Some(monitor) => monitor.tick().await,
        None => std::future::pending().await,
    }
}

const fn decode_failure(error: &DecodeError) -> DecodeFailure {
    match error {
        DecodeError::MalformedPayload { .. } => DecodeFailure::Malformed,
        DecodeError::MissingField { .. } => DecodeFailure::MissingField,
        DecodeError::InvalidNumericField { .. } => DecodeFailure::InvalidNumber,
    }
}
