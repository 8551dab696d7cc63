//! Shared test transport: a scripted in-memory connector.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use trade_feed::{
    FeedConfig, InboundFrame, OutboundFrame, StreamConnection, StreamConnector, TransportError,
};

/// Ordered record of everything the transport and the consumer saw.
pub type Log = Arc<Mutex<Vec<String>>>;

pub const ETH_TRADE: &str = r#"{"p":"2500.50","q":"0.1234","T":1700000000000,"s":"ETHUSDT"}"#;

/// What one connect attempt does.
pub enum Script {
    /// Fail the handshake.
    Refuse,
    /// Never complete the handshake.
    Hang,
    /// Open, deliver `frames`, then drop after `hold` (or stay open forever).
    Open {
        frames: Vec<InboundFrame>,
        hold: Option<Duration>,
    },
}

impl Script {
    pub fn open_forever(frames: &[&str]) -> Self {
        Self::Open {
            frames: frames.iter().map(|f| text(f)).collect(),
            hold: None,
        }
    }

    pub fn open_for(hold: Duration, frames: &[&str]) -> Self {
        Self::Open {
            frames: frames.iter().map(|f| text(f)).collect(),
            hold: Some(hold),
        }
    }
}

/// Behavior once every script has been used.
#[derive(Clone, Copy)]
pub enum Exhausted {
    Refuse,
    Hang,
}

pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<Script>>,
    exhausted: Exhausted,
    connects: Mutex<Vec<Instant>>,
    log: Log,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<Script>, exhausted: Exhausted, log: &Log) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            exhausted,
            connects: Mutex::new(Vec::new()),
            log: Arc::clone(log),
        })
    }

    /// Instants of every connect attempt so far.
    pub fn connects(&self) -> Vec<Instant> {
        self.connects.lock().clone()
    }
}

#[async_trait]
impl StreamConnector for ScriptedConnector {
    async fn connect(&self, _url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        self.connects.lock().push(Instant::now());
        let script = self.scripts.lock().pop_front();
        let script = script.unwrap_or(match self.exhausted {
            Exhausted::Refuse => Script::Refuse,
            Exhausted::Hang => Script::Hang,
        });

        match script {
            Script::Refuse => Err(TransportError::Connect("connection refused".to_string())),
            Script::Hang => std::future::pending().await,
            Script::Open { frames, hold } => Ok(Box::new(ScriptedConnection {
                frames: frames.into(),
                hold,
                log: Arc::clone(&self.log),
            })),
        }
    }
}

struct ScriptedConnection {
    frames: VecDeque<InboundFrame>,
    hold: Option<Duration>,
    log: Log,
}

#[async_trait]
impl StreamConnection for ScriptedConnection {
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let entry = match frame {
            OutboundFrame::Text(text) => format!("send:{text}"),
            OutboundFrame::Ping(_) => "ping".to_string(),
            OutboundFrame::Pong(_) => "pong".to_string(),
        };
        self.log.lock().push(entry);
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        if let Some(frame) = self.frames.pop_front() {
            return Some(Ok(frame));
        }
        match self.hold {
            Some(hold) => {
                tokio::time::sleep(hold).await;
                self.hold = Some(Duration::ZERO);
                None
            }
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.log.lock().push("close".to_string());
        Ok(())
    }
}

impl Drop for ScriptedConnection {
    fn drop(&mut self) {
        self.log.lock().push("released".to_string());
    }
}

pub fn text(json: &str) -> InboundFrame {
    InboundFrame::Text(json.to_string())
}

/// Deterministic configuration: no jitter, no heartbeat.
pub fn config(channels: &[&str]) -> FeedConfig {
    FeedConfig::new("ws://venue.test/ws", channels.iter().copied())
        .with_jitter_factor(0.0)
        .with_heartbeat(None)
}

/// Sent subscribe frames, in order.
pub fn subscribes(log: &Log) -> Vec<String> {
    log.lock()
        .iter()
        .filter_map(|entry| entry.strip_prefix("send:").map(str::to_string))
        .collect()
}
