//! WebSocket Connector
//!
//! `tokio-tungstenite` implementation of the transport ports. TLS is
//! handled by rustls with the webpki root store, so `wss://` endpoints
//! work without system certificates.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{
    CloseInfo, InboundFrame, OutboundFrame, StreamConnection, StreamConnector, TransportError,
};

/// Opens WebSocket connections with `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl StreamConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn StreamConnection>, TransportError> {
        let (stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(url, status = %response.status(), "WebSocket handshake complete");

        Ok(Box::new(TungsteniteConnection { stream }))
    }
}

/// One open WebSocket connection.
pub struct TungsteniteConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl StreamConnection for TungsteniteConnection {
    async fn send(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        let message = match frame {
            OutboundFrame::Text(text) => Message::Text(text.into()),
            OutboundFrame::Ping(data) => Message::Ping(data.into()),
            OutboundFrame::Pong(data) => Message::Pong(data.into()),
        };

        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_frame(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(Message::Text(text)) => InboundFrame::Text(text.as_str().to_owned()),
                Ok(Message::Binary(data)) => InboundFrame::Binary(data.to_vec()),
                Ok(Message::Ping(data)) => InboundFrame::Ping(data.to_vec()),
                Ok(Message::Pong(data)) => InboundFrame::Pong(data.to_vec()),
                Ok(Message::Close(close)) => InboundFrame::Close(close.map(close_info)),
                // Raw frames are never yielded while reading
                Ok(Message::Frame(_)) => continue,
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => return None,
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            };
            return Some(Ok(frame));
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Send(e.to_string())),
        }
    }
}

fn close_info(frame: CloseFrame) -> CloseInfo {
    CloseInfo {
        code: u16::from(frame.code),
        reason: frame.reason.as_str().to_owned(),
    }
}
