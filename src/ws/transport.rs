//! Transport seam between [`super::WsClient`] and a concrete websocket.
//!
//! DESIGN
//! ======
//! A connection is split into a read half ([`WsSource`]) and a write half
//! ([`WsSink`]) so the client can serialize writers without making readers
//! wait on them. Adapters normalize each backend's close signalling into
//! [`TransportError::Close`]: a received close frame, a close frame with no
//! status (1005), or a peer that vanished without a closing handshake (1006).
//! Control frames (ping/pong) are answered by the backends and never
//! surface as messages.

use std::string::FromUtf8Error;

use async_trait::async_trait;
use axum::extract::ws::{self as axum_ws, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

use super::close;

// =============================================================================
// TYPES
// =============================================================================

/// Kind of a data message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Text,
    Binary,
}

/// Raw error from a transport, before close classification.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The peer closed the connection, or it ended in a way that maps to a close code.
    #[error("connection closed with code {code}: {reason}")]
    Close { code: u16, reason: String },

    /// The stream yielded nothing more. The connection was already torn down.
    #[error("connection stream ended")]
    StreamEnded,

    #[error("text payload is not valid UTF-8: {0}")]
    InvalidText(#[from] FromUtf8Error),

    #[error(transparent)]
    Tungstenite(Box<tungstenite::Error>),

    #[error(transparent)]
    Axum(#[from] axum::Error),
}

impl TransportError {
    fn close(code: u16, reason: impl Into<String>) -> Self {
        Self::Close { code, reason: reason.into() }
    }

    /// The close code carried by this error, if it is a close condition.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match self {
            Self::Close { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<tungstenite::Error> for TransportError {
    fn from(error: tungstenite::Error) -> Self {
        match error {
            tungstenite::Error::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
                Self::close(close::ABNORMAL_CLOSURE, "reset without closing handshake")
            }
            tungstenite::Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::close(close::ABNORMAL_CLOSURE, io.to_string())
            }
            other => Self::Tungstenite(Box::new(other)),
        }
    }
}

/// Read half of a connection. Only one reader may use it at a time.
#[async_trait]
pub trait WsSource: Send {
    /// Wait for the next data message.
    async fn recv(&mut self) -> Result<(MessageType, Bytes), TransportError>;
}

/// Write half of a connection.
#[async_trait]
pub trait WsSink: Send {
    async fn send_message(&mut self, kind: MessageType, payload: Bytes) -> Result<(), TransportError>;

    async fn send_ping(&mut self) -> Result<(), TransportError>;

    async fn send_close(&mut self, code: u16, reason: &str) -> Result<(), TransportError>;

    /// Flush and release the write side of the underlying connection.
    async fn shutdown(&mut self) -> Result<(), TransportError>;
}

/// An established connection, already split into halves.
pub struct Transport {
    pub(crate) source: Box<dyn WsSource>,
    pub(crate) sink: Box<dyn WsSink>,
}

impl Transport {
    pub fn new(source: impl WsSource + 'static, sink: impl WsSink + 'static) -> Self {
        Self { source: Box::new(source), sink: Box::new(sink) }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport").finish_non_exhaustive()
    }
}

// =============================================================================
// TOKIO-TUNGSTENITE
// =============================================================================

impl<S> From<WebSocketStream<S>> for Transport
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    fn from(stream: WebSocketStream<S>) -> Self {
        let (sink, source) = stream.split();
        Self::new(source, sink)
    }
}

#[async_trait]
impl<S> WsSource for SplitStream<WebSocketStream<S>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self) -> Result<(MessageType, Bytes), TransportError> {
        loop {
            let Some(message) = self.next().await else {
                return Err(TransportError::StreamEnded);
            };
            let message = message?;
            let kind = match &message {
                Message::Text(_) => MessageType::Text,
                Message::Binary(_) => MessageType::Binary,
                Message::Close(Some(frame)) => {
                    return Err(TransportError::close(u16::from(frame.code), frame.reason.as_str()));
                }
                Message::Close(None) => return Err(TransportError::close(close::NO_STATUS_RECEIVED, "")),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };
            return Ok((kind, message.into_data()));
        }
    }
}

#[async_trait]
impl<S> WsSink for SplitSink<WebSocketStream<S>, Message>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send_message(&mut self, kind: MessageType, payload: Bytes) -> Result<(), TransportError> {
        let message = match kind {
            MessageType::Text => Message::text(String::from_utf8(payload.to_vec())?),
            MessageType::Binary => Message::binary(payload),
        };
        Ok(self.send(message).await?)
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        Ok(self.send(Message::Ping(Bytes::new())).await?)
    }

    async fn send_close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = CloseFrame { code: code.into(), reason: reason.to_owned().into() };
        Ok(self.send(Message::Close(Some(frame))).await?)
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        // Errors meaning the close handshake already ran are success here.
        match SinkExt::close(self).await {
            Ok(())
            | Err(
                tungstenite::Error::ConnectionClosed
                | tungstenite::Error::AlreadyClosed
                | tungstenite::Error::Protocol(ProtocolError::SendAfterClosing),
            ) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// AXUM (server side of an upgrade)
// =============================================================================

impl From<WebSocket> for Transport {
    fn from(socket: WebSocket) -> Self {
        let (sink, source) = socket.split();
        Self::new(source, sink)
    }
}

#[async_trait]
impl WsSource for SplitStream<WebSocket> {
    async fn recv(&mut self) -> Result<(MessageType, Bytes), TransportError> {
        loop {
            let Some(message) = self.next().await else {
                return Err(TransportError::StreamEnded);
            };
            let message = message?;
            let kind = match &message {
                axum_ws::Message::Text(_) => MessageType::Text,
                axum_ws::Message::Binary(_) => MessageType::Binary,
                axum_ws::Message::Close(Some(frame)) => {
                    return Err(TransportError::close(frame.code, frame.reason.as_str()));
                }
                axum_ws::Message::Close(None) => {
                    return Err(TransportError::close(close::NO_STATUS_RECEIVED, ""));
                }
                axum_ws::Message::Ping(_) | axum_ws::Message::Pong(_) => continue,
            };
            return Ok((kind, message.into_data()));
        }
    }
}

#[async_trait]
impl WsSink for SplitSink<WebSocket, axum_ws::Message> {
    async fn send_message(&mut self, kind: MessageType, payload: Bytes) -> Result<(), TransportError> {
        let message = match kind {
            MessageType::Text => axum_ws::Message::text(String::from_utf8(payload.to_vec())?),
            MessageType::Binary => axum_ws::Message::binary(payload),
        };
        Ok(self.send(message).await?)
    }

    async fn send_ping(&mut self) -> Result<(), TransportError> {
        Ok(self.send(axum_ws::Message::Ping(Bytes::new())).await?)
    }

    async fn send_close(&mut self, code: u16, reason: &str) -> Result<(), TransportError> {
        let frame = axum_ws::CloseFrame { code, reason: reason.to_owned().into() };
        Ok(self.send(axum_ws::Message::Close(Some(frame))).await?)
    }

    async fn shutdown(&mut self) -> Result<(), TransportError> {
        Ok(SinkExt::close(self).await?)
    }
}
