//! Persistent websocket client with close classification.
//!
//! DESIGN
//! ======
//! One `WsClient` owns exactly one connection for its whole life. Every
//! transport result goes through `classify`, so callers only ever see:
//! success, `NormalClose`, `AbnormalClose`, or a non-close error passed
//! through untouched. Unexpected closes are logged at the point of
//! detection, since the sentinel returned to the caller drops the cause.
//!
//! CONCURRENCY
//! ===========
//! - Writers (data, JSON, ping, close frame) share one async mutex and
//!   never interleave frames.
//! - Reads are not serialized. The connection supports one reader at a
//!   time; a second concurrent reader gets `ConcurrentRead` immediately
//!   instead of queueing behind the first.
//! - `closed` is an atomic flipped by compare-and-swap. A reader and a
//!   writer that both observe the close race only for the transition;
//!   each still receives the classification of its own error.
//! - `close` raises a watch flag that every read and write races against,
//!   so a stuck operation returns `Closed` and gives up its lock. The
//!   close frame, the shutdown, and each lock wait are bounded by the
//!   control deadline. Both halves are dropped afterwards, which releases
//!   the socket even when the peer stopped reading.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex, watch};
use tokio_tungstenite::tungstenite::http::HeaderMap;
use tracing::{debug, error};
use uuid::Uuid;

use super::close::{self, CloseClass};
use super::dial::{Dialer, TungsteniteDialer};
use super::transport::{MessageType, Transport, TransportError, WsSink, WsSource};
use crate::config::WsConfig;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WsError {
    /// Connection establishment failed.
    #[error("websocket dial failed: {0}")]
    Dial(#[source] TransportError),

    #[error("websocket dial timed out after {0:?}")]
    DialTimeout(Duration),

    /// The connection ended the way both sides expected.
    #[error("websocket normal close")]
    NormalClose,

    /// The connection ended unexpectedly. The cause has already been logged.
    #[error("websocket abnormal close")]
    AbnormalClose,

    /// Any non-close transport failure, verbatim.
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("json serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("websocket operation did not finish within {0:?}")]
    Timeout(Duration),

    #[error("another read is already in progress on this connection")]
    ConcurrentRead,

    /// [`WsClient::close`] was called. Operations in flight at that moment
    /// end with this too.
    #[error("websocket closed locally")]
    Closed,
}

impl WsError {
    /// `true` once the connection is over: either close sentinel, or a local close.
    #[must_use]
    pub fn is_close(&self) -> bool {
        matches!(self, Self::NormalClose | Self::AbnormalClose | Self::Closed)
    }
}

// =============================================================================
// CLIENT
// =============================================================================

pub struct WsClient {
    id: Uuid,
    /// `None` once `close` has released the half.
    source: Mutex<Option<Box<dyn WsSource>>>,
    sink: Mutex<Option<Box<dyn WsSink>>>,
    closed: AtomicBool,
    closing: watch::Sender<bool>,
    config: WsConfig,
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl WsClient {
    /// Wrap an established connection. Liveness is not checked.
    pub fn new(connection: impl Into<Transport>) -> Self {
        Self::with_config(connection, WsConfig::default())
    }

    pub fn with_config(connection: impl Into<Transport>, config: WsConfig) -> Self {
        let Transport { source, sink } = connection.into();
        Self {
            id: Uuid::new_v4(),
            source: Mutex::new(Some(source)),
            sink: Mutex::new(Some(sink)),
            closed: AtomicBool::new(false),
            closing: watch::Sender::new(false),
            config,
        }
    }

    /// Dial `url` with the default dialer and config.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Dial`] if the connection or handshake fails.
    pub async fn dial(url: &str, headers: &HeaderMap) -> Result<Self, WsError> {
        Self::dial_with(&TungsteniteDialer, url, headers, WsConfig::default()).await
    }

    /// Dial `url` through `dialer`. Dropping the returned future abandons the
    /// attempt; `config.connect_timeout` bounds it.
    ///
    /// A handshake body returned by a refusing server is logged, never returned.
    ///
    /// # Errors
    ///
    /// Returns [`WsError::Dial`] on failure, [`WsError::DialTimeout`] when the
    /// connect timeout elapses first.
    pub async fn dial_with<D>(dialer: &D, url: &str, headers: &HeaderMap, config: WsConfig) -> Result<Self, WsError>
    where
        D: Dialer + ?Sized,
    {
        let attempt = dialer.dial(url, headers);
        let dialed = match config.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .map_err(|_| WsError::DialTimeout(limit))?,
            None => attempt.await,
        };

        match dialed {
            Ok(transport) => {
                let client = Self::with_config(transport, config);
                debug!(conn_id = %client.id, %url, "ws: connected");
                Ok(client)
            }
            Err(failure) => {
                if let Some(body) = &failure.handshake_body {
                    error!(%url, body = %String::from_utf8_lossy(body), "ws: dial rejected");
                }
                Err(WsError::Dial(failure.error))
            }
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    // -------------------------------------------------------------------------
    // READ
    // -------------------------------------------------------------------------

    /// Read one data message.
    ///
    /// # Errors
    ///
    /// Close sentinels, transport errors, [`WsError::ConcurrentRead`] when
    /// another read is still pending, or [`WsError::Closed`] once `close`
    /// has been called.
    pub async fn read(&self) -> Result<(MessageType, Bytes), WsError> {
        if self.is_closing() {
            return Err(WsError::Closed);
        }
        let mut guard = self.source.try_lock().map_err(|_| WsError::ConcurrentRead)?;
        let Some(source) = guard.as_mut() else {
            return Err(WsError::Closed);
        };
        let result = tokio::select! {
            biased;
            () = self.closing() => return Err(WsError::Closed),
            result = source.recv() => result,
        };
        drop(guard);
        self.classify(result)
    }

    pub async fn read_bytes(&self) -> Result<Bytes, WsError> {
        let (_, data) = self.read().await?;
        Ok(data)
    }

    /// Read one message as text. Invalid UTF-8 is replaced, not rejected.
    pub async fn read_string(&self) -> Result<String, WsError> {
        let (_, data) = self.read().await?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    /// Read one message and decode it as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::read`], plus [`WsError::Serialization`].
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, WsError> {
        let (_, data) = self.read().await?;
        Ok(serde_json::from_slice(&data)?)
    }

    // -------------------------------------------------------------------------
    // WRITE
    // -------------------------------------------------------------------------

    /// Write one message under the write lock.
    ///
    /// # Errors
    ///
    /// Close sentinels, transport errors, or [`WsError::Closed`].
    pub async fn write(&self, kind: MessageType, payload: impl Into<Bytes>) -> Result<(), WsError> {
        self.send(Outgoing::Message(kind, payload.into())).await
    }

    pub async fn write_bytes(&self, data: impl Into<Bytes>) -> Result<(), WsError> {
        self.write(MessageType::Binary, data).await
    }

    pub async fn write_string(&self, text: impl Into<String>) -> Result<(), WsError> {
        self.write(MessageType::Text, text.into()).await
    }

    /// Serialize `value` as JSON and send it as a text message.
    ///
    /// # Errors
    ///
    /// [`WsError::Serialization`] before anything is sent, otherwise as [`Self::write`].
    pub async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<(), WsError> {
        let payload = serde_json::to_vec(value)?;
        self.write(MessageType::Text, payload).await
    }

    /// Send a ping within the control deadline.
    ///
    /// # Errors
    ///
    /// [`WsError::Timeout`] if the deadline passes, otherwise as [`Self::write`].
    pub async fn write_ping(&self) -> Result<(), WsError> {
        self.send(Outgoing::Ping).await
    }

    async fn send(&self, outgoing: Outgoing) -> Result<(), WsError> {
        if self.is_closing() {
            return Err(WsError::Closed);
        }
        let deadline = self.config.control_timeout;
        let attempt = async move {
            let mut guard = self.sink.lock().await;
            let Some(sink) = guard.as_mut() else {
                return Err(WsError::Closed);
            };
            match outgoing {
                Outgoing::Message(kind, payload) => Ok(sink.send_message(kind, payload).await),
                Outgoing::Ping => tokio::time::timeout(deadline, sink.send_ping())
                    .await
                    .map_err(|_| WsError::Timeout(deadline)),
            }
        };
        let result = tokio::select! {
            biased;
            () = self.closing() => return Err(WsError::Closed),
            result = attempt => result?,
        };
        self.classify(result)
    }

    // -------------------------------------------------------------------------
    // CLOSE
    // -------------------------------------------------------------------------

    /// Send a normal close frame, then close the connection. A no-op once the
    /// connection is closed, whether by us or by the peer.
    ///
    /// Reads and writes in flight end with [`WsError::Closed`]. A close frame
    /// that cannot be sent in time is logged and the connection is closed
    /// anyway. Both halves are released before this returns.
    ///
    /// # Errors
    ///
    /// A failed shutdown of the underlying connection, or [`WsError::Timeout`]
    /// when the write lock or the shutdown outlasts the control deadline.
    pub async fn close(&self) -> Result<(), WsError> {
        if !self.mark_closed() {
            return Ok(());
        }
        self.closing.send_modify(|closing| *closing = true);

        let deadline = self.config.control_timeout;
        let result = match tokio::time::timeout(deadline, self.sink.lock()).await {
            Ok(mut guard) => match guard.take() {
                Some(sink) => self.shutdown(sink).await,
                None => Ok(()),
            },
            Err(_) => {
                error!(conn_id = %self.id, ?deadline, "ws: write lock not released for close");
                Err(WsError::Timeout(deadline))
            }
        };

        match tokio::time::timeout(deadline, self.source.lock()).await {
            Ok(mut guard) => drop(guard.take()),
            Err(_) => error!(conn_id = %self.id, ?deadline, "ws: read half not released for close"),
        }

        debug!(conn_id = %self.id, "ws: closed");
        result
    }

    /// Close frame, then shutdown, each under the control deadline. `sink`
    /// is dropped on return whatever the outcome.
    async fn shutdown(&self, mut sink: Box<dyn WsSink>) -> Result<(), WsError> {
        let deadline = self.config.control_timeout;
        match tokio::time::timeout(deadline, sink.send_close(close::NORMAL_CLOSURE, close::NORMAL_CLOSE_REASON)).await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(conn_id = %self.id, error = %e, "ws: send close frame failed"),
            Err(_) => error!(conn_id = %self.id, ?deadline, "ws: send close frame timed out"),
        }

        match tokio::time::timeout(deadline, sink.shutdown()).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                error!(conn_id = %self.id, ?deadline, "ws: shutdown timed out");
                Err(WsError::Timeout(deadline))
            }
        }
    }

    fn is_closing(&self) -> bool {
        *self.closing.borrow()
    }

    /// Resolves once `close` has been called.
    async fn closing(&self) {
        let mut signal = self.closing.subscribe();
        loop {
            let closing = *signal.borrow_and_update();
            if closing || signal.changed().await.is_err() {
                return;
            }
        }
    }

    // -------------------------------------------------------------------------
    // CLASSIFICATION
    // -------------------------------------------------------------------------

    fn classify<T>(&self, result: Result<T, TransportError>) -> Result<T, WsError> {
        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        let Some(code) = error.close_code() else {
            return Err(WsError::Transport(error));
        };

        if self.mark_closed() {
            debug!(conn_id = %self.id, code, "ws: peer closed connection");
        }

        match close::classify(code) {
            CloseClass::Tolerable => Err(WsError::NormalClose),
            CloseClass::Unexpected => {
                error!(conn_id = %self.id, code, error = %error, "ws: close error");
                Err(WsError::AbnormalClose)
            }
        }
    }

    /// Flip `closed` from false to true. Returns whether this call did it.
    fn mark_closed(&self) -> bool {
        self.closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

enum Outgoing {
    Message(MessageType, Bytes),
    Ping,
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
