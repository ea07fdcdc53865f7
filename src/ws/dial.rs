//! Outbound connection establishment.

use async_trait::async_trait;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, client::IntoClientRequest, http::HeaderMap};

use super::transport::{Transport, TransportError};

/// A failed dial. `handshake_body` holds whatever the server sent back when
/// it refused the upgrade, for diagnostics only.
#[derive(Debug)]
pub struct DialFailure {
    pub error: TransportError,
    pub handshake_body: Option<Vec<u8>>,
}

impl From<tungstenite::Error> for DialFailure {
    fn from(error: tungstenite::Error) -> Self {
        let handshake_body = match &error {
            tungstenite::Error::Http(response) => response.body().clone(),
            _ => None,
        };
        Self { error: error.into(), handshake_body }
    }
}

/// Opens websocket connections. Implement this to dial through a custom
/// stack or to script connections in tests.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, url: &str, headers: &HeaderMap) -> Result<Transport, DialFailure>;
}

/// Dials with `tokio-tungstenite`, over rustls for `wss://` URLs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteDialer;

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, url: &str, headers: &HeaderMap) -> Result<Transport, DialFailure> {
        let mut request = url.into_client_request()?;
        request.headers_mut().extend(headers.clone());

        let (stream, _response) = connect_async(request).await?;
        Ok(Transport::from(stream))
    }
}
