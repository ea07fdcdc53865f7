//! Request primitive shared by the buffered and streaming paths.

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{HttpError, StreamReader};
use crate::config::HttpConfig;

/// Caller-owned HTTP client. Cheap to clone; clones share one connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    config: HttpConfig,
}

impl HttpClient {
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_config(HttpConfig::default())
    }

    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialized.
    pub fn with_config(config: HttpConfig) -> Result<Self, HttpError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = config.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        let http = builder.build().map_err(HttpError::ClientBuild)?;
        Ok(Self { http, config })
    }

    /// Wrap an already configured reqwest client.
    #[must_use]
    pub fn from_reqwest(http: reqwest::Client, config: HttpConfig) -> Self {
        Self { http, config }
    }

    // =========================================================================
    // BUFFERED
    // =========================================================================

    /// Send a request and decode the JSON response into a generic map.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`]; a non-2xx status is [`HttpError::Status`].
    pub async fn request<B>(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&B>,
    ) -> Result<Map<String, Value>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        self.request_as(method, url, headers, body).await
    }

    /// Like [`Self::request`], decoding into `T`.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`].
    pub async fn request_as<T, B>(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&B>,
    ) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        // `response` is dropped, and the body released, on every return below.
        let response = self.send(method, url, headers, body).await?;
        let response = self.check_status(response).await?;
        let bytes = response.bytes().await.map_err(HttpError::Read)?;
        serde_json::from_slice(&bytes).map_err(HttpError::Decode)
    }

    pub async fn get(&self, url: &str, headers: &HeaderMap) -> Result<Map<String, Value>, HttpError> {
        self.request::<Value>(Method::GET, url, headers, None).await
    }

    pub async fn post<B>(&self, url: &str, headers: &HeaderMap, body: &B) -> Result<Map<String, Value>, HttpError>
    where
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, url, headers, Some(body)).await
    }

    // =========================================================================
    // STREAMING
    // =========================================================================

    /// Send a request and return its body unread.
    ///
    /// # Errors
    ///
    /// Any [`HttpError`] raised before the body is handed over. On a non-2xx
    /// status the body is drained and released before returning.
    pub async fn stream<B>(
        &self,
        method: Method,
        url: &str,
        headers: &HeaderMap,
        body: Option<&B>,
    ) -> Result<StreamReader, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let response = self.send(method, url, headers, body).await?;
        let response = self.check_status(response).await?;
        Ok(StreamReader::new(response))
    }

    pub async fn stream_get(&self, url: &str, headers: &HeaderMap) -> Result<StreamReader, HttpError> {
        self.stream::<Value>(Method::GET, url, headers, None).await
    }

    pub async fn stream_post<B>(&self, url: &str, headers: &HeaderMap, body: &B) -> Result<StreamReader, HttpError>
    where
        B: Serialize + ?Sized,
    {
        self.stream(Method::POST, url, headers, Some(body)).await
    }

    // =========================================================================
    // SHARED
    // =========================================================================

    async fn send<B>(&self, method: Method, url: &str, headers: &HeaderMap, body: Option<&B>) -> Result<Response, HttpError>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(HttpError::Serialize)?;
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(bytes);
        }
        let response = request
            .headers(headers.clone())
            .send()
            .await
            .map_err(HttpError::Request)?;

        debug!(%method, %url, status = response.status().as_u16(), "http: response");
        Ok(response)
    }

    /// Pass 2xx responses through. Anything else is drained, released, and
    /// turned into [`HttpError::Status`].
    async fn check_status(&self, response: Response) -> Result<Response, HttpError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let mut reader = StreamReader::new(response);
        let raw = reader.read_all().await.unwrap_or_default();
        if let Err(e) = reader.close() {
            debug!(error = %e, "http: release error body failed");
        }

        let body = truncate_body(&raw, self.config.error_body_limit);
        warn!(status = status.as_u16(), %body, "http: unexpected status");
        Err(HttpError::Status { status: status.as_u16(), body })
    }
}

/// Cut at `limit` bytes, backing off to the start of a split UTF-8 character.
fn truncate_body(raw: &[u8], limit: usize) -> String {
    if raw.len() <= limit {
        return String::from_utf8_lossy(raw).into_owned();
    }
    let mut end = limit;
    while end > 0 && limit - end < 3 && is_continuation(raw[end]) {
        end -= 1;
    }
    let mut text = String::from_utf8_lossy(&raw[..end]).into_owned();
    text.push_str(" [truncated]");
    text
}

fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
