//! HTTP client with a streaming response reader.
//!
//! DESIGN
//! ======
//! [`HttpClient`] is constructed and owned by the caller; there is no
//! process-wide instance. Both request paths share one send primitive and
//! one status check:
//! - `request`/`get`/`post` read the whole body, decode JSON, and release
//!   the response on every path.
//! - `stream`/`stream_get`/`stream_post` hand the open body to the caller
//!   as a [`StreamReader`]. The caller closes it.
//!
//! A non-2xx status never yields a reader: the body is drained (errors
//! ignored), released, and its text is captured in [`HttpError::Status`].

mod client;
mod stream;

pub use client::HttpClient;
pub use stream::StreamReader;

/// Errors produced by [`HttpClient`] and [`StreamReader`].
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("http client build failed: {0}")]
    ClientBuild(#[source] reqwest::Error),

    /// The request body could not be encoded as JSON.
    #[error("request body serialization failed: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("send request failed: {0}")]
    Request(#[source] reqwest::Error),

    /// Status outside `200..300`. `body` may be truncated.
    #[error("unexpected status code: {status}, response body: {body}")]
    Status { status: u16, body: String },

    #[error("read response failed: {0}")]
    Read(#[source] reqwest::Error),

    /// The response body was not the expected JSON.
    #[error("response deserialization failed: {0}")]
    Decode(#[source] serde_json::Error),
}
