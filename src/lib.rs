//! netx — network I/O client core.
//!
//! DESIGN
//! ======
//! Two independent connection wrappers, composed only by the caller:
//! - [`ws::WsClient`]: one persistent websocket connection with serialized
//!   writes and two-level close classification.
//! - [`http::StreamReader`]: one in-flight HTTP response whose body stays
//!   open until the caller closes it, produced by [`http::HttpClient`].
//!
//! Around them sit the axum-facing pieces: [`ws::upgrade`] for the
//! server side of a websocket, [`errorx::ApiError`] for business errors,
//! and [`response`] for rendering handler results.
//!
//! Diagnostics go through `tracing`. The crate never installs a subscriber.

pub mod config;
pub mod errorx;
pub mod http;
pub mod response;
pub mod ws;

pub use config::{HttpConfig, NetConfig, WsConfig};
pub use errorx::ApiError;
pub use http::{HttpClient, HttpError, StreamReader};
pub use ws::{MessageType, WsClient, WsError};

#[cfg(test)]
pub(crate) mod test_helpers;
