//! HTTP → websocket upgrade for axum handlers.
//!
//! No origin check is applied: any page may open a socket. Handlers that
//! need origin or CSRF protection must inspect the request headers before
//! calling [`upgrade`].

use std::future::Future;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::response::{IntoResponse, Response};
use tracing::warn;

use super::WsClient;
use crate::errorx::ApiError;

/// Upgrade the request and run `handler` with a [`WsClient`] over the new socket.
///
/// Take the extractor as `Result<WebSocketUpgrade, WebSocketUpgradeRejection>`
/// so a non-upgrade request is answered with an [`ApiError`] instead of
/// axum's plain-text rejection.
pub fn upgrade<F, Fut>(ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>, handler: F) -> Response
where
    F: FnOnce(WsClient) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return ApiError::end_msg(&rejection, "upgrade ws failed").into_response(),
    };

    ws.on_failed_upgrade(|error| warn!(error = %error, "ws: upgrade failed"))
        .on_upgrade(move |socket| handler(WsClient::new(socket)))
}

#[cfg(test)]
#[path = "upgrade_test.rs"]
mod tests;
