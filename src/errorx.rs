//! Business errors for HTTP handlers.
//!
//! An [`ApiError`] is the terminal error of a handler chain: it is rendered
//! with HTTP 200 and a `{"code","msg"}` body so clients can branch on
//! `code`. Everything upstream of the terminal point keeps its own error
//! types; the `end*` constructors log the original error and convert it.

use std::error::Error as StdError;
use std::fmt::Display;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

/// Code used when the error carries no business code of its own.
pub const UNKNOWN_CODE: i64 = 999;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("code={code}, msg={msg}")]
pub struct ApiError {
    pub code: i64,
    pub msg: String,
}

impl ApiError {
    pub fn new(code: i64, msg: impl Into<String>) -> Self {
        Self { code, msg: msg.into() }
    }

    /// Log `err` and convert it. An `ApiError` anywhere in the source chain
    /// is returned as-is; anything else becomes [`UNKNOWN_CODE`] with the
    /// error's message.
    pub fn end(err: &(dyn StdError + 'static)) -> Self {
        error!(error = %err, "api: request failed");
        let mut current = Some(err);
        while let Some(e) = current {
            if let Some(api) = e.downcast_ref::<ApiError>() {
                return api.clone();
            }
            current = e.source();
        }
        Self::new(UNKNOWN_CODE, err.to_string())
    }

    /// Log `err` and replace it with a fixed message.
    pub fn end_msg(err: &dyn Display, msg: impl Into<String>) -> Self {
        Self::end_code(err, UNKNOWN_CODE, msg)
    }

    /// Log `err` and replace it with a fixed code and message.
    pub fn end_code(err: &dyn Display, code: i64, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        error!(error = %err, code, %msg, "api: request failed");
        Self { code, msg }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
#[path = "errorx_test.rs"]
mod tests;
