//! Response shaping for axum handlers.
//!
//! DESIGN
//! ======
//! Handler results are rendered as `{"code", "msg", "data"}`. Each result
//! type declares its own payload through [`Envelope::data`] as a list of
//! `(wire key, value)` pairs; nothing is discovered at runtime. Zero-valued
//! fields (null, 0, "", false) are left out of `data`, and `data` itself
//! is left out when empty.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::errorx::ApiError;

/// A handler result with a business code, a message, and declared payload fields.
pub trait Envelope {
    fn code(&self) -> i64;

    fn msg(&self) -> &str;

    /// Payload fields as `(wire key, value)`, in output order.
    fn data(&self) -> Vec<(&'static str, Value)>;
}

/// Failure of a handler, split by how it is rendered.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Rendered as 200 with `{"code","msg"}`.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Rendered as 500 with the error text.
    #[error("{0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl ServiceError {
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Box::new(err))
    }
}

#[must_use]
pub fn make_response<E: Envelope + ?Sized>(resp: &E) -> Value {
    let mut out = Map::new();
    out.insert("code".into(), Value::from(resp.code()));
    out.insert("msg".into(), Value::from(resp.msg()));

    let data: Map<String, Value> = resp
        .data()
        .into_iter()
        .filter(|(_, value)| !is_zero(value))
        .map(|(key, value)| (key.to_owned(), value))
        .collect();
    if !data.is_empty() {
        out.insert("data".into(), Value::Object(data));
    }
    Value::Object(out)
}

/// Log the call and render its outcome.
pub fn post_process<Q, E>(path: &str, req: &Q, result: Result<E, ServiceError>) -> Response
where
    Q: Serialize + ?Sized,
    E: Envelope,
{
    match result {
        Ok(resp) => {
            let body = make_response(&resp);
            info!(%path, req = %json_string(req), resp = %body, "api: handled");
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(ServiceError::Api(api)) => {
            info!(%path, req = %json_string(req), err = %api, "api: handled");
            api.into_response()
        }
        Err(ServiceError::Internal(err)) => {
            error!(%path, req = %json_string(req), error = %err, "api: internal error");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

/// Serialize for logging. Failures are logged and yield an empty string.
pub fn json_string<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        error!(error = %e, "api: json encode for log failed");
        String::new()
    })
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
#[path = "response_test.rs"]
mod tests;
