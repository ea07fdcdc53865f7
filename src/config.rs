//! Client configuration parsed from environment variables.

use std::time::Duration;

pub const DEFAULT_WS_CONTROL_TIMEOUT_MS: u64 = 3000;
pub const DEFAULT_WS_CONNECT_TIMEOUT_SECS: u64 = 0;
pub const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 0;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HTTP_ERROR_BODY_LIMIT: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Settings for [`crate::ws::WsClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WsConfig {
    /// Deadline for ping and close control frames.
    pub control_timeout: Duration,
    /// Upper bound on a dial attempt. `None` waits for the transport.
    pub connect_timeout: Option<Duration>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            control_timeout: Duration::from_millis(DEFAULT_WS_CONTROL_TIMEOUT_MS),
            connect_timeout: secs_or_none(DEFAULT_WS_CONNECT_TIMEOUT_SECS),
        }
    }
}

/// Settings for [`crate::http::HttpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Whole-request timeout. `None` by default since streamed bodies may
    /// stay open for a long time.
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    /// Max bytes of a non-2xx body kept in [`crate::http::HttpError::Status`].
    pub error_body_limit: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: secs_or_none(DEFAULT_HTTP_REQUEST_TIMEOUT_SECS),
            connect_timeout: secs_or_none(DEFAULT_HTTP_CONNECT_TIMEOUT_SECS),
            error_body_limit: DEFAULT_HTTP_ERROR_BODY_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetConfig {
    pub ws: WsConfig,
    pub http: HttpConfig,
}

impl NetConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `NETX_WS_CONTROL_TIMEOUT_MS`: default 3000
    /// - `NETX_WS_CONNECT_TIMEOUT_SECS`: default 0 (no bound)
    /// - `NETX_HTTP_REQUEST_TIMEOUT_SECS`: default 0 (no bound)
    /// - `NETX_HTTP_CONNECT_TIMEOUT_SECS`: default 10
    /// - `NETX_HTTP_ERROR_BODY_LIMIT`: default 4096
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let control_ms = env_parse("NETX_WS_CONTROL_TIMEOUT_MS", DEFAULT_WS_CONTROL_TIMEOUT_MS)?;
        let ws_connect = env_parse("NETX_WS_CONNECT_TIMEOUT_SECS", DEFAULT_WS_CONNECT_TIMEOUT_SECS)?;
        let http_request = env_parse("NETX_HTTP_REQUEST_TIMEOUT_SECS", DEFAULT_HTTP_REQUEST_TIMEOUT_SECS)?;
        let http_connect = env_parse("NETX_HTTP_CONNECT_TIMEOUT_SECS", DEFAULT_HTTP_CONNECT_TIMEOUT_SECS)?;
        let error_body_limit = env_parse("NETX_HTTP_ERROR_BODY_LIMIT", DEFAULT_HTTP_ERROR_BODY_LIMIT)?;

        Ok(Self {
            ws: WsConfig {
                control_timeout: Duration::from_millis(control_ms),
                connect_timeout: secs_or_none(ws_connect),
            },
            http: HttpConfig {
                request_timeout: secs_or_none(http_request),
                connect_timeout: secs_or_none(http_connect),
                error_body_limit,
            },
        })
    }
}

fn env_parse<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue { var: key, value: raw.to_owned() })
}

/// Zero means "no timeout".
fn secs_or_none(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
