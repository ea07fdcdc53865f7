//! Close codes and their two-level classification.
//!
//! Tolerable closes end the connection the way both peers expect. Every
//! other close code, registered or not, is unexpected and gets logged.

pub const NORMAL_CLOSURE: u16 = 1000;
pub const GOING_AWAY: u16 = 1001;
pub const PROTOCOL_ERROR: u16 = 1002;
pub const UNSUPPORTED_DATA: u16 = 1003;
pub const NO_STATUS_RECEIVED: u16 = 1005;
pub const ABNORMAL_CLOSURE: u16 = 1006;
pub const INVALID_PAYLOAD: u16 = 1007;
pub const POLICY_VIOLATION: u16 = 1008;
pub const MESSAGE_TOO_BIG: u16 = 1009;
pub const MANDATORY_EXTENSION: u16 = 1010;
pub const INTERNAL_ERROR: u16 = 1011;
pub const SERVICE_RESTART: u16 = 1012;
pub const TRY_AGAIN_LATER: u16 = 1013;
pub const TLS_HANDSHAKE: u16 = 1015;

/// Reason text sent with our own close frame.
pub const NORMAL_CLOSE_REASON: &str = "normal close";

pub const TOLERABLE_CODES: [u16; 3] = [NORMAL_CLOSURE, GOING_AWAY, NO_STATUS_RECEIVED];

pub const UNEXPECTED_CODES: [u16; 11] = [
    PROTOCOL_ERROR,
    UNSUPPORTED_DATA,
    ABNORMAL_CLOSURE,
    INVALID_PAYLOAD,
    POLICY_VIOLATION,
    MESSAGE_TOO_BIG,
    MANDATORY_EXTENSION,
    INTERNAL_ERROR,
    SERVICE_RESTART,
    TRY_AGAIN_LATER,
    TLS_HANDSHAKE,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseClass {
    /// Expected shutdown. Nothing to report.
    Tolerable,
    /// Anything else. The cause must be logged before it is collapsed.
    Unexpected,
}

#[must_use]
pub fn classify(code: u16) -> CloseClass {
    if TOLERABLE_CODES.contains(&code) {
        CloseClass::Tolerable
    } else {
        CloseClass::Unexpected
    }
}

#[cfg(test)]
#[path = "close_test.rs"]
mod tests;
