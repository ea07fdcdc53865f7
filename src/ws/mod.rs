//! Websocket client core.
//!
//! DESIGN
//! ======
//! [`WsClient`] wraps one live connection, from a dial or from an axum
//! upgrade, and folds every transport failure into a small set of
//! outcomes. See `client.rs` for the classification and locking rules and
//! `transport.rs` for the backend seam.

pub mod close;
mod client;
mod dial;
mod transport;
mod upgrade;

pub use client::{WsClient, WsError};
pub use dial::{DialFailure, Dialer, TungsteniteDialer};
pub use transport::{MessageType, Transport, TransportError, WsSink, WsSource};
pub use upgrade::upgrade;
