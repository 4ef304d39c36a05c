//! Relay protocol
//!
//! A long-lived, message-oriented duplex channel between the privileged
//! background process and untrusted page contexts. Page contexts send
//! [`RelayRequest`]s naming an action; the background looks the action up in a
//! fixed table, runs it against the preference store and answers with a
//! [`RelayReply`] echoing the action name and request id.
//!
//! Messages travel as JSON values so the same code runs over browser ports and
//! over the in-memory [`channel`].

pub mod channel;
mod client;
mod message;
mod server;

pub use client::RelayClient;
pub use message::{Action, RelayReply, RelayRequest};
pub use server::RelayServer;

use serde_json::Value;

/// Error type for relay round trips.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    #[error("Relay channel disconnected")]
    Disconnected,
    #[error("Failed to post message: {0}")]
    Post(String),
    #[error("Malformed relay message: {0}")]
    Malformed(String),
    #[error("Background handler failed: {0}")]
    Handler(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Malformed(e.to_string())
    }
}

/// Sending half of a relay channel.
pub trait Outbound {
    fn post(&self, message: Value) -> Result<(), RelayError>;
}

impl<T: Outbound + ?Sized> Outbound for std::rc::Rc<T> {
    fn post(&self, message: Value) -> Result<(), RelayError> {
        (**self).post(message)
    }
}
