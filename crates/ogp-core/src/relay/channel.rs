//! In-memory relay channel
//!
//! Connects a page-side [`RelayClient`](super::RelayClient) and a
//! [`RelayServer`](super::RelayServer) inside one process.

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use serde_json::Value;

use super::{Outbound, RelayError};

impl Outbound for UnboundedSender<Value> {
    fn post(&self, message: Value) -> Result<(), RelayError> {
        self.unbounded_send(message).map_err(|_| RelayError::Disconnected)
    }
}

/// One end of an in-memory channel.
pub struct Endpoint {
    pub sender: UnboundedSender<Value>,
    pub receiver: UnboundedReceiver<Value>,
}

/// Create a connected pair of endpoints: `(page, background)`.
pub fn pair() -> (Endpoint, Endpoint) {
    let (to_background, from_page) = unbounded();
    let (to_page, from_background) = unbounded();
    (
        Endpoint { sender: to_background, receiver: from_background },
        Endpoint { sender: to_page, receiver: from_page },
    )
}
