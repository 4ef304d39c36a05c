//! Page-side relay client

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::{Stream, StreamExt};
use serde_json::Value;

use super::message::{Action, RelayReply, RelayRequest};
use super::{Outbound, RelayError};
use crate::options::Options;

struct Pending {
    action: String,
    reply: oneshot::Sender<Result<Value, RelayError>>,
}

struct ClientInner {
    outbound: Box<dyn Outbound>,
    next_id: Cell<u64>,
    pending: RefCell<HashMap<u64, Pending>>,
    closed: Cell<bool>,
}

/// One page context's handle on the relay channel.
///
/// Requests are correlated by id, so concurrent requests for the same action
/// are fine. Inbound messages must be fed to [`RelayClient::deliver`], either
/// directly from a port callback or through [`RelayClient::pump`].
#[derive(Clone)]
pub struct RelayClient {
    inner: Rc<ClientInner>,
}

impl RelayClient {
    pub fn new<O: Outbound + 'static>(outbound: O) -> Self {
        Self {
            inner: Rc::new(ClientInner {
                outbound: Box::new(outbound),
                next_id: Cell::new(1),
                pending: RefCell::new(HashMap::new()),
                closed: Cell::new(false),
            }),
        }
    }

    /// Number of requests awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Send `action` and wait for its reply's `data`.
    pub async fn request(&self, action: &str, category: Option<&str>) -> Result<Value, RelayError> {
        if self.is_closed() {
            return Err(RelayError::Disconnected);
        }

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let request = RelayRequest::new(id, action, category);
        let message = serde_json::to_value(&request)?;

        let (tx, rx) = oneshot::channel();
        self.inner.pending.borrow_mut().insert(
            id,
            Pending { action: action.to_string(), reply: tx },
        );

        if let Err(e) = self.inner.outbound.post(message) {
            self.inner.pending.borrow_mut().remove(&id);
            return Err(e);
        }

        rx.await.unwrap_or(Err(RelayError::Disconnected))
    }

    /// Route one inbound message to the request waiting for it.
    pub fn deliver(&self, message: Value) {
        let reply: RelayReply = match serde_json::from_value(message) {
            Ok(reply) => reply,
            Err(e) => {
                log::warn!("dropping malformed relay reply: {e}");
                return;
            }
        };

        let pending = {
            let mut pending = self.inner.pending.borrow_mut();
            let id = match reply.id {
                Some(id) => Some(id),
                // Replies from legacy peers carry no id: match the oldest
                // request for the same action.
                None => pending
                    .iter()
                    .filter(|(_, p)| p.action == reply.action)
                    .map(|(id, _)| *id)
                    .min(),
            };
            id.and_then(|id| pending.remove(&id))
        };

        let Some(pending) = pending else {
            log::warn!("dropping relay reply for '{}' with no pending request", reply.action);
            return;
        };

        if pending.action != reply.action {
            log::warn!(
                "relay reply action '{}' does not match request '{}'",
                reply.action,
                pending.action
            );
        }

        let result = match reply.error {
            Some(error) => Err(RelayError::Handler(error)),
            None => Ok(reply.data),
        };
        // The requester may have been dropped; nothing to do then.
        let _ = pending.reply.send(result);
    }

    /// Mark the channel closed and fail every pending request.
    pub fn disconnect(&self) {
        self.inner.closed.set(true);
        let drained: Vec<Pending> = self.inner.pending.borrow_mut().drain().map(|(_, p)| p).collect();
        for pending in drained {
            let _ = pending.reply.send(Err(RelayError::Disconnected));
        }
    }

    /// Deliver every message from `inbound` until it ends, then disconnect.
    pub async fn pump<S>(&self, mut inbound: S)
    where
        S: Stream<Item = Value> + Unpin,
    {
        while let Some(message) = inbound.next().await {
            self.deliver(message);
        }
        self.disconnect();
    }

    // =========================================================================
    // Actions
    // =========================================================================

    /// Fetch the options record. An uninitialized store reads as defaults.
    pub async fn get_opts(&self) -> Result<Options, RelayError> {
        let data = self.request(Action::GetOpts.as_str(), None).await?;
        if data.is_null() {
            return Ok(Options::default());
        }
        Ok(serde_json::from_value(data)?)
    }

    pub async fn toggle_category_safeness(&self, category: &str) -> Result<(), RelayError> {
        self.request(Action::ToggleCategorySafeness.as_str(), Some(category)).await?;
        Ok(())
    }

    pub async fn mark_category_as_safe(&self, category: &str) -> Result<(), RelayError> {
        self.request(Action::MarkCategoryAsSafe.as_str(), Some(category)).await?;
        Ok(())
    }

    pub async fn unmark_category_as_safe(&self, category: &str) -> Result<(), RelayError> {
        self.request(Action::UnmarkCategoryAsSafe.as_str(), Some(category)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::channel;
    use crate::storage::MemoryStore;
    use crate::testing::with_relay;
    use futures::future::join;
    use std::future::Future;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_opts_uninitialized_reads_default() {
        let opts = with_relay(MemoryStore::new(), |client| async move {
            client.get_opts().await.unwrap()
        })
        .await;
        assert_eq!(opts, Options::default());
    }

    #[tokio::test]
    async fn test_toggle_roundtrip_updates_store() {
        let store = MemoryStore::new();
        let opts = with_relay(store.clone(), |client| async move {
            client.toggle_category_safeness("Snacks").await.unwrap();
            client.get_opts().await.unwrap()
        })
        .await;
        assert_eq!(opts.categories.safe, vec!["Snacks"]);
        assert_eq!(Value::Object(store.snapshot()), json!({"categories": {"safe": ["Snacks"]}}));
    }

    #[tokio::test]
    async fn test_unknown_action_resolves_null() {
        let data = with_relay(MemoryStore::new(), |client| async move {
            client.request("explode", Some("Snacks")).await.unwrap()
        })
        .await;
        assert_eq!(data, Value::Null);
    }

    #[tokio::test]
    async fn test_concurrent_same_action_requests() {
        let store = MemoryStore::new();
        let (a, b) = with_relay(store, |client| async move {
            client.mark_category_as_safe("Dairy").await.unwrap();
            join(client.get_opts(), client.get_opts()).await
        })
        .await;
        assert_eq!(a.unwrap().categories.safe, vec!["Dairy"]);
        assert_eq!(b.unwrap().categories.safe, vec!["Dairy"]);
    }

    #[tokio::test]
    async fn test_mark_and_unmark_roundtrip() {
        let opts = with_relay(MemoryStore::new(), |client| async move {
            client.mark_category_as_safe("Dairy").await.unwrap();
            client.mark_category_as_safe("Snacks").await.unwrap();
            client.unmark_category_as_safe("Dairy").await.unwrap();
            client.get_opts().await.unwrap()
        })
        .await;
        assert_eq!(opts.categories.safe, vec!["Snacks"]);
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_requests() {
        let (page, _background) = channel::pair();
        let client = RelayClient::new(page.sender);
        let waiting = client.clone();
        let (result, ()) = join(waiting.get_opts(), async {
            tokio::task::yield_now().await;
            assert_eq!(client.pending_count(), 1);
            client.disconnect();
        })
        .await;
        assert_eq!(result, Err(RelayError::Disconnected));
        assert_eq!(client.get_opts().await, Err(RelayError::Disconnected));
    }

    #[tokio::test]
    async fn test_post_failure_clears_pending() {
        let (page, background) = channel::pair();
        drop(background);
        let client = RelayClient::new(page.sender);
        assert_eq!(client.request("get-opts", None).await, Err(RelayError::Disconnected));
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn test_legacy_reply_matches_by_action() {
        let (page, _background) = channel::pair();
        let client = RelayClient::new(page.sender);
        let mut fut = Box::pin(client.request("get-opts", None));
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        client.deliver(json!({"action": "other", "data": 1}));
        assert_eq!(client.pending_count(), 1);

        client.deliver(json!({"action": "get-opts", "data": 2}));
        assert_eq!(client.pending_count(), 0);
        assert_eq!(fut.as_mut().poll(&mut cx), std::task::Poll::Ready(Ok(json!(2))));
    }

    #[test]
    fn test_handler_error_is_surfaced() {
        let (page, _background) = channel::pair();
        let client = RelayClient::new(page.sender);
        let mut fut = Box::pin(client.request("get-opts", None));
        let waker = futures::task::noop_waker();
        let mut cx = std::task::Context::from_waker(&waker);
        assert!(fut.as_mut().poll(&mut cx).is_pending());

        client.deliver(json!({"id": 1, "action": "get-opts", "data": null, "error": "quota"}));
        assert_eq!(
            fut.as_mut().poll(&mut cx),
            std::task::Poll::Ready(Err(RelayError::Handler("quota".to_string())))
        );
    }
}
