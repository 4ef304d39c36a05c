//! Background-side relay server

use std::rc::Rc;

use futures::{Stream, StreamExt};
use serde_json::Value;

use super::message::{Action, RelayReply, RelayRequest};
use super::{Outbound, RelayError};
use crate::prefs::PreferenceStore;
use crate::storage::{KvStore, StorageError};

/// Serves the preference store to any number of relay channels.
///
/// The server is the sole writer of the store. Requests from different
/// channels are handled as they arrive, so read-modify-write cycles from two
/// contexts may interleave; the last write wins.
pub struct RelayServer<S> {
    prefs: Rc<PreferenceStore<S>>,
}

impl<S> Clone for RelayServer<S> {
    fn clone(&self) -> Self {
        Self { prefs: Rc::clone(&self.prefs) }
    }
}

impl<S: KvStore> RelayServer<S> {
    pub fn new(prefs: PreferenceStore<S>) -> Self {
        Self { prefs: Rc::new(prefs) }
    }

    pub fn prefs(&self) -> &PreferenceStore<S> {
        &self.prefs
    }

    /// Handle one inbound message and build its reply.
    ///
    /// Unknown actions reply with `null` data. Messages that are not
    /// requests at all get no reply.
    pub async fn handle(&self, message: Value) -> Option<Value> {
        let request: RelayRequest = match serde_json::from_value(message) {
            Ok(request) => request,
            Err(e) => {
                log::warn!("ignoring malformed relay request: {e}");
                return None;
            }
        };

        let reply = match self.dispatch(&request).await {
            Ok(data) => RelayReply::to(&request, data),
            Err(e) => {
                log::error!("relay action '{}' failed: {e}", request.action);
                RelayReply::failed(&request, e.to_string())
            }
        };

        match serde_json::to_value(&reply) {
            Ok(value) => Some(value),
            Err(e) => {
                log::error!("failed to encode relay reply: {e}");
                None
            }
        }
    }

    async fn dispatch(&self, request: &RelayRequest) -> Result<Value, StorageError> {
        let Some(action) = Action::from_name(&request.action) else {
            log::debug!("unknown relay action '{}'", request.action);
            return Ok(Value::Null);
        };

        let category = request.category.as_deref();
        match action {
            Action::GetOpts => Ok(Value::Object(self.prefs.get_record().await?)),
            Action::ToggleCategorySafeness => {
                self.prefs.toggle_safeness(category).await?;
                Ok(Value::Null)
            }
            Action::MarkCategoryAsSafe => {
                self.prefs.mark_as_safe(category).await?;
                Ok(Value::Null)
            }
            Action::UnmarkCategoryAsSafe => {
                self.prefs.unmark_as_safe(category).await?;
                Ok(Value::Null)
            }
        }
    }

    /// Answer every request from `inbound` on `outbound` until the channel
    /// closes.
    pub async fn serve<I, O>(&self, mut inbound: I, outbound: O) -> Result<(), RelayError>
    where
        I: Stream<Item = Value> + Unpin,
        O: Outbound,
    {
        while let Some(message) = inbound.next().await {
            if let Some(reply) = self.handle(message).await {
                outbound.post(reply)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn server() -> (MemoryStore, RelayServer<MemoryStore>) {
        let store = MemoryStore::new();
        (store.clone(), RelayServer::new(PreferenceStore::new(store)))
    }

    #[tokio::test]
    async fn test_get_opts_uninitialized_replies_empty_object() {
        let (_, server) = server();
        let reply = server.handle(json!({"id": 1, "action": "get-opts"})).await.unwrap();
        assert_eq!(reply, json!({"id": 1, "action": "get-opts", "data": {}}));
    }

    #[tokio::test]
    async fn test_unknown_action_replies_null() {
        let (store, server) = server();
        let reply = server
            .handle(json!({"id": 4, "action": "drop-table", "category": "Snacks"}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"id": 4, "action": "drop-table", "data": null}));
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_mutations_reply_null_and_write() {
        let (store, server) = server();
        server.prefs().init().await.unwrap();
        let reply = server
            .handle(json!({"id": 2, "action": "mark-category-as-safe", "category": "Dairy"}))
            .await
            .unwrap();
        assert_eq!(reply, json!({"id": 2, "action": "mark-category-as-safe", "data": null}));
        assert_eq!(Value::Object(store.snapshot()), json!({"categories": {"safe": ["Dairy"]}}));
    }

    #[tokio::test]
    async fn test_null_category_is_noop() {
        let (store, server) = server();
        server.prefs().init().await.unwrap();
        let writes = store.write_count();
        server
            .handle(json!({"action": "toggle-category-safeness", "category": null}))
            .await
            .unwrap();
        server.handle(json!({"action": "unmark-category-as-safe"})).await.unwrap();
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_legacy_request_reply_has_no_id() {
        let (_, server) = server();
        let reply = server.handle(json!({"action": "get-opts"})).await.unwrap();
        assert_eq!(reply, json!({"action": "get-opts", "data": {}}));
    }

    #[tokio::test]
    async fn test_non_request_gets_no_reply() {
        let (_, server) = server();
        assert_eq!(server.handle(json!("hello")).await, None);
        assert_eq!(server.handle(json!({"category": "Snacks"})).await, None);
    }

    struct FailingStore;

    impl KvStore for FailingStore {
        async fn get_all(&self) -> Result<serde_json::Map<String, Value>, StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }

        async fn set_all(&self, _items: serde_json::Map<String, Value>) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("quota exceeded".to_string()))
        }
    }

    #[tokio::test]
    async fn test_store_failure_is_reported_in_reply() {
        let server = RelayServer::new(PreferenceStore::new(FailingStore));
        let reply = server.handle(json!({"id": 9, "action": "get-opts"})).await.unwrap();
        assert_eq!(
            reply,
            json!({
                "id": 9,
                "action": "get-opts",
                "data": null,
                "error": "Storage backend unavailable: quota exceeded"
            })
        );
    }
}
