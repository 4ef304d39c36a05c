//! Preference store
//!
//! Wraps a [`KvStore`] and exposes the options record with read-modify-write
//! mutations for the safe-category list. Every mutation is a full read, an
//! in-memory change and a full write. Two writers racing on the same record can
//! lose an update; the background process is the only writer in practice.

use serde_json::{Map, Value};

use crate::options::Options;
use crate::storage::{KvStore, StorageError};

pub struct PreferenceStore<S> {
    store: S,
}

impl<S: KvStore> PreferenceStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the backing store.
    pub fn backend(&self) -> &S {
        &self.store
    }

    /// Raw stored record. Empty when the store was never initialized.
    pub async fn get_record(&self) -> Result<Map<String, Value>, StorageError> {
        self.store.get_all().await
    }

    /// Current options, or `None` if nothing has been stored yet.
    pub async fn get(&self) -> Result<Option<Options>, StorageError> {
        let record = self.store.get_all().await?;
        if record.is_empty() {
            return Ok(None);
        }
        Ok(Some(Options::from_record(&record)?))
    }

    /// Write the default options if the store is empty. Safe to call on every
    /// start. Returns true if the default was written.
    pub async fn init(&self) -> Result<bool, StorageError> {
        let record = self.store.get_all().await?;
        if !record.is_empty() {
            return Ok(false);
        }
        self.store.set_all(Options::default().to_record()).await?;
        log::debug!("initialized options with defaults");
        Ok(true)
    }

    pub async fn is_marked_as_safe(&self, category: &str) -> Result<bool, StorageError> {
        let opts = self.get().await?.unwrap_or_default();
        Ok(opts.is_marked_as_safe(category))
    }

    /// Append `category` to the safe list unless already present.
    /// A missing category is ignored without touching storage.
    pub async fn mark_as_safe(&self, category: Option<&str>) -> Result<(), StorageError> {
        let Some(category) = category else {
            return Ok(());
        };
        self.update(|opts| {
            opts.mark_as_safe(category);
        })
        .await
    }

    /// Remove every occurrence of `category` from the safe list.
    /// A missing category is ignored without touching storage.
    pub async fn unmark_as_safe(&self, category: Option<&str>) -> Result<(), StorageError> {
        let Some(category) = category else {
            return Ok(());
        };
        self.update(|opts| {
            opts.unmark_as_safe(category);
        })
        .await
    }

    /// Flip membership of `category` in the safe list.
    /// A missing category is ignored without touching storage.
    pub async fn toggle_safeness(&self, category: Option<&str>) -> Result<(), StorageError> {
        let Some(category) = category else {
            return Ok(());
        };
        self.update(|opts| {
            opts.toggle_safeness(category);
        })
        .await
    }

    async fn update<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut Options),
    {
        let record = self.store.get_all().await?;
        let mut opts = Options::from_record(&record)?;
        change(&mut opts);
        self.store.set_all(opts.to_record()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    async fn initialized() -> PreferenceStore<MemoryStore> {
        let prefs = PreferenceStore::new(MemoryStore::new());
        prefs.init().await.unwrap();
        prefs
    }

    async fn safe(prefs: &PreferenceStore<MemoryStore>) -> Vec<String> {
        prefs.get().await.unwrap().unwrap().categories.safe
    }

    /// Store whose reads yield before returning, so two read-modify-write
    /// cycles can interleave inside one task.
    struct YieldingStore(MemoryStore);

    impl KvStore for YieldingStore {
        async fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
            let record = self.0.get_all().await?;
            tokio::task::yield_now().await;
            Ok(record)
        }

        async fn set_all(&self, items: Map<String, Value>) -> Result<(), StorageError> {
            self.0.set_all(items).await
        }
    }

    #[tokio::test]
    async fn test_get_uninitialized_is_none() {
        let prefs = PreferenceStore::new(MemoryStore::new());
        assert_eq!(prefs.get().await.unwrap(), None);
        assert!(prefs.get_record().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_writes_default_once() {
        let store = MemoryStore::new();
        let prefs = PreferenceStore::new(store.clone());
        assert!(prefs.init().await.unwrap());
        assert!(!prefs.init().await.unwrap());
        assert_eq!(store.write_count(), 1);
        assert_eq!(Value::Object(store.snapshot()), json!({"categories": {"safe": []}}));
    }

    #[tokio::test]
    async fn test_init_keeps_existing_record() {
        let mut record = Map::new();
        record.insert("categories".to_string(), json!({"safe": ["Dairy"]}));
        let prefs = PreferenceStore::new(MemoryStore::with_record(record));
        assert!(!prefs.init().await.unwrap());
        assert_eq!(safe(&prefs).await, vec!["Dairy"]);
    }

    #[tokio::test]
    async fn test_repeated_mark_keeps_single_entry() {
        let prefs = initialized().await;
        for _ in 0..3 {
            prefs.mark_as_safe(Some("Snacks")).await.unwrap();
        }
        assert_eq!(safe(&prefs).await, vec!["Snacks"]);
    }

    #[tokio::test]
    async fn test_unmark_absent_leaves_list_unchanged() {
        let prefs = initialized().await;
        prefs.mark_as_safe(Some("Dairy")).await.unwrap();
        prefs.unmark_as_safe(Some("Snacks")).await.unwrap();
        assert_eq!(safe(&prefs).await, vec!["Dairy"]);
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_membership() {
        let prefs = initialized().await;
        prefs.toggle_safeness(Some("Snacks")).await.unwrap();
        assert!(prefs.is_marked_as_safe("Snacks").await.unwrap());
        prefs.toggle_safeness(Some("Snacks")).await.unwrap();
        assert!(!prefs.is_marked_as_safe("Snacks").await.unwrap());
        assert!(safe(&prefs).await.is_empty());
    }

    #[tokio::test]
    async fn test_missing_category_is_noop() {
        let store = MemoryStore::new();
        let prefs = PreferenceStore::new(store.clone());
        prefs.init().await.unwrap();
        prefs.mark_as_safe(Some("Dairy")).await.unwrap();
        let before = serde_json::to_vec(&store.snapshot()).unwrap();
        let writes = store.write_count();

        prefs.mark_as_safe(None).await.unwrap();
        prefs.unmark_as_safe(None).await.unwrap();
        prefs.toggle_safeness(None).await.unwrap();

        assert_eq!(serde_json::to_vec(&store.snapshot()).unwrap(), before);
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_mutation_on_uninitialized_store_uses_default() {
        let prefs = PreferenceStore::new(MemoryStore::new());
        prefs.mark_as_safe(Some("Snacks")).await.unwrap();
        assert_eq!(safe(&prefs).await, vec!["Snacks"]);
    }

    #[tokio::test]
    async fn test_concurrent_toggles_can_lose_an_update() {
        let store = MemoryStore::new();
        let first = PreferenceStore::new(YieldingStore(store.clone()));
        let second = PreferenceStore::new(YieldingStore(store.clone()));
        first.init().await.unwrap();

        // Both read `{safe: []}` before either writes.
        let (a, b) = tokio::join!(
            first.toggle_safeness(Some("X")),
            second.toggle_safeness(Some("X")),
        );
        a.unwrap();
        b.unwrap();

        // Two toggles should cancel out; the race records only one.
        assert_eq!(Value::Object(store.snapshot()), json!({"categories": {"safe": ["X"]}}));
    }
}
