//! Key-value storage backend
//!
//! The extension's synchronized storage is an external get-all / set-all
//! store with no partial updates. [`KvStore`] is the seam the preference
//! store is written against; [`MemoryStore`] is the in-process backend used by
//! tests and tooling.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde_json::{Map, Value};

/// Error type for storage backends.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("Stored options are malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A persisted mapping of string keys to JSON values.
///
/// Both operations move the complete record; there is no transaction support
/// beyond what the backend itself provides.
#[allow(async_fn_in_trait)]
pub trait KvStore {
    /// Read every stored key.
    async fn get_all(&self) -> Result<Map<String, Value>, StorageError>;

    /// Write every key in `items`, replacing previous values for those keys.
    async fn set_all(&self, items: Map<String, Value>) -> Result<(), StorageError>;
}

/// Shared in-memory store. Clones see the same record.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    record: Rc<RefCell<Map<String, Value>>>,
    writes: Rc<Cell<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `record`.
    pub fn with_record(record: Map<String, Value>) -> Self {
        Self {
            record: Rc::new(RefCell::new(record)),
            writes: Rc::default(),
        }
    }

    /// Current record contents.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.record.borrow().clone()
    }

    /// Number of `set_all` calls so far.
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }
}

impl KvStore for MemoryStore {
    async fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
        Ok(self.record.borrow().clone())
    }

    async fn set_all(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        let mut record = self.record.borrow_mut();
        for (key, value) in items {
            record.insert(key, value);
        }
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}
