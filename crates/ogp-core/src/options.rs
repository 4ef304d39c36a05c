//! Persisted options model
//!
//! The options record is stored as-is in the extension's synchronized
//! key-value storage: `{ "categories": { "safe": [..] } }`. Uniqueness of
//! `safe` is maintained by the mutation helpers here, not by storage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;

/// Display name of the host page's catch-all category. It never receives a
/// checkbox and is never remediated.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// The sole persisted entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Options {
    pub categories: Categories,
}

/// Category preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct Categories {
    /// Category names exempt from bulk remediation, in marking order.
    pub safe: Vec<String>,
}

impl Options {
    /// Decode options from a storage record. Missing keys fall back to their
    /// defaults, so an empty record decodes to an empty `safe` list.
    pub fn from_record(record: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(record.clone()))
    }

    /// Encode options as a storage record.
    pub fn to_record(&self) -> Map<String, Value> {
        let mut record = Map::new();
        let safe = self.categories.safe.iter().cloned().map(Value::String).collect();
        let mut categories = Map::new();
        categories.insert("safe".to_string(), Value::Array(safe));
        record.insert("categories".to_string(), Value::Object(categories));
        record
    }

    pub fn is_marked_as_safe(&self, category: &str) -> bool {
        self.categories.safe.iter().any(|c| c == category)
    }

    /// Append `category` unless already present. Returns true if it was added.
    pub fn mark_as_safe(&mut self, category: &str) -> bool {
        if self.is_marked_as_safe(category) {
            return false;
        }
        self.categories.safe.push(category.to_string());
        true
    }

    /// Remove every occurrence of `category`. Returns true if anything was removed.
    pub fn unmark_as_safe(&mut self, category: &str) -> bool {
        let before = self.categories.safe.len();
        self.categories.safe.retain(|c| c != category);
        self.categories.safe.len() != before
    }

    /// Flip membership of `category`. Returns the new membership.
    pub fn toggle_safeness(&mut self, category: &str) -> bool {
        if self.unmark_as_safe(category) {
            false
        } else {
            self.categories.safe.push(category.to_string());
            true
        }
    }

    /// Number of safe categories.
    pub fn safe_count(&self) -> usize {
        self.categories.safe.len()
    }
}
