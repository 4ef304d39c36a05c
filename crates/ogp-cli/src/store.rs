//! File-backed options store
//!
//! Keeps the whole record as one pretty-printed JSON object. A missing or
//! empty file reads as an empty record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ogp_core::{KvStore, StorageError};
use serde_json::{Map, Value};

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvStore for FileStore {
    async fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Map::new());
        }
        Ok(serde_json::from_str(&text)?)
    }

    async fn set_all(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        let mut record = self.get_all().await?;
        record.extend(items);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut text = serde_json::to_string_pretty(&record)?;
        text.push('\n');
        tokio::fs::write(&self.path, text).await?;
        Ok(())
    }
}
