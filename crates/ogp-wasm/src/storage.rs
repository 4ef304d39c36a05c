//! `storage.sync` backend

use js_sys::Promise;
use ogp_core::{KvStore, StorageError};
use serde_json::{Map, Value};
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;

use crate::browser::{call_method, describe, extension_api, from_js, get_path, to_js};

/// The extension's synchronized key-value area.
pub struct SyncStorage {
    area: JsValue,
}

impl SyncStorage {
    pub fn new() -> Result<Self, JsValue> {
        let area = get_path(&extension_api()?, &["storage", "sync"])?;
        Ok(Self { area })
    }

    async fn call(&self, method: &str, arg: JsValue) -> Result<JsValue, StorageError> {
        let promise: Promise = call_method(&self.area, method, &[arg])
            .and_then(|value| value.dyn_into())
            .map_err(unavailable)?;
        JsFuture::from(promise).await.map_err(unavailable)
    }
}

fn unavailable(error: JsValue) -> StorageError {
    StorageError::Unavailable(describe(&error))
}

impl KvStore for SyncStorage {
    async fn get_all(&self) -> Result<Map<String, Value>, StorageError> {
        let items = self.call("get", JsValue::NULL).await?;
        match from_js(&items).map_err(unavailable)? {
            Value::Object(record) => Ok(record),
            Value::Null => Ok(Map::new()),
            other => Err(StorageError::Unavailable(format!("unexpected storage value: {other}"))),
        }
    }

    async fn set_all(&self, items: Map<String, Value>) -> Result<(), StorageError> {
        let items = to_js(&Value::Object(items)).map_err(unavailable)?;
        self.call("set", items).await?;
        Ok(())
    }
}
