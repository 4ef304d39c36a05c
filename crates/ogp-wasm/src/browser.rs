//! Extension API access
//!
//! The extension namespace is `browser` on Firefox and `chrome` elsewhere.
//! Both are reached through `Reflect` so one build runs on either.

use js_sys::{Function, Reflect};
use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::{JsCast, JsValue};

/// `globalThis.browser`, falling back to `globalThis.chrome`.
pub fn extension_api() -> Result<JsValue, JsValue> {
    let global = js_sys::global();
    for name in ["browser", "chrome"] {
        let api = Reflect::get(&global, &name.into())?;
        if !api.is_undefined() && !api.is_null() {
            return Ok(api);
        }
    }
    Err(JsValue::from_str("Extension API not available"))
}

/// Follow `path` from `root`, failing on the first missing segment.
pub fn get_path(root: &JsValue, path: &[&str]) -> Result<JsValue, JsValue> {
    let mut current = root.clone();
    for segment in path {
        current = Reflect::get(&current, &(*segment).into())?;
        if current.is_undefined() {
            return Err(JsValue::from_str(&format!("Missing extension API: {}", path.join("."))));
        }
    }
    Ok(current)
}

/// Call `target[name](...args)`.
pub fn call_method(target: &JsValue, name: &str, args: &[JsValue]) -> Result<JsValue, JsValue> {
    let method: Function = Reflect::get(target, &name.into())?.dyn_into()?;
    let args: js_sys::Array = args.iter().collect();
    Reflect::apply(&method, target, &args)
}

/// Plain objects rather than `Map`s so the browser APIs see ordinary JSON data.
pub fn to_js(value: &Value) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(JsValue::from)
}

pub fn from_js(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    serde_wasm_bindgen::from_value(value.clone()).map_err(JsValue::from)
}

/// Readable form of a thrown JS value.
pub fn describe(error: &JsValue) -> String {
    error.as_string().unwrap_or_else(|| format!("{error:?}"))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use serde_json::json;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_objects_cross_as_plain_objects() {
        let value = json!({"categories": {"safe": ["Snacks"]}});
        let js = to_js(&value).unwrap();
        assert!(!js.is_instance_of::<js_sys::Map>());
        let safe = get_path(&js, &["categories", "safe"]).unwrap();
        assert!(js_sys::Array::is_array(&safe));
        assert_eq!(from_js(&js).unwrap(), value);
    }

    #[wasm_bindgen_test]
    fn test_undefined_reads_as_null() {
        assert_eq!(from_js(&JsValue::UNDEFINED).unwrap(), Value::Null);
    }
}
