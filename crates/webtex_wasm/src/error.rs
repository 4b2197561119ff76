//! Workspace errors as plain JavaScript objects.
//!
//! Every rejected promise carries a [`SerializableError`]:
//! `{ kind, message, path }`. `kind` is the variant name and is meant for
//! branching in the UI.

use wasm_bindgen::prelude::*;
use webtex_core::error::SerializableError;

fn to_js(err: &SerializableError) -> JsValue {
    serde_wasm_bindgen::to_value(err).unwrap_or_else(|_| JsValue::from_str(&err.message))
}

/// Convert core results into values a `Promise` can reject with.
pub trait IntoJsResult<T> {
    fn js(self) -> Result<T, JsValue>;
}

impl<T> IntoJsResult<T> for webtex_core::Result<T> {
    fn js(self) -> Result<T, JsValue> {
        self.map_err(|e| to_js(&e.to_serializable()))
    }
}

/// Error for failures on the JS side of the bridge.
pub fn js_error(kind: &str, message: impl Into<String>) -> JsValue {
    to_js(&SerializableError {
        kind: kind.to_string(),
        message: message.into(),
        path: None,
    })
}
