//! [`EngineFilesystem`] over the TeX engine's JavaScript object.
//!
//! The engine (a SwiftLaTeX-style `PdfTeXEngine`) keeps its own memory
//! filesystem and exposes three synchronous methods for filling it:
//! `makeMemFSFolder(path)`, `writeMemFSFile(path, content)` and
//! `setEngineMainFile(path)`. Text goes across as a JS string, binary
//! content as a `Uint8Array`.

use std::io::{Error, ErrorKind, Result};

use js_sys::{Function, Reflect, Uint8Array};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use webtex_core::PathKey;
use webtex_core::mirror::{EngineContent, EngineFilesystem};

/// Engine filesystem backed by a JS engine object.
#[wasm_bindgen]
pub struct JsEngineFilesystem {
    engine: JsValue,
}

#[wasm_bindgen]
impl JsEngineFilesystem {
    /// Wrap an engine object. Missing methods fail at build time, not here.
    #[wasm_bindgen(constructor)]
    pub fn new(engine: JsValue) -> Self {
        Self { engine }
    }

    /// Whether the engine object has every method a mirror needs.
    #[wasm_bindgen(js_name = "isComplete")]
    pub fn is_complete(&self) -> bool {
        ["makeMemFSFolder", "writeMemFSFile", "setEngineMainFile"]
            .iter()
            .all(|name| self.method(name).is_ok())
    }
}

impl JsEngineFilesystem {
    fn method(&self, name: &str) -> Result<Function> {
        Reflect::get(&self.engine, &JsValue::from_str(name))
            .ok()
            .and_then(|value| value.dyn_into::<Function>().ok())
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::Unsupported,
                    format!("engine has no '{}' method", name),
                )
            })
    }

    fn call(&self, name: &str, args: &[JsValue]) -> Result<()> {
        let method = self.method(name)?;
        let result = match args {
            [path] => method.call1(&self.engine, path),
            [path, content] => method.call2(&self.engine, path, content),
            _ => method.call0(&self.engine),
        };
        result.map(|_| ()).map_err(js_to_io_error)
    }
}

fn js_to_io_error(err: JsValue) -> Error {
    let message = err
        .as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Object>()
                .and_then(|obj| obj.to_string().as_string())
        })
        .unwrap_or_else(|| "unknown engine error".to_string());
    Error::other(message)
}

impl EngineFilesystem for JsEngineFilesystem {
    fn ensure_directory(&self, path: &PathKey) -> Result<()> {
        self.call("makeMemFSFolder", &[JsValue::from_str(path.as_str())])
    }

    fn write_file(&self, path: &PathKey, content: EngineContent<'_>) -> Result<()> {
        let content = match content {
            EngineContent::Text(text) => JsValue::from_str(text),
            EngineContent::Bytes(bytes) => Uint8Array::from(bytes).into(),
        };
        self.call(
            "writeMemFSFile",
            &[JsValue::from_str(path.as_str()), content],
        )
    }

    fn set_main_entry_point(&self, path: &PathKey) -> Result<()> {
        self.call("setEngineMainFile", &[JsValue::from_str(path.as_str())])
    }
}
