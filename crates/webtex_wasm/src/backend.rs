//! The workspace as a JavaScript class.
//!
//! ```javascript
//! const backend = await WebTexBackend.create();
//! const id = backend.subscribe((event) => {
//!   if (event.type === 'TreeLoaded') renderTree(backend.getTree());
//! });
//!
//! await backend.createFile('chapters/intro.tex');
//! backend.beginDrag('figs/a.png');
//! backend.hover('');
//! await backend.drop();
//!
//! const report = await backend.build(new JsEngineFilesystem(engine), {
//!   'main.tex': editor.getValue(),
//! });
//! ```
//!
//! Every mutation returns a `Promise` and reloads the tree before it
//! settles; rejected promises carry `{ kind, message, path }`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use js_sys::{Function, Promise, Uint8Array};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use webtex_core::dnd::{DragAndDropCoordinator, HoverOutcome};
use webtex_core::events::WorkspaceEvent;
use webtex_core::workspace::{LoadOutcome, LoadState, Workspace};
use webtex_core::{PathKey, WorkspaceError};

use crate::engine_fs::JsEngineFilesystem;
use crate::error::{IntoJsResult, js_error};
use crate::opfs_storage::{DEFAULT_ROOT_DIR, OpfsStorage};

type OpfsWorkspace = Workspace<OpfsStorage>;

/// Result of offering a folder as drop target.
#[derive(Serialize)]
struct HoverResult {
    accepted: bool,
    reason: Option<String>,
}

/// Workspace session over OPFS plus the file tree's drag state.
#[wasm_bindgen]
pub struct WebTexBackend {
    ws: Rc<OpfsWorkspace>,
    dnd: RefCell<DragAndDropCoordinator>,
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| js_error("Serialize", e.to_string()))
}

fn parse_key(path: &str) -> Result<PathKey, JsValue> {
    PathKey::parse(path).js()
}

#[wasm_bindgen]
impl WebTexBackend {
    /// Open the workspace in OPFS directory `rootName` (default `webtex`)
    /// and load its tree.
    ///
    /// A tree that fails to load does not reject; check `loadError()`.
    #[wasm_bindgen]
    pub async fn create(root_name: Option<String>) -> Result<WebTexBackend, JsValue> {
        let root_name = root_name.unwrap_or_else(|| DEFAULT_ROOT_DIR.to_string());
        let storage = OpfsStorage::open(&root_name).await?;
        let ws = Workspace::open(storage).await.js()?;
        Ok(Self {
            ws: Rc::new(ws),
            dnd: RefCell::new(DragAndDropCoordinator::new()),
        })
    }

    // ========================================================================
    // Tree
    // ========================================================================

    /// Reload the tree from storage. Resolves to `true` if this load's tree
    /// was installed, `false` if a newer load superseded it.
    #[wasm_bindgen]
    pub fn load(&self) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            let outcome = ws.load().await.js()?;
            Ok(JsValue::from_bool(outcome == LoadOutcome::Installed))
        })
    }

    /// The current tree as `{ path, name, kind, children }`.
    #[wasm_bindgen(js_name = "getTree")]
    pub fn get_tree(&self) -> Result<JsValue, JsValue> {
        let tree = self.ws.tree().js()?;
        to_js(&tree.to_view())
    }

    /// Why the last load failed, or `undefined`.
    #[wasm_bindgen(js_name = "loadError")]
    pub fn load_error(&self) -> Option<String> {
        match self.ws.state() {
            LoadState::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Read a file as text.
    #[wasm_bindgen(js_name = "readText")]
    pub fn read_text(&self, path: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move { Ok(JsValue::from_str(&ws.read_text(&path).await.js()?)) })
    }

    /// Read a file as a `Uint8Array`.
    #[wasm_bindgen(js_name = "readBinary")]
    pub fn read_binary(&self, path: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            let bytes = ws.read_bytes(&path).await.js()?;
            Ok(Uint8Array::from(bytes.as_slice()).into())
        })
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create a file and any missing folders. Resolves to its path.
    #[wasm_bindgen(js_name = "createFile")]
    pub fn create_file(&self, path: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            let created = ws.create_file(&path).await.js()?;
            Ok(JsValue::from_str(created.as_str()))
        })
    }

    /// Create folder `name` inside `parent` (`""` for the root).
    #[wasm_bindgen(js_name = "createFolder")]
    pub fn create_folder(&self, parent: String, name: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            let created = ws.create_folder(&parent, &name).await.js()?;
            Ok(JsValue::from_str(created.as_str()))
        })
    }

    /// Delete a file, or a folder and everything in it.
    #[wasm_bindgen]
    pub fn delete(&self, path: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            ws.delete(&path).await.js()?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Move `source` into folder `target`. Resolves to the new path.
    #[wasm_bindgen(js_name = "moveEntry")]
    pub fn move_entry(&self, source: String, target: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            let moved = ws.move_entry(&source, &target).await.js()?;
            Ok(JsValue::from_str(moved.as_str()))
        })
    }

    /// Save text to an existing file.
    #[wasm_bindgen(js_name = "saveFile")]
    pub fn save_file(&self, path: String, content: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            ws.save_file(&path, &content).await.js()?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Save bytes to an existing file.
    #[wasm_bindgen(js_name = "saveBinary")]
    pub fn save_binary(&self, path: String, data: Uint8Array) -> Promise {
        let ws = Rc::clone(&self.ws);
        let data = data.to_vec();
        future_to_promise(async move {
            ws.save_bytes(&path, &data).await.js()?;
            Ok(JsValue::UNDEFINED)
        })
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Select a file. Returns the selection, `undefined` if `path` is not a file.
    #[wasm_bindgen]
    pub fn select(&self, path: &str) -> Option<String> {
        self.ws.select(path).map(|p| p.to_string())
    }

    /// The selected file.
    #[wasm_bindgen]
    pub fn selected(&self) -> Option<String> {
        self.ws.selected().map(|p| p.to_string())
    }

    // ========================================================================
    // Drag and drop
    // ========================================================================

    /// Start dragging the entry at `path`.
    #[wasm_bindgen(js_name = "beginDrag")]
    pub fn begin_drag(&self, path: &str) -> Result<(), JsValue> {
        let key = parse_key(path)?;
        let tree = self.ws.tree().js()?;
        self.dnd.borrow_mut().begin_drag(&tree, &key).js()
    }

    /// Offer the folder at `path` as drop target. Returns `{ accepted, reason }`.
    #[wasm_bindgen]
    pub fn hover(&self, path: &str) -> Result<JsValue, JsValue> {
        let key = parse_key(path)?;
        let tree = self.ws.tree().js()?;
        let Some(folder) = tree.find_folder(&key) else {
            return to_js(&HoverResult {
                accepted: false,
                reason: Some(format!("'{}' is not a folder", key)),
            });
        };

        let result = match self.dnd.borrow_mut().hover(folder) {
            HoverOutcome::Accepted => HoverResult {
                accepted: true,
                reason: None,
            },
            HoverOutcome::Rejected(reason) => HoverResult {
                accepted: false,
                reason: Some(reason.to_string()),
            },
            HoverOutcome::NotDragging => HoverResult {
                accepted: false,
                reason: Some("no drag in progress".to_string()),
            },
        };
        to_js(&result)
    }

    /// The pointer left the folder at `path`.
    #[wasm_bindgen]
    pub fn leave(&self, path: &str) -> Result<(), JsValue> {
        let key = parse_key(path)?;
        self.dnd.borrow_mut().leave(&key);
        Ok(())
    }

    /// End the drag. Resolves to the moved entry's new path, or `null` when
    /// there was no target.
    #[wasm_bindgen(js_name = "drop")]
    pub fn finish_drag(&self) -> Promise {
        let request = DragAndDropCoordinator::drop(&mut self.dnd.borrow_mut());
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            let Some(request) = request else {
                return Ok(JsValue::NULL);
            };
            let moved = ws.apply_drop(request).await.js()?;
            Ok(JsValue::from_str(moved.as_str()))
        })
    }

    /// Abandon the drag.
    #[wasm_bindgen(js_name = "cancelDrag")]
    pub fn cancel_drag(&self) {
        self.dnd.borrow_mut().cancel();
    }

    /// Path being dragged, if any.
    #[wasm_bindgen(js_name = "draggedPath")]
    pub fn dragged_path(&self) -> Option<String> {
        self.dnd.borrow().dragged_path().map(|p| p.to_string())
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Path of the document the engine compiles.
    #[wasm_bindgen(js_name = "getMainFile")]
    pub fn get_main_file(&self) -> String {
        self.ws.main_file().to_string()
    }

    /// Change the main document and persist it in the workspace config.
    #[wasm_bindgen(js_name = "setMainFile")]
    pub fn set_main_file(&self, path: String) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            ws.set_main_file(&path).js()?;
            ws.save_config().await.js()?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Mirror the workspace into `engine` and set its main file.
    ///
    /// `buffers` maps paths to unsaved editor text, e.g.
    /// `{ 'main.tex': editor.getValue() }`. Resolves to
    /// `{ directories, files, bytes }`.
    #[wasm_bindgen]
    pub fn build(&self, engine: JsEngineFilesystem, buffers: JsValue) -> Promise {
        let ws = Rc::clone(&self.ws);
        future_to_promise(async move {
            let overlays = parse_overlays(buffers)?;
            let report = ws.prepare_build(&engine, overlays).await.js()?;
            to_js(&report)
        })
    }

    /// Stop a running build before its next file.
    #[wasm_bindgen(js_name = "cancelBuild")]
    pub fn cancel_build(&self) {
        self.ws.cancel_build();
    }

    // ========================================================================
    // Events
    // ========================================================================

    /// Call `callback(event)` for every workspace event. Returns an id for
    /// `unsubscribe`.
    #[wasm_bindgen]
    pub fn subscribe(&self, callback: Function) -> f64 {
        let id = self.ws.subscribe(Arc::new(move |event: &WorkspaceEvent| {
            let value = match serde_wasm_bindgen::to_value(event) {
                Ok(value) => value,
                Err(e) => {
                    log::warn!("Could not serialize event {:?}: {}", event, e);
                    return;
                }
            };
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                log::warn!("Event callback threw: {:?}", e);
            }
        }));
        id as f64
    }

    /// Remove a listener by the id `subscribe` returned. Returns whether it
    /// was registered.
    #[wasm_bindgen]
    pub fn unsubscribe(&self, id: f64) -> bool {
        self.ws.unsubscribe(id as u64)
    }
}

/// `{ path: text }` from JS into overlay pairs. `undefined`/`null` means none.
fn parse_overlays(buffers: JsValue) -> Result<Vec<(PathKey, String)>, JsValue> {
    if buffers.is_undefined() || buffers.is_null() {
        return Ok(Vec::new());
    }
    let map: HashMap<String, String> = serde_wasm_bindgen::from_value(buffers)
        .map_err(|e| js_error("InvalidBuffers", e.to_string()))?;
    map.into_iter()
        .map(|(path, text)| Ok((PathKey::parse(&path)?, text)))
        .collect::<Result<Vec<_>, WorkspaceError>>()
        .js()
}
