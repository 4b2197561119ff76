//! WebAssembly bindings for the WebTeX workspace filesystem.
//!
//! The browser editor keeps its project in the origin-private file system
//! (OPFS) and compiles it with a TeX engine that has its own in-memory
//! filesystem. This crate exposes [`WebTexBackend`] to JavaScript: it owns
//! the [`Workspace`](webtex_core::Workspace) session over OPFS, the
//! drag-and-drop state of the file tree, and the mirror into the engine.
//!
//! ```javascript
//! import init, { WebTexBackend } from './wasm/webtex_wasm.js';
//!
//! await init();
//! const backend = await WebTexBackend.create();
//! backend.subscribe((event) => console.log(event.type));
//! const tree = await backend.getTree();
//! await backend.build(engine, { 'main.tex': editor.getValue() });
//! ```

#[cfg(target_arch = "wasm32")]
mod backend;
#[cfg(target_arch = "wasm32")]
mod engine_fs;
#[cfg(target_arch = "wasm32")]
mod error;
#[cfg(target_arch = "wasm32")]
mod opfs_storage;

#[cfg(target_arch = "wasm32")]
pub use backend::WebTexBackend;
#[cfg(target_arch = "wasm32")]
pub use engine_fs::JsEngineFilesystem;
#[cfg(target_arch = "wasm32")]
pub use opfs_storage::OpfsStorage;

use wasm_bindgen::prelude::*;

// ============================================================================
// Initialization
// ============================================================================

/// Route Rust panics to `console.error` with a stack trace.
#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

/// Initialize the WASM module. Called automatically on module load.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    set_panic_hook();

    // A second init (hot reload) finds the logger already installed
    if console_log::init_with_level(log::Level::Info).is_err() {
        log::debug!("console logger already initialized");
    }
}
