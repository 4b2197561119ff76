//! [`StorageAdapter`] over the browser's origin-private file system.
//!
//! OPFS is handle-based already, so this is a thin mapping: directory and
//! file handles from the `opfs` crate become the adapter's handles, and OPFS
//! DOMException names become `io::ErrorKind`s the core understands.
//!
//! Works on the main thread and in workers; the OPFS root is looked up on
//! whatever global scope the module runs in.

use std::fmt;
use std::io::{Error, ErrorKind, Result};

use futures::StreamExt;
use opfs::persistent::{self, DirectoryHandle, FileHandle};
use opfs::{
    CreateWritableOptions, DirectoryEntry, DirectoryHandle as _, FileHandle as _,
    GetDirectoryHandleOptions, GetFileHandleOptions, WritableFileStream as _,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use webtex_core::storage::{BoxFuture, EntryList, StorageAdapter, StorageEntry};

/// A directory in OPFS, with its workspace path for diagnostics.
#[derive(Clone)]
pub struct OpfsDir {
    handle: DirectoryHandle,
    path: String,
}

/// A file in OPFS, with its workspace path for diagnostics.
#[derive(Clone)]
pub struct OpfsFile {
    handle: FileHandle,
    path: String,
}

impl fmt::Debug for OpfsDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpfsDir({:?})", self.path)
    }
}

impl fmt::Debug for OpfsFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpfsFile({:?})", self.path)
    }
}

fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", parent, name)
    }
}

/// OPFS directory opened when the page names none.
pub const DEFAULT_ROOT_DIR: &str = "webtex";

/// Storage root inside a named OPFS directory.
#[derive(Clone)]
pub struct OpfsStorage {
    root: DirectoryHandle,
    name: String,
}

impl fmt::Debug for OpfsStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpfsStorage")
            .field("name", &self.name)
            .finish()
    }
}

impl OpfsStorage {
    /// Open (creating if needed) the OPFS directory `root_name`.
    pub async fn open(root_name: &str) -> std::result::Result<Self, JsValue> {
        let opfs_root = get_opfs_root().await?;
        let options = GetDirectoryHandleOptions { create: true };
        let root = DirectoryHandle::from(opfs_root)
            .get_directory_handle_with_options(root_name, &options)
            .await
            .map_err(|e| JsValue::from_str(&format!("Failed to open '{}': {:?}", root_name, e)))?;

        log::info!("Opened OPFS workspace '{}'", root_name);
        Ok(Self {
            root,
            name: root_name.to_string(),
        })
    }

    /// Name of the OPFS directory backing this storage.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// `navigator.storage.getDirectory()` on either a Window or a worker scope.
async fn get_opfs_root() -> std::result::Result<web_sys::FileSystemDirectoryHandle, JsValue> {
    let global = js_sys::global();
    let navigator = js_sys::Reflect::get(&global, &JsValue::from_str("navigator"))?;
    if navigator.is_undefined() {
        return Err(JsValue::from_str("No navigator in this global scope"));
    }
    let storage = js_sys::Reflect::get(&navigator, &JsValue::from_str("storage"))?;
    if storage.is_undefined() {
        return Err(JsValue::from_str("navigator.storage is unavailable"));
    }

    let get_directory = js_sys::Reflect::get(&storage, &JsValue::from_str("getDirectory"))?;
    let get_directory = get_directory
        .dyn_ref::<js_sys::Function>()
        .ok_or_else(|| JsValue::from_str("navigator.storage.getDirectory is not a function"))?;
    let promise = get_directory.call0(&storage)?.dyn_into::<js_sys::Promise>()?;

    JsFuture::from(promise)
        .await?
        .dyn_into::<web_sys::FileSystemDirectoryHandle>()
}

/// Map an OPFS failure onto the `io::ErrorKind` the core classifies.
fn opfs_to_io_error(e: persistent::Error) -> Error {
    opfs_to_io_error_as(e, ErrorKind::InvalidInput)
}

/// Like [`opfs_to_io_error`], with the kind to report when the entry exists
/// as the other kind (`TypeMismatchError`).
fn opfs_to_io_error_as(e: persistent::Error, type_mismatch: ErrorKind) -> Error {
    let message = format!("{:?}", e);
    Error::new(error_kind(&message, type_mismatch), message)
}

fn error_kind(message: &str, type_mismatch: ErrorKind) -> ErrorKind {
    if message.contains("NotFoundError") {
        ErrorKind::NotFound
    } else if message.contains("InvalidModificationError") {
        ErrorKind::DirectoryNotEmpty
    } else if message.contains("TypeMismatchError") {
        type_mismatch
    } else {
        ErrorKind::Other
    }
}

async fn subdirectory(dir: &DirectoryHandle, name: &str) -> Option<DirectoryHandle> {
    let options = GetDirectoryHandleOptions { create: false };
    dir.get_directory_handle_with_options(name, &options)
        .await
        .ok()
}

async fn is_file(dir: &DirectoryHandle, name: &str) -> bool {
    let options = GetFileHandleOptions { create: false };
    dir.get_file_handle_with_options(name, &options)
        .await
        .is_ok()
}

/// Names of the direct children of `dir`, folders flagged.
async fn child_names(dir: &DirectoryHandle) -> Result<Vec<(String, bool)>> {
    let mut stream = dir.entries().await.map_err(opfs_to_io_error)?;
    let mut names = Vec::new();
    while let Some(entry) = stream.next().await {
        let (name, entry) = entry.map_err(opfs_to_io_error)?;
        names.push((name, matches!(entry, DirectoryEntry::Directory(_))));
    }
    Ok(names)
}

/// Remove everything below `dir`, deepest entries first.
fn clear_directory(dir: DirectoryHandle) -> BoxFuture<'static, Result<()>> {
    Box::pin(async move {
        let mut dir = dir;
        for (name, is_dir) in child_names(&dir).await? {
            if is_dir && let Some(child) = subdirectory(&dir, &name).await {
                clear_directory(child).await?;
            }
            dir.remove_entry(&name).await.map_err(opfs_to_io_error)?;
        }
        Ok(())
    })
}

impl StorageAdapter for OpfsStorage {
    type FileHandle = OpfsFile;
    type DirHandle = OpfsDir;

    fn open_root(&self) -> BoxFuture<'_, Result<OpfsDir>> {
        Box::pin(async move {
            Ok(OpfsDir {
                handle: self.root.clone(),
                path: String::new(),
            })
        })
    }

    fn list_entries<'a>(&'a self, dir: &'a OpfsDir) -> BoxFuture<'a, Result<EntryList<Self>>> {
        Box::pin(async move {
            let mut stream = dir.handle.entries().await.map_err(opfs_to_io_error)?;
            let mut entries = Vec::new();
            while let Some(entry) = stream.next().await {
                match entry {
                    Ok((name, DirectoryEntry::File(handle))) => {
                        let path = child_path(&dir.path, &name);
                        entries.push(StorageEntry::File {
                            name,
                            handle: OpfsFile { handle, path },
                        });
                    }
                    Ok((name, DirectoryEntry::Directory(handle))) => {
                        let path = child_path(&dir.path, &name);
                        entries.push(StorageEntry::Directory {
                            name,
                            handle: OpfsDir { handle, path },
                        });
                    }
                    Err(e) => return Err(opfs_to_io_error(e)),
                }
            }
            Ok(entries)
        })
    }

    fn get_or_create_file<'a>(
        &'a self,
        dir: &'a OpfsDir,
        name: &'a str,
    ) -> BoxFuture<'a, Result<OpfsFile>> {
        Box::pin(async move {
            let path = child_path(&dir.path, name);
            if subdirectory(&dir.handle, name).await.is_some() {
                return Err(Error::new(
                    ErrorKind::IsADirectory,
                    format!("'{}' is a folder", path),
                ));
            }
            let options = GetFileHandleOptions { create: true };
            let handle = dir
                .handle
                .get_file_handle_with_options(name, &options)
                .await
                .map_err(|e| opfs_to_io_error_as(e, ErrorKind::IsADirectory))?;
            Ok(OpfsFile { handle, path })
        })
    }

    fn get_or_create_directory<'a>(
        &'a self,
        dir: &'a OpfsDir,
        name: &'a str,
    ) -> BoxFuture<'a, Result<OpfsDir>> {
        Box::pin(async move {
            let path = child_path(&dir.path, name);
            if is_file(&dir.handle, name).await {
                return Err(Error::new(
                    ErrorKind::NotADirectory,
                    format!("'{}' is a file", path),
                ));
            }
            let options = GetDirectoryHandleOptions { create: true };
            let handle = dir
                .handle
                .get_directory_handle_with_options(name, &options)
                .await
                .map_err(|e| opfs_to_io_error_as(e, ErrorKind::NotADirectory))?;
            Ok(OpfsDir { handle, path })
        })
    }

    fn remove_entry<'a>(
        &'a self,
        dir: &'a OpfsDir,
        name: &'a str,
        recursive: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if let Some(child) = subdirectory(&dir.handle, name).await {
                if recursive {
                    clear_directory(child).await?;
                } else if !child_names(&child).await?.is_empty() {
                    return Err(Error::new(
                        ErrorKind::DirectoryNotEmpty,
                        format!("'{}' is not empty", child_path(&dir.path, name)),
                    ));
                }
            }
            let mut parent = dir.handle.clone();
            parent.remove_entry(name).await.map_err(opfs_to_io_error)
        })
    }

    fn read_bytes<'a>(&'a self, file: &'a OpfsFile) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move { file.handle.read().await.map_err(opfs_to_io_error) })
    }

    fn write_bytes<'a>(&'a self, file: &'a OpfsFile, content: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut handle = file.handle.clone();
            let options = CreateWritableOptions {
                keep_existing_data: false,
            };
            let mut writer = handle
                .create_writable_with_options(&options)
                .await
                .map_err(opfs_to_io_error)?;
            writer
                .write_at_cursor_pos(content.to_vec())
                .await
                .map_err(opfs_to_io_error)?;
            writer.close().await.map_err(opfs_to_io_error)?;
            log::debug!("Wrote {} bytes to '{}'", content.len(), file.path);
            Ok(())
        })
    }
}
