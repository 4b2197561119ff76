//! Storage abstraction module.
//!
//! The workspace lives in a handle-based storage root: you never address an
//! entry by path, you ask a directory handle for a named child. This module
//! provides the [`StorageAdapter`] trait describing exactly that capability
//! set, so the tree can be built over the browser's origin-private file
//! system, a directory on disk, or an in-memory arena.
//!
//! ## Object safety
//!
//! Like the rest of the crate the trait returns boxed futures, which keeps
//! implementations free of any particular async runtime. On native targets
//! the futures and handles are `Send`; on WASM they are not, since browser
//! handles wrap `JsValue`s.

mod memory;
#[cfg(not(target_arch = "wasm32"))]
mod native;

pub use memory::{InMemoryStorage, MemDirHandle, MemFileHandle, StorageOp};
#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeStorage;

use std::fmt;
use std::future::Future;
use std::io::{Error, ErrorKind, Result};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A boxed future for object-safe async methods.
///
/// On native targets, futures are `Send` for compatibility with multi-threaded runtimes.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A boxed future for object-safe async methods.
///
/// WASM version without `Send` requirement - JavaScript is single-threaded.
#[cfg(target_arch = "wasm32")]
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// `Send + Sync` on native targets, no bound on WASM.
#[cfg(not(target_arch = "wasm32"))]
pub trait MaybeSend: Send + Sync {}
#[cfg(not(target_arch = "wasm32"))]
impl<T: Send + Sync + ?Sized> MaybeSend for T {}

/// `Send + Sync` on native targets, no bound on WASM.
#[cfg(target_arch = "wasm32")]
pub trait MaybeSend {}
#[cfg(target_arch = "wasm32")]
impl<T: ?Sized> MaybeSend for T {}

/// Kind of a storage entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// A regular file
    File,
    /// A directory
    Directory,
}

impl EntryKind {
    /// Human name used in messages ("file" or "folder").
    pub fn noun(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "folder",
        }
    }
}

/// One child of a directory as reported by [`StorageAdapter::list_entries`].
pub enum StorageEntry<F, D> {
    /// A file and its handle
    File {
        /// Local name inside the directory
        name: String,
        /// Handle to the file
        handle: F,
    },
    /// A directory and its handle
    Directory {
        /// Local name inside the directory
        name: String,
        /// Handle to the directory
        handle: D,
    },
}

impl<F, D> StorageEntry<F, D> {
    /// Local name of the entry.
    pub fn name(&self) -> &str {
        match self {
            StorageEntry::File { name, .. } | StorageEntry::Directory { name, .. } => name,
        }
    }

    /// Kind of the entry.
    pub fn kind(&self) -> EntryKind {
        match self {
            StorageEntry::File { .. } => EntryKind::File,
            StorageEntry::Directory { .. } => EntryKind::Directory,
        }
    }
}

impl<F, D> fmt::Debug for StorageEntry<F, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageEntry")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Entry list type returned by [`StorageAdapter::list_entries`].
pub type EntryList<S> =
    Vec<StorageEntry<<S as StorageAdapter>::FileHandle, <S as StorageAdapter>::DirHandle>>;

/// Capability interface over a handle-based storage root.
///
/// Handles are opaque capabilities, not owned resources. A handle obtained
/// before a mutation may refer to an entry that no longer exists afterwards;
/// implementations report that as `ErrorKind::NotFound`.
///
/// Error kinds implementations are expected to use:
/// - `NotFound` for missing entries and stale handles
/// - `IsADirectory` when a file was requested where a directory exists
/// - `NotADirectory` when a directory was requested where a file exists
/// - `DirectoryNotEmpty` for a non-recursive removal of a non-empty directory
pub trait StorageAdapter: MaybeSend {
    /// Opaque handle to a file.
    type FileHandle: Clone + fmt::Debug + MaybeSend;
    /// Opaque handle to a directory.
    type DirHandle: Clone + fmt::Debug + MaybeSend;

    /// Open the storage root.
    fn open_root(&self) -> BoxFuture<'_, Result<Self::DirHandle>>;

    /// Enumerate the direct children of a directory, in no particular order.
    fn list_entries<'a>(&'a self, dir: &'a Self::DirHandle) -> BoxFuture<'a, Result<EntryList<Self>>>;

    /// Get the named child file, creating an empty one if absent.
    ///
    /// An existing file is returned untouched (not truncated).
    fn get_or_create_file<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Self::FileHandle>>;

    /// Get the named child directory, creating it if absent.
    fn get_or_create_directory<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Self::DirHandle>>;

    /// Remove the named child. Directories with entries require `recursive`.
    fn remove_entry<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
        recursive: bool,
    ) -> BoxFuture<'a, Result<()>>;

    /// Read the full content of a file.
    fn read_bytes<'a>(&'a self, file: &'a Self::FileHandle) -> BoxFuture<'a, Result<Vec<u8>>>;

    /// Read a file as UTF-8 text.
    fn read_text<'a>(&'a self, file: &'a Self::FileHandle) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let bytes = self.read_bytes(file).await?;
            String::from_utf8(bytes).map_err(|e| Error::new(ErrorKind::InvalidData, e))
        })
    }

    /// Replace the full content of a file.
    fn write_bytes<'a>(
        &'a self,
        file: &'a Self::FileHandle,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<()>>;
}

// Blanket implementation for references to StorageAdapter
impl<T: StorageAdapter + ?Sized> StorageAdapter for &T {
    type FileHandle = T::FileHandle;
    type DirHandle = T::DirHandle;

    fn open_root(&self) -> BoxFuture<'_, Result<Self::DirHandle>> {
        (**self).open_root()
    }

    fn list_entries<'a>(&'a self, dir: &'a Self::DirHandle) -> BoxFuture<'a, Result<EntryList<Self>>> {
        (**self).list_entries(dir)
    }

    fn get_or_create_file<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Self::FileHandle>> {
        (**self).get_or_create_file(dir, name)
    }

    fn get_or_create_directory<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, Result<Self::DirHandle>> {
        (**self).get_or_create_directory(dir, name)
    }

    fn remove_entry<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
        recursive: bool,
    ) -> BoxFuture<'a, Result<()>> {
        (**self).remove_entry(dir, name, recursive)
    }

    fn read_bytes<'a>(&'a self, file: &'a Self::FileHandle) -> BoxFuture<'a, Result<Vec<u8>>> {
        (**self).read_bytes(file)
    }

    fn read_text<'a>(&'a self, file: &'a Self::FileHandle) -> BoxFuture<'a, Result<String>> {
        (**self).read_text(file)
    }

    fn write_bytes<'a>(
        &'a self,
        file: &'a Self::FileHandle,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<()>> {
        (**self).write_bytes(file, content)
    }
}
