//! Replication of the workspace into the engine filesystem.
//!
//! The typesetting engine compiles out of its own private memory
//! filesystem, which knows nothing about the storage root. Before every
//! build the whole tree is copied across: folders first, then the raw bytes
//! of every file. There is no diffing; the engine keeps no record of what
//! was synced last time, and a full walk is cheap next to a compile.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use ts_rs::TS;

use crate::error::{Result, WorkspaceError};
use crate::path_key::PathKey;
use crate::storage::StorageAdapter;
use crate::tree::{FolderNode, Node};

/// Content handed to the engine filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineContent<'a> {
    /// An unsaved editor buffer
    Text(&'a str),
    /// Raw file bytes, written verbatim
    Bytes(&'a [u8]),
}

impl EngineContent<'_> {
    /// The content as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            EngineContent::Text(text) => text.as_bytes(),
            EngineContent::Bytes(bytes) => bytes,
        }
    }
}

/// The engine's private filesystem.
///
/// Synchronous, since the engine exposes it as plain calls on a worker
/// proxy. Paths are root-relative keys.
pub trait EngineFilesystem {
    /// Make sure a directory exists at `path`.
    fn ensure_directory(&self, path: &PathKey) -> io::Result<()>;

    /// Create or overwrite the file at `path`.
    fn write_file(&self, path: &PathKey, content: EngineContent<'_>) -> io::Result<()>;

    /// Tell the engine which file to compile.
    fn set_main_entry_point(&self, path: &PathKey) -> io::Result<()>;
}

/// What one mirror pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MirrorReport {
    /// Directories ensured (not counting the root)
    pub directories: usize,
    /// Files written
    pub files: usize,
    /// Total bytes written
    pub bytes: usize,
}

/// Copies a workspace tree into an [`EngineFilesystem`].
pub struct MirrorSync<'a, S: StorageAdapter> {
    storage: &'a S,
    overlays: HashMap<PathKey, String>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, S: StorageAdapter> MirrorSync<'a, S> {
    /// Mirror from `storage`.
    pub fn new(storage: &'a S) -> Self {
        Self {
            storage,
            overlays: HashMap::new(),
            cancel: None,
        }
    }

    /// Use these texts instead of the stored content for their paths.
    ///
    /// This is how unsaved editor buffers reach the compiler.
    pub fn with_overlays(mut self, overlays: impl IntoIterator<Item = (PathKey, String)>) -> Self {
        self.overlays.extend(overlays);
        self
    }

    /// Stop between files once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    /// Copy every folder and file under `root` into `engine`.
    ///
    /// Pre-order, so a directory is always ensured before anything inside
    /// it is written. The first file that can't be read or written aborts
    /// the pass with [`WorkspaceError::MirrorSyncFailure`].
    pub async fn sync<E>(&self, root: &FolderNode<S>, engine: &E) -> Result<MirrorReport>
    where
        E: EngineFilesystem + ?Sized,
    {
        let mut report = MirrorReport::default();
        let mut stack: Vec<&Node<S>> = root.children().iter().rev().collect();

        while let Some(node) = stack.pop() {
            match node {
                Node::Folder(folder) => {
                    engine
                        .ensure_directory(folder.path())
                        .map_err(|source| WorkspaceError::MirrorSyncFailure {
                            path: folder.path().clone(),
                            source,
                        })?;
                    report.directories += 1;
                    stack.extend(folder.children().iter().rev());
                }
                Node::File(file) => {
                    if self.cancelled() {
                        log::debug!("Mirror cancelled after {} files", report.files);
                        return Err(WorkspaceError::MirrorCancelled {
                            files_written: report.files,
                        });
                    }

                    let written = if let Some(text) = self.overlays.get(file.path()) {
                        engine
                            .write_file(file.path(), EngineContent::Text(text))
                            .map(|()| text.len())
                    } else {
                        let bytes = self.storage.read_bytes(file.handle()).await.map_err(
                            |source| WorkspaceError::MirrorSyncFailure {
                                path: file.path().clone(),
                                source,
                            },
                        )?;
                        engine
                            .write_file(file.path(), EngineContent::Bytes(&bytes))
                            .map(|()| bytes.len())
                    };
                    let written = written.map_err(|source| WorkspaceError::MirrorSyncFailure {
                        path: file.path().clone(),
                        source,
                    })?;
                    report.files += 1;
                    report.bytes += written;
                }
            }
        }

        for path in self.overlays.keys() {
            if !matches!(root.find_by_path(path), Some(Node::File(_))) {
                log::warn!("Ignoring editor buffer for '{}': not a file in the workspace", path);
            }
        }

        log::debug!(
            "Mirrored {} directories, {} files ({} bytes)",
            report.directories,
            report.files,
            report.bytes
        );
        Ok(report)
    }
}

// ============================================================================
// InMemoryEngineFs - Available on all targets, including WASM
// ============================================================================

/// One call recorded by [`InMemoryEngineFs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOp {
    /// `ensure_directory(path)`
    EnsureDirectory(String),
    /// `write_file(path, ..)`
    WriteFile(String),
    /// `set_main_entry_point(path)`
    SetMain(String),
}

#[derive(Default)]
struct EngineState {
    directories: BTreeSet<String>,
    files: BTreeMap<String, Vec<u8>>,
    main: Option<String>,
    ops: Vec<EngineOp>,
}

/// An engine filesystem held in memory.
///
/// Useful for embedding the workspace without a real engine and for tests,
/// which can inspect the written files and the order of calls.
#[derive(Clone, Default)]
pub struct InMemoryEngineFs {
    state: Arc<Mutex<EngineState>>,
}

impl InMemoryEngineFs {
    /// Create an empty engine filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes of the file at `path`.
    pub fn read(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    /// Text of the file at `path`, if present and valid UTF-8.
    pub fn read_to_string(&self, path: &str) -> Option<String> {
        self.read(path).and_then(|bytes| String::from_utf8(bytes).ok())
    }

    /// Whether a directory was ensured at `path`.
    pub fn has_directory(&self, path: &str) -> bool {
        self.lock().directories.contains(path)
    }

    /// Paths of all written files, sorted.
    pub fn file_paths(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    /// The main entry point last set.
    pub fn main_entry_point(&self) -> Option<String> {
        self.lock().main.clone()
    }

    /// Every call made so far, in order.
    pub fn ops(&self) -> Vec<EngineOp> {
        self.lock().ops.clone()
    }
}

impl EngineFilesystem for InMemoryEngineFs {
    fn ensure_directory(&self, path: &PathKey) -> io::Result<()> {
        let mut state = self.lock();
        state.directories.insert(path.as_str().to_string());
        state.ops.push(EngineOp::EnsureDirectory(path.as_str().to_string()));
        Ok(())
    }

    fn write_file(&self, path: &PathKey, content: EngineContent<'_>) -> io::Result<()> {
        let mut state = self.lock();
        if let Some(parent) = path.parent()
            && !parent.is_root()
            && !state.directories.contains(parent.as_str())
        {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no directory '{}' in engine filesystem", parent),
            ));
        }
        state
            .files
            .insert(path.as_str().to_string(), content.as_bytes().to_vec());
        state.ops.push(EngineOp::WriteFile(path.as_str().to_string()));
        Ok(())
    }

    fn set_main_entry_point(&self, path: &PathKey) -> io::Result<()> {
        let mut state = self.lock();
        state.main = Some(path.as_str().to_string());
        state.ops.push(EngineOp::SetMain(path.as_str().to_string()));
        Ok(())
    }
}

// ============================================================================
// DirectoryEngineFs - Native only
// ============================================================================

#[cfg(not(target_arch = "wasm32"))]
pub use native::DirectoryEngineFs;

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::fs;
    use std::io;
    use std::path::{Path, PathBuf};
    use std::sync::{Mutex, PoisonError};

    use super::{EngineContent, EngineFilesystem};
    use crate::path_key::PathKey;

    /// Mirrors into a directory on disk, for handing to a native TeX toolchain.
    #[derive(Debug)]
    pub struct DirectoryEngineFs {
        root: PathBuf,
        main: Mutex<Option<PathKey>>,
    }

    impl DirectoryEngineFs {
        /// Write under `root`. The directory is created on first use.
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                main: Mutex::new(None),
            }
        }

        /// The output directory.
        pub fn root(&self) -> &Path {
            &self.root
        }

        /// Main entry point last set, as a path under the output directory.
        pub fn main_entry_point(&self) -> Option<PathBuf> {
            let main = self.main.lock().unwrap_or_else(PoisonError::into_inner);
            main.as_ref().map(|key| self.resolve(key))
        }

        fn resolve(&self, key: &PathKey) -> PathBuf {
            key.segments().fold(self.root.clone(), |acc, s| acc.join(s))
        }
    }

    impl EngineFilesystem for DirectoryEngineFs {
        fn ensure_directory(&self, path: &PathKey) -> io::Result<()> {
            fs::create_dir_all(self.resolve(path))
        }

        fn write_file(&self, path: &PathKey, content: EngineContent<'_>) -> io::Result<()> {
            let target = self.resolve(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(target, content.as_bytes())
        }

        fn set_main_entry_point(&self, path: &PathKey) -> io::Result<()> {
            *self.main.lock().unwrap_or_else(PoisonError::into_inner) = Some(path.clone());
            Ok(())
        }
    }
}
