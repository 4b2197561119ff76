// ============================================================================
// InMemoryStorage - Available on all targets, including WASM
// ============================================================================

use std::collections::{BTreeMap, HashMap};
use std::io::{Error, ErrorKind, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{BoxFuture, EntryList, StorageAdapter, StorageEntry};

const ROOT_ID: u64 = 0;

/// Handle to a directory inside an [`InMemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemDirHandle(u64);

/// Handle to a file inside an [`InMemoryStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemFileHandle(u64);

/// Storage operations, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    /// [`StorageAdapter::open_root`]
    OpenRoot,
    /// [`StorageAdapter::list_entries`]
    ListEntries,
    /// [`StorageAdapter::get_or_create_file`]
    GetOrCreateFile,
    /// [`StorageAdapter::get_or_create_directory`]
    GetOrCreateDirectory,
    /// [`StorageAdapter::remove_entry`]
    RemoveEntry,
    /// [`StorageAdapter::read_bytes`]
    ReadBytes,
    /// [`StorageAdapter::write_bytes`]
    WriteBytes,
}

enum Entry {
    Dir { children: BTreeMap<String, u64> },
    File { bytes: Vec<u8> },
}

struct Arena {
    entries: HashMap<u64, Entry>,
    next_id: u64,
    pending_failures: Vec<StorageOp>,
}

impl Arena {
    fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(
            ROOT_ID,
            Entry::Dir {
                children: BTreeMap::new(),
            },
        );
        Self {
            entries,
            next_id: ROOT_ID + 1,
            pending_failures: Vec::new(),
        }
    }

    fn alloc(&mut self, entry: Entry) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    fn children(&self, dir: u64) -> Result<&BTreeMap<String, u64>> {
        match self.entries.get(&dir) {
            Some(Entry::Dir { children }) => Ok(children),
            Some(Entry::File { .. }) => Err(Error::new(
                ErrorKind::NotADirectory,
                "handle refers to a file",
            )),
            None => Err(stale()),
        }
    }

    fn child(&self, dir: u64, name: &str) -> Result<Option<u64>> {
        Ok(self.children(dir)?.get(name).copied())
    }

    fn is_dir(&self, id: u64) -> bool {
        matches!(self.entries.get(&id), Some(Entry::Dir { .. }))
    }

    fn link(&mut self, dir: u64, name: &str, id: u64) -> Result<()> {
        match self.entries.get_mut(&dir) {
            Some(Entry::Dir { children }) => {
                children.insert(name.to_string(), id);
                Ok(())
            }
            _ => Err(stale()),
        }
    }

    fn get_or_create_file(&mut self, dir: u64, name: &str) -> Result<u64> {
        match self.child(dir, name)? {
            Some(id) if self.is_dir(id) => Err(Error::new(
                ErrorKind::IsADirectory,
                format!("'{name}' is a directory"),
            )),
            Some(id) => Ok(id),
            None => {
                let id = self.alloc(Entry::File { bytes: Vec::new() });
                self.link(dir, name, id)?;
                Ok(id)
            }
        }
    }

    fn get_or_create_directory(&mut self, dir: u64, name: &str) -> Result<u64> {
        match self.child(dir, name)? {
            Some(id) if !self.is_dir(id) => Err(Error::new(
                ErrorKind::NotADirectory,
                format!("'{name}' is a file"),
            )),
            Some(id) => Ok(id),
            None => {
                let id = self.alloc(Entry::Dir {
                    children: BTreeMap::new(),
                });
                self.link(dir, name, id)?;
                Ok(id)
            }
        }
    }

    fn remove(&mut self, dir: u64, name: &str, recursive: bool) -> Result<()> {
        let id = self
            .child(dir, name)?
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("'{name}' not found")))?;

        if let Some(Entry::Dir { children }) = self.entries.get(&id)
            && !children.is_empty()
            && !recursive
        {
            return Err(Error::new(
                ErrorKind::DirectoryNotEmpty,
                format!("'{name}' is not empty"),
            ));
        }

        if let Some(Entry::Dir { children }) = self.entries.get_mut(&dir) {
            children.remove(name);
        }

        // Drop the whole subtree so outstanding handles into it go stale
        let mut doomed = vec![id];
        while let Some(next) = doomed.pop() {
            if let Some(Entry::Dir { children }) = self.entries.remove(&next) {
                doomed.extend(children.into_values());
            }
        }
        Ok(())
    }

    fn file(&self, id: u64) -> Result<&Vec<u8>> {
        match self.entries.get(&id) {
            Some(Entry::File { bytes }) => Ok(bytes),
            Some(Entry::Dir { .. }) => Err(Error::new(
                ErrorKind::IsADirectory,
                "handle refers to a directory",
            )),
            None => Err(stale()),
        }
    }

    fn file_mut(&mut self, id: u64) -> Result<&mut Vec<u8>> {
        match self.entries.get_mut(&id) {
            Some(Entry::File { bytes }) => Ok(bytes),
            Some(Entry::Dir { .. }) => Err(Error::new(
                ErrorKind::IsADirectory,
                "handle refers to a directory",
            )),
            None => Err(stale()),
        }
    }

    fn lookup(&self, path: &str) -> Option<u64> {
        let mut current = ROOT_ID;
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            current = self.child(current, segment).ok()??;
        }
        Some(current)
    }
}

fn stale() -> Error {
    Error::new(ErrorKind::NotFound, "handle no longer refers to an entry")
}

/// An in-memory storage root with OPFS-like semantics.
///
/// Handles are arena ids. Removing an entry drops its whole subtree, so any
/// handle into it fails with `NotFound` afterwards, the same as a browser
/// handle to a deleted entry.
///
/// Every adapter call is counted (see [`call_count`](Self::call_count)) and a
/// failure can be injected for the next call of a given operation, which is
/// how the failure paths of mutations and mirroring are tested.
#[derive(Clone)]
pub struct InMemoryStorage {
    arena: Arc<RwLock<Arena>>,
    calls: Arc<AtomicUsize>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    /// Create an empty storage root.
    pub fn new() -> Self {
        Self {
            arena: Arc::new(RwLock::new(Arena::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builder: add a file at a `/`-separated path, creating parent folders.
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        {
            let mut arena = self.write();
            let (dirs, leaf) = match path.rsplit_once('/') {
                Some((dirs, leaf)) => (dirs, leaf),
                None => ("", path),
            };
            let mut current = ROOT_ID;
            for segment in dirs.split('/').filter(|s| !s.is_empty()) {
                if let Ok(id) = arena.get_or_create_directory(current, segment) {
                    current = id;
                }
            }
            if let Ok(id) = arena.get_or_create_file(current, leaf)
                && let Ok(bytes) = arena.file_mut(id)
            {
                *bytes = content.into();
            }
        }
        self
    }

    /// Builder: add an (empty) folder at a `/`-separated path.
    pub fn with_dir(self, path: &str) -> Self {
        {
            let mut arena = self.write();
            let mut current = ROOT_ID;
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                if let Ok(id) = arena.get_or_create_directory(current, segment) {
                    current = id;
                }
            }
        }
        self
    }

    /// Number of adapter calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call of `op` fail with an `Other` error.
    pub fn fail_next(&self, op: StorageOp) {
        self.write().pending_failures.push(op);
    }

    /// Whether an entry exists at a `/`-separated path.
    pub fn exists(&self, path: &str) -> bool {
        self.read().lookup(path).is_some()
    }

    /// Whether a folder exists at a `/`-separated path.
    pub fn is_dir(&self, path: &str) -> bool {
        let arena = self.read();
        arena.lookup(path).is_some_and(|id| arena.is_dir(id))
    }

    /// Content of the file at a `/`-separated path.
    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        let arena = self.read();
        let id = arena.lookup(path)?;
        arena.file(id).ok().cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and consume an injected failure for `op`, if any.
    fn enter(&self, op: StorageOp) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut arena = self.write();
        if let Some(pos) = arena.pending_failures.iter().position(|p| *p == op) {
            arena.pending_failures.remove(pos);
            return Err(Error::other(format!("injected {op:?} failure")));
        }
        Ok(())
    }
}

impl StorageAdapter for InMemoryStorage {
    type FileHandle = MemFileHandle;
    type DirHandle = MemDirHandle;

    fn open_root(&self) -> BoxFuture<'_, Result<MemDirHandle>> {
        Box::pin(async move {
            self.enter(StorageOp::OpenRoot)?;
            Ok(MemDirHandle(ROOT_ID))
        })
    }

    fn list_entries<'a>(&'a self, dir: &'a MemDirHandle) -> BoxFuture<'a, Result<EntryList<Self>>> {
        Box::pin(async move {
            self.enter(StorageOp::ListEntries)?;
            let arena = self.read();
            let entries = arena
                .children(dir.0)?
                .iter()
                .map(|(name, id)| {
                    if arena.is_dir(*id) {
                        StorageEntry::Directory {
                            name: name.clone(),
                            handle: MemDirHandle(*id),
                        }
                    } else {
                        StorageEntry::File {
                            name: name.clone(),
                            handle: MemFileHandle(*id),
                        }
                    }
                })
                .collect();
            Ok(entries)
        })
    }

    fn get_or_create_file<'a>(
        &'a self,
        dir: &'a MemDirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, Result<MemFileHandle>> {
        Box::pin(async move {
            self.enter(StorageOp::GetOrCreateFile)?;
            self.write().get_or_create_file(dir.0, name).map(MemFileHandle)
        })
    }

    fn get_or_create_directory<'a>(
        &'a self,
        dir: &'a MemDirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, Result<MemDirHandle>> {
        Box::pin(async move {
            self.enter(StorageOp::GetOrCreateDirectory)?;
            self.write().get_or_create_directory(dir.0, name).map(MemDirHandle)
        })
    }

    fn remove_entry<'a>(
        &'a self,
        dir: &'a MemDirHandle,
        name: &'a str,
        recursive: bool,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.enter(StorageOp::RemoveEntry)?;
            self.write().remove(dir.0, name, recursive)
        })
    }

    fn read_bytes<'a>(&'a self, file: &'a MemFileHandle) -> BoxFuture<'a, Result<Vec<u8>>> {
        Box::pin(async move {
            self.enter(StorageOp::ReadBytes)?;
            self.read().file(file.0).cloned()
        })
    }

    fn write_bytes<'a>(
        &'a self,
        file: &'a MemFileHandle,
        content: &'a [u8],
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.enter(StorageOp::WriteBytes)?;
            let mut arena = self.write();
            let bytes = arena.file_mut(file.0)?;
            bytes.clear();
            bytes.extend_from_slice(content);
            Ok(())
        })
    }
}
