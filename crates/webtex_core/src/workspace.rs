//! The workspace session.
//!
//! [`Workspace`] is what a UI holds on to. It owns the storage adapter and
//! the current tree, runs mutations through [`TreeMutator`], and reloads the
//! tree after every one of them, successful or not. Everything is addressed
//! by path: handles never leave a single operation.
//!
//! At most one mutation runs at a time. A second one started while the
//! first is still awaiting storage fails with
//! [`WorkspaceError::MutationInFlight`] instead of racing it.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::WorkspaceConfig;
use crate::dnd::DropRequest;
use crate::error::{MoveRejection, Result, WorkspaceError};
use crate::events::{CallbackRegistry, EventCallback, SubscriptionId, WorkspaceEvent};
use crate::mirror::{EngineFilesystem, MirrorReport, MirrorSync};
use crate::mutator::TreeMutator;
use crate::path_key::PathKey;
use crate::storage::{EntryKind, StorageAdapter};
use crate::tree::{FolderNode, Node, WorkspaceTree};

/// Whether the workspace currently has a tree.
pub enum LoadState<S: StorageAdapter> {
    /// No load has completed yet.
    Unloaded,
    /// The last load succeeded.
    Loaded(Arc<FolderNode<S>>),
    /// The last load failed. No tree is shown, as opposed to an empty one.
    Failed(String),
}

impl<S: StorageAdapter> Clone for LoadState<S> {
    fn clone(&self) -> Self {
        match self {
            LoadState::Unloaded => LoadState::Unloaded,
            LoadState::Loaded(tree) => LoadState::Loaded(Arc::clone(tree)),
            LoadState::Failed(message) => LoadState::Failed(message.clone()),
        }
    }
}

impl<S: StorageAdapter> fmt::Debug for LoadState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadState::Unloaded => f.write_str("Unloaded"),
            LoadState::Loaded(tree) => f
                .debug_struct("Loaded")
                .field("files", &tree.file_count())
                .field("folders", &tree.folder_count())
                .finish(),
            LoadState::Failed(message) => f.debug_tuple("Failed").field(message).finish(),
        }
    }
}

/// What became of a [`Workspace::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The new tree is now current.
    Installed,
    /// A later load started while this one ran; its result was dropped.
    Superseded,
}

/// Clears the in-flight flag when the mutation ends, however it ends.
struct MutationGuard<'a>(&'a AtomicBool);

impl Drop for MutationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A WebTeX workspace over a storage root.
pub struct Workspace<S: StorageAdapter> {
    storage: S,
    config: RwLock<WorkspaceConfig>,
    state: RwLock<LoadState<S>>,
    selection: RwLock<Option<PathKey>>,
    generation: AtomicU64,
    mutating: AtomicBool,
    cancel_build: Arc<AtomicBool>,
    events: CallbackRegistry,
}

impl<S: StorageAdapter> Workspace<S> {
    /// Create an unloaded workspace with the default config.
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, WorkspaceConfig::default())
    }

    /// Create an unloaded workspace with `config`.
    pub fn with_config(storage: S, config: WorkspaceConfig) -> Self {
        Self {
            storage,
            config: RwLock::new(config),
            state: RwLock::new(LoadState::Unloaded),
            selection: RwLock::new(None),
            generation: AtomicU64::new(0),
            mutating: AtomicBool::new(false),
            cancel_build: Arc::new(AtomicBool::new(false)),
            events: CallbackRegistry::new(),
        }
    }

    /// Read `.webtex.toml` from the storage root (or use defaults), then load the tree.
    ///
    /// A failed tree load is not an error here; it shows up as
    /// [`LoadState::Failed`]. Only an unreadable config is.
    pub async fn open(storage: S) -> Result<Self> {
        let config = WorkspaceConfig::load_from(&storage).await?;
        let workspace = Self::with_config(storage, config);
        if let Err(e) = workspace.load().await {
            log::warn!("Workspace opened without a tree: {}", e);
        }
        Ok(workspace)
    }

    /// The storage adapter.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// A copy of the current config.
    pub fn config(&self) -> WorkspaceConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Write the current config to `.webtex.toml` in the storage root.
    pub async fn save_config(&self) -> Result<()> {
        self.config().save_to(&self.storage).await
    }

    /// Subscribe to workspace events.
    pub fn subscribe(&self, callback: EventCallback) -> SubscriptionId {
        self.events.subscribe(callback)
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    fn emit(&self, event: WorkspaceEvent) {
        self.events.emit(&event);
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Rebuild the tree from storage.
    ///
    /// If another load starts before this one finishes, this one's result is
    /// discarded (last load wins) and [`LoadOutcome::Superseded`] is returned.
    pub async fn load(&self) -> Result<LoadOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let options = self.config().load_options();
        let result = WorkspaceTree::load(&self.storage, &options).await;

        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("Discarding superseded tree load #{}", generation);
            return result.map(|_| LoadOutcome::Superseded);
        }

        match result {
            Ok(tree) => {
                let (files, folders) = (tree.file_count(), tree.folder_count());
                let tree = Arc::new(tree);
                *self.state.write().unwrap_or_else(PoisonError::into_inner) =
                    LoadState::Loaded(Arc::clone(&tree));
                self.emit(WorkspaceEvent::TreeLoaded { files, folders });
                self.revalidate_selection(&tree);
                Ok(LoadOutcome::Installed)
            }
            Err(e) => {
                log::warn!("Failed to load workspace tree: {}", e);
                let message = e.to_string();
                *self.state.write().unwrap_or_else(PoisonError::into_inner) =
                    LoadState::Failed(message.clone());
                self.emit(WorkspaceEvent::LoadFailed { message });
                Err(e)
            }
        }
    }

    /// Current load state.
    pub fn state(&self) -> LoadState<S> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The current tree, or [`WorkspaceError::NotLoaded`].
    pub fn tree(&self) -> Result<Arc<FolderNode<S>>> {
        match &*self.state.read().unwrap_or_else(PoisonError::into_inner) {
            LoadState::Loaded(tree) => Ok(Arc::clone(tree)),
            _ => Err(WorkspaceError::NotLoaded),
        }
    }

    /// Resolve a path in the current tree.
    pub fn resolve(&self, path: impl AsRef<str>) -> Result<Node<S>> {
        let path = PathKey::parse(path.as_ref())?;
        let tree = self.tree()?;
        tree.find_by_path(&path)
            .cloned()
            .ok_or(WorkspaceError::EntryNotFound(path))
    }

    fn resolve_file(tree: &FolderNode<S>, path: &PathKey) -> Result<S::FileHandle> {
        match tree.find_by_path(path) {
            Some(Node::File(file)) => Ok(file.handle().clone()),
            Some(Node::Folder(_)) => Err(WorkspaceError::NameConflict {
                path: path.clone(),
                expected: EntryKind::File.noun(),
            }),
            None => Err(WorkspaceError::EntryNotFound(path.clone())),
        }
    }

    fn resolve_folder<'t>(tree: &'t FolderNode<S>, path: &PathKey) -> Result<&'t FolderNode<S>> {
        if path.is_root() {
            return Ok(tree);
        }
        match tree.find_by_path(path) {
            Some(Node::Folder(folder)) => Ok(folder),
            Some(Node::File(_)) => Err(WorkspaceError::NameConflict {
                path: path.clone(),
                expected: EntryKind::Directory.noun(),
            }),
            None => Err(WorkspaceError::EntryNotFound(path.clone())),
        }
    }

    /// Read a file as UTF-8 text.
    pub async fn read_text(&self, path: impl AsRef<str>) -> Result<String> {
        let path = PathKey::parse(path.as_ref())?;
        let handle = Self::resolve_file(&*self.tree()?, &path)?;
        self.storage
            .read_text(&handle)
            .await
            .map_err(|e| WorkspaceError::from_io(&path, EntryKind::File.noun(), e))
    }

    /// Read a file's raw bytes.
    pub async fn read_bytes(&self, path: impl AsRef<str>) -> Result<Vec<u8>> {
        let path = PathKey::parse(path.as_ref())?;
        let handle = Self::resolve_file(&*self.tree()?, &path)?;
        self.storage
            .read_bytes(&handle)
            .await
            .map_err(|e| WorkspaceError::from_io(&path, EntryKind::File.noun(), e))
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    fn begin_mutation(&self) -> Result<MutationGuard<'_>> {
        self.mutating
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| WorkspaceError::MutationInFlight)?;
        Ok(MutationGuard(&self.mutating))
    }

    /// Whether a mutation is running.
    pub fn is_mutating(&self) -> bool {
        self.mutating.load(Ordering::SeqCst)
    }

    /// Refuse to create an entry the reloaded tree would leave out.
    fn ensure_visible(&self, path: &PathKey) -> Result<()> {
        if self.config().load_options().hides(path) {
            return Err(WorkspaceError::InvalidPath {
                path: path.as_str().to_string(),
                reason: "hidden from the workspace tree",
            });
        }
        Ok(())
    }

    /// Reload after a mutation and hand back the mutation's own result.
    async fn reload_after<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(e) = self.load().await {
            log::warn!("Reload after mutation failed: {}", e);
        }
        result
    }

    /// Create a file (and any missing folders on the way). An existing file
    /// is left as is.
    pub async fn create_file(&self, path: impl AsRef<str>) -> Result<PathKey> {
        let path = PathKey::parse(path.as_ref())?;
        self.ensure_visible(&path)?;
        let _guard = self.begin_mutation()?;
        let tree = self.tree()?;

        let result = TreeMutator::new(&self.storage)
            .create_file(tree.handle(), &path)
            .await
            .map(|_| {
                self.emit(WorkspaceEvent::EntryCreated {
                    path: path.clone(),
                    kind: EntryKind::File,
                });
                path
            });
        self.reload_after(result).await
    }

    /// Create a folder `name` inside the folder at `parent`.
    pub async fn create_folder(&self, parent: impl AsRef<str>, name: &str) -> Result<PathKey> {
        let parent = PathKey::parse(parent.as_ref())?;
        self.ensure_visible(&parent.join(name)?)?;
        let _guard = self.begin_mutation()?;
        let tree = self.tree()?;
        let folder = Self::resolve_folder(&tree, &parent)?;

        let result = TreeMutator::new(&self.storage)
            .create_folder(folder.handle(), folder.path(), name)
            .await
            .and_then(|_| {
                let path = parent.join(name)?;
                self.emit(WorkspaceEvent::EntryCreated {
                    path: path.clone(),
                    kind: EntryKind::Directory,
                });
                Ok(path)
            });
        self.reload_after(result).await
    }

    /// Delete a file, or a folder with everything in it.
    pub async fn delete(&self, path: impl AsRef<str>) -> Result<()> {
        let path = PathKey::parse(path.as_ref())?;
        let _guard = self.begin_mutation()?;
        let tree = self.tree()?;
        let node = tree
            .find_by_path(&path)
            .ok_or_else(|| WorkspaceError::EntryNotFound(path.clone()))?;
        let parent = tree
            .parent_of(&path)
            .ok_or_else(|| WorkspaceError::EntryNotFound(path.clone()))?;
        let kind = node.kind();

        let result = TreeMutator::new(&self.storage)
            .delete(parent.handle(), parent.path(), path.name(), node.is_folder())
            .await
            .map(|()| {
                self.emit(WorkspaceEvent::EntryDeleted {
                    path: path.clone(),
                    kind,
                });
            });
        self.reload_after(result).await
    }

    /// Move the entry at `source` into the folder at `target`. Returns the new path.
    ///
    /// Both paths are resolved against the current tree. On a
    /// [`WorkspaceError::PartialMoveFailure`] the entry exists at both paths
    /// after the reload.
    pub async fn move_entry(
        &self,
        source: impl AsRef<str>,
        target: impl AsRef<str>,
    ) -> Result<PathKey> {
        let source = PathKey::parse(source.as_ref())?;
        let target = PathKey::parse(target.as_ref())?;
        TreeMutator::<S>::check_move(&source, &target)?;
        self.ensure_visible(&target.join(source.name())?)?;

        let _guard = self.begin_mutation()?;
        let tree = self.tree()?;
        let node = tree
            .find_by_path(&source)
            .ok_or_else(|| WorkspaceError::EntryNotFound(source.clone()))?;
        let source_parent = tree
            .parent_of(&source)
            .ok_or_else(|| WorkspaceError::EntryNotFound(source.clone()))?;
        let target_folder = match Self::resolve_folder(&tree, &target) {
            Err(WorkspaceError::NameConflict { .. }) => {
                return Err(WorkspaceError::InvalidMove {
                    source_path: source,
                    target,
                    reason: MoveRejection::TargetNotFolder,
                });
            }
            other => other?,
        };
        let kind = node.kind();

        let result = TreeMutator::new(&self.storage)
            .move_node(node, source_parent.handle(), target_folder)
            .await;
        match &result {
            Ok(destination) => {
                self.emit(WorkspaceEvent::EntryMoved {
                    from: source.clone(),
                    to: destination.clone(),
                    kind,
                });
                self.rebase_selection(&source, destination);
            }
            Err(WorkspaceError::PartialMoveFailure {
                destination, error, ..
            }) => {
                self.emit(WorkspaceEvent::PartialMove {
                    from: source.clone(),
                    to: destination.clone(),
                    message: error.to_string(),
                });
            }
            Err(_) => {}
        }
        self.reload_after(result).await
    }

    /// Execute a drop from the drag and drop coordinator.
    ///
    /// The snapshot paths are re-resolved in the current tree, so a drop
    /// that outlived a reload still moves the right entry.
    pub async fn apply_drop(&self, request: DropRequest) -> Result<PathKey> {
        self.move_entry(request.source_path(), request.target_path())
            .await
    }

    /// Replace the content of an existing file.
    pub async fn save_file(&self, path: impl AsRef<str>, content: &str) -> Result<()> {
        self.save_bytes(path, content.as_bytes()).await
    }

    /// Replace the content of an existing file with raw bytes.
    pub async fn save_bytes(&self, path: impl AsRef<str>, content: &[u8]) -> Result<()> {
        let path = PathKey::parse(path.as_ref())?;
        let _guard = self.begin_mutation()?;
        let handle = Self::resolve_file(&*self.tree()?, &path)?;
        self.storage
            .write_bytes(&handle, content)
            .await
            .map_err(|e| WorkspaceError::from_io(&path, EntryKind::File.noun(), e))?;
        log::debug!("Saved '{}' ({} bytes)", path, content.len());
        self.emit(WorkspaceEvent::FileSaved {
            path,
            bytes: content.len(),
        });
        Ok(())
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// The selected file, if any.
    pub fn selected(&self) -> Option<PathKey> {
        self.selection
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Select the file at `path`.
    ///
    /// A path that doesn't resolve to a file clears the selection. Returns
    /// the new selection.
    pub fn select(&self, path: impl AsRef<str>) -> Option<PathKey> {
        let resolved = PathKey::parse(path.as_ref()).ok().filter(|key| {
            self.tree()
                .is_ok_and(|tree| matches!(tree.find_by_path(key), Some(Node::File(_))))
        });
        if resolved.is_none() {
            log::debug!("Selection '{}' not found, clearing", path.as_ref());
        }
        self.set_selection(resolved.clone());
        resolved
    }

    /// Clear the selection.
    pub fn clear_selection(&self) {
        self.set_selection(None);
    }

    fn set_selection(&self, path: Option<PathKey>) {
        let mut selection = self.selection.write().unwrap_or_else(PoisonError::into_inner);
        if *selection == path {
            return;
        }
        *selection = path.clone();
        drop(selection);
        self.emit(WorkspaceEvent::SelectionChanged { path });
    }

    fn rebase_selection(&self, from: &PathKey, to: &PathKey) {
        if let Some(rebased) = self.selected().and_then(|s| s.rebase(from, to)) {
            self.set_selection(Some(rebased));
        }
    }

    fn revalidate_selection(&self, tree: &FolderNode<S>) {
        if let Some(selected) = self.selected()
            && !matches!(tree.find_by_path(&selected), Some(Node::File(_)))
        {
            self.set_selection(None);
        }
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// The document compiled by [`prepare_build`](Self::prepare_build).
    pub fn main_file(&self) -> PathKey {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .main_file
            .clone()
    }

    /// Change the main document. Call [`save_config`](Self::save_config) to persist it.
    pub fn set_main_file(&self, path: impl AsRef<str>) -> Result<()> {
        let path = PathKey::parse(path.as_ref())?;
        if path.is_root() {
            return Err(WorkspaceError::InvalidPath {
                path: String::new(),
                reason: "main file cannot be the workspace root",
            });
        }
        self.config
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .main_file = path.clone();
        self.emit(WorkspaceEvent::MainFileChanged { path });
        Ok(())
    }

    /// Ask a running [`prepare_build`](Self::prepare_build) to stop before its next file.
    pub fn cancel_build(&self) {
        self.cancel_build.store(true, Ordering::SeqCst);
    }

    /// Mirror the tree into `engine` and point it at the main document.
    ///
    /// `overlays` are unsaved editor buffers that replace the stored content
    /// of their paths for this build only.
    pub async fn prepare_build<E>(
        &self,
        engine: &E,
        overlays: impl IntoIterator<Item = (PathKey, String)>,
    ) -> Result<MirrorReport>
    where
        E: EngineFilesystem + ?Sized,
    {
        let tree = self.tree()?;
        let main = self.main_file();
        if !matches!(tree.find_by_path(&main), Some(Node::File(_))) {
            return Err(WorkspaceError::EntryNotFound(main));
        }

        self.cancel_build.store(false, Ordering::SeqCst);
        let report = MirrorSync::new(&self.storage)
            .with_overlays(overlays)
            .with_cancel_flag(Arc::clone(&self.cancel_build))
            .sync(&tree, engine)
            .await?;
        engine
            .set_main_entry_point(&main)
            .map_err(|source| WorkspaceError::MirrorSyncFailure {
                path: main.clone(),
                source,
            })?;

        self.emit(WorkspaceEvent::MirrorCompleted {
            directories: report.directories,
            files: report.files,
            bytes: report.bytes,
        });
        Ok(report)
    }
}

impl<S: StorageAdapter> fmt::Debug for Workspace<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workspace")
            .field("state", &self.state())
            .field("selection", &self.selected())
            .field("mutating", &self.is_mutating())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::InMemoryEngineFs;
    use crate::storage::{InMemoryStorage, StorageOp};
    use crate::test_utils::{block_on_test, key, sample_project};
    use std::sync::Mutex;

    fn loaded(storage: InMemoryStorage) -> Workspace<InMemoryStorage> {
        let ws = Workspace::new(storage);
        block_on_test(ws.load()).unwrap();
        ws
    }

    fn recorder(ws: &Workspace<InMemoryStorage>) -> Arc<Mutex<Vec<WorkspaceEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        ws.subscribe(Arc::new(move |e| sink.lock().unwrap().push(e.clone())));
        events
    }

    #[test]
    fn test_unloaded_workspace_rejects_access() {
        let ws = Workspace::new(InMemoryStorage::new());
        assert!(matches!(ws.state(), LoadState::Unloaded));
        assert!(matches!(ws.tree(), Err(WorkspaceError::NotLoaded)));
        assert!(matches!(
            block_on_test(ws.create_file("main.tex")),
            Err(WorkspaceError::NotLoaded)
        ));
    }

    #[test]
    fn test_failed_load_is_distinct_from_empty() {
        let storage = InMemoryStorage::new();
        storage.fail_next(StorageOp::OpenRoot);
        let ws = Workspace::new(storage);
        let events = recorder(&ws);

        assert!(block_on_test(ws.load()).is_err());
        assert!(matches!(ws.state(), LoadState::Failed(_)));
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(WorkspaceEvent::LoadFailed { .. })
        ));

        block_on_test(ws.load()).unwrap();
        match ws.state() {
            LoadState::Loaded(tree) => assert!(tree.children().is_empty()),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[test]
    fn test_create_file_reloads_tree() {
        let ws = loaded(InMemoryStorage::new());
        let events = recorder(&ws);
        block_on_test(ws.create_file("main.tex")).unwrap();

        let tree = ws.tree().unwrap();
        assert!(tree.find_by_path(&key("main.tex")).is_some());
        let events = events.lock().unwrap();
        assert!(matches!(events[0], WorkspaceEvent::EntryCreated { .. }));
        assert!(matches!(events[1], WorkspaceEvent::TreeLoaded { files: 1, .. }));
    }

    #[test]
    fn test_created_dot_file_is_in_tree() {
        let ws = loaded(InMemoryStorage::new());
        let path = block_on_test(ws.create_file(".latexmkrc")).unwrap();
        assert!(!ws.resolve(&path).unwrap().is_folder());
        let path = block_on_test(ws.create_folder("", ".cache")).unwrap();
        assert!(ws.resolve(&path).unwrap().is_folder());
    }

    #[test]
    fn test_creating_hidden_entries_rejected() {
        let storage = InMemoryStorage::new().with_file("figs/a.png", vec![1]);
        let config = WorkspaceConfig {
            skip_hidden: true,
            ..WorkspaceConfig::default()
        };
        let ws = Workspace::with_config(storage.clone(), config);
        block_on_test(ws.load()).unwrap();
        let before = storage.call_count();

        for result in [
            block_on_test(ws.create_file(".latexmkrc")),
            block_on_test(ws.create_file("figs/.cache/x.aux")),
            block_on_test(ws.create_folder("figs", ".git")),
        ] {
            assert!(matches!(result, Err(WorkspaceError::InvalidPath { .. })));
        }
        assert_eq!(storage.call_count(), before);
    }

    #[test]
    fn test_config_file_is_never_a_tree_entry() {
        let storage = InMemoryStorage::new().with_file("figs/.webtex.toml", "x");
        let ws = loaded(storage.clone());
        let err = block_on_test(ws.create_file(".webtex.toml")).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidPath { .. }));

        let err = block_on_test(ws.move_entry("figs/.webtex.toml", "")).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidPath { .. }));
        assert_eq!(storage.file_content("figs/.webtex.toml").unwrap(), b"x");
    }

    #[test]
    fn test_create_folder_under_file_is_name_conflict() {
        let ws = loaded(sample_project());
        let err = block_on_test(ws.create_folder("main.tex", "x")).unwrap_err();
        assert!(matches!(err, WorkspaceError::NameConflict { .. }));

        let path = block_on_test(ws.create_folder("figs", "tables")).unwrap();
        assert_eq!(path, key("figs/tables"));
        assert!(ws.resolve("figs/tables").unwrap().is_folder());
    }

    #[test]
    fn test_delete_folder_is_recursive_and_clears_selection() {
        let ws = loaded(sample_project());
        assert_eq!(ws.select("figs/a.png"), Some(key("figs/a.png")));

        block_on_test(ws.delete("figs")).unwrap();
        let tree = ws.tree().unwrap();
        assert!(tree.walk().all(|n| !n.path().as_str().starts_with("figs")));
        assert_eq!(ws.selected(), None);
    }

    #[test]
    fn test_move_follows_selection() {
        let ws = loaded(sample_project());
        ws.select("figs/plots/b.pdf");

        let dest = block_on_test(ws.move_entry("figs", "chapters")).unwrap();
        assert_eq!(dest, key("chapters/figs"));
        assert_eq!(ws.selected(), Some(key("chapters/figs/plots/b.pdf")));
    }

    #[test]
    fn test_move_into_file_rejected() {
        let ws = loaded(sample_project());
        let calls = ws.storage().call_count();
        let err = block_on_test(ws.move_entry("refs.bib", "main.tex")).unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::InvalidMove {
                reason: MoveRejection::TargetNotFolder,
                ..
            }
        ));
        assert_eq!(ws.storage().call_count(), calls);
    }

    #[test]
    fn test_failed_mutation_still_reloads() {
        let ws = loaded(sample_project());
        let events = recorder(&ws);
        ws.storage().fail_next(StorageOp::RemoveEntry);

        let err = block_on_test(ws.delete("refs.bib")).unwrap_err();
        assert!(matches!(err, WorkspaceError::Storage { .. }));
        assert!(matches!(
            events.lock().unwrap().last(),
            Some(WorkspaceEvent::TreeLoaded { .. })
        ));
        assert!(!ws.is_mutating());
    }

    #[test]
    fn test_concurrent_mutation_rejected() {
        let ws = loaded(sample_project());
        let _guard = ws.begin_mutation().unwrap();
        let err = block_on_test(ws.create_file("other.tex")).unwrap_err();
        assert!(matches!(err, WorkspaceError::MutationInFlight));
    }

    #[test]
    fn test_select_missing_clears() {
        let ws = loaded(sample_project());
        ws.select("main.tex");
        assert_eq!(ws.select("nope.tex"), None);
        assert_eq!(ws.selected(), None);
        assert_eq!(ws.select("figs"), None);
    }

    #[test]
    fn test_save_and_read() {
        let ws = loaded(sample_project());
        block_on_test(ws.save_file("chapters/intro.tex", "Bonjour.\n")).unwrap();
        assert_eq!(
            block_on_test(ws.read_text("chapters/intro.tex")).unwrap(),
            "Bonjour.\n"
        );
        assert!(matches!(
            block_on_test(ws.save_file("missing.tex", "")),
            Err(WorkspaceError::EntryNotFound(_))
        ));
    }

    #[test]
    fn test_prepare_build_sets_main_entry_point() {
        let ws = loaded(sample_project());
        let engine = InMemoryEngineFs::new();
        let report = block_on_test(ws.prepare_build(&engine, [])).unwrap();
        assert_eq!(report.files, 5);
        assert_eq!(engine.main_entry_point().as_deref(), Some("main.tex"));
    }

    #[test]
    fn test_prepare_build_requires_main_file() {
        let ws = loaded(InMemoryStorage::new().with_file("paper.tex", ""));
        let engine = InMemoryEngineFs::new();
        assert!(matches!(
            block_on_test(ws.prepare_build(&engine, [])),
            Err(WorkspaceError::EntryNotFound(_))
        ));

        ws.set_main_file("paper.tex").unwrap();
        block_on_test(ws.prepare_build(&engine, [])).unwrap();
        assert_eq!(engine.main_entry_point().as_deref(), Some("paper.tex"));
    }

    #[test]
    fn test_open_reads_config() {
        let storage = InMemoryStorage::new()
            .with_file(".webtex.toml", "main_file = \"thesis.tex\"\n")
            .with_file("thesis.tex", "");
        let ws = block_on_test(Workspace::open(storage)).unwrap();
        assert_eq!(ws.main_file(), key("thesis.tex"));
        assert_eq!(ws.tree().unwrap().file_count(), 1);
    }
}
