//! Structural mutations against the storage root.
//!
//! Every operation here talks to storage only; none of them touch the
//! in-memory tree. Callers reload the tree afterwards (the [`Workspace`]
//! session does this for you), and must not reuse handles from the old tree.
//!
//! Storage has no rename, so a move is an explicit two-phase copy then
//! delete. If the delete fails the entry ends up at both paths, which is
//! reported as [`WorkspaceError::PartialMoveFailure`]; content is never lost.
//!
//! [`Workspace`]: crate::workspace::Workspace

use crate::error::{MoveRejection, Result, WorkspaceError};
use crate::path_key::{PathKey, validate_segment};
use crate::storage::{BoxFuture, EntryKind, StorageAdapter, StorageEntry};
use crate::tree::{FileNode, FolderNode, Node};

/// Create, delete and move operations over a [`StorageAdapter`].
pub struct TreeMutator<'a, S: StorageAdapter> {
    storage: &'a S,
}

impl<'a, S: StorageAdapter> TreeMutator<'a, S> {
    /// Create a mutator over `storage`.
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Validate a move by paths alone, before any storage call.
    ///
    /// Rejects moving the root, moving onto itself, moving into the folder
    /// it already lives in, and moving a folder into its own subtree.
    pub fn check_move(source: &PathKey, target: &PathKey) -> Result<()> {
        let reason = if source.is_root() {
            Some(MoveRejection::RootNotMovable)
        } else if target == source {
            Some(MoveRejection::OntoItself)
        } else if source.parent().as_ref() == Some(target) {
            Some(MoveRejection::OntoCurrentParent)
        } else if target.is_descendant_of(source) {
            Some(MoveRejection::IntoDescendant)
        } else {
            None
        };

        match reason {
            Some(reason) => Err(WorkspaceError::InvalidMove {
                source_path: source.clone(),
                target: target.clone(),
                reason,
            }),
            None => Ok(()),
        }
    }

    /// Create the file at `path`, creating intermediate folders as needed.
    ///
    /// Idempotent: existing folders are reused and an existing file is left
    /// untouched.
    pub async fn create_file(&self, root: &S::DirHandle, path: &PathKey) -> Result<S::FileHandle> {
        let (parent_path, leaf) = path.split_leaf().ok_or_else(|| WorkspaceError::InvalidPath {
            path: path.as_str().to_string(),
            reason: "cannot create a file at the workspace root",
        })?;

        let mut dir = root.clone();
        let mut dir_path = PathKey::root();
        for segment in parent_path.segments() {
            dir_path = dir_path.join(segment)?;
            dir = self
                .storage
                .get_or_create_directory(&dir, segment)
                .await
                .map_err(|e| WorkspaceError::from_io(&dir_path, EntryKind::Directory.noun(), e))?;
        }

        let file = self
            .storage
            .get_or_create_file(&dir, leaf)
            .await
            .map_err(|e| WorkspaceError::from_io(path, EntryKind::File.noun(), e))?;
        log::debug!("Created file '{}'", path);
        Ok(file)
    }

    /// Create a folder named `name` inside the folder at `parent_path`.
    pub async fn create_folder(
        &self,
        parent: &S::DirHandle,
        parent_path: &PathKey,
        name: &str,
    ) -> Result<S::DirHandle> {
        let path = parent_path.join(name)?;
        let dir = self
            .storage
            .get_or_create_directory(parent, name)
            .await
            .map_err(|e| WorkspaceError::from_io(&path, EntryKind::Directory.noun(), e))?;
        log::debug!("Created folder '{}'", path);
        Ok(dir)
    }

    /// Remove the entry `name` from the folder at `parent_path`.
    ///
    /// Without `recursive`, removing a non-empty folder fails with
    /// [`WorkspaceError::DirectoryNotEmpty`].
    pub async fn delete(
        &self,
        parent: &S::DirHandle,
        parent_path: &PathKey,
        name: &str,
        recursive: bool,
    ) -> Result<()> {
        let path = parent_path.join(name)?;
        self.storage
            .remove_entry(parent, name, recursive)
            .await
            .map_err(|e| WorkspaceError::from_io(&path, "entry", e))?;
        log::debug!("Deleted '{}'", path);
        Ok(())
    }

    /// Move a file into `target` by copy then delete. Returns the new path.
    ///
    /// A same-named file in `target` is overwritten. A same-named folder is a
    /// [`WorkspaceError::NameConflict`], raised before anything is written.
    pub async fn move_file(
        &self,
        source: &FileNode<S>,
        source_parent: &S::DirHandle,
        target: &FolderNode<S>,
    ) -> Result<PathKey> {
        let destination = self.prepare_move(source.path(), EntryKind::File, target)?;

        let content = self
            .storage
            .read_bytes(source.handle())
            .await
            .map_err(|e| WorkspaceError::from_io(source.path(), EntryKind::File.noun(), e))?;
        let copy = self
            .storage
            .get_or_create_file(target.handle(), source.name())
            .await
            .map_err(|e| WorkspaceError::from_io(&destination, EntryKind::File.noun(), e))?;
        self.storage
            .write_bytes(&copy, &content)
            .await
            .map_err(|e| WorkspaceError::from_io(&destination, EntryKind::File.noun(), e))?;

        self.remove_original(source.path(), source_parent, &destination, false)
            .await?;
        log::debug!("Moved file '{}' to '{}'", source.path(), destination);
        Ok(destination)
    }

    /// Move a folder and its whole subtree into `target`. Returns the new path.
    ///
    /// The subtree is copied pre-order (each folder before its contents) and
    /// then the source is removed recursively. A same-named folder in
    /// `target` is merged into, with files overwritten.
    ///
    /// The copy follows the storage listing, not `source`'s children, so
    /// entries the tree leaves out (dot-files) move along too.
    pub async fn move_folder(
        &self,
        source: &FolderNode<S>,
        source_parent: &S::DirHandle,
        target: &FolderNode<S>,
    ) -> Result<PathKey> {
        let destination = self.prepare_move(source.path(), EntryKind::Directory, target)?;

        let copy = self
            .storage
            .get_or_create_directory(target.handle(), source.name())
            .await
            .map_err(|e| WorkspaceError::from_io(&destination, EntryKind::Directory.noun(), e))?;
        let files = self
            .copy_folder(source.handle(), source.path(), &copy, &destination)
            .await?;

        self.remove_original(source.path(), source_parent, &destination, true)
            .await?;
        log::debug!(
            "Moved folder '{}' to '{}' ({} files)",
            source.path(),
            destination,
            files
        );
        Ok(destination)
    }

    /// Move either kind of node into `target`.
    pub async fn move_node(
        &self,
        source: &Node<S>,
        source_parent: &S::DirHandle,
        target: &FolderNode<S>,
    ) -> Result<PathKey> {
        match source {
            Node::File(file) => self.move_file(file, source_parent, target).await,
            Node::Folder(folder) => self.move_folder(folder, source_parent, target).await,
        }
    }

    /// Path checks plus the kind collision check against `target`'s children.
    fn prepare_move(
        &self,
        source: &PathKey,
        kind: EntryKind,
        target: &FolderNode<S>,
    ) -> Result<PathKey> {
        Self::check_move(source, target.path())?;
        let name = source.name();
        validate_segment(name)?;
        let destination = target.path().join(name)?;

        let clash = target
            .children()
            .iter()
            .find(|c| c.name() == name && c.kind() != kind);
        if clash.is_some() {
            return Err(WorkspaceError::NameConflict {
                path: destination,
                expected: kind.noun(),
            });
        }
        Ok(destination)
    }

    async fn remove_original(
        &self,
        source: &PathKey,
        source_parent: &S::DirHandle,
        destination: &PathKey,
        recursive: bool,
    ) -> Result<()> {
        if let Err(error) = self
            .storage
            .remove_entry(source_parent, source.name(), recursive)
            .await
        {
            log::warn!(
                "Copied '{}' to '{}' but removing the original failed: {}",
                source,
                destination,
                error
            );
            return Err(WorkspaceError::PartialMoveFailure {
                source_path: source.clone(),
                destination: destination.clone(),
                error,
            });
        }
        Ok(())
    }

    /// Copy everything stored below `source` into `dest`. Returns the number
    /// of files copied.
    fn copy_folder<'b>(
        &'b self,
        source: &'b S::DirHandle,
        source_path: &'b PathKey,
        dest: &'b S::DirHandle,
        dest_path: &'b PathKey,
    ) -> BoxFuture<'b, Result<usize>> {
        Box::pin(async move {
            let entries = self
                .storage
                .list_entries(source)
                .await
                .map_err(|e| WorkspaceError::from_io(source_path, EntryKind::Directory.noun(), e))?;

            let mut files = 0;
            for entry in entries {
                let from = source_path.join(entry.name())?;
                let to = dest_path.join(entry.name())?;
                match entry {
                    StorageEntry::Directory { name, handle } => {
                        let dir = self
                            .storage
                            .get_or_create_directory(dest, &name)
                            .await
                            .map_err(|e| {
                                WorkspaceError::from_io(&to, EntryKind::Directory.noun(), e)
                            })?;
                        files += self.copy_folder(&handle, &from, &dir, &to).await?;
                    }
                    StorageEntry::File { name, handle } => {
                        let content = self.storage.read_bytes(&handle).await.map_err(|e| {
                            WorkspaceError::from_io(&from, EntryKind::File.noun(), e)
                        })?;
                        let copy = self
                            .storage
                            .get_or_create_file(dest, &name)
                            .await
                            .map_err(|e| WorkspaceError::from_io(&to, EntryKind::File.noun(), e))?;
                        self.storage
                            .write_bytes(&copy, &content)
                            .await
                            .map_err(|e| WorkspaceError::from_io(&to, EntryKind::File.noun(), e))?;
                        files += 1;
                    }
                }
            }
            Ok(files)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{InMemoryStorage, StorageOp};
    use crate::test_utils::{block_on_test, key, load_tree, paths, sample_project};
    use crate::tree::{LoadOptions, WorkspaceTree};

    fn folder<'t>(
        root: &'t FolderNode<InMemoryStorage>,
        path: &str,
    ) -> &'t FolderNode<InMemoryStorage> {
        root.find_folder(&key(path)).unwrap()
    }

    #[test]
    fn test_create_file_creates_intermediate_folders() {
        let storage = InMemoryStorage::new();
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        block_on_test(mutator.create_file(root.handle(), &key("chapters/one/intro.tex"))).unwrap();

        let root = load_tree(&storage);
        assert_eq!(
            paths(&root),
            vec!["chapters", "chapters/one", "chapters/one/intro.tex"]
        );
    }

    #[test]
    fn test_create_file_keeps_existing_content() {
        let storage = InMemoryStorage::new().with_file("main.tex", "keep me");
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        block_on_test(mutator.create_file(root.handle(), &key("main.tex"))).unwrap();
        assert_eq!(storage.file_content("main.tex").unwrap(), b"keep me");
    }

    #[test]
    fn test_create_file_through_a_file_is_name_conflict() {
        let storage = InMemoryStorage::new().with_file("figs", "not a folder");
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let err = block_on_test(mutator.create_file(root.handle(), &key("figs/a.png"))).unwrap_err();
        match err {
            WorkspaceError::NameConflict { path, expected } => {
                assert_eq!(path, key("figs"));
                assert_eq!(expected, "folder");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_create_file_at_root_path_rejected() {
        let storage = InMemoryStorage::new();
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let err = block_on_test(mutator.create_file(root.handle(), &PathKey::root())).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidPath { .. }));
    }

    #[test]
    fn test_create_folder_rejects_multi_segment_name() {
        let storage = InMemoryStorage::new();
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let before = storage.call_count();
        let err = block_on_test(mutator.create_folder(root.handle(), root.path(), "a/b")).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidPath { .. }));
        assert_eq!(storage.call_count(), before);
    }

    #[test]
    fn test_delete_non_recursive_non_empty_fails_fast() {
        let storage = sample_project();
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let err = block_on_test(mutator.delete(root.handle(), root.path(), "figs", false)).unwrap_err();
        assert!(matches!(err, WorkspaceError::DirectoryNotEmpty(_)));
        assert!(storage.exists("figs/plots/b.pdf"));

        block_on_test(mutator.delete(root.handle(), root.path(), "figs", true)).unwrap();
        let root = load_tree(&storage);
        assert!(root.walk().all(|n| !n.path().as_str().starts_with("figs")));
    }

    #[test]
    fn test_move_file_out_of_folder() {
        let storage = InMemoryStorage::new().with_file("figs/a.png", vec![1, 2, 3]);
        let root = load_tree(&storage);
        let figs = folder(&root, "figs");
        let png = root.find_by_path(&key("figs/a.png")).unwrap();

        let mutator = TreeMutator::new(&storage);
        let dest = block_on_test(mutator.move_node(png, figs.handle(), &root)).unwrap();
        assert_eq!(dest, key("a.png"));

        let root = load_tree(&storage);
        assert_eq!(paths(&root), vec!["figs", "a.png"]);
        assert!(folder(&root, "figs").children().is_empty());
        assert_eq!(storage.file_content("a.png").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_rejected_moves_make_no_storage_calls() {
        let storage = sample_project();
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let figs = root.find_by_path(&key("figs")).unwrap();
        let png = root.find_by_path(&key("figs/a.png")).unwrap();
        let before = storage.call_count();

        let cases = [
            (png, folder(&root, "figs"), MoveRejection::OntoCurrentParent),
            (figs, folder(&root, "figs"), MoveRejection::OntoItself),
            (figs, folder(&root, "figs/plots"), MoveRejection::IntoDescendant),
        ];
        for (source, target, expected) in cases {
            let parent = root.parent_of(source.path()).unwrap();
            let err = block_on_test(mutator.move_node(source, parent.handle(), target)).unwrap_err();
            match err {
                WorkspaceError::InvalidMove { reason, .. } => assert_eq!(reason, expected),
                other => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(storage.call_count(), before);
    }

    #[test]
    fn test_move_kind_collision_writes_nothing() {
        let storage = InMemoryStorage::new()
            .with_file("draft/figs", "a file named figs")
            .with_file("figs/a.png", vec![9]);
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let figs = root.find_by_path(&key("figs")).unwrap();
        let before = storage.call_count();

        let err = block_on_test(mutator.move_node(figs, root.handle(), folder(&root, "draft")))
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::NameConflict { .. }));
        assert_eq!(storage.call_count(), before);
    }

    #[test]
    fn test_move_file_overwrites_same_name_file() {
        let storage = InMemoryStorage::new()
            .with_file("old/main.tex", "new text")
            .with_file("main.tex", "old text");
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let source = root.find_by_path(&key("old/main.tex")).unwrap();
        block_on_test(mutator.move_node(source, folder(&root, "old").handle(), &root)).unwrap();
        assert_eq!(storage.file_content("main.tex").unwrap(), b"new text");
        assert!(!storage.exists("old/main.tex"));
    }

    #[test]
    fn test_failed_removal_leaves_duplicate() {
        let storage = InMemoryStorage::new().with_file("figs/a.png", vec![7, 7]);
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let png = root.find_by_path(&key("figs/a.png")).unwrap();

        storage.fail_next(StorageOp::RemoveEntry);
        let err = block_on_test(mutator.move_node(png, folder(&root, "figs").handle(), &root))
            .unwrap_err();
        match err {
            WorkspaceError::PartialMoveFailure {
                source_path,
                destination,
                ..
            } => {
                assert_eq!(source_path, key("figs/a.png"));
                assert_eq!(destination, key("a.png"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(storage.file_content("figs/a.png").unwrap(), vec![7, 7]);
        assert_eq!(storage.file_content("a.png").unwrap(), vec![7, 7]);
    }

    #[test]
    fn test_move_folder_copies_subtree() {
        let storage = sample_project().with_dir("assets");
        let root = load_tree(&storage);
        let mutator = TreeMutator::new(&storage);
        let figs = root.find_by_path(&key("figs")).unwrap();

        let dest =
            block_on_test(mutator.move_node(figs, root.handle(), folder(&root, "assets"))).unwrap();
        assert_eq!(dest, key("assets/figs"));

        let root = load_tree(&storage);
        assert!(root.find_by_path(&key("figs")).is_none());
        assert!(root.find_by_path(&key("assets/figs/plots/b.pdf")).is_some());
        assert_eq!(
            storage.file_content("assets/figs/a.png").unwrap(),
            vec![0x89, b'P', b'N', b'G', 0x00, 0xff]
        );
    }

    #[test]
    fn test_move_folder_carries_dot_files() {
        let storage = InMemoryStorage::new()
            .with_file("chapters/intro.tex", "intro")
            .with_file("chapters/.latexmkrc", "$pdf_mode = 1;")
            .with_file("chapters/.cache/aux", vec![3, 1])
            .with_dir("book");
        let options = LoadOptions { skip_hidden: true };
        let root = block_on_test(WorkspaceTree::load(&storage, &options)).unwrap();
        assert!(root.find_by_path(&key("chapters/.latexmkrc")).is_none());

        let mutator = TreeMutator::new(&storage);
        let chapters = root.find_by_path(&key("chapters")).unwrap();
        let dest =
            block_on_test(mutator.move_node(chapters, root.handle(), folder(&root, "book"))).unwrap();
        assert_eq!(dest, key("book/chapters"));

        assert_eq!(
            storage.file_content("book/chapters/.latexmkrc").unwrap(),
            b"$pdf_mode = 1;"
        );
        assert_eq!(storage.file_content("book/chapters/.cache/aux").unwrap(), vec![3, 1]);
        assert!(!storage.exists("chapters/.latexmkrc"));
        assert!(!storage.exists("chapters"));
    }

    #[test]
    fn test_root_is_not_movable() {
        let err = TreeMutator::<InMemoryStorage>::check_move(&PathKey::root(), &key("figs"))
            .unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::InvalidMove {
                reason: MoveRejection::RootNotMovable,
                ..
            }
        ));
    }
}
