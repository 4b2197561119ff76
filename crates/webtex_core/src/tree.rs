//! In-memory tree of the storage root.
//!
//! A [`FolderNode`] for the root owns the whole hierarchy. Nodes carry their
//! root-relative [`PathKey`] and the storage handle they were enumerated
//! with. The tree is immutable once built: mutations go to storage and the
//! tree is reloaded wholesale, so a node's handle is only meaningful for the
//! load that produced it.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;
use ts_rs::TS;

use crate::config::CONFIG_FILE;
use crate::error::{Result, WorkspaceError};
use crate::path_key::{PathKey, sibling_order};
use crate::storage::{BoxFuture, EntryKind, StorageAdapter, StorageEntry};

/// A file in the workspace tree.
pub struct FileNode<S: StorageAdapter> {
    path: PathKey,
    handle: S::FileHandle,
}

/// A folder in the workspace tree. Children are in sibling order.
pub struct FolderNode<S: StorageAdapter> {
    path: PathKey,
    handle: S::DirHandle,
    children: Vec<Node<S>>,
}

/// A node of the workspace tree.
pub enum Node<S: StorageAdapter> {
    /// A file
    File(FileNode<S>),
    /// A folder and its children
    Folder(FolderNode<S>),
}

impl<S: StorageAdapter> FileNode<S> {
    /// Root-relative path.
    pub fn path(&self) -> &PathKey {
        &self.path
    }

    /// Display name (last path segment).
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Storage handle from the load that produced this node.
    pub fn handle(&self) -> &S::FileHandle {
        &self.handle
    }
}

impl<S: StorageAdapter> FolderNode<S> {
    /// Root-relative path (empty for the root).
    pub fn path(&self) -> &PathKey {
        &self.path
    }

    /// Display name (last path segment, empty for the root).
    pub fn name(&self) -> &str {
        self.path.name()
    }

    /// Storage handle from the load that produced this node.
    pub fn handle(&self) -> &S::DirHandle {
        &self.handle
    }

    /// Children, folders first.
    pub fn children(&self) -> &[Node<S>] {
        &self.children
    }

    /// Whether this is the storage root.
    pub fn is_root(&self) -> bool {
        self.path.is_root()
    }

    fn child(&self, name: &str, kind: Option<EntryKind>) -> Option<&Node<S>> {
        let split = self.children.partition_point(Node::is_folder);
        let (folders, files) = self.children.split_at(split);
        let search = |nodes: &[Node<S>]| -> Option<usize> {
            nodes.binary_search_by(|n| n.name().cmp(name)).ok()
        };
        match kind {
            Some(EntryKind::Directory) => search(folders).map(|i| &folders[i]),
            Some(EntryKind::File) => search(files).map(|i| &files[i]),
            None => search(folders)
                .map(|i| &folders[i])
                .or_else(|| search(files).map(|i| &files[i])),
        }
    }

    /// Find the node at `path` below this folder.
    ///
    /// `path` is root-relative, so this is normally called on the root.
    /// Descends one segment at a time with a binary search per level.
    /// Returns `None` for the root path itself; use [`find_folder`](Self::find_folder).
    pub fn find_by_path(&self, path: &PathKey) -> Option<&Node<S>> {
        let (parent, name) = path.split_leaf()?;
        self.find_folder(&parent)?.child(name, None)
    }

    /// Find the folder at `path`. The root path yields `self`.
    pub fn find_folder(&self, path: &PathKey) -> Option<&FolderNode<S>> {
        let mut current = self;
        for segment in path.segments() {
            match current.child(segment, Some(EntryKind::Directory))? {
                Node::Folder(folder) => current = folder,
                Node::File(_) => return None,
            }
        }
        Some(current)
    }

    /// Folder containing the node at `path`.
    pub fn parent_of(&self, path: &PathKey) -> Option<&FolderNode<S>> {
        self.find_folder(&path.parent()?)
    }

    /// Pre-order iterator over every node below this folder.
    pub fn walk(&self) -> Walk<'_, S> {
        Walk {
            stack: self.children.iter().rev().collect(),
        }
    }

    /// Number of files below this folder.
    pub fn file_count(&self) -> usize {
        self.walk().filter(|n| !n.is_folder()).count()
    }

    /// Number of folders below this folder (not counting itself).
    pub fn folder_count(&self) -> usize {
        self.walk().filter(|n| n.is_folder()).count()
    }

    /// Serializable projection of this folder.
    pub fn to_view(&self) -> NodeView {
        NodeView {
            path: self.path.as_str().to_string(),
            name: self.name().to_string(),
            kind: EntryKind::Directory,
            children: self.children.iter().map(Node::to_view).collect(),
        }
    }
}

impl<S: StorageAdapter> Node<S> {
    /// Root-relative path.
    pub fn path(&self) -> &PathKey {
        match self {
            Node::File(f) => &f.path,
            Node::Folder(d) => &d.path,
        }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        self.path().name()
    }

    /// Whether this is a folder.
    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }

    /// Kind of the node.
    pub fn kind(&self) -> EntryKind {
        match self {
            Node::File(_) => EntryKind::File,
            Node::Folder(_) => EntryKind::Directory,
        }
    }

    /// The folder, if this is one.
    pub fn as_folder(&self) -> Option<&FolderNode<S>> {
        match self {
            Node::Folder(d) => Some(d),
            Node::File(_) => None,
        }
    }

    /// The file, if this is one.
    pub fn as_file(&self) -> Option<&FileNode<S>> {
        match self {
            Node::File(f) => Some(f),
            Node::Folder(_) => None,
        }
    }

    /// Serializable projection of this node.
    pub fn to_view(&self) -> NodeView {
        match self {
            Node::File(f) => NodeView {
                path: f.path.as_str().to_string(),
                name: f.name().to_string(),
                kind: EntryKind::File,
                children: Vec::new(),
            },
            Node::Folder(d) => d.to_view(),
        }
    }

    fn order(&self, other: &Self) -> Ordering {
        sibling_order(self.kind(), self.name(), other.kind(), other.name())
    }
}

// Handles are only `Clone + Debug`, so these can't be derived on `S`.

impl<S: StorageAdapter> Clone for FileNode<S> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            handle: self.handle.clone(),
        }
    }
}

impl<S: StorageAdapter> Clone for FolderNode<S> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            handle: self.handle.clone(),
            children: self.children.clone(),
        }
    }
}

impl<S: StorageAdapter> Clone for Node<S> {
    fn clone(&self) -> Self {
        match self {
            Node::File(f) => Node::File(f.clone()),
            Node::Folder(d) => Node::Folder(d.clone()),
        }
    }
}

impl<S: StorageAdapter> fmt::Debug for FileNode<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileNode")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .finish()
    }
}

impl<S: StorageAdapter> fmt::Debug for FolderNode<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FolderNode")
            .field("path", &self.path)
            .field("handle", &self.handle)
            .field("children", &self.children)
            .finish()
    }
}

impl<S: StorageAdapter> fmt::Debug for Node<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::File(file) => file.fmt(f),
            Node::Folder(folder) => folder.fmt(f),
        }
    }
}

/// Pre-order iterator returned by [`FolderNode::walk`].
pub struct Walk<'a, S: StorageAdapter> {
    stack: Vec<&'a Node<S>>,
}

impl<'a, S: StorageAdapter> Iterator for Walk<'a, S> {
    type Item = &'a Node<S>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        if let Node::Folder(folder) = node {
            self.stack.extend(folder.children.iter().rev());
        }
        Some(node)
    }
}

/// Serializable view of a tree node, for UIs and `--json` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NodeView {
    /// Root-relative path
    pub path: String,
    /// Display name
    pub name: String,
    /// File or directory
    pub kind: EntryKind,
    /// Children in sibling order (empty for files)
    pub children: Vec<NodeView>,
}

/// Render a view as an ASCII tree. Folders get a trailing `/`.
pub fn format_tree(view: &NodeView) -> String {
    let mut result = String::new();
    if view.path.is_empty() {
        result.push_str(".\n");
    } else {
        push_label(&mut result, view);
    }
    for (i, child) in view.children.iter().enumerate() {
        format_tree_node(&mut result, child, "", i + 1 == view.children.len());
    }
    result
}

fn push_label(result: &mut String, node: &NodeView) {
    result.push_str(&node.name);
    if node.kind == EntryKind::Directory {
        result.push('/');
    }
    result.push('\n');
}

fn format_tree_node(result: &mut String, node: &NodeView, prefix: &str, is_last: bool) {
    let connector = if is_last { "└── " } else { "├── " };
    result.push_str(prefix);
    result.push_str(connector);
    push_label(result, node);

    let child_prefix = format!("{}{}", prefix, if is_last { "    " } else { "│   " });
    for (i, child) in node.children.iter().enumerate() {
        format_tree_node(result, child, &child_prefix, i + 1 == node.children.len());
    }
}

/// Options for [`WorkspaceTree::load`].
///
/// The workspace config file at the root is never part of the tree.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Also skip every entry whose name starts with `.`, and everything
    /// below it.
    pub skip_hidden: bool,
}

impl LoadOptions {
    /// Whether the tree built with these options leaves `path` out.
    pub fn hides(&self, path: &PathKey) -> bool {
        if path.as_str() == CONFIG_FILE {
            return true;
        }
        self.skip_hidden && path.segments().any(|s| s.starts_with('.'))
    }
}

/// Builds the in-memory tree from a storage root.
pub struct WorkspaceTree;

impl WorkspaceTree {
    /// Enumerate the whole storage root.
    ///
    /// Fails as a whole if any directory cannot be listed; a truncated tree
    /// is never returned. Entries with names that are not valid path
    /// segments are skipped with a warning.
    pub async fn load<S: StorageAdapter>(
        storage: &S,
        options: &LoadOptions,
    ) -> Result<FolderNode<S>> {
        let root = storage
            .open_root()
            .await
            .map_err(WorkspaceError::StorageUnavailable)?;
        let tree = load_folder(storage, PathKey::root(), root, options).await?;
        log::debug!(
            "Loaded workspace tree: {} folders, {} files",
            tree.folder_count(),
            tree.file_count()
        );
        Ok(tree)
    }
}

fn load_folder<'a, S: StorageAdapter>(
    storage: &'a S,
    path: PathKey,
    handle: S::DirHandle,
    options: &'a LoadOptions,
) -> BoxFuture<'a, Result<FolderNode<S>>> {
    Box::pin(async move {
        let entries = storage
            .list_entries(&handle)
            .await
            .map_err(|e| WorkspaceError::from_io(&path, "folder", e))?;

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries {
            let child_path = match path.join(entry.name()) {
                Ok(p) => p,
                Err(e) => {
                    log::warn!("Skipping entry in '{}': {}", path, e);
                    continue;
                }
            };
            if options.hides(&child_path) {
                continue;
            }
            let node = match entry {
                StorageEntry::File { handle, .. } => Node::File(FileNode {
                    path: child_path,
                    handle,
                }),
                StorageEntry::Directory { handle, .. } => {
                    Node::Folder(load_folder(storage, child_path, handle, options).await?)
                }
            };
            children.push(node);
        }
        children.sort_by(Node::order);

        Ok(FolderNode {
            path,
            handle,
            children,
        })
    })
}
