//! Drag and drop session state.
//!
//! One session at a time: `Idle`, then `Dragging` once a node is picked up,
//! with an optional hover target. The dragged node and the target are
//! captured by path only. Handles go stale when the tree is reloaded while
//! a drag is open, so the session layer resolves both paths against the
//! current tree when the [`DropRequest`] is applied.

use crate::error::{MoveRejection, Result, WorkspaceError};
use crate::path_key::PathKey;
use crate::storage::{EntryKind, StorageAdapter};
use crate::tree::FolderNode;

/// Snapshot of the node being dragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraggedEntry {
    path: PathKey,
    kind: EntryKind,
}

impl DraggedEntry {
    /// Path of the dragged node at drag start.
    pub fn path(&self) -> &PathKey {
        &self.path
    }

    /// Kind of the dragged node.
    pub fn kind(&self) -> EntryKind {
        self.kind
    }
}

/// Snapshot of the folder currently hovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    path: PathKey,
}

impl DropTarget {
    /// Path of the target folder.
    pub fn path(&self) -> &PathKey {
        &self.path
    }
}

/// Drag session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DragState {
    /// No drag in progress
    #[default]
    Idle,
    /// A node is being dragged
    Dragging {
        /// The dragged node
        source: DraggedEntry,
        /// Current drop target, if any
        target: Option<DropTarget>,
    },
}

/// A completed drop, to be executed as a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropRequest {
    /// The dragged node
    pub source: DraggedEntry,
    /// The folder it was dropped on
    pub target: DropTarget,
}

impl DropRequest {
    /// Path of the node to move.
    pub fn source_path(&self) -> &PathKey {
        &self.source.path
    }

    /// Path of the destination folder.
    pub fn target_path(&self) -> &PathKey {
        &self.target.path
    }
}

/// Result of [`DragAndDropCoordinator::hover`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoverOutcome {
    /// The folder is now the drop target.
    Accepted,
    /// The folder can't take the dragged node; state unchanged.
    Rejected(MoveRejection),
    /// No drag in progress.
    NotDragging,
}

/// The drag and drop state machine.
#[derive(Debug, Default)]
pub struct DragAndDropCoordinator {
    state: DragState,
}

impl DragAndDropCoordinator {
    /// Start in `Idle`.
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> &DragState {
        &self.state
    }

    /// Whether a drag is in progress.
    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Path of the dragged node, if dragging.
    pub fn dragged_path(&self) -> Option<&PathKey> {
        match &self.state {
            DragState::Dragging { source, .. } => Some(&source.path),
            DragState::Idle => None,
        }
    }

    /// Path of the current drop target, if any.
    pub fn target_path(&self) -> Option<&PathKey> {
        match &self.state {
            DragState::Dragging {
                target: Some(target),
                ..
            } => Some(&target.path),
            _ => None,
        }
    }

    /// Pick up the node at `path` in `root`. Replaces any open session.
    pub fn begin_drag<S: StorageAdapter>(
        &mut self,
        root: &FolderNode<S>,
        path: &PathKey,
    ) -> Result<()> {
        if path.is_root() {
            return Err(WorkspaceError::InvalidMove {
                source_path: path.clone(),
                target: path.clone(),
                reason: MoveRejection::RootNotMovable,
            });
        }
        let node = root
            .find_by_path(path)
            .ok_or_else(|| WorkspaceError::EntryNotFound(path.clone()))?;

        if let Some(previous) = self.dragged_path() {
            log::debug!("Drag of '{}' replaced by '{}'", previous, path);
        }
        self.state = DragState::Dragging {
            source: DraggedEntry {
                path: path.clone(),
                kind: node.kind(),
            },
            target: None,
        };
        Ok(())
    }

    /// Offer `candidate` as the drop target.
    ///
    /// The dragged node itself and anything below it are rejected.
    pub fn hover<S: StorageAdapter>(&mut self, candidate: &FolderNode<S>) -> HoverOutcome {
        let DragState::Dragging { source, target } = &mut self.state else {
            return HoverOutcome::NotDragging;
        };
        if candidate.path() == &source.path {
            return HoverOutcome::Rejected(MoveRejection::OntoItself);
        }
        if candidate.path().is_descendant_of(&source.path) {
            return HoverOutcome::Rejected(MoveRejection::IntoDescendant);
        }
        *target = Some(DropTarget {
            path: candidate.path().clone(),
        });
        HoverOutcome::Accepted
    }

    /// The pointer left `candidate`; clears the target if it was this folder.
    pub fn leave(&mut self, candidate: &PathKey) {
        if let DragState::Dragging { target, .. } = &mut self.state
            && target.as_ref().is_some_and(|t| &t.path == candidate)
        {
            *target = None;
        }
    }

    /// End the drag. Returns the move to perform if a target was set.
    /// Always returns to `Idle`.
    pub fn drop(&mut self) -> Option<DropRequest> {
        match std::mem::replace(&mut self.state, DragState::Idle) {
            DragState::Dragging {
                source,
                target: Some(target),
            } => Some(DropRequest { source, target }),
            _ => None,
        }
    }

    /// Abandon the drag.
    pub fn cancel(&mut self) {
        self.state = DragState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{key, load_tree, sample_project};

    #[test]
    fn test_drag_hover_drop() {
        let root = load_tree(&sample_project());
        let mut dnd = DragAndDropCoordinator::new();
        dnd.begin_drag(&root, &key("figs/a.png")).unwrap();
        assert!(dnd.is_dragging());

        assert_eq!(dnd.hover(&root), HoverOutcome::Accepted);
        assert_eq!(dnd.target_path(), Some(&PathKey::root()));

        let request = dnd.drop().unwrap();
        assert_eq!(request.source_path(), &key("figs/a.png"));
        assert!(request.target_path().is_root());
        assert_eq!(request.source.kind(), EntryKind::File);
        assert!(!dnd.is_dragging());
    }

    #[test]
    fn test_hover_on_self_or_descendant_rejected() {
        let root = load_tree(&sample_project());
        let mut dnd = DragAndDropCoordinator::new();
        dnd.begin_drag(&root, &key("figs")).unwrap();

        let figs = root.find_folder(&key("figs")).unwrap();
        let plots = root.find_folder(&key("figs/plots")).unwrap();
        assert_eq!(
            dnd.hover(figs),
            HoverOutcome::Rejected(MoveRejection::OntoItself)
        );
        assert_eq!(
            dnd.hover(plots),
            HoverOutcome::Rejected(MoveRejection::IntoDescendant)
        );
        assert_eq!(dnd.target_path(), None);
    }

    #[test]
    fn test_rejected_hover_keeps_previous_target() {
        let root = load_tree(&sample_project());
        let mut dnd = DragAndDropCoordinator::new();
        dnd.begin_drag(&root, &key("figs")).unwrap();
        let chapters = root.find_folder(&key("chapters")).unwrap();
        let plots = root.find_folder(&key("figs/plots")).unwrap();

        assert_eq!(dnd.hover(chapters), HoverOutcome::Accepted);
        assert!(matches!(dnd.hover(plots), HoverOutcome::Rejected(_)));
        assert_eq!(dnd.target_path(), Some(&key("chapters")));
    }

    #[test]
    fn test_leave_clears_matching_target_only() {
        let root = load_tree(&sample_project());
        let mut dnd = DragAndDropCoordinator::new();
        dnd.begin_drag(&root, &key("main.tex")).unwrap();
        let chapters = root.find_folder(&key("chapters")).unwrap();
        dnd.hover(chapters);

        dnd.leave(&key("figs"));
        assert_eq!(dnd.target_path(), Some(&key("chapters")));
        dnd.leave(&key("chapters"));
        assert_eq!(dnd.target_path(), None);
        assert!(dnd.is_dragging());
    }

    #[test]
    fn test_drop_without_target_is_noop_and_resets() {
        let root = load_tree(&sample_project());
        let mut dnd = DragAndDropCoordinator::new();
        dnd.begin_drag(&root, &key("main.tex")).unwrap();
        assert!(dnd.drop().is_none());
        assert!(!dnd.is_dragging());
        assert!(dnd.drop().is_none());
    }

    #[test]
    fn test_cancel_and_idle_hover() {
        let root = load_tree(&sample_project());
        let mut dnd = DragAndDropCoordinator::new();
        assert_eq!(dnd.hover(&root), HoverOutcome::NotDragging);
        dnd.begin_drag(&root, &key("refs.bib")).unwrap();
        dnd.hover(&root);
        dnd.cancel();
        assert!(matches!(dnd.state(), DragState::Idle));
        assert!(dnd.drop().is_none());
    }

    #[test]
    fn test_begin_drag_unknown_path_or_root() {
        let root = load_tree(&sample_project());
        let mut dnd = DragAndDropCoordinator::new();
        assert!(matches!(
            dnd.begin_drag(&root, &key("nope.tex")),
            Err(WorkspaceError::EntryNotFound(_))
        ));
        assert!(matches!(
            dnd.begin_drag(&root, &PathKey::root()),
            Err(WorkspaceError::InvalidMove { .. })
        ));
        assert!(!dnd.is_dragging());
    }
}
