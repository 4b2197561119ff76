use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::path_key::PathKey;

/// Why a move request was refused before touching storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoveRejection {
    /// Source and target are the same node.
    OntoItself,
    /// Target is the folder the source already lives in.
    OntoCurrentParent,
    /// Target lies inside the source folder.
    IntoDescendant,
    /// Target is not a folder.
    TargetNotFolder,
    /// The storage root itself cannot be moved.
    RootNotMovable,
}

impl std::fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            MoveRejection::OntoItself => "cannot move an entry onto itself",
            MoveRejection::OntoCurrentParent => "entry is already in the target folder",
            MoveRejection::IntoDescendant => "cannot move a folder into its own subtree",
            MoveRejection::TargetNotFolder => "drop target is not a folder",
            MoveRejection::RootNotMovable => "the workspace root cannot be moved",
        };
        f.write_str(msg)
    }
}

/// Unified error type for workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The storage root could not be opened. Fatal to the whole workspace.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[source] io::Error),

    /// A path did not resolve to a node in the current tree.
    #[error("No entry at '{0}'")]
    EntryNotFound(PathKey),

    /// An entry of the other kind already occupies the name.
    #[error("'{path}' already exists and is not a {expected}")]
    NameConflict {
        /// Path of the conflicting entry
        path: PathKey,
        /// The kind the operation needed ("file" or "folder")
        expected: &'static str,
    },

    /// A path string failed validation.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The offending input
        path: String,
        /// What was wrong with it
        reason: &'static str,
    },

    /// A move was rejected before any storage call.
    #[error("Cannot move '{source_path}' to '{target}': {reason}")]
    InvalidMove {
        /// Path of the entry being moved
        source_path: PathKey,
        /// Path of the requested destination folder
        target: PathKey,
        /// Why the move was refused
        reason: MoveRejection,
    },

    /// Non-recursive removal of a folder that still has entries.
    #[error("Folder '{0}' is not empty")]
    DirectoryNotEmpty(PathKey),

    /// The copy half of a move succeeded but the source could not be removed.
    /// The entry now exists at both paths.
    #[error("Moved '{source_path}' to '{destination}' but could not remove the original: {error}")]
    PartialMoveFailure {
        /// Original path, still present
        source_path: PathKey,
        /// New path, fully written
        destination: PathKey,
        /// Storage error from the removal
        error: io::Error,
    },

    /// A file could not be copied into the engine filesystem.
    #[error("Failed to mirror '{path}' into the engine filesystem: {source}")]
    MirrorSyncFailure {
        /// Path of the file that failed
        path: PathKey,
        /// Underlying error
        source: io::Error,
    },

    /// The mirror walk observed its cancellation flag.
    #[error("Mirror cancelled after {files_written} files")]
    MirrorCancelled {
        /// Files written before cancellation
        files_written: usize,
    },

    /// Another mutation is still running.
    #[error("Another workspace mutation is still in progress")]
    MutationInFlight,

    /// The workspace tree has not been loaded (or the last load failed).
    #[error("Workspace is not loaded")]
    NotLoaded,

    /// Any other storage failure.
    #[error("Storage error at '{path}': {source}")]
    Storage {
        /// Path the operation was working on
        path: PathKey,
        /// Underlying error
        source: io::Error,
    },

    // Config errors
    /// Config file could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config could not be serialized
    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),
}

impl WorkspaceError {
    /// Classify a storage `io::Error` raised while working on `path`.
    ///
    /// `expected` names the kind the caller wanted to find or create, and is
    /// used when storage reports a kind mismatch.
    pub fn from_io(path: &PathKey, expected: &'static str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => WorkspaceError::EntryNotFound(path.clone()),
            io::ErrorKind::IsADirectory | io::ErrorKind::NotADirectory => {
                WorkspaceError::NameConflict {
                    path: path.clone(),
                    expected,
                }
            }
            io::ErrorKind::DirectoryNotEmpty => WorkspaceError::DirectoryNotEmpty(path.clone()),
            _ => WorkspaceError::Storage {
                path: path.clone(),
                source: err,
            },
        }
    }

    /// Path associated with the error, if any.
    pub fn path(&self) -> Option<&PathKey> {
        match self {
            WorkspaceError::EntryNotFound(path)
            | WorkspaceError::DirectoryNotEmpty(path)
            | WorkspaceError::NameConflict { path, .. }
            | WorkspaceError::MirrorSyncFailure { path, .. }
            | WorkspaceError::Storage { path, .. } => Some(path),
            WorkspaceError::InvalidMove { source_path, .. }
            | WorkspaceError::PartialMoveFailure { source_path, .. } => Some(source_path),
            _ => None,
        }
    }
}

/// Result type alias for workspace operations
pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// A serializable representation of WorkspaceError for IPC (e.g., wasm bindings)
#[derive(Debug, Clone, Serialize)]
pub struct SerializableError {
    /// Error kind/variant name
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Associated path (if applicable)
    pub path: Option<String>,
}

impl From<&WorkspaceError> for SerializableError {
    fn from(err: &WorkspaceError) -> Self {
        let kind = match err {
            WorkspaceError::StorageUnavailable(_) => "StorageUnavailable",
            WorkspaceError::EntryNotFound(_) => "EntryNotFound",
            WorkspaceError::NameConflict { .. } => "NameConflict",
            WorkspaceError::InvalidPath { .. } => "InvalidPath",
            WorkspaceError::InvalidMove { .. } => "InvalidMove",
            WorkspaceError::DirectoryNotEmpty(_) => "DirectoryNotEmpty",
            WorkspaceError::PartialMoveFailure { .. } => "PartialMoveFailure",
            WorkspaceError::MirrorSyncFailure { .. } => "MirrorSyncFailure",
            WorkspaceError::MirrorCancelled { .. } => "MirrorCancelled",
            WorkspaceError::MutationInFlight => "MutationInFlight",
            WorkspaceError::NotLoaded => "NotLoaded",
            WorkspaceError::Storage { .. } => "Storage",
            WorkspaceError::ConfigParse(_) => "ConfigParse",
            WorkspaceError::ConfigSerialize(_) => "ConfigSerialize",
        }
        .to_string();

        Self {
            kind,
            message: err.to_string(),
            path: err.path().map(|p| p.as_str().to_string()),
        }
    }
}

impl From<WorkspaceError> for SerializableError {
    fn from(err: WorkspaceError) -> Self {
        SerializableError::from(&err)
    }
}

impl WorkspaceError {
    /// Convert to a serializable representation for IPC
    pub fn to_serializable(&self) -> SerializableError {
        SerializableError::from(self)
    }
}
