#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Configuration options
pub mod config;

/// Drag and drop session state
pub mod dnd;

/// Error (common error types)
pub mod error;

/// Workspace events and subscriptions
pub mod events;

/// Replication of the workspace into the engine filesystem
pub mod mirror;

/// Create, delete and move operations
pub mod mutator;

/// Root-relative path keys
pub mod path_key;

/// Storage abstraction over handle-based roots
pub mod storage;

/// In-memory workspace tree
pub mod tree;

/// Workspace session (load, mutate, select, build)
pub mod workspace;

#[cfg(test)]
pub mod test_utils;

pub use error::{Result, WorkspaceError};
pub use path_key::PathKey;
pub use storage::{BoxFuture, StorageAdapter};
pub use tree::{FileNode, FolderNode, Node, WorkspaceTree};
pub use workspace::Workspace;
