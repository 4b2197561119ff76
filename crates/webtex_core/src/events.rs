//! Workspace events and subscriptions.
//!
//! The [`Workspace`](crate::workspace::Workspace) session emits a
//! [`WorkspaceEvent`] after every load, mutation, selection change and
//! mirror pass, so a UI can refresh its file tree without polling.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::path_key::PathKey;
use crate::storage::EntryKind;

/// Events emitted by the workspace session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(tag = "type")]
pub enum WorkspaceEvent {
    /// The tree was (re)loaded.
    TreeLoaded {
        /// Number of files in the tree
        files: usize,
        /// Number of folders in the tree, not counting the root
        folders: usize,
    },

    /// Loading the tree failed; the workspace has no tree.
    LoadFailed {
        /// Error message
        message: String,
    },

    /// A file or folder was created.
    EntryCreated {
        /// Path of the new entry
        #[ts(type = "string")]
        path: PathKey,
        /// File or directory
        kind: EntryKind,
    },

    /// A file or folder was deleted.
    EntryDeleted {
        /// Path of the removed entry
        #[ts(type = "string")]
        path: PathKey,
        /// File or directory
        kind: EntryKind,
    },

    /// An entry was moved to another folder.
    EntryMoved {
        /// Old path
        #[ts(type = "string")]
        from: PathKey,
        /// New path
        #[ts(type = "string")]
        to: PathKey,
        /// File or directory
        kind: EntryKind,
    },

    /// A move copied the entry but left the original behind.
    PartialMove {
        /// Original path, still present
        #[ts(type = "string")]
        from: PathKey,
        /// New path, fully written
        #[ts(type = "string")]
        to: PathKey,
        /// Error from the removal
        message: String,
    },

    /// A file's content was saved.
    FileSaved {
        /// Path of the file
        #[ts(type = "string")]
        path: PathKey,
        /// Bytes written
        bytes: usize,
    },

    /// The selected file changed.
    SelectionChanged {
        /// Newly selected path, `None` when cleared
        #[ts(type = "string | null")]
        path: Option<PathKey>,
    },

    /// The main document changed.
    MainFileChanged {
        /// Path of the new main document
        #[ts(type = "string")]
        path: PathKey,
    },

    /// The tree was mirrored into the engine filesystem.
    MirrorCompleted {
        /// Directories ensured
        directories: usize,
        /// Files written
        files: usize,
        /// Bytes written
        bytes: usize,
    },
}

/// A unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback function type for workspace events.
///
/// Callbacks receive a reference to the event and should not block.
#[cfg(not(target_arch = "wasm32"))]
pub type EventCallback = Arc<dyn Fn(&WorkspaceEvent) + Send + Sync>;

/// Callback function type for workspace events.
///
/// Not `Send` on WASM, where callbacks usually wrap JS functions.
#[cfg(target_arch = "wasm32")]
pub type EventCallback = Arc<dyn Fn(&WorkspaceEvent)>;

/// Registry of event subscribers.
pub struct CallbackRegistry {
    callbacks: RwLock<HashMap<SubscriptionId, EventCallback>>,
    next_id: AtomicU64,
}

impl CallbackRegistry {
    /// Create a new empty callback registry.
    pub fn new() -> Self {
        Self {
            callbacks: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Subscribe to workspace events.
    ///
    /// Returns a subscription ID that can be used to unsubscribe later.
    pub fn subscribe(&self, callback: EventCallback) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);
        id
    }

    /// Returns `true` if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }

    /// Emit an event to all registered callbacks.
    ///
    /// Callbacks run synchronously in no particular order. A panicking
    /// callback does not stop the others.
    pub fn emit(&self, event: &WorkspaceEvent) {
        // Snapshot so a callback may subscribe or unsubscribe
        let callbacks: Vec<EventCallback> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for callback in callbacks {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                callback(event);
            }));
        }
    }

    /// Get the number of active subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("subscriber_count", &self.subscriber_count())
            .field("next_id", &self.next_id.load(Ordering::SeqCst))
            .finish()
    }
}
