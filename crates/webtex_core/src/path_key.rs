//! Root-relative path keys.
//!
//! Every node in the workspace tree is identified by a [`PathKey`]: the
//! `/`-joined sequence of segment names from the storage root down to the
//! node, with no leading or trailing slash. The root itself is the empty key.
//!
//! Keys are also the only thing that survives a tree reload, so every layer
//! above the tree (mutations, drag and drop, selection) compares keys and
//! never storage handles.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::storage::EntryKind;

/// A validated, root-relative path such as `chapters/intro.tex`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathKey(String);

impl PathKey {
    /// The distinguished empty path of the storage root.
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and validate a path string.
    ///
    /// The empty string is the root. Anything else must be one or more valid
    /// segments joined by single slashes.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::root());
        }
        if raw.starts_with('/') || raw.ends_with('/') {
            return Err(invalid(raw, "leading or trailing slash"));
        }
        for segment in raw.split('/') {
            if let Err(reason) = check_segment(segment) {
                return Err(invalid(raw, reason));
            }
        }
        Ok(Self(raw.to_string()))
    }

    /// The path as a string slice (empty for the root).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the storage root.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Display name of the node: the last segment, empty for the root.
    pub fn name(&self) -> &str {
        match self.0.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.0,
        }
    }

    /// Key of the containing folder. The root has no parent.
    pub fn parent(&self) -> Option<PathKey> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rsplit_once('/') {
            Some((parent, _)) => Self(parent.to_string()),
            None => Self::root(),
        })
    }

    /// Append a single segment.
    pub fn join(&self, segment: &str) -> Result<PathKey> {
        validate_segment(segment)?;
        if self.is_root() {
            Ok(Self(segment.to_string()))
        } else {
            Ok(Self(format!("{}/{}", self.0, segment)))
        }
    }

    /// Segments from the root down. Empty for the root.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments (0 for the root).
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Split into the parent key and the leaf name.
    pub fn split_leaf(&self) -> Option<(PathKey, &str)> {
        let parent = self.parent()?;
        Some((parent, self.name()))
    }

    /// Whether `self` lies strictly below `ancestor`.
    ///
    /// Uses the segment boundary, so `figs2/a.png` is not below `figs`.
    pub fn is_descendant_of(&self, ancestor: &PathKey) -> bool {
        if self.is_root() {
            return false;
        }
        if ancestor.is_root() {
            return true;
        }
        self.0.len() > ancestor.0.len()
            && self.0.starts_with(&ancestor.0)
            && self.0.as_bytes()[ancestor.0.len()] == b'/'
    }

    /// Rebase `self` from under `from` to under `to`.
    ///
    /// `from` must be `self` or one of its ancestors.
    pub fn rebase(&self, from: &PathKey, to: &PathKey) -> Option<PathKey> {
        let rest = if self == from {
            ""
        } else if self.is_descendant_of(from) {
            if from.is_root() {
                self.0.as_str()
            } else {
                &self.0[from.0.len() + 1..]
            }
        } else {
            return None;
        };

        let joined = match (to.is_root(), rest.is_empty()) {
            (true, _) => rest.to_string(),
            (false, true) => to.0.clone(),
            (false, false) => format!("{}/{}", to.0, rest),
        };
        Some(Self(joined))
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("/")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl FromStr for PathKey {
    type Err = WorkspaceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PathKey {
    type Error = WorkspaceError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for PathKey {
    type Error = WorkspaceError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<PathKey> for String {
    fn from(key: PathKey) -> Self {
        key.0
    }
}

impl AsRef<str> for PathKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check that `segment` can be used as a single entry name.
pub fn validate_segment(segment: &str) -> Result<()> {
    check_segment(segment).map_err(|reason| invalid(segment, reason))
}

fn check_segment(segment: &str) -> std::result::Result<(), &'static str> {
    if segment.is_empty() {
        return Err("empty segment");
    }
    if segment == "." || segment == ".." {
        return Err("relative segment");
    }
    if segment.contains('/') {
        return Err("segment contains '/'");
    }
    if segment.contains('\0') {
        return Err("segment contains NUL");
    }
    Ok(())
}

fn invalid(path: &str, reason: &'static str) -> WorkspaceError {
    WorkspaceError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

/// Sibling order inside one folder: folders first, then names compared
/// byte-wise (case-sensitive, `B` sorts before `a`).
pub fn sibling_order(a_kind: EntryKind, a_name: &str, b_kind: EntryKind, b_name: &str) -> Ordering {
    match (a_kind, b_kind) {
        (EntryKind::Directory, EntryKind::File) => Ordering::Less,
        (EntryKind::File, EntryKind::Directory) => Ordering::Greater,
        _ => a_name.cmp(b_name),
    }
}
