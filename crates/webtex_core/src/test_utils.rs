//! Test utilities for webtex_core
//!
//! Shared fixtures: a blocking executor for the boxed futures and a sample
//! project laid out the way a typical LaTeX workspace is.

use std::future::Future;

use crate::path_key::PathKey;
use crate::storage::InMemoryStorage;
use crate::tree::{FolderNode, LoadOptions, WorkspaceTree};

/// Run a future to completion (tests only).
pub fn block_on_test<F: Future>(future: F) -> F::Output {
    futures_lite::future::block_on(future)
}

/// Parse a path, panicking on invalid input.
pub fn key(path: &str) -> PathKey {
    PathKey::parse(path).unwrap()
}

/// A small LaTeX project:
///
/// ```text
/// chapters/intro.tex
/// figs/a.png
/// figs/plots/b.pdf
/// main.tex
/// refs.bib
/// ```
pub fn sample_project() -> InMemoryStorage {
    InMemoryStorage::new()
        .with_file("main.tex", "\\documentclass{article}\n\\input{chapters/intro}\n")
        .with_file("refs.bib", "@book{knuth,}\n")
        .with_file("chapters/intro.tex", "Hello.\n")
        .with_file("figs/a.png", vec![0x89, b'P', b'N', b'G', 0x00, 0xff])
        .with_file("figs/plots/b.pdf", b"%PDF-1.5\n".to_vec())
}

/// Load the tree of `storage` with default options.
pub fn load_tree(storage: &InMemoryStorage) -> FolderNode<InMemoryStorage> {
    block_on_test(WorkspaceTree::load(storage, &LoadOptions::default())).unwrap()
}

/// All paths of the tree in pre-order, for compact assertions.
pub fn paths(root: &FolderNode<InMemoryStorage>) -> Vec<String> {
    root.walk().map(|n| n.path().as_str().to_string()).collect()
}
