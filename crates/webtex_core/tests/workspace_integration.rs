//! End-to-end checks of the workspace over the in-memory storage root.

use std::collections::HashSet;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_lite::future::{block_on, yield_now, zip};
use webtex_core::dnd::{DragAndDropCoordinator, HoverOutcome};
use webtex_core::mirror::{InMemoryEngineFs, MirrorSync};
use webtex_core::mutator::TreeMutator;
use webtex_core::storage::{EntryList, InMemoryStorage, StorageOp};
use webtex_core::tree::{LoadOptions, Node};
use webtex_core::workspace::{LoadOutcome, LoadState};
use webtex_core::{BoxFuture, PathKey, StorageAdapter, Workspace, WorkspaceError, WorkspaceTree};

fn key(path: &str) -> PathKey {
    PathKey::parse(path).unwrap()
}

fn project() -> InMemoryStorage {
    InMemoryStorage::new()
        .with_file("main.tex", "\\documentclass{article}\n")
        .with_file("refs.bib", "")
        .with_file("figs/a.png", vec![0x89, b'P', b'N', b'G', 0, 0xff, 0x10])
        .with_file("figs/plots/b.pdf", b"%PDF".to_vec())
        .with_file("chapters/one/intro.tex", "intro")
        .with_file("chapters/two.tex", "two")
}

fn open(storage: InMemoryStorage) -> Workspace<InMemoryStorage> {
    let ws = Workspace::new(storage);
    block_on(ws.load()).unwrap();
    ws
}

#[test]
fn paths_are_unique() {
    let ws = open(project());
    let tree = ws.tree().unwrap();
    let mut seen = HashSet::new();
    for node in tree.walk() {
        assert!(seen.insert(node.path().clone()), "duplicate {}", node.path());
    }
    assert_eq!(seen.len(), tree.file_count() + tree.folder_count());
}

#[test]
fn create_file_round_trip() {
    let ws = open(InMemoryStorage::new());
    block_on(ws.create_file("a/b/c.tex")).unwrap();

    let tree = ws.tree().unwrap();
    assert!(tree.find_by_path(&key("a")).unwrap().is_folder());
    assert!(tree.find_by_path(&key("a/b")).unwrap().is_folder());
    assert!(!tree.find_by_path(&key("a/b/c.tex")).unwrap().is_folder());
}

#[test]
fn create_dot_file_round_trip() {
    let ws = open(InMemoryStorage::new());
    let path = block_on(ws.create_file(".latexmkrc")).unwrap();
    assert!(ws.tree().unwrap().find_by_path(&path).is_some());
}

#[test]
fn folder_move_keeps_dot_files() {
    let storage = project().with_file("chapters/.latexmkrc", "$pdf_mode = 1;");
    let ws = open(storage.clone().with_dir("book"));

    let dest = block_on(ws.move_entry("chapters", "book")).unwrap();
    assert_eq!(dest, key("book/chapters"));
    assert!(!storage.exists("chapters/.latexmkrc"));
    assert_eq!(
        storage.file_content("book/chapters/.latexmkrc").unwrap(),
        b"$pdf_mode = 1;"
    );
    assert!(ws.resolve("book/chapters/.latexmkrc").is_ok());
}

#[test]
fn move_preserves_content() {
    let ws = open(project());
    let before = block_on(ws.read_bytes("figs/a.png")).unwrap();

    let dest = block_on(ws.move_entry("figs/a.png", "chapters/one")).unwrap();
    assert_eq!(dest, key("chapters/one/a.png"));

    let tree = ws.tree().unwrap();
    assert!(tree.find_by_path(&key("figs/a.png")).is_none());
    assert_eq!(block_on(ws.read_bytes("chapters/one/a.png")).unwrap(), before);
}

#[test]
fn self_move_makes_no_storage_calls() {
    let storage = project();
    let ws = open(storage.clone());
    let calls = storage.call_count();

    for (source, target) in [("figs/a.png", "figs"), ("figs", "figs")] {
        let err = block_on(ws.move_entry(source, target)).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidMove { .. }));
    }
    assert_eq!(storage.call_count(), calls);
}

#[test]
fn descendant_move_rejected_before_storage() {
    let storage = project();
    let tree = block_on(WorkspaceTree::load(&storage, &LoadOptions::default())).unwrap();
    let chapters = tree.find_by_path(&key("chapters")).unwrap();
    let one = tree.find_folder(&key("chapters/one")).unwrap();
    let calls = storage.call_count();

    let err = block_on(TreeMutator::new(&storage).move_node(chapters, tree.handle(), one))
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::InvalidMove { .. }));
    assert_eq!(storage.call_count(), calls);
}

#[test]
fn delete_removes_subtree() {
    let ws = open(project());
    block_on(ws.delete("chapters")).unwrap();
    let tree = ws.tree().unwrap();
    assert!(
        tree.walk()
            .all(|n| !n.path().is_descendant_of(&key("chapters")) && n.path() != &key("chapters"))
    );
    assert_eq!(tree.file_count(), 4);
}

#[test]
fn mirror_is_complete() {
    let storage = project();
    let ws = open(storage.clone());
    let engine = InMemoryEngineFs::new();
    block_on(ws.prepare_build(&engine, [])).unwrap();

    let tree = ws.tree().unwrap();
    for node in tree.walk() {
        let path = node.path().as_str();
        match node {
            Node::Folder(_) => assert!(engine.has_directory(path), "{path}"),
            Node::File(_) => assert_eq!(engine.read(path), storage.file_content(path)),
        }
    }
}

#[test]
fn scenario_main_tex_reaches_engine() {
    let ws = open(InMemoryStorage::new());
    block_on(ws.create_file("main.tex")).unwrap();

    let tree = ws.tree().unwrap();
    let paths: Vec<_> = tree.walk().map(|n| n.path().clone()).collect();
    assert_eq!(paths, vec![key("main.tex")]);

    block_on(ws.save_file("main.tex", "\\documentclass{article}")).unwrap();
    let engine = InMemoryEngineFs::new();
    block_on(MirrorSync::new(ws.storage()).sync(&ws.tree().unwrap(), &engine)).unwrap();
    assert_eq!(
        engine.read_to_string("main.tex").as_deref(),
        Some("\\documentclass{article}")
    );
}

#[test]
fn scenario_move_out_of_figs_by_drag_and_drop() {
    let ws = open(InMemoryStorage::new().with_file("figs/a.png", vec![1, 2]));
    let mut dnd = DragAndDropCoordinator::new();
    let tree = ws.tree().unwrap();

    dnd.begin_drag(&tree, &key("figs/a.png")).unwrap();
    assert_eq!(dnd.hover(&tree), HoverOutcome::Accepted);
    let request = dnd.drop().unwrap();
    block_on(ws.apply_drop(request)).unwrap();

    let tree = ws.tree().unwrap();
    assert!(!tree.find_by_path(&key("a.png")).unwrap().is_folder());
    let figs = tree.find_folder(&key("figs")).unwrap();
    assert!(figs.children().is_empty());
}

#[test]
fn drop_survives_reload_between_hover_and_drop() {
    let ws = open(project());
    let mut dnd = DragAndDropCoordinator::new();
    let tree = ws.tree().unwrap();
    dnd.begin_drag(&tree, &key("refs.bib")).unwrap();
    dnd.hover(tree.find_folder(&key("chapters")).unwrap());

    // Unrelated mutation reloads the tree; the snapshot handles are stale
    block_on(ws.create_file("appendix.tex")).unwrap();

    let request = dnd.drop().unwrap();
    let dest = block_on(ws.apply_drop(request)).unwrap();
    assert_eq!(dest, key("chapters/refs.bib"));
}

#[test]
fn partial_move_leaves_duplicate_and_reports() {
    let storage = project();
    let ws = open(storage.clone());
    storage.fail_next(StorageOp::RemoveEntry);

    let err = block_on(ws.move_entry("refs.bib", "figs")).unwrap_err();
    assert!(matches!(err, WorkspaceError::PartialMoveFailure { .. }));

    let tree = ws.tree().unwrap();
    assert!(tree.find_by_path(&key("refs.bib")).is_some());
    assert!(tree.find_by_path(&key("figs/refs.bib")).is_some());
}

#[test]
fn binary_assets_mirror_byte_exact() {
    let ws = open(project());
    let engine = InMemoryEngineFs::new();
    block_on(ws.prepare_build(&engine, [])).unwrap();
    assert_eq!(
        engine.read("figs/a.png").unwrap(),
        vec![0x89, b'P', b'N', b'G', 0, 0xff, 0x10]
    );
}

#[test]
fn unsaved_buffer_wins_over_stored_content() {
    let ws = open(project());
    let engine = InMemoryEngineFs::new();
    block_on(ws.prepare_build(&engine, [(key("main.tex"), "edited".to_string())])).unwrap();
    assert_eq!(engine.read_to_string("main.tex").as_deref(), Some("edited"));
    assert_eq!(
        block_on(ws.read_text("main.tex")).unwrap(),
        "\\documentclass{article}\n"
    );
}

#[test]
fn events_follow_mutations() {
    let ws = open(project());
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let id = ws.subscribe(Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    // EntryCreated + TreeLoaded
    block_on(ws.create_file("notes.tex")).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);

    assert!(ws.unsubscribe(id));
    block_on(ws.delete("notes.tex")).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

/// Yields once before opening the root so two loads can interleave.
struct YieldingStorage(InMemoryStorage);

impl StorageAdapter for YieldingStorage {
    type FileHandle = <InMemoryStorage as StorageAdapter>::FileHandle;
    type DirHandle = <InMemoryStorage as StorageAdapter>::DirHandle;

    fn open_root(&self) -> BoxFuture<'_, io::Result<Self::DirHandle>> {
        Box::pin(async move {
            yield_now().await;
            self.0.open_root().await
        })
    }

    fn list_entries<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
    ) -> BoxFuture<'a, io::Result<EntryList<Self>>> {
        self.0.list_entries(dir)
    }

    fn get_or_create_file<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, io::Result<Self::FileHandle>> {
        self.0.get_or_create_file(dir, name)
    }

    fn get_or_create_directory<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
    ) -> BoxFuture<'a, io::Result<Self::DirHandle>> {
        self.0.get_or_create_directory(dir, name)
    }

    fn remove_entry<'a>(
        &'a self,
        dir: &'a Self::DirHandle,
        name: &'a str,
        recursive: bool,
    ) -> BoxFuture<'a, io::Result<()>> {
        self.0.remove_entry(dir, name, recursive)
    }

    fn read_bytes<'a>(&'a self, file: &'a Self::FileHandle) -> BoxFuture<'a, io::Result<Vec<u8>>> {
        self.0.read_bytes(file)
    }

    fn write_bytes<'a>(
        &'a self,
        file: &'a Self::FileHandle,
        content: &'a [u8],
    ) -> BoxFuture<'a, io::Result<()>> {
        self.0.write_bytes(file, content)
    }
}

#[test]
fn last_load_wins() {
    let ws = Workspace::new(YieldingStorage(project()));
    let (first, second) = block_on(zip(ws.load(), ws.load()));
    assert_eq!(first.unwrap(), LoadOutcome::Superseded);
    assert_eq!(second.unwrap(), LoadOutcome::Installed);
    assert!(matches!(ws.state(), LoadState::Loaded(_)));
}

#[test]
fn failed_load_is_an_explicit_state() {
    let storage = project();
    storage.fail_next(StorageOp::ListEntries);
    let ws = Workspace::new(storage);
    assert!(block_on(ws.load()).is_err());
    assert!(matches!(ws.state(), LoadState::Failed(_)));
    assert!(matches!(ws.tree(), Err(WorkspaceError::NotLoaded)));
}
