//! Entry command handlers: create, delete, move and print files.

use webtex_core::{PathKey, WorkspaceError};

use crate::cli::{CliWorkspace, block_on, normalize_path};

fn report(result: Result<(), WorkspaceError>) -> bool {
    match result {
        Ok(()) => true,
        Err(WorkspaceError::PartialMoveFailure {
            source_path,
            destination,
            error,
        }) => {
            eprintln!(
                "⚠ Copied '{}' to '{}' but could not remove the original: {}",
                source_path, destination, error
            );
            eprintln!("  The entry now exists at both paths.");
            false
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}

/// `webtex new <path>`
pub fn handle_new(ws: &CliWorkspace, path: &str) -> bool {
    report(block_on(ws.create_file(normalize_path(path))).map(|created| {
        println!("✓ Created {}", created);
    }))
}

/// `webtex mkdir <path>`
pub fn handle_mkdir(ws: &CliWorkspace, path: &str) -> bool {
    let result = PathKey::parse(normalize_path(path)).and_then(|key| {
        if key.is_root() {
            return Err(WorkspaceError::InvalidPath {
                path: path.to_string(),
                reason: "the workspace root already exists",
            });
        }
        // Missing parents are created too, like `mkdir -p`
        let mut parent = PathKey::root();
        for segment in key.segments() {
            let next = parent.join(segment)?;
            if ws.tree()?.find_folder(&next).is_none() {
                block_on(ws.create_folder(&parent, segment))?;
            }
            parent = next;
        }
        Ok(key)
    });
    report(result.map(|created| {
        println!("✓ Created {}/", created);
    }))
}

/// `webtex rm <path>`
pub fn handle_rm(ws: &CliWorkspace, path: &str) -> bool {
    let path = normalize_path(path);
    report(block_on(ws.delete(path)).map(|()| {
        println!("✓ Deleted {}", path);
    }))
}

/// `webtex mv <source> <target>`
pub fn handle_mv(ws: &CliWorkspace, source: &str, target: &str) -> bool {
    report(
        block_on(ws.move_entry(normalize_path(source), normalize_path(target))).map(|dest| {
            println!("✓ Moved {} → {}", normalize_path(source), dest);
        }),
    )
}

/// `webtex cat <path>`
pub fn handle_cat(ws: &CliWorkspace, path: &str) -> bool {
    report(block_on(ws.read_text(normalize_path(path))).map(|text| {
        print!("{}", text);
    }))
}
