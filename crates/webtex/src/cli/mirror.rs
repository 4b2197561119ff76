//! `mirror` command handler

use std::path::PathBuf;

use webtex_core::mirror::DirectoryEngineFs;

use crate::cli::{CliWorkspace, block_on, normalize_path};

/// Copy the workspace into `out`, exactly as a build would see it.
pub fn handle_mirror(ws: &CliWorkspace, out: PathBuf, main: Option<String>) -> bool {
    if let Some(main) = main
        && let Err(e) = ws.set_main_file(normalize_path(&main))
    {
        eprintln!("✗ {}", e);
        return false;
    }

    let engine = DirectoryEngineFs::new(&out);
    match block_on(ws.prepare_build(&engine, [])) {
        Ok(report) => {
            println!(
                "✓ Mirrored {} files ({} bytes) in {} folders to {}",
                report.files,
                report.bytes,
                report.directories,
                out.display()
            );
            if let Some(main) = engine.main_entry_point() {
                println!("  Main document: {}", main.display());
            }
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use webtex_core::Workspace;
    use webtex_core::storage::NativeStorage;

    #[test]
    fn test_mirror_copies_tree() {
        let src = TempDir::new().unwrap();
        std::fs::create_dir(src.path().join("figs")).unwrap();
        std::fs::write(src.path().join("figs/a.png"), [0u8, 1, 2, 255]).unwrap();
        std::fs::write(src.path().join("paper.tex"), "x").unwrap();
        let out = TempDir::new().unwrap();

        let ws = Workspace::new(NativeStorage::new(src.path()));
        block_on(ws.load()).unwrap();

        // No main.tex, so the default main document is missing
        assert!(!handle_mirror(&ws, out.path().to_path_buf(), None));
        assert!(handle_mirror(
            &ws,
            out.path().to_path_buf(),
            Some("paper.tex".to_string())
        ));
        assert_eq!(
            std::fs::read(out.path().join("figs/a.png")).unwrap(),
            vec![0u8, 1, 2, 255]
        );
    }
}
