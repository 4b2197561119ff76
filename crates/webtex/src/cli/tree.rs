//! `tree` command handler

use webtex_core::tree::format_tree;

use crate::cli::CliWorkspace;

/// Print the workspace tree, as ASCII art or JSON.
pub fn handle_tree(ws: &CliWorkspace, json: bool) -> bool {
    let tree = match ws.tree() {
        Ok(tree) => tree,
        Err(e) => {
            eprintln!("✗ {}", e);
            return false;
        }
    };

    let view = tree.to_view();
    if json {
        match serde_json::to_string_pretty(&view) {
            Ok(output) => println!("{}", output),
            Err(e) => {
                eprintln!("✗ Could not serialize tree: {}", e);
                return false;
            }
        }
    } else {
        print!("{}", format_tree(&view));
        println!(
            "\n{} folders, {} files",
            tree.folder_count(),
            tree.file_count()
        );
    }
    true
}
