//! The `webtex` command line.
//!
//! Every command opens the workspace directory through [`NativeStorage`],
//! so it goes through exactly the same tree, mutation and mirror code as
//! the browser build.

/// Clap argument definitions
mod args;

/// Config command handlers
mod config;

/// `new`, `mkdir`, `rm`, `mv`, `cat` commands
mod entry;

/// `mirror` command
mod mirror;

/// `tree` command
mod tree;

use clap::Parser;
use std::path::PathBuf;

use webtex_core::config::WorkspaceConfig;
use webtex_core::storage::NativeStorage;
use webtex_core::workspace::{LoadState, Workspace};

pub use args::Cli;
use args::Commands;

/// Workspace over a directory on disk.
pub type CliWorkspace = Workspace<NativeStorage>;

/// Helper to run async operations in sync context
fn block_on<F: std::future::Future>(f: F) -> F::Output {
    futures_lite::future::block_on(f)
}

/// Accept `/`, `./x` and `x/` for user-typed paths.
fn normalize_path(raw: &str) -> &str {
    let trimmed = raw.trim_start_matches("./");
    let trimmed = trimmed.trim_matches('/');
    if trimmed == "." { "" } else { trimmed }
}

/// Main entry point for the CLI
pub fn run_cli() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let root = cli
        .root
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let success = match cli.command {
        Commands::Init { main } => handle_init(root, main),
        Commands::Tree { json } => with_workspace(root, |ws| tree::handle_tree(ws, json)),
        Commands::New { path } => with_workspace(root, |ws| entry::handle_new(ws, &path)),
        Commands::Mkdir { path } => with_workspace(root, |ws| entry::handle_mkdir(ws, &path)),
        Commands::Rm { path } => with_workspace(root, |ws| entry::handle_rm(ws, &path)),
        Commands::Mv { source, target } => {
            with_workspace(root, |ws| entry::handle_mv(ws, &source, &target))
        }
        Commands::Cat { path } => with_workspace(root, |ws| entry::handle_cat(ws, &path)),
        Commands::Mirror { out, main } => {
            with_workspace(root, |ws| mirror::handle_mirror(ws, out, main))
        }
        Commands::Config { command } => {
            with_workspace(root, |ws| config::handle_config_command(ws, command))
        }
    };

    if !success {
        std::process::exit(1);
    }
}

fn with_workspace(root: PathBuf, run: impl FnOnce(&CliWorkspace) -> bool) -> bool {
    open_workspace(root).is_some_and(|ws| run(&ws))
}

/// Open the workspace at `root`, printing why when it can't be used.
fn open_workspace(root: PathBuf) -> Option<CliWorkspace> {
    let storage = NativeStorage::new(&root);
    let ws = match block_on(Workspace::open(storage)) {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("✗ Could not open workspace at {}: {}", root.display(), e);
            return None;
        }
    };

    if let LoadState::Failed(message) = ws.state() {
        eprintln!("✗ Could not read workspace at {}: {}", root.display(), message);
        return None;
    }
    Some(ws)
}

/// Handle the init command
/// Returns true on success, false on error
fn handle_init(root: PathBuf, main: Option<String>) -> bool {
    let storage = match NativeStorage::create(&root) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("✗ Could not create {}: {}", root.display(), e);
            return false;
        }
    };

    let mut config = match WorkspaceConfig::load_from_sync(&storage) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("✗ {}", e);
            return false;
        }
    };
    if let Some(main) = main {
        match normalize_path(&main).parse() {
            Ok(path) => config.main_file = path,
            Err(e) => {
                eprintln!("✗ {}", e);
                return false;
            }
        }
    }
    if let Err(e) = config.save_to_sync(&storage) {
        eprintln!("✗ Could not write config: {}", e);
        return false;
    }

    let ws = Workspace::with_config(storage, config);
    let main_file = ws.main_file();
    let created = block_on(async {
        ws.load().await?;
        let existing = ws.resolve(&main_file).is_ok();
        ws.create_file(&main_file).await?;
        if !existing {
            ws.save_file(
                &main_file,
                "\\documentclass{article}\n\\begin{document}\n\n\\end{document}\n",
            )
            .await?;
        }
        Ok::<bool, webtex_core::WorkspaceError>(!existing)
    });

    match created {
        Ok(created) => {
            println!("✓ Initialized workspace at {}", root.display());
            if created {
                println!("  Created {}", main_file);
            }
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}
