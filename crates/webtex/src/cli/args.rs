//! Command-line argument structures and enums

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "webtex")]
#[command(version)]
#[command(about = "Manage the files of a WebTeX LaTeX workspace", long_about = None)]
pub struct Cli {
    /// Workspace directory (default: current directory)
    #[arg(short, long, global = true)]
    pub root: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the workspace directory, its config and the main document
    Init {
        /// Main document to create (default: main.tex)
        #[arg(short, long)]
        main: Option<String>,
    },

    /// Print the file tree
    #[command(alias = "ls")]
    Tree {
        /// Print the tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a file, with any missing folders
    #[command(alias = "touch")]
    New {
        /// Path of the file, relative to the workspace root
        path: String,
    },

    /// Create a folder
    Mkdir {
        /// Path of the folder, relative to the workspace root
        path: String,
    },

    /// Delete a file, or a folder and everything in it
    Rm {
        /// Path of the entry to delete
        path: String,
    },

    /// Move a file or folder into another folder
    Mv {
        /// Path of the entry to move
        source: String,

        /// Destination folder ("" or "/" for the workspace root)
        target: String,
    },

    /// Print a file's content
    Cat {
        /// Path of the file
        path: String,
    },

    /// Copy the workspace into a directory, as the engine would see it before a build
    Mirror {
        /// Output directory
        #[arg(short, long)]
        out: PathBuf,

        /// Main document (overrides the config)
        #[arg(short, long)]
        main: Option<String>,
    },

    /// Show or change the workspace config
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the config as TOML
    Show,

    /// Set the main document
    SetMain {
        /// Path of the main document
        path: String,
    },

    /// Show or hide dot-files in the tree
    SkipHidden {
        /// true to hide dot-files
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
}
