//! `webtex` - manage a WebTeX workspace directory from the command line.

/// CLI module - command-line interface for webtex
mod cli;

fn main() {
    cli::run_cli();
}
