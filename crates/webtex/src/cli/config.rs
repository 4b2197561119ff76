//! Config command handlers

use webtex_core::config::WorkspaceConfig;

use crate::cli::args::ConfigCommands;
use crate::cli::{CliWorkspace, block_on, normalize_path};

pub fn handle_config_command(ws: &CliWorkspace, command: Option<ConfigCommands>) -> bool {
    match command.unwrap_or(ConfigCommands::Show) {
        ConfigCommands::Show => show(&ws.config()),

        ConfigCommands::SetMain { path } => {
            if let Err(e) = ws.set_main_file(normalize_path(&path)) {
                eprintln!("✗ {}", e);
                return false;
            }
            if ws.resolve(ws.main_file()).is_err() {
                eprintln!("⚠ {} does not exist yet", ws.main_file());
            }
            save(ws)
        }

        ConfigCommands::SkipHidden { value } => {
            let mut config = ws.config();
            config.skip_hidden = value;
            match config.save_to_sync(ws.storage()) {
                Ok(()) => {
                    println!("✓ skip_hidden = {}", value);
                    true
                }
                Err(e) => {
                    eprintln!("✗ Could not write config: {}", e);
                    false
                }
            }
        }
    }
}

fn show(config: &WorkspaceConfig) -> bool {
    match config.to_toml_string() {
        Ok(toml) => {
            print!("{}", toml);
            true
        }
        Err(e) => {
            eprintln!("✗ {}", e);
            false
        }
    }
}

fn save(ws: &CliWorkspace) -> bool {
    match block_on(ws.save_config()) {
        Ok(()) => {
            println!("✓ main_file = {}", ws.main_file());
            true
        }
        Err(e) => {
            eprintln!("✗ Could not write config: {}", e);
            false
        }
    }
}
