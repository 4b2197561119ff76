//! Configuration for a WebTeX workspace.
//!
//! The config lives inside the workspace itself as `.webtex.toml` at the
//! storage root, and is always left out of the file tree. Which storage
//! directory holds the workspace is up to the host (see `OpfsStorage::open`
//! in the browser bindings), since it has to be known before this file can
//! be read.
//!
//! # Example
//!
//! ```ignore
//! use webtex_core::config::WorkspaceConfig;
//!
//! let config = WorkspaceConfig::load_from(&storage).await?;
//! assert_eq!(config.main_file.as_str(), "main.tex");
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkspaceError};
use crate::path_key::PathKey;
use crate::storage::{StorageAdapter, StorageEntry};
use crate::tree::LoadOptions;

/// Name of the config file at the storage root.
pub const CONFIG_FILE: &str = ".webtex.toml";

/// User-editable workspace settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// The document handed to the engine as its entry point.
    pub main_file: PathKey,

    /// Leave every dot-file and dot-folder out of the tree. Off by default;
    /// the config file itself is hidden either way.
    pub skip_hidden: bool,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            main_file: PathKey::parse("main.tex").unwrap_or_default(),
            skip_hidden: false,
        }
    }
}

impl WorkspaceConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize as pretty TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Tree loading options derived from this config.
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            skip_hidden: self.skip_hidden,
        }
    }

    // ========================================================================
    // StorageAdapter-based methods (work on all platforms including WASM)
    // ========================================================================

    /// Load the config from the storage root, or defaults when there is none.
    pub async fn load_from<S: StorageAdapter>(storage: &S) -> Result<Self> {
        let config_path = PathKey::parse(CONFIG_FILE)?;
        let root = storage
            .open_root()
            .await
            .map_err(WorkspaceError::StorageUnavailable)?;
        let entries = storage
            .list_entries(&root)
            .await
            .map_err(|e| WorkspaceError::from_io(&PathKey::root(), "folder", e))?;

        let handle = entries.into_iter().find_map(|entry| match entry {
            StorageEntry::File { name, handle } if name == CONFIG_FILE => Some(handle),
            _ => None,
        });
        let Some(handle) = handle else {
            log::debug!("No {} in workspace, using defaults", CONFIG_FILE);
            return Ok(Self::default());
        };

        let contents = storage
            .read_text(&handle)
            .await
            .map_err(|e| WorkspaceError::from_io(&config_path, "file", e))?;
        Self::from_toml_str(&contents)
    }

    /// Write the config to the storage root.
    pub async fn save_to<S: StorageAdapter>(&self, storage: &S) -> Result<()> {
        let config_path = PathKey::parse(CONFIG_FILE)?;
        let contents = self.to_toml_string()?;
        let root = storage
            .open_root()
            .await
            .map_err(WorkspaceError::StorageUnavailable)?;
        let file = storage
            .get_or_create_file(&root, CONFIG_FILE)
            .await
            .map_err(|e| WorkspaceError::from_io(&config_path, "file", e))?;
        storage
            .write_bytes(&file, contents.as_bytes())
            .await
            .map_err(|e| WorkspaceError::from_io(&config_path, "file", e))?;
        Ok(())
    }

    // ========================================================================
    // Sync wrappers. On WASM, storage access is expected to be async.
    // ========================================================================

    /// Sync wrapper for [`WorkspaceConfig::load_from`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from_sync<S: StorageAdapter>(storage: &S) -> Result<Self> {
        futures_lite::future::block_on(Self::load_from(storage))
    }

    /// Sync wrapper for [`WorkspaceConfig::save_to`].
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to_sync<S: StorageAdapter>(&self, storage: &S) -> Result<()> {
        futures_lite::future::block_on(self.save_to(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStorage;
    use crate::test_utils::block_on_test;

    #[test]
    fn test_defaults() {
        let config = WorkspaceConfig::default();
        assert_eq!(config.main_file.as_str(), "main.tex");
        assert!(!config.skip_hidden);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = WorkspaceConfig::from_toml_str("main_file = \"thesis/root.tex\"\n").unwrap();
        assert_eq!(config.main_file.as_str(), "thesis/root.tex");
        assert!(!config.skip_hidden);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let config =
            WorkspaceConfig::from_toml_str("root_dir = \"old\"\nskip_hidden = true\n").unwrap();
        assert!(config.skip_hidden);
        assert!(!config.to_toml_string().unwrap().contains("root_dir"));
    }

    #[test]
    fn test_invalid_main_file_rejected() {
        let err = WorkspaceConfig::from_toml_str("main_file = \"/abs.tex\"\n").unwrap_err();
        assert!(matches!(err, WorkspaceError::ConfigParse(_)));
    }

    #[test]
    fn test_missing_config_gives_defaults() {
        let storage = InMemoryStorage::new().with_file("main.tex", "");
        let config = block_on_test(WorkspaceConfig::load_from(&storage)).unwrap();
        assert_eq!(config, WorkspaceConfig::default());
    }

    #[test]
    fn test_save_then_load() {
        let storage = InMemoryStorage::new();
        let config = WorkspaceConfig {
            main_file: PathKey::parse("paper.tex").unwrap(),
            skip_hidden: true,
        };
        block_on_test(config.save_to(&storage)).unwrap();
        assert!(storage.exists(CONFIG_FILE));

        let loaded = block_on_test(WorkspaceConfig::load_from(&storage)).unwrap();
        assert_eq!(loaded, config);
    }
}
