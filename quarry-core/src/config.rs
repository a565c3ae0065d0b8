//! Configuration management for Quarry
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Programmatic/CLI overrides
//! 2. Environment variables (QUARRY_*)
//! 3. Config file (~/.config/quarry/config.toml)
//! 4. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::workspace::TransferOptions;
use crate::{Error, Result};

/// Workspace-related configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Directory holding cached clones and pointer records
    ///
    /// Defaults to `~/.cache/quarry/repos` when unset.
    pub root: Option<PathBuf>,

    /// Default timeout for clone/fetch transfers, in seconds
    ///
    /// Unset means transfers run without a deadline.
    pub fetch_timeout_secs: Option<u64>,
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Workspace configuration
    pub workspace: WorkspaceConfig,
}

impl Config {
    /// Load configuration from the default config file location
    ///
    /// Returns default config if the file doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();

        if let Some(path) = config_path {
            if path.exists() {
                return Self::load_from_file(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| Error::Internal(format!("failed to parse config: {}", e)))
    }

    /// Get the default config file path
    ///
    /// Returns `~/.config/quarry/config.toml` on Unix
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("quarry").join("config.toml"))
    }

    /// Apply environment variable overrides
    ///
    /// Supported variables:
    /// - QUARRY_WORKSPACE_ROOT: workspace root directory
    /// - QUARRY_FETCH_TIMEOUT_SECS: transfer timeout in seconds
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(root) = std::env::var("QUARRY_WORKSPACE_ROOT") {
            self.workspace.root = Some(PathBuf::from(root));
        }

        if let Ok(timeout) = std::env::var("QUARRY_FETCH_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.workspace.fetch_timeout_secs = Some(secs);
            }
        }

        self
    }

    /// Apply CLI flag overrides
    pub fn with_cli_overrides(
        mut self,
        root: Option<PathBuf>,
        fetch_timeout_secs: Option<u64>,
    ) -> Self {
        if let Some(root) = root {
            self.workspace.root = Some(root);
        }

        if let Some(secs) = fetch_timeout_secs {
            self.workspace.fetch_timeout_secs = Some(secs);
        }

        self
    }

    /// Load configuration with all overrides applied
    ///
    /// Priority: CLI > env > config file > defaults
    pub fn load_with_overrides(
        root: Option<PathBuf>,
        fetch_timeout_secs: Option<u64>,
    ) -> Result<Self> {
        Ok(Self::load()?
            .with_env_overrides()
            .with_cli_overrides(root, fetch_timeout_secs))
    }

    /// The effective workspace root
    pub fn workspace_root(&self) -> Result<PathBuf> {
        if let Some(root) = &self.workspace.root {
            return Ok(root.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| Error::Internal("could not determine cache directory".to_string()))?;
        Ok(cache_dir.join("quarry").join("repos"))
    }

    /// Transfer options derived from the configured timeout
    pub fn transfer_options(&self) -> TransferOptions {
        match self.workspace.fetch_timeout_secs {
            Some(secs) => TransferOptions::with_timeout(Duration::from_secs(secs)),
            None => TransferOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.workspace.root.is_none());
        assert!(config.workspace.fetch_timeout_secs.is_none());
        assert!(config.transfer_options().timeout.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[workspace]\nroot = \"/srv/quarry\"\nfetch_timeout_secs = 30\n",
        )
        .unwrap();

        let config = Config::load_from_file(&path).unwrap();
        assert_eq!(config.workspace.root, Some(PathBuf::from("/srv/quarry")));
        assert_eq!(config.workspace.fetch_timeout_secs, Some(30));
        assert_eq!(
            config.transfer_options().timeout,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let config = Config::default()
            .with_cli_overrides(Some(PathBuf::from("/override")), Some(5));
        assert_eq!(config.workspace.root, Some(PathBuf::from("/override")));
        assert_eq!(config.workspace.fetch_timeout_secs, Some(5));
    }

    #[test]
    fn test_default_config_path() {
        if let Some(path) = Config::default_config_path() {
            let path = path.to_string_lossy();
            assert!(path.contains("quarry"));
            assert!(path.ends_with("config.toml"));
        }
    }
}
