//! Configuration loader with inheritance support.
//!
//! Loads configuration from multiple sources and merges them:
//! 1. Global config: `~/.kvgraph/config.toml`
//! 2. Local config: `.kvgraph/config.toml` (in workspace), or an explicit file
//! 3. CLI overrides
//!
//! Later sources override earlier ones. Files are merged as TOML tables before
//! deserialization, so a partial file only replaces the keys it sets.

use crate::error::ConfigError;
use crate::{ConfigOverrides, KvGraphConfig};
use std::path::{Path, PathBuf};
use toml::Table;
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Global configuration directory name.
const GLOBAL_CONFIG_DIR: &str = ".kvgraph";

/// Local configuration directory name.
const LOCAL_CONFIG_DIR: &str = ".kvgraph";

/// Configuration loader with caching and inheritance support.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Global config directory (e.g., `~/.kvgraph`)
    global_config_dir: Option<PathBuf>,

    /// File used instead of the workspace-local config
    config_file: Option<PathBuf>,

    /// Cached global config table
    global_config: Option<Table>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader.
    ///
    /// Automatically detects the global config directory (`~/.kvgraph`).
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(GLOBAL_CONFIG_DIR)),
            config_file: None,
            global_config: None,
        }
    }

    /// Create a loader with a custom global config directory.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
            config_file: None,
            global_config: None,
        }
    }

    /// Read `path` in place of the workspace-local config file.
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file = Some(path.into());
        self
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        match &self.config_file {
            Some(path) => path.clone(),
            None => workspace_root.join(LOCAL_CONFIG_DIR).join(CONFIG_FILE_NAME),
        }
    }

    /// Load configuration for a workspace with optional CLI overrides.
    ///
    /// Merges config in order: global → local → overrides, then validates.
    pub fn load(
        &mut self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<KvGraphConfig, ConfigError> {
        let mut merged = Table::new();
        let mut source = PathBuf::from("<defaults>");

        if let Some(global) = self.load_global()? {
            merge_tables(&mut merged, global);
            source = self.global_config_path().unwrap_or(source);
        }

        if let Some(local) = self.load_local(workspace_root)? {
            merge_tables(&mut merged, local);
            source = self.local_config_path(workspace_root);
        }

        let mut config: KvGraphConfig = toml::Value::Table(merged)
            .try_into()
            .map_err(|e| ConfigError::parse_toml(&source, e))?;

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load only the global configuration table.
    pub fn load_global(&mut self) -> Result<Option<Table>, ConfigError> {
        if let Some(ref table) = self.global_config {
            return Ok(Some(table.clone()));
        }

        let Some(global_path) = self.global_config_path() else {
            debug!("No home directory found, skipping global config");
            return Ok(None);
        };

        if !global_path.exists() {
            trace!("Global config not found at {:?}", global_path);
            return Ok(None);
        }

        debug!("Loading global config from {:?}", global_path);
        let table = read_table(&global_path)?;
        self.global_config = Some(table.clone());
        Ok(Some(table))
    }

    /// Load only the local configuration table for a workspace.
    ///
    /// An explicit config file must exist; the workspace file is optional.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<Table>, ConfigError> {
        let local_path = self.local_config_path(workspace_root);

        if self.config_file.is_none() && !local_path.exists() {
            trace!("Local config not found at {:?}", local_path);
            return Ok(None);
        }

        debug!("Loading local config from {:?}", local_path);
        read_table(&local_path).map(Some)
    }

    /// Save configuration to the local config file for a workspace.
    pub fn save_local(
        &self,
        workspace_root: &Path,
        config: &KvGraphConfig,
    ) -> Result<(), ConfigError> {
        save_config_file(&self.local_config_path(workspace_root), config)
    }

    /// Create `~/.kvgraph/config.toml` with the default configuration.
    ///
    /// An existing file is left untouched.
    pub fn init_global(&self) -> Result<PathBuf, ConfigError> {
        let Some(ref global_dir) = self.global_config_dir else {
            return Err(ConfigError::NoHomeDir);
        };
        init_file(&global_dir.join(CONFIG_FILE_NAME))
    }

    /// Create `.kvgraph/config.toml` in a workspace with the default configuration.
    ///
    /// An existing file is left untouched.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        init_file(&self.local_config_path(workspace_root))
    }

    /// Clear cached global configuration.
    pub fn clear_cache(&mut self) {
        self.global_config = None;
    }
}

fn read_table(path: &Path) -> Result<Table, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    content
        .parse::<Table>()
        .map_err(|e| ConfigError::parse_toml(path, e))
}

fn init_file(path: &Path) -> Result<PathBuf, ConfigError> {
    if !path.exists() {
        save_config_file(path, &KvGraphConfig::default())?;
    }
    Ok(path.to_path_buf())
}

fn save_config_file(path: &Path, config: &KvGraphConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// Merge `overlay` into `base`; nested tables merge key by key.
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
