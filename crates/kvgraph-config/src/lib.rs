//! kvgraph Configuration Management
//!
//! Provides configuration loading with support for:
//! - Global config: `~/.kvgraph/config.toml`
//! - Local config: `.kvgraph/config.toml` (in workspace)
//! - CLI overrides via `ConfigOverrides`
//!
//! Configuration is merged in order: global → local → CLI overrides.

mod error;
mod loader;

pub use error::ConfigError;
pub use loader::ConfigLoader;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest page size a configuration may allow.
pub const PAGE_SIZE_CEILING: usize = 1000;

/// Root configuration for kvgraph.
///
/// Represents the fully merged configuration from all sources.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct KvGraphConfig {
    /// Record store configuration
    pub storage: StorageConfig,

    /// Connection page sizes
    pub pagination: PaginationConfig,

    /// Relationship defaults
    pub relationships: RelationshipConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Record store configuration.
///
/// # Example TOML
///
/// ```toml
/// [storage]
/// backend = "sqlite"
/// data_dir = ".kvgraph"
/// database_file = "kvgraph.db"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Which record store answers queries
    pub backend: StoreBackend,

    /// Directory for kvgraph data (default: `.kvgraph`)
    pub data_dir: PathBuf,

    /// SQLite database file name inside `data_dir`
    pub database_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: PathBuf::from(".kvgraph"),
            database_file: "kvgraph.db".to_string(),
        }
    }
}

/// Record store selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// SQLite file in the data directory (default)
    #[default]
    Sqlite,
    /// Process-local store, seeded on every run
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(ConfigError::invalid_value(
                "storage.backend",
                format!("unknown backend '{}'. Valid values: sqlite, memory", s),
            )),
        }
    }
}

/// Connection page sizes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PaginationConfig {
    /// Page size when `first` is not given
    pub default_page_size: usize,

    /// Largest page a client may request
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 || self.max_page_size > PAGE_SIZE_CEILING {
            return Err(ConfigError::invalid_value(
                "pagination.max_page_size",
                format!("must be between 1 and {}", PAGE_SIZE_CEILING),
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::invalid_value(
                "pagination.default_page_size",
                format!("must be between 1 and {}", self.max_page_size),
            ));
        }
        Ok(())
    }
}

/// Relationship defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RelationshipConfig {
    /// Defer related-record fetches until a non-key field is read
    pub lazy: bool,
}

impl Default for RelationshipConfig {
    fn default() -> Self {
        Self { lazy: true }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: LogFormat,

    /// Log file path (optional)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON structured logging
    Json,
}

/// CLI overrides for configuration values.
///
/// Used to apply command-line arguments over file-based config.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override the data directory
    pub data_dir: Option<PathBuf>,

    /// Override the store backend
    pub backend: Option<StoreBackend>,

    /// Override the default page size
    pub default_page_size: Option<usize>,

    /// Override relationship laziness
    pub lazy: Option<bool>,

    /// Override log level
    pub log_level: Option<String>,
}

impl KvGraphConfig {
    /// Apply CLI overrides to this configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref dir) = overrides.data_dir {
            self.storage.data_dir = dir.clone();
        }

        if let Some(backend) = overrides.backend {
            self.storage.backend = backend;
        }

        if let Some(size) = overrides.default_page_size {
            self.pagination.default_page_size = size;
        }

        if let Some(lazy) = overrides.lazy {
            self.relationships.lazy = lazy;
        }

        if let Some(ref level) = overrides.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pagination.validate()?;
        if self.storage.database_file.is_empty() {
            return Err(ConfigError::invalid_value(
                "storage.database_file",
                "must not be empty",
            ));
        }
        Ok(())
    }

    /// Get the effective data directory for a workspace.
    pub fn data_dir(&self, workspace_root: &Path) -> PathBuf {
        if self.storage.data_dir.is_absolute() {
            self.storage.data_dir.clone()
        } else {
            workspace_root.join(&self.storage.data_dir)
        }
    }

    /// Get the SQLite database path for a workspace.
    pub fn database_path(&self, workspace_root: &Path) -> PathBuf {
        self.data_dir(workspace_root)
            .join(&self.storage.database_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = KvGraphConfig::default();
        assert_eq!(config.storage.backend, StoreBackend::Sqlite);
        assert_eq!(config.storage.data_dir, PathBuf::from(".kvgraph"));
        assert_eq!(config.pagination.default_page_size, 20);
        assert_eq!(config.pagination.max_page_size, 100);
        assert!(config.relationships.lazy);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = KvGraphConfig::default();
        let overrides = ConfigOverrides {
            data_dir: Some(PathBuf::from("/custom/data")),
            backend: Some(StoreBackend::Memory),
            lazy: Some(false),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        config.apply_overrides(&overrides);

        assert_eq!(config.storage.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.storage.backend, StoreBackend::Memory);
        assert!(!config.relationships.lazy);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_database_path() {
        let config = KvGraphConfig::default();
        let workspace = PathBuf::from("/home/user/project");

        assert_eq!(
            config.database_path(&workspace),
            PathBuf::from("/home/user/project/.kvgraph/kvgraph.db")
        );
    }

    #[test]
    fn test_absolute_data_dir() {
        let mut config = KvGraphConfig::default();
        config.storage.data_dir = PathBuf::from("/var/lib/kvgraph");

        assert_eq!(
            config.data_dir(Path::new("/project")),
            PathBuf::from("/var/lib/kvgraph")
        );
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("sqlite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("dynamo".parse::<StoreBackend>().is_err());
        assert_eq!(StoreBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_validate_page_sizes() {
        let mut config = KvGraphConfig::default();
        config.pagination.default_page_size = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pagination.default_page_size"));

        config.pagination.default_page_size = 200;
        assert!(config.validate().is_err());

        config.pagination.max_page_size = PAGE_SIZE_CEILING + 1;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("pagination.max_page_size"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = KvGraphConfig::default();
        config.storage.backend = StoreBackend::Memory;
        config.logging.format = LogFormat::Json;

        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("backend = \"memory\""));
        let parsed: KvGraphConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
