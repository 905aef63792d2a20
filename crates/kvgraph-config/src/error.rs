//! Errors from loading and saving kvgraph settings.
//!
//! Every file-system failure names the file it was about, so a bad layer in
//! the global/local merge can be traced to its source.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read settings from {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A settings layer is not valid TOML, or does not fit [`crate::KvGraphConfig`]
    #[error("{path} is not a valid kvgraph settings file: {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot render settings as TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("cannot write settings to {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot create settings directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Global settings live under the home directory
    #[error("no home directory for global settings; use --config to name a file")]
    NoHomeDir,

    /// A setting failed validation; `key` is its dotted TOML path
    #[error("{key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl ConfigError {
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadFile {
            path: path.into(),
            source,
        }
    }

    pub fn parse_toml(path: impl Into<PathBuf>, source: toml::de::Error) -> Self {
        Self::ParseToml {
            path: path.into(),
            source,
        }
    }

    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteFile {
            path: path.into(),
            source,
        }
    }

    pub fn create_dir(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    /// Reject the setting at dotted path `key`
    pub fn invalid_value(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_names_the_setting() {
        let err = ConfigError::invalid_value("storage.backend", "unknown backend 'dynamo'");
        assert_eq!(err.to_string(), "storage.backend: unknown backend 'dynamo'");
    }

    #[test]
    fn test_no_home_dir_suggests_config_flag() {
        assert!(ConfigError::NoHomeDir.to_string().contains("--config"));
    }

    #[test]
    fn test_io_errors_carry_path() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = ConfigError::read_file("/tmp/kvgraph/config.toml", io);
        assert!(err.to_string().contains("/tmp/kvgraph/config.toml"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
