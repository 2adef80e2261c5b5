//! Configuration management for taskslot
//!
//! This module handles loading, parsing, and managing configuration from:
//! 1. Embedded default_config.toml (compile-time defaults)
//! 2. User config at ~/.config/taskslot/config.toml (or platform-specific location)
//! 3. Project-local config at ./.taskslot/config.toml

use crate::domain::task::SchedulerConfig;
use crate::error::ConfigError;
use crate::logging::{self, LogFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration embedded in binary
const DEFAULT_CONFIG: &str = include_str!("../../default_config.toml");

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub timestamps: bool,
    #[serde(default)]
    pub file_line: bool,
    #[serde(default)]
    pub file_output: bool,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            timestamps: true,
            file_line: false,
            file_output: false,
            file_path: None,
        }
    }
}

impl LoggingConfig {
    /// Resolve into the settings `logging::init_logging` takes
    pub fn to_logging_config(&self) -> logging::LoggingConfig {
        logging::LoggingConfig {
            level: logging::parse_level(&self.level),
            format: LogFormat::from(self.format.as_str()),
            timestamps: self.timestamps,
            file_line: self.file_line,
            file_output: self.file_output,
            file_path: self.file_path.clone(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration with fallback chain:
    /// 1. Project-local .taskslot/config.toml
    /// 2. User config ~/.config/taskslot/config.toml
    /// 3. Embedded default_config.toml
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::parse(DEFAULT_CONFIG).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse default config: {}", e))
        })?;

        for path in [Self::user_config_path(), Self::project_config_path()]
            .into_iter()
            .flatten()
        {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(overlay) => {
                    config = overlay;
                    tracing::info!("Loaded config from {:?}", path);
                }
                Err(e) => {
                    tracing::warn!("Failed to load config {:?}: {}", path, e);
                }
            }
        }

        config.scheduler.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config = Self::parse(&contents).map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.scheduler.validate()?;
        Ok(config)
    }

    fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Get the user config path (~/.config/taskslot/config.toml)
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|config_dir| config_dir.join("taskslot").join("config.toml"))
    }

    /// Get the project-local config path (./.taskslot/config.toml)
    pub fn project_config_path() -> Option<PathBuf> {
        std::env::current_dir()
            .ok()
            .map(|cwd| cwd.join(".taskslot").join("config.toml"))
    }

    /// Write configuration as TOML
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let toml_string =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, toml_string).map_err(|e| ConfigError::IoError(e.to_string()))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::parse(DEFAULT_CONFIG).unwrap_or_else(|_| Self {
            scheduler: SchedulerConfig::default(),
            logging: LoggingConfig::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::{OverflowStrategy, RetryPriority};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_embedded_default_matches_code_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[scheduler]
max_concurrent = 2
overflow_strategy = "drop-oldest"
max_queue_size = 10
retry_priority = "original"
"#,
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.scheduler.max_concurrent, 2);
        assert_eq!(config.scheduler.overflow_strategy, OverflowStrategy::DropOldest);
        assert_eq!(config.scheduler.max_queue_size, Some(10));
        assert_eq!(config.scheduler.retry_priority, RetryPriority::Original);
        assert_eq!(config.scheduler.default_retries, 3);
        assert!(config.scheduler.auto_start);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler]\nmax_concurrent = 0\n").unwrap();

        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = AppConfig::load_from_file(&dir.path().join("nope.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.scheduler.max_queue_size = Some(3);

        config.save_to(&path).unwrap();
        assert_eq!(AppConfig::load_from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_logging_section_resolves() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: "json".to_string(),
            ..Default::default()
        };
        let resolved = config.to_logging_config();
        assert_eq!(resolved.level, tracing::Level::DEBUG);
        assert_eq!(resolved.format, LogFormat::Json);
    }
}
