//! Configuration management
//!
//! This module handles loading and managing configuration from:
//! - Command-line arguments
//! - Environment variables
//! - Configuration files (TOML)
//! - Defaults

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Default settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Base URI prepended to generated link hrefs
    #[serde(default = "default_base_uri")]
    pub base_uri: String,
}

/// Model file locations
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelsConfig {
    /// Directory scanned for `*.toml` model files
    pub directory: Option<PathBuf>,

    /// Explicit model files, loaded before the directory scan
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path
    pub file: Option<PathBuf>,
}

// Default value functions

fn default_base_uri() -> String {
    "http://localhost:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file {:?}: {}", path, e)))?;

        Ok(config)
    }

    /// Load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./hyperstate.toml
    /// 2. ~/.hyperstate/config.toml
    /// 3. /etc/hyperstate/config.toml
    pub fn load() -> Result<Self> {
        let paths = vec![
            PathBuf::from("hyperstate.toml"),
            dirs::home_dir()
                .map(|h| h.join(".hyperstate").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from("/dev/null")),
            PathBuf::from("/etc/hyperstate/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                tracing::info!("Loading config from {:?}", path);
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Get the model directory from config or environment
    pub fn models_directory(&self) -> PathBuf {
        if let Some(dir) = &self.models.directory {
            return dir.clone();
        }

        std::env::var("HYPERSTATE_MODELS")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"))
    }

    /// Collect every model file: explicit entries first, then the
    /// directory scan in name order
    pub fn model_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = self.models.files.clone();

        let dir = self.models_directory();
        if dir.is_dir() {
            let mut scanned = Vec::new();
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == "toml") {
                    scanned.push(path);
                }
            }
            scanned.sort();
            files.extend(scanned);
        } else if self.models.directory.is_some() {
            return Err(Error::Config(format!(
                "Model directory {:?} does not exist",
                dir
            )));
        }

        Ok(files)
    }
}
