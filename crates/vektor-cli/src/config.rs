//! Configuration for the vektor CLI
//!
//! Loaded from `vektor.yaml` when present, then overridden by environment
//! variables (`VEKTOR_*`, `RUST_LOG`, `LOG_*`). A `.env` file is read into
//! the environment before any of this happens.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnvVar { var: String, value: String },
}

/// How decoded queries and schemas are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The wire message as JSON
    Json,
    /// The rebuilt expression tree
    #[default]
    Debug,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(OutputFormat::Json),
            "debug" => Ok(OutputFormat::Debug),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Catalog used by `describe` and `scan` when none is given
    pub catalog: String,

    pub output: OutputFormat,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            catalog: "catalog.yaml".to_string(),
            output: OutputFormat::Debug,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: "compact".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub codec: CodecConfig,
}

impl Config {
    /// Load `path` if it exists, otherwise start from defaults; then apply
    /// environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Config::from_yaml(&std::fs::read_to_string(path)?)?
        } else {
            Config::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(catalog) = std::env::var("VEKTOR_CATALOG") {
            self.codec.catalog = catalog;
        }
        if let Ok(output) = std::env::var("VEKTOR_OUTPUT") {
            self.codec.output = output.parse().map_err(|value| ConfigError::InvalidEnvVar {
                var: "VEKTOR_OUTPUT".to_string(),
                value,
            })?;
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Ok(output) = std::env::var("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Ok(dir) = std::env::var("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }
}
