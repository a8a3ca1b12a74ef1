//! Configuration for the `regimen` command line.
//!
//! Layering, highest priority first:
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attributes)
//! 3. TOML config file (`~/.config/regimen/config.toml`)
//! 4. Compiled defaults
//!
//! A missing default config file is not an error. An explicit path that
//! doesn't exist is.

use std::path::{Path, PathBuf};

use crate::storage::default_data_dir;

/// Default `refill_at` percentage for new tasks.
pub const DEFAULT_REFILL_AT: u32 = 20;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),

    #[error("could not determine config directory (no HOME or XDG_CONFIG_HOME)")]
    NoConfigDir,
}

/// Config file contents; every field optional so files can be partial.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    data_dir: Option<PathBuf>,
    log_level: Option<String>,
    notifications: Option<bool>,
    default_refill_at: Option<u32>,
}

/// Fully resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Directory holding the JSON collections.
    pub data_dir: PathBuf,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Whether the local notification center grants permission.
    pub notifications: bool,
    /// `refill_at` for tasks added without one.
    pub default_refill_at: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: "warn".into(),
            notifications: true,
            default_refill_at: DEFAULT_REFILL_AT,
        }
    }
}

/// Values given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Default config file location.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let mut p = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    p.push("regimen");
    p.push("config.toml");
    Ok(p)
}

impl Config {
    /// Resolves the configuration from overrides, file and defaults.
    pub fn load(overrides: &Overrides) -> Result<Self, ConfigError> {
        let file = match &overrides.config_path {
            Some(path) => read_file(path)?,
            None => match default_config_path() {
                Ok(path) if path.exists() => read_file(&path)?,
                _ => ConfigFile::default(),
            },
        };
        Ok(Self::resolve(file, overrides))
    }

    /// Parses TOML text and applies overrides on top.
    pub fn from_toml(text: &str, overrides: &Overrides) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        Ok(Self::resolve(file, overrides))
    }

    fn resolve(file: ConfigFile, overrides: &Overrides) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: overrides
                .data_dir
                .clone()
                .or(file.data_dir)
                .unwrap_or(defaults.data_dir),
            log_level: overrides
                .log_level
                .clone()
                .or(file.log_level)
                .unwrap_or(defaults.log_level),
            notifications: file.notifications.unwrap_or(defaults.notifications),
            default_refill_at: file
                .default_refill_at
                .unwrap_or(defaults.default_refill_at)
                .min(100),
        }
    }
}

fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&text)?)
}
