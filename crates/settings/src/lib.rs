//! Quorus Settings
//!
//! JSON config file management shared by the aggregator and operator
//! binaries. Each service defines its own config type and wraps it in
//! `Settings<T>` to persist it.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Read(String),
    #[error("failed to write settings: {0}")]
    Write(String),
    #[error("failed to parse settings: {0}")]
    Parse(String),
    #[error("failed to create directory: {0}")]
    CreateDir(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

/// Settings wrapper for any serializable config type.
///
/// ```ignore
/// let settings: Settings<AggregatorSettings> =
///     Settings::load_or_default("aggregator", None)?;
/// ```
pub struct Settings<T> {
    pub config: T,
    path: PathBuf,
}

impl<T: Serialize + DeserializeOwned + Default> Settings<T> {
    /// Load settings from the default path for a service, or create a
    /// default file there if none exists.
    pub fn load_or_default(service: &str, custom_path: Option<&Path>) -> Result<Self> {
        let path = match custom_path {
            Some(p) => p.to_path_buf(),
            None => default_settings_path(service),
        };

        if path.exists() {
            debug!("loading settings from {}", path.display());
            let content =
                fs::read_to_string(&path).map_err(|e| SettingsError::Read(e.to_string()))?;
            let config: T =
                serde_json::from_str(&content).map_err(|e| SettingsError::Parse(e.to_string()))?;
            Ok(Self { config, path })
        } else {
            debug!("writing default settings to {}", path.display());
            let settings = Self {
                config: T::default(),
                path,
            };
            settings.save()?;
            Ok(settings)
        }
    }

    /// Persist the current settings to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| SettingsError::CreateDir(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(&self.config)
            .map_err(|e| SettingsError::Write(e.to_string()))?;
        fs::write(&self.path, content).map_err(|e| SettingsError::Write(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Default settings file location for a service.
///
/// Resolution order: `$QUORUS_CONFIG_DIR/<service>/settings.json`, then
/// `$XDG_CONFIG_HOME/quorus/<service>/settings.json`, then
/// `$HOME/.config/quorus/<service>/settings.json`, then the current
/// directory.
pub fn default_settings_path(service: &str) -> PathBuf {
    config_dir_for(service).join("settings.json")
}

/// Default config directory for a service.
pub fn config_dir_for(service: &str) -> PathBuf {
    if let Some(dir) = std::env::var_os("QUORUS_CONFIG_DIR") {
        return PathBuf::from(dir).join(service);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("quorus").join(service);
    }
    if let Some(home) = std::env::var_os("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join("quorus")
            .join(service);
    }
    PathBuf::from(".").join("quorus").join(service)
}
