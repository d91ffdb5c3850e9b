//! Configuration resolution for the local dump store.
//!
//! The first source that yields a path wins:
//! 1. Explicit path supplied by the embedder
//! 2. Environment variable (AD_STORAGE_CONFIG)
//! 3. XDG config (~/.config/activity_dump/storage.json), if present
//! 4. Built-in defaults
//!
//! Field overrides (AD_MAX_DUMPS_COUNT, AD_OUTPUT_DIR, AD_COMPRESSION) are
//! applied on top of whichever source won, then the result is validated.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ConfigResolution, ConfigSource, LocalStorageConfig};
use crate::error::{Error, Result};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "AD_STORAGE_CONFIG";

/// File name looked up in the XDG config directory.
pub const CONFIG_FILE_NAME: &str = "storage.json";

/// Locations the resolver consults before the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigPaths {
    /// Explicit path to storage.json
    pub config_path: Option<PathBuf>,
    /// Directory searched instead of the XDG default
    pub config_dir: Option<PathBuf>,
}

/// Finds, loads and validates `storage.json`.
#[derive(Debug)]
pub struct ConfigResolver {
    paths: ConfigPaths,
}

impl ConfigResolver {
    pub fn new(paths: ConfigPaths) -> Self {
        ConfigResolver { paths }
    }

    /// Create a resolver with no explicit overrides.
    pub fn with_defaults() -> Self {
        ConfigResolver {
            paths: ConfigPaths::default(),
        }
    }

    /// Directory searched for `storage.json`.
    pub fn resolve_config_dir(&self) -> Option<PathBuf> {
        if let Some(ref dir) = self.paths.config_dir {
            return Some(dir.clone());
        }
        dirs::config_dir().map(|d| d.join("activity_dump"))
    }

    /// Resolve the storage.json path using the process environment.
    pub fn resolve_config_path(&self) -> (Option<PathBuf>, ConfigResolution) {
        self.resolve_config_path_with(|key| env::var(key).ok())
    }

    /// Resolve the storage.json path using `lookup` for environment access.
    pub fn resolve_config_path_with<F>(&self, lookup: F) -> (Option<PathBuf>, ConfigResolution)
    where
        F: Fn(&str) -> Option<String>,
    {
        // 1. Explicit path
        if let Some(ref path) = self.paths.config_path {
            return (Some(path.clone()), ConfigResolution::Explicit);
        }

        // 2. AD_STORAGE_CONFIG env var
        if let Some(path) = lookup(CONFIG_ENV_VAR) {
            return (Some(PathBuf::from(path)), ConfigResolution::EnvVar);
        }

        // 3. XDG config dir
        if let Some(config_dir) = self.resolve_config_dir() {
            let path = config_dir.join(CONFIG_FILE_NAME);
            if path.exists() {
                return (Some(path), ConfigResolution::XdgConfig);
            }
        }

        // 4. Default
        (None, ConfigResolution::Default)
    }

    /// Load, override and validate the configuration from the process environment.
    pub fn load(&self) -> Result<(LocalStorageConfig, ConfigSource)> {
        self.load_with(|key| env::var(key).ok())
    }

    /// Load, override and validate the configuration using `lookup` for
    /// environment access.
    pub fn load_with<F>(&self, lookup: F) -> Result<(LocalStorageConfig, ConfigSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (path, resolution) = self.resolve_config_path_with(&lookup);

        let (mut config, source) = match path {
            Some(p) => {
                let config = read_config_file(&p)?;
                (
                    config,
                    ConfigSource {
                        path: Some(p),
                        resolution,
                    },
                )
            }
            None => (
                LocalStorageConfig::default(),
                ConfigSource {
                    path: None,
                    resolution: ConfigResolution::Default,
                },
            ),
        };

        config.apply_overrides(&lookup)?;
        config.validate()?;

        debug!(
            source = %source.resolution,
            max_dumps_count = config.max_dumps_count,
            output_directory = %config.output_directory.display(),
            "resolved local storage configuration"
        );

        Ok((config, source))
    }
}

fn read_config_file(path: &Path) -> Result<LocalStorageConfig> {
    let content = fs::read_to_string(path).map_err(|source| Error::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| Error::ParseConfig {
        path: path.to_path_buf(),
        source,
    })
}
