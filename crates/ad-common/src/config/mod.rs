//! Local storage configuration.
//!
//! This module provides:
//! - The typed `storage.json` configuration for the local dump store
//! - Deterministic config resolution (explicit path > env > XDG > defaults)
//! - Semantic validation

pub mod resolve;

pub use resolve::{ConfigPaths, ConfigResolver};

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::format::StorageFormat;
use crate::request::StorageRequest;

/// Default cap on the number of dumps retained on disk.
pub const DEFAULT_MAX_DUMPS_COUNT: usize = 100;

/// Default directory for locally persisted dumps.
pub const DEFAULT_OUTPUT_DIRECTORY: &str = "/tmp/activity_dumps";

/// Configuration of the local activity dump store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStorageConfig {
    /// Maximum number of logical dumps kept on disk.
    #[serde(default = "default_max_dumps_count")]
    pub max_dumps_count: usize,

    /// Directory scanned at startup and written to by default.
    #[serde(default = "default_output_directory")]
    pub output_directory: PathBuf,

    /// Formats recognized as managed artifacts.
    #[serde(default = "default_formats")]
    pub formats: Vec<StorageFormat>,

    /// Compress artifacts unless a request says otherwise.
    #[serde(default)]
    pub compression: bool,
}

fn default_max_dumps_count() -> usize {
    DEFAULT_MAX_DUMPS_COUNT
}

fn default_output_directory() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIRECTORY)
}

fn default_formats() -> Vec<StorageFormat> {
    vec![StorageFormat::Profile]
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        LocalStorageConfig {
            max_dumps_count: default_max_dumps_count(),
            output_directory: default_output_directory(),
            formats: default_formats(),
            compression: false,
        }
    }
}

impl LocalStorageConfig {
    /// Create a config rooted at `output_directory` with the given cap.
    pub fn new(output_directory: impl Into<PathBuf>, max_dumps_count: usize) -> Self {
        LocalStorageConfig {
            max_dumps_count,
            output_directory: output_directory.into(),
            ..Default::default()
        }
    }

    /// Replace the recognized format set.
    pub fn with_formats(mut self, formats: impl Into<Vec<StorageFormat>>) -> Self {
        self.formats = formats.into();
        self
    }

    /// Set the default compression flag.
    pub fn with_compression(mut self, compression: bool) -> Self {
        self.compression = compression;
        self
    }

    /// Whether `format` is one of the recognized formats.
    pub fn recognizes(&self, format: StorageFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Build a local request for `format` using the configured directory and
    /// default compression flag.
    pub fn request(&self, format: StorageFormat) -> StorageRequest {
        StorageRequest::local(self.output_directory.clone(), format, self.compression)
    }

    /// Reject values the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_dumps_count == 0 {
            return Err(Error::InvalidValue {
                field: "max_dumps_count".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.formats.is_empty() {
            return Err(Error::InvalidValue {
                field: "formats".to_string(),
                reason: "at least one storage format is required".to_string(),
            });
        }
        if !self.output_directory.is_absolute() {
            return Err(Error::InvalidValue {
                field: "output_directory".to_string(),
                reason: format!("{} is not an absolute path", self.output_directory.display()),
            });
        }
        Ok(())
    }

    /// Apply field overrides from a variable lookup.
    ///
    /// Recognized keys: `AD_MAX_DUMPS_COUNT`, `AD_OUTPUT_DIR`, `AD_COMPRESSION`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("AD_MAX_DUMPS_COUNT") {
            self.max_dumps_count = val.trim().parse().map_err(|_| Error::InvalidValue {
                field: "AD_MAX_DUMPS_COUNT".to_string(),
                reason: format!("not a positive integer: {}", val),
            })?;
        }
        if let Some(val) = lookup("AD_OUTPUT_DIR") {
            self.output_directory = PathBuf::from(val);
        }
        if let Some(val) = lookup("AD_COMPRESSION") {
            self.compression = match val.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(Error::InvalidValue {
                        field: "AD_COMPRESSION".to_string(),
                        reason: format!("not a boolean: {}", val),
                    })
                }
            };
        }
        Ok(())
    }
}

/// Where a loaded configuration came from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// File that was read; `None` for built-in defaults
    pub path: Option<PathBuf>,
    /// Winning resolution step
    pub resolution: ConfigResolution,
}

/// Which resolution step produced the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// From an explicit path supplied by the embedder
    Explicit,
    /// `AD_STORAGE_CONFIG`
    EnvVar,
    /// `activity_dump/storage.json` under the user config directory
    XdgConfig,
    /// No file; built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::Explicit => write!(f, "explicit"),
            ConfigResolution::EnvVar => write!(f, "env"),
            ConfigResolution::XdgConfig => write!(f, "xdg"),
            ConfigResolution::Default => write!(f, "default"),
        }
    }
}
