//! Errors for the shared storage vocabulary and configuration loading.
//!
//! Codes are stable: 1x for configuration content, 6x for reading the
//! configuration file.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping of [`Error`] values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Io => "io",
        })
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("unknown storage format: {0}")]
    InvalidStorageFormat(String),

    #[error("unknown storage type: {0}")]
    InvalidStorageType(String),

    #[error("couldn't parse storage config [{path}]: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("couldn't read storage config [{path}]: {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidValue { .. } => 11,
            Error::InvalidStorageFormat(_) => 12,
            Error::InvalidStorageType(_) => 13,
            Error::ParseConfig { .. } => 14,
            Error::ReadConfig { .. } => 60,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::ReadConfig { .. } => ErrorCategory::Io,
            _ => ErrorCategory::Config,
        }
    }

    /// Whether retrying without editing the configuration could succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::ReadConfig { source, .. } => matches!(
                source.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }
}
