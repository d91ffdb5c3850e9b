//! Error types for local dump storage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from constructing or writing to the local dump store.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("invalid retention capacity {0}: at least one dump must be kept")]
    InvalidCapacity(usize),

    #[error("couldn't create output directory [{path}]: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't list existing activity dumps in [{path}]: {source}")]
    ListDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't compress [{path}]: {source}")]
    Compression {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't persist to file [{path}]: {source}")]
    CreateFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't write to file [{path}]: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't sync file [{path}]: {source}")]
    Sync {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't set mode for file [{path}]: {source}")]
    SetPermissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't rename file from [{from}] to [{to}]: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ad_common::Error),
}

impl StorageError {
    /// Whether this error can only be raised while opening the store.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            StorageError::InvalidCapacity(_)
                | StorageError::CreateDir { .. }
                | StorageError::ListDir { .. }
                | StorageError::Config(_)
        )
    }

    /// Path the failing operation was acting on, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            StorageError::CreateDir { path, .. }
            | StorageError::ListDir { path, .. }
            | StorageError::Compression { path, .. }
            | StorageError::CreateFile { path, .. }
            | StorageError::Write { path, .. }
            | StorageError::Sync { path, .. }
            | StorageError::SetPermissions { path, .. } => Some(path),
            StorageError::Rename { from, .. } => Some(from),
            StorageError::InvalidCapacity(_) | StorageError::Config(_) => None,
        }
    }
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
