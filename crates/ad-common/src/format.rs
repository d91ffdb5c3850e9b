//! Storage formats and storage backend identities.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Suffix appended to compressed artifacts.
pub const COMPRESSION_EXTENSION: &str = ".gz";

/// Encodings an activity dump can be persisted in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// JSON document
    Json,

    /// Protocol buffers message
    Protobuf,

    /// Graphviz graph
    Dot,

    /// Security profile
    Profile,
}

impl StorageFormat {
    /// All known formats.
    pub const ALL: [StorageFormat; 4] = [
        StorageFormat::Json,
        StorageFormat::Protobuf,
        StorageFormat::Dot,
        StorageFormat::Profile,
    ];

    /// Format name without a leading dot.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageFormat::Json => "json",
            StorageFormat::Protobuf => "protobuf",
            StorageFormat::Dot => "dot",
            StorageFormat::Profile => "profile",
        }
    }

    /// On-disk extension, including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            StorageFormat::Json => ".json",
            StorageFormat::Protobuf => ".protobuf",
            StorageFormat::Dot => ".dot",
            StorageFormat::Profile => ".profile",
        }
    }

    /// Parse a file extension such as `.json` or `json`.
    pub fn from_extension(ext: &str) -> Option<Self> {
        ext.parse().ok()
    }
}

impl std::str::FromStr for StorageFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.strip_prefix('.').unwrap_or(s);
        match name.to_lowercase().as_str() {
            "json" => Ok(StorageFormat::Json),
            "protobuf" => Ok(StorageFormat::Protobuf),
            "dot" => Ok(StorageFormat::Dot),
            "profile" => Ok(StorageFormat::Profile),
            _ => Err(Error::InvalidStorageFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Files on the local filesystem
    #[default]
    Local,

    /// Remote intake endpoint
    Remote,
}

impl std::str::FromStr for StorageType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(StorageType::Local),
            "remote" => Ok(StorageType::Remote),
            _ => Err(Error::InvalidStorageType(s.to_string())),
        }
    }
}

impl std::fmt::Display for StorageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageType::Local => write!(f, "local"),
            StorageType::Remote => write!(f, "remote"),
        }
    }
}
