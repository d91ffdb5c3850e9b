//! Per-call persistence requests and dump metadata.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::format::{StorageFormat, StorageType, COMPRESSION_EXTENSION};

/// Placeholder substituted with the dump name in file name templates.
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Describes where and how a single dump encoding should be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageRequest {
    /// Backend the request targets.
    #[serde(default)]
    pub storage_type: StorageType,

    /// Encoding of the buffer being persisted.
    pub format: StorageFormat,

    /// Gzip the buffer before writing it.
    #[serde(default)]
    pub compression: bool,

    /// Directory the artifact is written to.
    pub output_directory: PathBuf,

    /// File stem template; `{name}` is replaced by the dump name.
    #[serde(default = "default_file_name_template")]
    pub file_name_template: String,
}

fn default_file_name_template() -> String {
    NAME_PLACEHOLDER.to_string()
}

impl StorageRequest {
    /// Create a local storage request with the default file name template.
    pub fn local(
        output_directory: impl Into<PathBuf>,
        format: StorageFormat,
        compression: bool,
    ) -> Self {
        StorageRequest {
            storage_type: StorageType::Local,
            format,
            compression,
            output_directory: output_directory.into(),
            file_name_template: default_file_name_template(),
        }
    }

    /// Override the file stem template.
    pub fn with_file_name_template(mut self, template: impl Into<String>) -> Self {
        self.file_name_template = template.into();
        self
    }

    /// Final artifact path for the dump called `name`.
    ///
    /// `<output_directory>/<stem><format extension>[.gz]`
    pub fn output_path(&self, name: &str) -> PathBuf {
        let stem = self.file_name_template.replace(NAME_PLACEHOLDER, name);
        let suffix = if self.compression {
            COMPRESSION_EXTENSION
        } else {
            ""
        };
        self.output_directory
            .join(format!("{}{}{}", stem, self.format.extension(), suffix))
    }

    pub fn output_directory(&self) -> &Path {
        &self.output_directory
    }
}

/// Metadata of the dump being persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DumpMetadata {
    /// Unique dump name, used as the retention identity.
    pub name: String,

    /// Human-readable description of the workload the dump was captured for.
    #[serde(default)]
    pub selector: String,

    /// Serialized size in bytes of the last persisted encoding.
    #[serde(default)]
    pub size: u64,
}

impl DumpMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        DumpMetadata {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Attach a workload selector description.
    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = selector.into();
        self
    }

    /// Selector for log lines, falling back to the dump name.
    pub fn selector_str(&self) -> &str {
        if self.selector.is_empty() {
            &self.name
        } else {
            &self.selector
        }
    }
}
