//! Activity dump storage common types, configuration and errors.
//!
//! This crate provides foundational types shared by storage backends:
//! - Storage formats and backend identities
//! - Per-call persistence requests and dump metadata
//! - Local storage configuration loading and validation
//! - Common error types
//! - Logging bootstrap for embedding processes

pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod request;

pub use config::{ConfigPaths, ConfigResolution, ConfigResolver, ConfigSource, LocalStorageConfig};
pub use error::{Error, ErrorCategory, Result};
pub use format::{StorageFormat, StorageType, COMPRESSION_EXTENSION};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use request::{DumpMetadata, StorageRequest};
