//! Bounded, crash-safe local storage for activity dumps.
//!
//! This crate provides:
//! - Atomic artifact writes (temp file, sync, read-only, rename) with optional gzip
//! - A capacity-bounded LRU retention index that deletes evicted dumps from disk
//! - Startup reconciliation of the index with dumps already on disk
//! - The [`LocalStore`] facade and the [`DumpStorage`] backend trait
//! - Storage telemetry through a pluggable [`MetricsSink`]
//!
//! # Example
//!
//! ```no_run
//! use ad_common::{DumpMetadata, LocalStorageConfig, StorageFormat};
//! use ad_storage::{DumpStorage, LocalStore, MemorySink};
//!
//! let config = LocalStorageConfig::new("/var/lib/activity_dumps", 50)
//!     .with_formats(vec![StorageFormat::Json]);
//! let store = LocalStore::open(config)?;
//!
//! let mut dump = DumpMetadata::new("dump-42").with_selector("image_name:nginx");
//! let path = store.persist(&store.request(StorageFormat::Json), &mut dump, b"{}")?;
//! println!("persisted {} bytes to {}", dump.size, path.display());
//!
//! let sink = MemorySink::new();
//! store.send_telemetry(&sink);
//! # Ok::<(), ad_storage::StorageError>(())
//! ```

pub mod compress;
pub mod error;
pub mod index;
pub mod local;
pub mod metrics;
pub mod reconcile;
pub mod writer;

pub use compress::{gzip_decompress, Compressor, GzipCompressor};
pub use error::{Result, StorageError};
pub use index::{ArtifactSet, CleanupObserver, RetentionIndex};
pub use local::{DumpStorage, LocalStore, LocalStoreBuilder};
pub use metrics::{
    MemorySink, MetricsSink, PrometheusSink, METRIC_LOCAL_STORAGE_COUNT,
    METRIC_LOCAL_STORAGE_DELETED,
};
pub use reconcile::{ReconcileSummary, StartupReconciler};
pub use writer::{ArtifactWriter, WrittenArtifact};
