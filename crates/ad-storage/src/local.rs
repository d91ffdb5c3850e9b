//! Local filesystem storage for activity dumps.
//!
//! [`LocalStore`] persists dump encodings under the configured output
//! directory and keeps at most `max_dumps_count` dumps on disk. A single lock
//! serializes persistence and telemetry; evictions triggered by a persist run
//! inside that same critical section.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use ad_common::{DumpMetadata, LocalStorageConfig, StorageFormat, StorageRequest, StorageType};

use crate::compress::Compressor;
use crate::error::Result;
use crate::index::{ArtifactSet, CleanupObserver, RetentionIndex};
use crate::metrics::{MetricsSink, METRIC_LOCAL_STORAGE_COUNT, METRIC_LOCAL_STORAGE_DELETED};
use crate::reconcile::{ReconcileSummary, StartupReconciler};
use crate::writer::ArtifactWriter;

/// A storage backend for activity dumps.
pub trait DumpStorage: Send + Sync {
    /// Identity of this backend.
    fn storage_type(&self) -> StorageType;

    /// Persist one encoding of `dump`, returning where it was written.
    ///
    /// On success `dump.size` holds the persisted byte length.
    fn persist(
        &self,
        request: &StorageRequest,
        dump: &mut DumpMetadata,
        raw: &[u8],
    ) -> Result<PathBuf>;

    /// Report backend metrics to `sink`.
    fn send_telemetry(&self, sink: &dyn MetricsSink);
}

/// Builder for [`LocalStore`].
pub struct LocalStoreBuilder {
    config: LocalStorageConfig,
    observer: Option<Arc<dyn CleanupObserver>>,
    writer: ArtifactWriter,
}

impl LocalStoreBuilder {
    /// Notify `observer` before the files of an evicted dump are removed.
    ///
    /// The store only keeps a weak handle on the observer.
    pub fn cleanup_observer(mut self, observer: Arc<dyn CleanupObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the default gzip compressor.
    pub fn compressor(mut self, compressor: Arc<dyn Compressor>) -> Self {
        self.writer = ArtifactWriter::new(compressor);
        self
    }

    /// Validate the configuration, reconcile the output directory and open
    /// the store.
    pub fn open(self) -> Result<LocalStore> {
        self.config.validate()?;

        let mut index = RetentionIndex::new(self.config.max_dumps_count, self.observer.as_ref())?;
        let reconciled = StartupReconciler::new(&self.config.output_directory).seed(&mut index)?;

        Ok(LocalStore {
            index: Mutex::new(index),
            writer: self.writer,
            config: self.config,
            reconciled,
        })
    }
}

/// Bounded local dump storage.
pub struct LocalStore {
    index: Mutex<RetentionIndex>,
    writer: ArtifactWriter,
    config: LocalStorageConfig,
    reconciled: ReconcileSummary,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("output_directory", &self.config.output_directory)
            .field("index", &*self.lock())
            .finish()
    }
}

impl LocalStore {
    pub fn builder(config: LocalStorageConfig) -> LocalStoreBuilder {
        LocalStoreBuilder {
            config,
            observer: None,
            writer: ArtifactWriter::default(),
        }
    }

    /// Open a store with the default compressor and no cleanup observer.
    pub fn open(config: LocalStorageConfig) -> Result<Self> {
        Self::builder(config).open()
    }

    /// Request targeting this store's output directory with its default
    /// compression flag.
    pub fn request(&self, format: StorageFormat) -> StorageRequest {
        self.config.request(format)
    }

    pub fn output_directory(&self) -> &Path {
        &self.config.output_directory
    }

    pub fn config(&self) -> &LocalStorageConfig {
        &self.config
    }

    /// What startup reconciliation found on disk.
    pub fn reconciled(&self) -> ReconcileSummary {
        self.reconciled
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains(name)
    }

    /// Artifacts currently retained for `name`.
    pub fn artifacts(&self, name: &str) -> Option<ArtifactSet> {
        self.lock().get(name).cloned()
    }

    /// Retained dump names, least recently written first.
    pub fn identities(&self) -> Vec<String> {
        self.lock().identities()
    }

    /// Evictions not yet reported through telemetry.
    pub fn pending_deleted_count(&self) -> u64 {
        self.lock().deleted_count()
    }

    fn lock(&self) -> MutexGuard<'_, RetentionIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DumpStorage for LocalStore {
    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }

    fn persist(
        &self,
        request: &StorageRequest,
        dump: &mut DumpMetadata,
        raw: &[u8],
    ) -> Result<PathBuf> {
        let mut index = self.lock();

        let output_path = request.output_path(&dump.name);
        let written = self.writer.write(&output_path, raw, request.compression)?;

        dump.size = written.bytes;

        info!(
            dump = %dump.name,
            format = %request.format,
            selector = %dump.selector_str(),
            path = %written.path.display(),
            bytes = written.bytes,
            "activity dump file written"
        );

        index.put(&dump.name, vec![written.path.clone()]);

        Ok(written.path)
    }

    fn send_telemetry(&self, sink: &dyn MetricsSink) {
        let mut index = self.lock();

        let count = index.len();
        if count > 0 {
            sink.gauge(METRIC_LOCAL_STORAGE_COUNT, count as f64);
        }

        let deleted = index.take_deleted_count();
        if deleted > 0 {
            sink.count(METRIC_LOCAL_STORAGE_DELETED, deleted as i64);
        }
    }
}
