//! Capacity-bounded, least-recently-used index of persisted dumps.
//!
//! Each entry maps a dump name to every artifact written for it. When an
//! insertion pushes the index over capacity, the least recently written dump
//! is evicted as a whole: the cleanup observer is notified, every file of the
//! dump is removed and the deletion counter is incremented, all before the
//! insertion returns.

use std::fs;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use lru::LruCache;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Result, StorageError};

/// Notified right before the files of an evicted dump are deleted.
pub trait CleanupObserver: Send + Sync {
    fn on_local_storage_cleanup(&self, paths: &[PathBuf]);
}

/// All on-disk artifacts of one logical dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    pub identity: String,
    pub files: Vec<PathBuf>,
    pub last_modified: Option<SystemTime>,
}

impl ArtifactSet {
    pub fn new(identity: impl Into<String>, files: Vec<PathBuf>) -> Self {
        ArtifactSet {
            identity: identity.into(),
            files,
            last_modified: None,
        }
    }

    pub fn with_last_modified(mut self, last_modified: SystemTime) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Add files not already tracked; rewriting an artifact keeps one entry.
    fn append(&mut self, files: Vec<PathBuf>) {
        for file in files {
            if !self.files.contains(&file) {
                self.files.push(file);
            }
        }
    }
}

/// Bounded LRU map from dump name to its artifact set.
pub struct RetentionIndex {
    dumps: LruCache<String, ArtifactSet>,
    deleted_count: u64,
    observer: Option<Weak<dyn CleanupObserver>>,
}

impl std::fmt::Debug for RetentionIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetentionIndex")
            .field("len", &self.dumps.len())
            .field("capacity", &self.dumps.cap())
            .field("deleted_count", &self.deleted_count)
            .finish()
    }
}

impl RetentionIndex {
    /// Create an index holding at most `capacity` dumps.
    pub fn new(capacity: usize, observer: Option<&Arc<dyn CleanupObserver>>) -> Result<Self> {
        let cap = NonZeroUsize::new(capacity).ok_or(StorageError::InvalidCapacity(capacity))?;
        Ok(RetentionIndex {
            dumps: LruCache::new(cap),
            deleted_count: 0,
            observer: observer.map(Arc::downgrade),
        })
    }

    /// Look up a dump without changing its recency.
    pub fn get(&self, identity: &str) -> Option<&ArtifactSet> {
        self.dumps.peek(identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.dumps.contains(identity)
    }

    /// Record `files` for `identity`.
    ///
    /// Files are appended to an existing entry, which becomes the most
    /// recently used one. A new entry may evict the least recently used dump;
    /// the evicted set is returned after its files have been removed.
    pub fn put(&mut self, identity: &str, files: Vec<PathBuf>) -> Option<ArtifactSet> {
        if let Some(existing) = self.dumps.get_mut(identity) {
            existing.append(files);
            existing.last_modified = Some(SystemTime::now());
            return None;
        }

        let set = ArtifactSet::new(identity, files).with_last_modified(SystemTime::now());
        self.insert(set)
    }

    /// Register a complete artifact set, evicting if over capacity.
    ///
    /// An existing entry with the same identity is merged into.
    pub fn insert(&mut self, set: ArtifactSet) -> Option<ArtifactSet> {
        if let Some(existing) = self.dumps.get_mut(&set.identity) {
            existing.append(set.files);
            existing.last_modified = existing.last_modified.max(set.last_modified);
            return None;
        }

        let (_, evicted) = self.dumps.push(set.identity.clone(), set)?;
        self.evict(&evicted);
        Some(evicted)
    }

    fn evict(&mut self, set: &ArtifactSet) {
        info!(
            dump = %set.identity,
            files = set.files.len(),
            "max dumps count reached, evicting least recently used dump"
        );

        if !set.files.is_empty() {
            if let Some(observer) = self.observer.as_ref().and_then(Weak::upgrade) {
                observer.on_local_storage_cleanup(&set.files);
            }
        }

        for path in &set.files {
            match fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed evicted artifact"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove dump (limit of dumps reached)"
                ),
            }
        }

        self.deleted_count += 1;
    }

    pub fn len(&self) -> usize {
        self.dumps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dumps.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.dumps.cap().get()
    }

    /// Dump names from least to most recently used.
    pub fn identities(&self) -> Vec<String> {
        self.dumps.iter().rev().map(|(k, _)| k.clone()).collect()
    }

    /// Evictions since the last [`take_deleted_count`](Self::take_deleted_count).
    pub fn deleted_count(&self) -> u64 {
        self.deleted_count
    }

    /// Read and reset the eviction counter.
    pub fn take_deleted_count(&mut self) -> u64 {
        std::mem::take(&mut self.deleted_count)
    }
}
