//! Startup reconciliation of the retention index with the output directory.
//!
//! Files are grouped by dump name (`name.json`, `name.json.gz` and
//! `name.dot` all belong to `name`), sorted oldest first by modification time
//! and inserted into the index, so any pre-existing excess over capacity is
//! evicted oldest first.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use ad_common::{StorageFormat, COMPRESSION_EXTENSION};

use crate::error::{Result, StorageError};
use crate::index::{ArtifactSet, RetentionIndex};
use crate::writer::create_private_dir_all;

/// Outcome of seeding an index from disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// Dumps found on disk.
    pub discovered: usize,
    /// Dumps evicted because the snapshot exceeded capacity.
    pub evicted: usize,
}

/// Rebuilds the retention view from files already in the output directory.
#[derive(Debug)]
pub struct StartupReconciler<'a> {
    dir: &'a Path,
}

impl<'a> StartupReconciler<'a> {
    pub fn new(dir: &'a Path) -> Self {
        StartupReconciler { dir }
    }

    /// List managed artifacts grouped per dump, oldest first.
    ///
    /// A missing directory is created and yields no dumps.
    pub fn scan(&self) -> Result<Vec<ArtifactSet>> {
        let entries = match fs::read_dir(self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                create_private_dir_all(self.dir).map_err(|source| StorageError::CreateDir {
                    path: self.dir.to_path_buf(),
                    source,
                })?;
                debug!(dir = %self.dir.display(), "created activity dump output directory");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(StorageError::ListDir {
                    path: self.dir.to_path_buf(),
                    source,
                })
            }
        };

        let mut entries = entries
            .collect::<io::Result<Vec<_>>>()
            .map_err(|source| StorageError::ListDir {
                path: self.dir.to_path_buf(),
                source,
            })?;
        entries.sort_by_key(|entry| entry.file_name());

        let mut dumps: BTreeMap<String, ArtifactSet> = BTreeMap::new();

        for entry in entries {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();

            let Some(identity) = self.dump_name(&file_name) else {
                continue;
            };

            let modified = match entry.metadata().and_then(|meta| {
                if meta.is_file() {
                    meta.modified().map(Some)
                } else {
                    Ok(None)
                }
            }) {
                Ok(Some(modified)) => modified,
                Ok(None) => continue,
                Err(e) => {
                    warn!(file = %file_name, error = %e, "failed to retrieve dump file information");
                    continue;
                }
            };

            let set = dumps
                .entry(identity.to_string())
                .or_insert_with(|| ArtifactSet::new(identity, Vec::with_capacity(1)));
            set.files.push(self.dir.join(entry.file_name()));
            set.last_modified = set.last_modified.max(Some(modified));
        }

        let mut sets: Vec<ArtifactSet> = dumps.into_values().collect();
        sets.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.identity.cmp(&b.identity))
        });

        Ok(sets)
    }

    /// Insert every dump found on disk into `index`, oldest first.
    pub fn seed(&self, index: &mut RetentionIndex) -> Result<ReconcileSummary> {
        let sets = self.scan()?;
        let mut summary = ReconcileSummary {
            discovered: sets.len(),
            evicted: 0,
        };

        for set in sets {
            if index.insert(set).is_some() {
                summary.evicted += 1;
            }
        }

        if summary.discovered > 0 {
            info!(
                dir = %self.dir.display(),
                discovered = summary.discovered,
                evicted = summary.evicted,
                "reconciled local activity dumps"
            );
        }

        Ok(summary)
    }

    /// Dump name of a managed artifact, or `None` for unmanaged files.
    ///
    /// Any known storage format is managed, whichever formats the store is
    /// currently configured to encode.
    fn dump_name<'n>(&self, file_name: &'n str) -> Option<&'n str> {
        let (stem, ext) = split_extension(file_name);
        if ext == COMPRESSION_EXTENSION {
            return Some(split_extension(stem).0);
        }
        StorageFormat::from_extension(ext).map(|_| stem)
    }
}

/// Split `name` at its last extension: `"a.json.gz"` -> `("a.json", ".gz")`.
///
/// Dotfiles without a further dot have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(idx) => name.split_at(idx),
    }
}
