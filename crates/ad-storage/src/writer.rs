//! Crash-safe artifact writer.
//!
//! Artifacts are written to `<final path>.tmp`, synced, made read-only and
//! only then renamed over the final path, so a reader never observes a
//! partially written artifact under its final name.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::compress::{Compressor, GzipCompressor};
use crate::error::{Result, StorageError};

/// Suffix of in-flight artifacts.
pub const TEMP_EXTENSION: &str = ".tmp";

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    /// Final path of the artifact.
    pub path: PathBuf,
    /// Bytes on disk (after compression, if any).
    pub bytes: u64,
    /// Whether the payload was compressed.
    pub compressed: bool,
}

/// Persists raw buffers to disk atomically, optionally compressing them first.
#[derive(Clone)]
pub struct ArtifactWriter {
    compressor: Arc<dyn Compressor>,
}

impl Default for ArtifactWriter {
    fn default() -> Self {
        Self::new(Arc::new(GzipCompressor::default()))
    }
}

impl std::fmt::Debug for ArtifactWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactWriter").finish_non_exhaustive()
    }
}

impl ArtifactWriter {
    pub fn new(compressor: Arc<dyn Compressor>) -> Self {
        ArtifactWriter { compressor }
    }

    /// Write `data` to `path`, compressing first when `compress` is set.
    ///
    /// On error nothing is left at `path` that was not there before, and the
    /// temporary file is removed.
    pub fn write(&self, path: &Path, data: &[u8], compress: bool) -> Result<WrittenArtifact> {
        let compressed;
        let payload: &[u8] = if compress {
            let base_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            compressed = self
                .compressor
                .compress(&base_name, data)
                .map_err(|source| StorageError::Compression {
                    path: path.to_path_buf(),
                    source,
                })?;
            &compressed
        } else {
            data
        };

        if let Some(parent) = path.parent() {
            // An existing directory is fine; anything else surfaces at create time.
            if let Err(e) = create_private_dir_all(parent) {
                debug!(dir = %parent.display(), error = %e, "couldn't create output directory");
            }
        }

        let temp_path = temp_path_for(path);
        remove_stale_temp(&temp_path);

        if let Err(e) = write_temp(&temp_path, payload) {
            discard_temp(&temp_path);
            return Err(e);
        }

        if let Err(source) = fs::rename(&temp_path, path) {
            discard_temp(&temp_path);
            return Err(StorageError::Rename {
                from: temp_path,
                to: path.to_path_buf(),
                source,
            });
        }

        debug!(path = %path.display(), bytes = payload.len(), compress, "artifact committed");

        Ok(WrittenArtifact {
            path: path.to_path_buf(),
            bytes: payload.len() as u64,
            compressed: compress,
        })
    }
}

/// `<path>.tmp`
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(TEMP_EXTENSION);
    PathBuf::from(name)
}

/// Create `dir` and its parents, restricted to owner and group.
pub fn create_private_dir_all(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(dir)
}

fn write_temp(temp_path: &Path, payload: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file: File = options
        .open(temp_path)
        .map_err(|source| StorageError::CreateFile {
            path: temp_path.to_path_buf(),
            source,
        })?;

    file.write_all(payload)
        .map_err(|source| StorageError::Write {
            path: temp_path.to_path_buf(),
            source,
        })?;

    file.sync_all().map_err(|source| StorageError::Sync {
        path: temp_path.to_path_buf(),
        source,
    })?;

    // Finalized artifacts are read-only.
    let set_read_only = file.metadata().and_then(|meta| {
        let mut perms = meta.permissions();
        perms.set_readonly(true);
        file.set_permissions(perms)
    });
    set_read_only.map_err(|source| StorageError::SetPermissions {
        path: temp_path.to_path_buf(),
        source,
    })?;

    Ok(())
}

fn remove_stale_temp(temp_path: &Path) {
    match fs::remove_file(temp_path) {
        Ok(()) => debug!(path = %temp_path.display(), "removed stale temporary artifact"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp_path.display(), error = %e, "couldn't remove stale temporary artifact"),
    }
}

fn discard_temp(temp_path: &Path) {
    match fs::remove_file(temp_path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %temp_path.display(), error = %e, "couldn't clean up temporary artifact"),
    }
}
