//! Gzip compression of dump buffers.

use std::io::{self, Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::{Compression, GzBuilder};

use ad_common::COMPRESSION_EXTENSION;

/// Compresses a dump buffer before it is written to disk.
pub trait Compressor: Send + Sync {
    /// Compress `data`. `base_name` is the final file name of the artifact.
    fn compress(&self, base_name: &str, data: &[u8]) -> io::Result<Vec<u8>>;
}

/// Gzip with the inner file name recorded in the header.
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: Compression,
}

impl Default for GzipCompressor {
    fn default() -> Self {
        GzipCompressor {
            level: Compression::default(),
        }
    }
}

impl GzipCompressor {
    pub fn with_level(level: u32) -> Self {
        GzipCompressor {
            level: Compression::new(level),
        }
    }
}

impl Compressor for GzipCompressor {
    fn compress(&self, base_name: &str, data: &[u8]) -> io::Result<Vec<u8>> {
        let inner_name = base_name
            .strip_suffix(COMPRESSION_EXTENSION)
            .unwrap_or(base_name);
        let mtime = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);

        let mut encoder: GzEncoder<Vec<u8>> = GzBuilder::new()
            .filename(inner_name)
            .mtime(mtime)
            .write(Vec::with_capacity(data.len() / 2), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }
}

/// Gzip decompress data.
pub fn gzip_decompress(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}

/// Inner file name recorded in a gzip header, if any.
pub fn gzip_inner_name(data: &[u8]) -> Option<String> {
    let mut decoder = GzDecoder::new(data);
    io::copy(&mut decoder, &mut io::sink()).ok()?;
    decoder
        .header()
        .and_then(|h| h.filename())
        .map(|name| String::from_utf8_lossy(name).into_owned())
}
