use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::debug;

use crate::error::{AnalyzeError, Result};

/// Configuration for opening record and reference files
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Buffer size for the decoded stream (default: 64KB)
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            buffer_size: 64 * 1024, // WHY: PGN archives are read front to back, larger reads cut syscalls
        }
    }
}

pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "gz")
}

/// Opens `path` as a buffered byte stream, transparently inflating `*.gz`.
///
/// Concatenated gzip members are read as one stream.
pub fn open_stream(path: &Path, config: &ReaderConfig) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).map_err(|e| AnalyzeError::io(path, e))?;

    if is_gzip(path) {
        debug!("Opening gzip stream: {}", path.display());
        Ok(Box::new(BufReader::with_capacity(
            config.buffer_size,
            MultiGzDecoder::new(file),
        )))
    } else {
        debug!("Opening plain stream: {}", path.display());
        Ok(Box::new(BufReader::with_capacity(config.buffer_size, file)))
    }
}
