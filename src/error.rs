use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the analysis pipeline.
///
/// Everything here aborts the run. Per-file parse problems are not errors at
/// this level: the worker logs them and moves on to the next file.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    /// Bad or missing flag value
    #[error("{0}")]
    Usage(String),

    #[error("invalid book pattern {pattern:?}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("failed to scan {}: {source}", root.display())]
    Discovery {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("malformed test descriptor {}: {source}", path.display())]
    Descriptor {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("detected a duplicate of test {test_id} in directory {}; use --allowDuplicates to continue nonetheless", directory.display())]
    DuplicateTest { test_id: String, directory: PathBuf },

    /// The fix-up table has no entry for a position seen in the games
    #[error("could not find FEN {fen} in fixFENsource")]
    MissingFixFen { fen: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A chunk task panicked or was cancelled
    #[error("worker task failed: {0}")]
    Worker(String),
}

impl AnalyzeError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = AnalyzeError> = std::result::Result<T, E>;
