use std::path::PathBuf;

use crate::discovery::DiscoveryConfig;
use crate::reader::ReaderConfig;

/// Everything one analysis run needs to know.
/// WHY: the CLI and the integration tests build the same struct, so the pipeline never sees clap types
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Root directory scanned for *.pgn and *.pgn.gz files
    pub root_dir: PathBuf,
    /// Descend into subdirectories of `root_dir`
    pub recursive: bool,
    /// Number of chunks processed at the same time
    pub concurrency: usize,
    /// Keep only tests whose book name matches this pattern
    pub match_book: Option<String>,
    /// Invert the book match
    pub match_book_inverted: bool,
    /// Downgrade duplicate test ids from fatal to a warning
    pub allow_duplicates: bool,
    /// Keep only tests flagged as SPRT
    pub sprt_only: bool,
    /// Reference file used to repair reset move counters
    pub fixfen_source: Option<PathBuf>,
    /// Report only positions where every game had the same result
    pub conclusive_only: bool,
    /// Draw a progress bar while chunks complete
    pub show_progress: bool,
    pub reader: ReaderConfig,
}

impl AnalysisConfig {
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    pub fn discovery(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            recursive: self.recursive,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("./pgns"),
            recursive: true,
            concurrency: num_cpus::get().max(1),
            match_book: None,
            match_book_inverted: false,
            allow_duplicates: false,
            sprt_only: false,
            fixfen_source: None,
            conclusive_only: false,
            show_progress: false,
            reader: ReaderConfig::default(),
        }
    }
}
