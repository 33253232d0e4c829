pub mod aggregator;
pub mod config;
pub mod discovery;
pub mod error;
pub mod filter;
pub mod fixfen;
pub mod ingest;
pub mod metadata;
pub mod parallel_processing;
pub mod partition;
pub mod reader;
pub mod record;
pub mod report;

// Re-export main types for convenient access
pub use aggregator::{Statistics, StatsTable};
pub use config::AnalysisConfig;
pub use error::AnalyzeError;
pub use record::Outcome;

// Re-export pipeline entry points for the CLI, tests and benchmarks
pub use parallel_processing::{
    process_files_parallel, run_analysis, select_files, AnalysisRun, FileSelection,
};
pub use report::{Report, RunSummary};
