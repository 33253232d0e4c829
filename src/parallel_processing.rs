// WHY: Pipeline orchestration lives in the library so the CLI, the integration tests
// and the benchmark all drive the exact same fan-out/join path

use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{info, warn};

use crate::aggregator::Statistics;
use crate::config::AnalysisConfig;
use crate::discovery::{collect_discovered_files, FileRecord};
use crate::error::{AnalyzeError, Result};
use crate::filter::{filter_by_book, filter_sprt_only, BookMatcher};
use crate::fixfen::FixFenTable;
use crate::ingest::{ingest_chunk, FileStats, IngestContext, RunCounters};
use crate::metadata::resolve_metadata;
use crate::partition::{split_chunks, target_chunks};

/// Aggregated state after every worker has joined
#[derive(Debug)]
pub struct AnalysisRun {
    pub entries: Vec<(String, Statistics)>,
    /// Distinct positions aggregated, kept even if `entries` is taken
    pub positions: usize,
    pub total_games: u64,
    pub total_chunks: usize,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub duplicate_tests: usize,
    pub elapsed: Duration,
}

/// Files that survived discovery, metadata resolution and filtering
#[derive(Debug)]
pub struct FileSelection {
    pub files: Vec<FileRecord>,
    pub discovered: usize,
    pub duplicate_tests: usize,
}

/// Discovers, resolves and filters the files one run will ingest
pub async fn select_files(config: &AnalysisConfig) -> Result<FileSelection> {
    // WHY: an empty pattern is rejected before touching the disk
    let matcher = config
        .match_book
        .as_deref()
        .map(BookMatcher::new)
        .transpose()?;
    if matcher.is_none() && config.match_book_inverted {
        warn!("--matchBookInverted has no effect without --matchBook");
    }

    let mut files = collect_discovered_files(&config.root_dir, config.discovery()).await?;
    let discovered = files.len();
    let index = resolve_metadata(&files, config.allow_duplicates)?;

    if let Some(matcher) = &matcher {
        filter_by_book(&mut files, &index, matcher, config.match_book_inverted);
    }
    if config.sprt_only {
        filter_sprt_only(&mut files, &index);
    }

    Ok(FileSelection {
        files,
        discovered,
        duplicate_tests: index.conflicts().len(),
    })
}

fn progress_bar(chunks: usize, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(chunks as u64);
    if let Ok(style) = ProgressStyle::with_template("Progress: {pos}/{len} chunks [{elapsed_precise}] {wide_bar}") {
        bar.set_style(style);
    }
    bar
}

type ChunkOutcome = std::result::Result<Result<Vec<FileStats>>, JoinError>;

/// Folds one joined chunk into the collected stats, keeping the first fatal error
fn collect_chunk(
    joined: ChunkOutcome,
    counters: &RunCounters,
    file_stats: &mut Vec<FileStats>,
    fatal: &mut Option<AnalyzeError>,
) {
    match joined {
        Ok(Ok(stats)) => file_stats.extend(stats),
        Ok(Err(e)) => {
            counters.abort();
            fatal.get_or_insert(e);
        }
        Err(e) => {
            counters.abort();
            fatal.get_or_insert(AnalyzeError::Worker(e.to_string()));
        }
    }
}

/// Ingests `files` on `concurrency` workers into the shared table in `ctx`.
///
/// Files are split into `4 × concurrency` contiguous chunks; each chunk runs
/// to completion on the blocking pool and at most `concurrency` chunks are in
/// flight. The join below is the only barrier. A fatal error from any chunk
/// aborts the run: no further chunks are submitted, running chunks stop
/// before their next file, and the error is returned once they have joined.
pub async fn process_files_parallel(
    files: Vec<PathBuf>,
    ctx: &Arc<IngestContext>,
    concurrency: usize,
    show_progress: bool,
) -> Result<Vec<FileStats>> {
    let concurrency = concurrency.max(1);
    let chunks = split_chunks(&files, target_chunks(concurrency));
    let total_chunks = chunks.len();
    info!(
        "Processing {} files in {} chunks with concurrency {}",
        files.len(),
        total_chunks,
        concurrency
    );

    let permits = Arc::new(Semaphore::new(concurrency));
    let progress = progress_bar(total_chunks, show_progress);
    let mut tasks = JoinSet::new();
    let mut file_stats = Vec::with_capacity(files.len());
    let mut fatal = None;
    let mut submitted = 0;

    for chunk in chunks {
        while let Some(joined) = tasks.try_join_next() {
            collect_chunk(joined, &ctx.counters, &mut file_stats, &mut fatal);
        }
        if ctx.counters.is_aborted() {
            break;
        }

        let permit = Arc::clone(&permits)
            .acquire_owned()
            .await
            .map_err(|e| AnalyzeError::Worker(e.to_string()))?;
        // WHY: the failing chunk raises the flag before it releases its permit
        if ctx.counters.is_aborted() {
            break;
        }

        let ctx = Arc::clone(ctx);
        let progress = progress.clone();
        tasks.spawn_blocking(move || {
            let _permit = permit;
            let result = ingest_chunk(&chunk, &ctx);
            ctx.counters.total_chunks.fetch_add(1, Ordering::Relaxed);
            progress.inc(1);
            result
        });
        submitted += 1;
    }

    while let Some(joined) = tasks.join_next().await {
        collect_chunk(joined, &ctx.counters, &mut file_stats, &mut fatal);
    }
    progress.finish_and_clear();

    if let Some(e) = fatal {
        warn!(
            "Aborting run after a fatal error, {} of {} chunks never started",
            total_chunks - submitted,
            total_chunks
        );
        return Err(e);
    }

    Ok(file_stats)
}

/// Runs the whole pipeline: file selection, fix-up table, parallel ingestion.
pub async fn run_analysis(config: &AnalysisConfig) -> Result<AnalysisRun> {
    let start = Instant::now();

    // WHY: selection validates --matchBook before anything else touches the disk
    let selection = select_files(config).await?;
    let files_analyzed = selection.files.len();
    info!(
        "Analyzing {} of {} discovered files",
        files_analyzed, selection.discovered
    );

    let fixfen = match &config.fixfen_source {
        Some(path) => Some(FixFenTable::load(path, &config.reader)?),
        None => None,
    };

    let paths: Vec<PathBuf> = selection.files.into_iter().map(|f| f.path).collect();
    let ctx = Arc::new(IngestContext {
        fixfen,
        reader: config.reader.clone(),
        ..Default::default()
    });
    let file_stats = process_files_parallel(
        paths,
        &ctx,
        config.effective_concurrency(),
        config.show_progress,
    )
    .await?;

    let ctx = Arc::try_unwrap(ctx)
        .map_err(|_| AnalyzeError::Worker("ingest context still shared after join".to_string()))?;
    let files_failed = file_stats.iter().filter(|s| s.error.is_some()).count();
    let entries = ctx.table.into_entries();
    let run = AnalysisRun {
        positions: entries.len(),
        total_games: ctx.counters.games(),
        total_chunks: ctx.counters.chunks(),
        files_analyzed,
        files_failed,
        duplicate_tests: selection.duplicate_tests,
        entries,
        elapsed: start.elapsed(),
    };

    info!(
        "Ingested {} games into {} positions from {} files ({} failed) in {:.3}s",
        run.total_games,
        run.positions,
        run.files_analyzed,
        run.files_failed,
        run.elapsed.as_secs_f64()
    );

    Ok(run)
}
