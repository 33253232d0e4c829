use pgn_reader::{BufferedReader, RawHeader, Skip, Visitor};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

use crate::aggregator::StatsTable;
use crate::error::{AnalyzeError, Result};
use crate::fixfen::FixFenTable;
use crate::reader::{open_stream, ReaderConfig};
use crate::record::{Control, Outcome, PositionSink, RecordEvent, RecordHandler};

/// Run-wide counters shared by every worker
#[derive(Debug, Default)]
pub struct RunCounters {
    pub total_games: AtomicU64,
    pub total_chunks: AtomicUsize,
    /// Files a worker started reading, whatever the outcome
    pub files_started: AtomicUsize,
    pub files_failed: AtomicUsize,
    /// Set once any worker hits a fatal error; workers stop between files
    aborted: AtomicBool,
}

impl RunCounters {
    pub fn games(&self) -> u64 {
        self.total_games.load(Ordering::Relaxed)
    }

    pub fn chunks(&self) -> usize {
        self.total_chunks.load(Ordering::Relaxed)
    }

    pub fn failed_files(&self) -> usize {
        self.files_failed.load(Ordering::Relaxed)
    }

    pub fn started_files(&self) -> usize {
        self.files_started.load(Ordering::Relaxed)
    }

    pub fn abort(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

/// Everything a worker needs, shared read-only except for the table and counters
#[derive(Debug, Default)]
pub struct IngestContext {
    pub table: StatsTable,
    pub counters: RunCounters,
    pub fixfen: Option<FixFenTable>,
    pub reader: ReaderConfig,
}

/// Per-file processing statistics
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileStats {
    pub path: PathBuf,
    /// Records the parser walked through
    pub records_read: u64,
    /// Records that ended up in the table
    pub games_counted: u64,
    /// Why the rest of the file was abandoned, if it was
    pub error: Option<String>,
}

/// Merges labeled positions into the shared table
struct TableSink<'a> {
    table: &'a StatsTable,
    total_games: &'a AtomicU64,
    counted: u64,
}

impl PositionSink for TableSink<'_> {
    fn accept(&mut self, position: &str, outcome: Outcome) -> Result<()> {
        self.table.merge(position, outcome);
        self.total_games.fetch_add(1, Ordering::Relaxed);
        self.counted += 1;
        Ok(())
    }
}

/// Bridges pgn-reader callbacks onto [`RecordHandler`] events.
///
/// The visitor API cannot return errors, so the first fatal error is parked
/// here and every later record is skipped until the caller collects it.
struct PgnAdapter<'a, S> {
    handler: RecordHandler<'a, S>,
    failure: Option<AnalyzeError>,
}

impl<'a, S: PositionSink> PgnAdapter<'a, S> {
    fn new(handler: RecordHandler<'a, S>) -> Self {
        Self {
            handler,
            failure: None,
        }
    }

    fn dispatch(&mut self, event: RecordEvent<'_>) -> Control {
        if self.failure.is_some() {
            return Control::SkipMoves;
        }

        match self.handler.handle(event) {
            Ok(control) => control,
            Err(e) => {
                self.failure = Some(e);
                Control::SkipMoves
            }
        }
    }
}

impl<S: PositionSink> Visitor for PgnAdapter<'_, S> {
    type Result = ();

    fn begin_game(&mut self) {
        self.dispatch(RecordEvent::Begin);
    }

    fn header(&mut self, key: &[u8], value: RawHeader<'_>) {
        let key = String::from_utf8_lossy(key);
        let value = String::from_utf8_lossy(value.as_bytes());
        self.dispatch(RecordEvent::Header {
            key: &key,
            value: &value,
        });
    }

    fn end_headers(&mut self) -> Skip {
        Skip(self.dispatch(RecordEvent::MovesStart) == Control::SkipMoves)
    }

    fn begin_variation(&mut self) -> Skip {
        Skip(true) // movetext is never needed
    }

    fn end_game(&mut self) -> Self::Result {
        self.dispatch(RecordEvent::End);
    }
}

/// Feeds every record in `stream` through `handler`.
///
/// Returns the number of records read. A fatal handler error is returned as
/// `Err`; an I/O or decoding failure ends the stream early and is reported in
/// the second tuple field instead.
pub fn read_records<R: Read, S: PositionSink>(
    stream: R,
    handler: RecordHandler<'_, S>,
) -> Result<(u64, Option<std::io::Error>, S)> {
    let mut adapter = PgnAdapter::new(handler);
    let mut reader = BufferedReader::new(stream);
    let mut records = 0u64;

    loop {
        match reader.read_game(&mut adapter) {
            Ok(Some(())) => {
                records += 1;
                if let Some(e) = adapter.failure.take() {
                    return Err(e);
                }
            }
            Ok(None) => return Ok((records, None, adapter.handler.into_sink())),
            Err(e) => return Ok((records, Some(e), adapter.handler.into_sink())),
        }
    }
}

/// Ingests one game file into the shared table.
///
/// Unreadable or malformed files are logged and reported in the returned
/// stats; only fatal conditions (a fix-up miss) come back as `Err`.
pub fn ingest_file(path: &Path, ctx: &IngestContext) -> Result<FileStats> {
    ctx.counters.files_started.fetch_add(1, Ordering::Relaxed);
    let mut stats = FileStats {
        path: path.to_path_buf(),
        records_read: 0,
        games_counted: 0,
        error: None,
    };

    let stream = match open_stream(path, &ctx.reader) {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Error when opening {}: {}", path.display(), e);
            ctx.counters.files_failed.fetch_add(1, Ordering::Relaxed);
            stats.error = Some(e.to_string());
            return Ok(stats);
        }
    };

    let sink = TableSink {
        table: &ctx.table,
        total_games: &ctx.counters.total_games,
        counted: 0,
    };
    let handler = RecordHandler::new(sink, ctx.fixfen.as_ref());

    let (records, failure, sink) = read_records(stream, handler)?;
    stats.records_read = records;
    stats.games_counted = sink.counted;

    if let Some(e) = failure {
        warn!(
            "Error when parsing {} after {} records: {}",
            path.display(),
            records,
            e
        );
        ctx.counters.files_failed.fetch_add(1, Ordering::Relaxed);
        stats.error = Some(e.to_string());
    } else {
        debug!(
            "Ingested {}: {} records, {} counted",
            path.display(),
            records,
            stats.games_counted
        );
    }

    Ok(stats)
}

/// Ingests `files` strictly in order.
///
/// A fatal error aborts the whole run: it is flagged on the shared counters
/// before returning, and every chunk stops before its next file once the
/// flag is up.
pub fn ingest_chunk(files: &[PathBuf], ctx: &IngestContext) -> Result<Vec<FileStats>> {
    let mut stats = Vec::with_capacity(files.len());
    for path in files {
        if ctx.counters.is_aborted() {
            debug!(
                "Run aborted, leaving {} files of this chunk unread",
                files.len() - stats.len()
            );
            break;
        }

        match ingest_file(path, ctx) {
            Ok(file_stats) => stats.push(file_stats),
            Err(e) => {
                ctx.counters.abort();
                return Err(e);
            }
        }
    }
    Ok(stats)
}
