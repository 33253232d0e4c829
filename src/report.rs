use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::aggregator::Statistics;
use crate::error::{AnalyzeError, Result};
use crate::parallel_processing::AnalysisRun;

pub const CSV_HEADER: &str = "FEN, Wins, Draws, Losses";

/// Sorted report rows plus the W/D/L sums over those rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub rows: Vec<(String, Statistics)>,
    pub totals: Statistics,
}

impl Report {
    /// Sorts entries by [`Statistics`] order, FEN ascending on ties, and
    /// optionally keeps only conclusive positions.
    pub fn build(mut entries: Vec<(String, Statistics)>, conclusive_only: bool) -> Self {
        if conclusive_only {
            entries.retain(|(_, stats)| stats.is_conclusive());
        }
        entries.sort_by(|(fen_a, a), (fen_b, b)| a.cmp(b).then_with(|| fen_a.cmp(fen_b)));

        let mut totals = Statistics::default();
        for (_, stats) in &entries {
            totals.add(stats);
        }

        Self {
            rows: entries,
            totals,
        }
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::with_capacity(64 * (self.rows.len() + 1));
        out.push_str(CSV_HEADER);
        out.push('\n');
        for (fen, stats) in &self.rows {
            out.push_str(&csv_row(fen, stats));
        }
        out
    }

    /// Writes the CSV report
    /// WHY: async buffered writes keep multi-million row reports off the runtime threads' critical path
    pub async fn write_csv(&self, path: &Path) -> Result<()> {
        let file = tokio::fs::File::create(path)
            .await
            .map_err(|e| AnalyzeError::io(path, e))?;
        let mut writer = BufWriter::new(file);

        let write = async {
            writer.write_all(CSV_HEADER.as_bytes()).await?;
            writer.write_all(b"\n").await?;
            for (fen, stats) in &self.rows {
                writer.write_all(csv_row(fen, stats).as_bytes()).await?;
            }
            writer.flush().await
        };
        write.await.map_err(|e| AnalyzeError::io(path, e))?;

        info!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }

    /// `Analyzed N games in total (W/D/L = w/d/l)`
    pub fn summary_line(&self, total_games: u64) -> String {
        format!(
            "Analyzed {} games in total (W/D/L = {}/{}/{})",
            total_games, self.totals.wins, self.totals.draws, self.totals.losses
        )
    }
}

fn csv_row(fen: &str, stats: &Statistics) -> String {
    format!("{}, {}, {}, {}\n", fen, stats.wins, stats.draws, stats.losses)
}

/// Machine-readable run summary written by `--stats-out`
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RunSummary {
    pub total_games: u64,
    pub total_chunks: usize,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub duplicate_tests: usize,
    pub positions: usize,
    pub positions_reported: usize,
    pub wins: u64,
    pub draws: u64,
    pub losses: u64,
    pub conclusive_only: bool,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn new(run: &AnalysisRun, report: &Report, conclusive_only: bool) -> Self {
        Self {
            total_games: run.total_games,
            total_chunks: run.total_chunks,
            files_analyzed: run.files_analyzed,
            files_failed: run.files_failed,
            duplicate_tests: run.duplicate_tests,
            positions: run.positions,
            positions_reported: report.rows.len(),
            wins: report.totals.wins,
            draws: report.totals.draws,
            losses: report.totals.losses,
            conclusive_only,
            elapsed_ms: run.elapsed.as_millis() as u64,
        }
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            AnalyzeError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| AnalyzeError::io(path, e))
    }
}
