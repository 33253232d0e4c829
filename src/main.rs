use anyhow::Result;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::info;

use fenwdl::{run_analysis, AnalysisConfig, Report, RunSummary};

#[derive(Parser, Debug)]
#[command(name = "fenwdl")]
#[command(about = "Aggregates win/draw/loss statistics per starting FEN over PGN collections")]
#[command(version)]
struct Args {
    /// Root directory to scan (recursively) for *.pgn and *.pgn.gz files
    #[arg(long, default_value = "./pgns", allow_hyphen_values = true)]
    dir: PathBuf,

    /// Number of worker threads (default: available cores)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Only analyze tests whose book matches this pattern
    #[arg(long = "matchBook", allow_hyphen_values = true)]
    match_book: Option<String>,

    /// Keep tests whose book does NOT match --matchBook
    #[arg(long = "matchBookInverted", alias = "matchBookInvert")]
    match_book_inverted: bool,

    /// Warn about duplicate test ids instead of aborting
    #[arg(long = "allowDuplicates")]
    allow_duplicates: bool,

    /// Only analyze games that are part of an SPRT test
    #[arg(long = "SPRTonly", alias = "onlySprt")]
    sprt_only: bool,

    /// Book file (plain or .gz) used to restore move counters reset to "0 1"
    #[arg(long = "fixFENsource", allow_hyphen_values = true)]
    fixfen_source: Option<PathBuf>,

    /// Only report positions where every game had the same result
    #[arg(long)]
    conclusive: bool,

    /// CSV report path
    #[arg(long, default_value = "results.csv", allow_hyphen_values = true)]
    out: PathBuf,

    /// Write a JSON run summary to this path
    #[arg(long, allow_hyphen_values = true)]
    stats_out: Option<PathBuf>,

    /// Suppress the console progress bar
    #[arg(long)]
    no_progress: bool,

    /// Only scan the top level of --dir
    #[arg(long)]
    no_recursive: bool,
}

impl Args {
    fn to_config(&self) -> AnalysisConfig {
        let defaults = AnalysisConfig::default();
        AnalysisConfig {
            root_dir: self.dir.clone(),
            recursive: !self.no_recursive,
            concurrency: self.concurrency.unwrap_or(defaults.concurrency).max(1),
            match_book: self.match_book.clone(),
            match_book_inverted: self.match_book_inverted,
            allow_duplicates: self.allow_duplicates,
            sprt_only: self.sprt_only,
            fixfen_source: self.fixfen_source.clone(),
            conclusive_only: self.conclusive,
            show_progress: !self.no_progress,
            ..defaults
        }
    }
}

/// Long flags older scripts pass with a single dash (`-conclusive`)
const LEGACY_FLAGS: [&str; 10] = [
    "dir",
    "concurrency",
    "matchBook",
    "matchBookInverted",
    "matchBookInvert",
    "allowDuplicates",
    "SPRTonly",
    "onlySprt",
    "fixFENsource",
    "conclusive",
];

/// Long flags whose next argument is a value, never a flag
const VALUE_FLAGS: [&str; 6] = ["dir", "concurrency", "matchBook", "fixFENsource", "out", "stats-out"];

/// Rewrites known single-dash long flags to `--` form, leaving option values alone
fn normalize_legacy_flags<I: IntoIterator<Item = OsString>>(args: I) -> Vec<OsString> {
    let mut expects_value = false;
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            if i == 0 || std::mem::take(&mut expects_value) {
                return arg;
            }
            let Some(text) = arg.to_str() else {
                return arg;
            };

            if let Some(name) = text.strip_prefix("--") {
                expects_value = !name.contains('=') && VALUE_FLAGS.contains(&name);
                return arg;
            }
            match text.strip_prefix('-') {
                Some(name) if LEGACY_FLAGS.contains(&name) => {
                    expects_value = VALUE_FLAGS.contains(&name);
                    OsString::from(format!("--{name}"))
                }
                _ => arg,
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    // WHY: structured JSON logging on stderr keeps stdout for the human-readable summary
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .json()
        .init();

    let args = Args::parse_from(normalize_legacy_flags(std::env::args_os()));
    info!(?args, "Parsed CLI arguments");

    if args.match_book.as_deref() == Some("") {
        anyhow::bail!("--matchBook cannot be empty");
    }

    let config = args.to_config();

    println!(
        "Looking {}for pgn files in {}",
        if config.recursive { "(recursively) " } else { "" },
        config.root_dir.display()
    );
    println!("Files will be processed with concurrency {}", config.concurrency);
    if let Some(book) = &config.match_book {
        println!(
            "Filtering pgn files {}matching the book name {}",
            if config.match_book_inverted { "not " } else { "" },
            book
        );
    }
    if config.allow_duplicates {
        println!("Allow duplicate tests during the analysis.");
    }
    if config.sprt_only {
        println!("Only analyse games that are part of a SPRT test");
    }
    if let Some(source) = &config.fixfen_source {
        println!("Read in move counters to possibly fix FENs from {}", source.display());
    }

    let mut run = run_analysis(&config).await?;
    println!("Time taken: {:.3}s", run.elapsed.as_secs_f64());

    let report = Report::build(std::mem::take(&mut run.entries), config.conclusive_only);
    report.write_csv(&args.out).await?;

    println!("{}", report.summary_line(run.total_games));
    println!("Wrote results to {}", args.out.display());

    if let Some(stats_path) = &args.stats_out {
        RunSummary::new(&run, &report, config.conclusive_only)
            .write_json(stats_path)
            .await?;
        info!("Wrote run summary to {}", stats_path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_legacy_flags_are_rewritten() {
        let args = normalize_legacy_flags(os(&[
            "fenwdl",
            "-conclusive",
            "-matchBookInverted",
            "--dir",
            "games",
            "-h",
        ]));
        assert_eq!(
            args,
            os(&["fenwdl", "--conclusive", "--matchBookInverted", "--dir", "games", "-h"])
        );
    }

    #[test]
    fn test_option_values_with_leading_dash_are_kept() {
        let args = normalize_legacy_flags(os(&[
            "fenwdl",
            "--matchBook",
            "-conclusive",
            "-dir",
            "-games",
            "--out=-x.csv",
            "-unknownFlag",
            "-conclusive",
        ]));
        assert_eq!(
            args,
            os(&[
                "fenwdl",
                "--matchBook",
                "-conclusive",
                "--dir",
                "-games",
                "--out=-x.csv",
                "-unknownFlag",
                "--conclusive",
            ])
        );

        let parsed = Args::parse_from(normalize_legacy_flags(os(&[
            "fenwdl",
            "--matchBook",
            "-foo",
            "--dir",
            "-games",
        ])));
        assert_eq!(parsed.match_book.as_deref(), Some("-foo"));
        assert_eq!(parsed.dir, PathBuf::from("-games"));
    }

    #[test]
    fn test_cli_flags_map_onto_config() {
        let args = Args::parse_from(normalize_legacy_flags(os(&[
            "fenwdl",
            "--dir",
            "games",
            "--concurrency",
            "0",
            "--matchBook",
            "UHO.*",
            "-matchBookInverted",
            "--onlySprt",
            "-conclusive",
            "--fixFENsource",
            "book.epd.gz",
        ])));
        let config = args.to_config();

        assert_eq!(config.root_dir, PathBuf::from("games"));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.match_book.as_deref(), Some("UHO.*"));
        assert!(config.match_book_inverted);
        assert!(config.sprt_only);
        assert!(config.conclusive_only);
        assert!(!config.allow_duplicates);
        assert_eq!(config.fixfen_source, Some(PathBuf::from("book.epd.gz")));
        assert_eq!(args.out, PathBuf::from("results.csv"));
    }
}
