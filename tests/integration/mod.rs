// Integration test utilities and common code
// WHY: every suite needs the same fishtest-style tree of game files and descriptors

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
pub const SICILIAN: &str = "rnbqkbnr/pp1ppppp/8/2p5/4P3/8/PPPP1PPP/RNBQKBNR w KQkq c6 0 2";

/// One game record as a fixture line up
#[derive(Debug, Clone, Copy)]
pub struct Game<'a> {
    pub result: &'a str,
    pub fen: Option<&'a str>,
    pub termination: Option<&'a str>,
}

impl<'a> Game<'a> {
    pub fn new(result: &'a str) -> Self {
        Self {
            result,
            fen: None,
            termination: None,
        }
    }

    pub fn from_fen(fen: &'a str, result: &'a str) -> Self {
        Self {
            fen: Some(fen),
            ..Self::new(result)
        }
    }

    pub fn terminated(mut self, termination: &'a str) -> Self {
        self.termination = Some(termination);
        self
    }
}

/// Renders games as PGN text with a little movetext noise in each record
pub fn pgn_text(games: &[Game<'_>]) -> String {
    let mut text = String::new();
    for (round, game) in games.iter().enumerate() {
        text.push_str(&format!("[Event \"fixture\"]\n[Round \"{}\"]\n", round + 1));
        if let Some(fen) = game.fen {
            text.push_str(&format!("[FEN \"{fen}\"]\n[SetUp \"1\"]\n"));
        }
        if let Some(termination) = game.termination {
            text.push_str(&format!("[Termination \"{termination}\"]\n"));
        }
        text.push_str(&format!(
            "[Result \"{}\"]\n\n1. e4 {{+0.31/12 0.5s}} e5 2. Nf3 (2. f4 exf4) Nc6 {}\n\n",
            game.result, game.result
        ));
    }
    text
}

/// Test fixture helper for a temporary directory of game files and descriptors
pub struct TestFixture {
    pub temp_dir: TempDir,
    pub root_path: PathBuf,
}

impl TestFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root_path = temp_dir.path().to_path_buf();

        Self {
            temp_dir,
            root_path,
        }
    }

    fn prepare(&self, relative_path: &Path) -> PathBuf {
        let file_path = self.root_path.join(relative_path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        file_path
    }

    /// Writes a plain `.pgn` file
    pub fn create_pgn<P: AsRef<Path>>(&self, relative_path: P, games: &[Game<'_>]) -> PathBuf {
        let file_path = self.prepare(relative_path.as_ref());
        fs::write(&file_path, pgn_text(games)).expect("Failed to write pgn file");
        file_path
    }

    /// Writes a gzip-compressed `.pgn.gz` file
    pub fn create_pgn_gz<P: AsRef<Path>>(&self, relative_path: P, games: &[Game<'_>]) -> PathBuf {
        let file_path = self.prepare(relative_path.as_ref());
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(pgn_text(games).as_bytes())
            .expect("Failed to compress pgn text");
        fs::write(&file_path, encoder.finish().expect("Failed to finish gzip stream"))
            .expect("Failed to write pgn.gz file");
        file_path
    }

    /// Writes `<relative_base>.json` with the given `args` object
    pub fn create_descriptor<P: AsRef<Path>>(&self, relative_base: P, args: serde_json::Value) -> PathBuf {
        let mut raw = relative_base.as_ref().as_os_str().to_owned();
        raw.push(".json");
        let file_path = self.prepare(Path::new(&raw));
        let json = serde_json::json!({ "args": args });
        fs::write(&file_path, json.to_string()).expect("Failed to write descriptor");
        file_path
    }

    /// Writes an arbitrary file, e.g. a move counter source
    pub fn create_file<P: AsRef<Path>>(&self, relative_path: P, content: &str) -> PathBuf {
        let file_path = self.prepare(relative_path.as_ref());
        fs::write(&file_path, content).expect("Failed to write file");
        file_path
    }

    pub fn path<P: AsRef<Path>>(&self, relative_path: P) -> PathBuf {
        self.root_path.join(relative_path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
