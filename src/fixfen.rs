use std::borrow::Cow;
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::info;

use crate::error::{AnalyzeError, Result};
use crate::reader::{open_stream, ReaderConfig};

/// Suffix left behind by tools that reset both move counters
const RESET_COUNTERS: &str = " 0 1";

/// Move counters keyed by the first four FEN fields.
///
/// Used to restore halfmove clock and fullmove number on positions whose
/// counters were rewritten to `0 1` by the game runner.
#[derive(Debug, Default, Clone)]
pub struct FixFenTable {
    entries: HashMap<String, (u32, u32)>,
}

impl FixFenTable {
    /// Parses `board side castling ep halfmove fullmove` lines.
    /// Lines without a positive fullmove number are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> std::io::Result<Self> {
        let mut table = Self::default();

        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split_whitespace();
            let (Some(board), Some(side), Some(castling), Some(ep)) =
                (fields.next(), fields.next(), fields.next(), fields.next())
            else {
                continue;
            };

            let Some(halfmove) = fields.next().and_then(|f| f.parse::<u32>().ok()) else {
                continue;
            };
            let fullmove = match fields.next().and_then(|f| f.parse::<u32>().ok()) {
                Some(fullmove) if fullmove > 0 => fullmove,
                _ => continue,
            };

            table.insert(format!("{board} {side} {castling} {ep}"), halfmove, fullmove);
        }

        Ok(table)
    }

    pub fn load(path: &Path, config: &ReaderConfig) -> Result<Self> {
        let stream = open_stream(path, config)?;
        let table = Self::from_reader(stream).map_err(|e| AnalyzeError::io(path, e))?;
        info!(
            "Read {} move counter entries to fix FENs from {}",
            table.len(),
            path.display()
        );
        Ok(table)
    }

    /// Duplicate positions keep the lower fullmove number
    pub fn insert(&mut self, key: String, halfmove: u32, fullmove: u32) {
        self.entries
            .entry(key)
            .and_modify(|existing| {
                if fullmove < existing.1 {
                    *existing = (halfmove, fullmove);
                }
            })
            .or_insert((halfmove, fullmove));
    }

    pub fn get(&self, key: &str) -> Option<(u32, u32)> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Restores the move counters of `fen` when they read `0 1`.
    ///
    /// The table must know every such position; a miss means the reference
    /// file does not belong to these games and is fatal.
    pub fn fix<'a>(&self, fen: &'a str) -> Result<Cow<'a, str>> {
        if self.is_empty() {
            return Ok(Cow::Borrowed(fen));
        }

        match fen.strip_suffix(RESET_COUNTERS) {
            Some(stripped) if !stripped.is_empty() => match self.entries.get(stripped) {
                Some((halfmove, fullmove)) => {
                    Ok(Cow::Owned(format!("{stripped} {halfmove} {fullmove}")))
                }
                None => Err(AnalyzeError::MissingFixFen {
                    fen: stripped.to_string(),
                }),
            },
            _ => Ok(Cow::Borrowed(fen)),
        }
    }
}
