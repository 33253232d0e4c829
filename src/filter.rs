use regex_automata::meta::Regex;
use tracing::info;

use crate::discovery::FileRecord;
use crate::error::{AnalyzeError, Result};
use crate::metadata::MetadataIndex;

/// Book name pattern that must match the whole name
#[derive(Debug)]
pub struct BookMatcher {
    pattern: String,
    regex: Regex,
}

impl BookMatcher {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.is_empty() {
            return Err(AnalyzeError::Usage("--matchBook cannot be empty".to_string()));
        }

        // WHY: anchoring gives whole-string semantics, a book "UHO" must not match "UHO_v2"
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            AnalyzeError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, book: &str) -> bool {
        self.regex.is_match(book)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

/// Keeps files whose test book matches (or, inverted, does not match).
///
/// Files without a descriptor or without a book never survive, whichever way
/// the match is inverted.
pub fn filter_by_book(
    files: &mut Vec<FileRecord>,
    index: &MetadataIndex,
    matcher: &BookMatcher,
    invert: bool,
) {
    let before = files.len();
    files.retain(|file| {
        match index.descriptor_for(file).and_then(|d| d.book.as_deref()) {
            Some(book) => matcher.is_match(book) != invert,
            None => false,
        }
    });

    info!(
        "Book filter {}{:?} kept {} of {} files",
        if invert { "not " } else { "" },
        matcher.pattern(),
        files.len(),
        before
    );
}

/// Keeps only files belonging to SPRT tests
pub fn filter_sprt_only(files: &mut Vec<FileRecord>, index: &MetadataIndex) {
    let before = files.len();
    files.retain(|file| {
        index
            .descriptor_for(file)
            .and_then(|d| d.sprt)
            .unwrap_or(false)
    });

    info!("SPRT filter kept {} of {} files", files.len(), before);
}
