use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::discovery::{descriptor_path, FileRecord};
use crate::error::{AnalyzeError, Result};

/// Metadata for one logical test, read from `<test_base>.json`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestDescriptor {
    pub book: Option<String>,
    /// Present-only flag: `Some(true)` when the test was an SPRT
    pub sprt: Option<bool>,
    pub book_depth: Option<u32>,
}

#[derive(Deserialize)]
struct RawDescriptor {
    #[serde(default)]
    args: Map<String, Value>,
}

impl TestDescriptor {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let raw: RawDescriptor = serde_json::from_str(text)?;
        Ok(Self::from_args(&raw.args))
    }

    fn from_args(args: &Map<String, Value>) -> Self {
        let book = args.get("book").and_then(Value::as_str).map(str::to_owned);

        let sprt = args
            .get("sprt")
            .filter(|value| !value.is_null())
            .map(|_| true);

        // book_depth is written as a string by the test server, accept numbers too
        let book_depth = args.get("book_depth").and_then(|value| match value {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            _ => None,
        });

        Self {
            book,
            sprt,
            book_depth,
        }
    }

    /// Reads the descriptor, `Ok(None)` when there is no such file
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AnalyzeError::io(path, e)),
        };

        Self::from_json(&text)
            .map(Some)
            .map_err(|source| AnalyzeError::Descriptor {
                path: path.to_path_buf(),
                source,
            })
    }
}

/// One test id: the first base path seen for it and its descriptor, if any
#[derive(Debug, Clone)]
pub struct TestEntry {
    pub base: PathBuf,
    pub descriptor: Option<TestDescriptor>,
}

/// Resolved metadata for every test id found during discovery
#[derive(Debug, Default)]
pub struct MetadataIndex {
    tests: HashMap<String, TestEntry>,
    conflicts: Vec<PathBuf>,
}

impl MetadataIndex {
    pub fn entry(&self, test_id: &str) -> Option<&TestEntry> {
        self.tests.get(test_id)
    }

    /// Descriptor that governs filtering for `file`
    pub fn descriptor_for(&self, file: &FileRecord) -> Option<&TestDescriptor> {
        self.entry(&file.test_id)
            .and_then(|entry| entry.descriptor.as_ref())
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn descriptor_count(&self) -> usize {
        self.tests.values().filter(|e| e.descriptor.is_some()).count()
    }

    /// Base paths that collided with an earlier test of the same id
    pub fn conflicts(&self) -> &[PathBuf] {
        &self.conflicts
    }
}

/// Groups files by test id and loads each test's descriptor once.
///
/// The first file seen for a test id fixes its base path. A later file with
/// the same id under a different base path is a duplicate test: fatal unless
/// `allow_duplicates`, in which case it is reported once per base path and
/// attributed to the first-seen test.
pub fn resolve_metadata(files: &[FileRecord], allow_duplicates: bool) -> Result<MetadataIndex> {
    let mut index = MetadataIndex::default();
    let mut warned: HashSet<PathBuf> = HashSet::new();

    for file in files {
        if let Some(entry) = index.tests.get(&file.test_id) {
            if entry.base != file.test_base && warned.insert(file.test_base.clone()) {
                let directory = file
                    .path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();

                if !allow_duplicates {
                    return Err(AnalyzeError::DuplicateTest {
                        test_id: file.test_id.clone(),
                        directory,
                    });
                }

                warn!(
                    "Detected a duplicate of test {} in directory {}",
                    file.test_id,
                    directory.display()
                );
                index.conflicts.push(file.test_base.clone());
            }
            continue;
        }

        let path = descriptor_path(&file.test_base);
        let descriptor = TestDescriptor::load(&path)?;
        if descriptor.is_none() {
            debug!("No descriptor for test {} at {}", file.test_id, path.display());
        }

        index.tests.insert(
            file.test_id.clone(),
            TestEntry {
                base: file.test_base.clone(),
                descriptor,
            },
        );
    }

    info!(
        "Resolved {} tests, {} with descriptors, {} duplicate(s)",
        index.test_count(),
        index.descriptor_count(),
        index.conflicts.len()
    );

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_descriptor_fields() {
        let descriptor = TestDescriptor::from_json(
            r#"{"args": {"book": "UHO_4060_v3.epd", "sprt": {"elo0": 0}, "book_depth": "8"}}"#,
        )
        .unwrap();
        assert_eq!(descriptor.book.as_deref(), Some("UHO_4060_v3.epd"));
        assert_eq!(descriptor.sprt, Some(true));
        assert_eq!(descriptor.book_depth, Some(8));
    }

    #[test]
    fn test_descriptor_missing_fields() {
        let descriptor = TestDescriptor::from_json(r#"{"args": {"tc": "10+0.1"}}"#).unwrap();
        assert_eq!(descriptor, TestDescriptor::default());

        let descriptor = TestDescriptor::from_json(r#"{"other": 1}"#).unwrap();
        assert_eq!(descriptor, TestDescriptor::default());
    }

    #[test]
    fn test_descriptor_numeric_and_bad_depth() {
        let descriptor = TestDescriptor::from_json(r#"{"args": {"book_depth": 12}}"#).unwrap();
        assert_eq!(descriptor.book_depth, Some(12));

        let descriptor = TestDescriptor::from_json(r#"{"args": {"book_depth": "deep"}}"#).unwrap();
        assert_eq!(descriptor.book_depth, None);
    }

    #[test]
    fn test_descriptor_loaded_once_per_test() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "testA.json", r#"{"args": {"book": "X"}}"#);
        let files = vec![
            FileRecord::new(write(root, "testA-1.pgn", "")),
            FileRecord::new(write(root, "testA-2.pgn", "")),
            FileRecord::new(write(root, "testB-1.pgn", "")),
        ];

        let index = resolve_metadata(&files, false).unwrap();
        assert_eq!(index.test_count(), 2);
        assert_eq!(index.descriptor_count(), 1);
        assert_eq!(
            index.descriptor_for(&files[1]).and_then(|d| d.book.as_deref()),
            Some("X")
        );
        assert!(index.descriptor_for(&files[2]).is_none());
        assert!(index.conflicts().is_empty());
    }

    #[test]
    fn test_duplicate_test_is_fatal_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let files = vec![
            FileRecord::new(write(root, "d1/testA-1.pgn", "")),
            FileRecord::new(write(root, "d2/testA-1.pgn", "")),
        ];

        let result = resolve_metadata(&files, false);
        match result {
            Err(AnalyzeError::DuplicateTest { test_id, directory }) => {
                assert_eq!(test_id, "testA");
                assert!(directory.ends_with("d2"));
            }
            other => panic!("expected duplicate test error, got {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_test_allowed_uses_first_descriptor() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "d1/testA.json", r#"{"args": {"book": "first"}}"#);
        write(root, "d2/testA.json", r#"{"args": {"book": "second"}}"#);
        let files = vec![
            FileRecord::new(write(root, "d1/testA-1.pgn", "")),
            FileRecord::new(write(root, "d2/testA-1.pgn", "")),
            FileRecord::new(write(root, "d2/testA-2.pgn", "")),
        ];

        let index = resolve_metadata(&files, true).unwrap();
        assert_eq!(index.conflicts().len(), 1);
        for file in &files {
            assert_eq!(
                index.descriptor_for(file).and_then(|d| d.book.as_deref()),
                Some("first")
            );
        }
    }

    #[test]
    fn test_malformed_descriptor_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "bad.json", "{not json");
        let files = vec![FileRecord::new(write(root, "bad-1.pgn", ""))];

        let result = resolve_metadata(&files, false);
        assert!(matches!(result, Err(AnalyzeError::Descriptor { .. })));
    }
}
