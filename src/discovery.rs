use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{AnalyzeError, Result};

/// Configuration for file discovery behavior
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Whether to descend into subdirectories of the root
    pub recursive: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { recursive: true }
    }
}

/// A discovered game file and the test it belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub path: PathBuf,
    /// File name up to the first `-` or `.`
    pub test_id: String,
    /// `parent / test_id`, the path the test descriptor hangs off
    pub test_base: PathBuf,
}

impl FileRecord {
    pub fn new(path: PathBuf) -> Self {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let test_id = test_id_of(&file_name).to_string();
        let test_base = path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&test_id);

        Self {
            path,
            test_id,
            test_base,
        }
    }

    /// Side-car descriptor path for this file's test
    pub fn descriptor_path(&self) -> PathBuf {
        descriptor_path(&self.test_base)
    }
}

/// `<base>.json`
pub fn descriptor_path(test_base: &Path) -> PathBuf {
    let mut raw = test_base.as_os_str().to_owned();
    raw.push(".json");
    PathBuf::from(raw)
}

fn test_id_of(file_name: &str) -> &str {
    match file_name.find(['-', '.']) {
        Some(end) => &file_name[..end],
        None => file_name,
    }
}

/// True for `*.pgn`, and for `*.gz` whose stem ends in `.pgn`
pub fn is_game_file(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("pgn") => true,
        Some("gz") => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.len() >= 4 && stem.ends_with(".pgn")),
        _ => false,
    }
}

/// Lists game files under `root_dir` in directory traversal order.
///
/// Only regular files (after following symlinks) named `*.pgn` or `*.pgn.gz`
/// are returned. Any traversal error, including a missing root, aborts
/// discovery.
pub fn discover_files(root_dir: impl AsRef<Path>, config: &DiscoveryConfig) -> Result<Vec<FileRecord>> {
    let root = root_dir.as_ref();
    let mut walker = WalkDir::new(root).follow_links(true).min_depth(1);
    if !config.recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| AnalyzeError::Discovery {
            root: root.to_path_buf(),
            source,
        })?;

        if !entry.file_type().is_file() || !is_game_file(entry.path()) {
            continue;
        }

        debug!("Found game file: {}", entry.path().display());
        files.push(FileRecord::new(entry.into_path()));
    }

    Ok(files)
}

/// Runs discovery on the blocking pool and logs a summary
/// WHY: directory walks on network storage can take seconds and must not stall the runtime
pub async fn collect_discovered_files(
    root_dir: impl AsRef<Path>,
    config: DiscoveryConfig,
) -> Result<Vec<FileRecord>> {
    let root = root_dir.as_ref().to_path_buf();
    info!(
        "Looking {}for pgn files in {}",
        if config.recursive { "(recursively) " } else { "" },
        root.display()
    );

    let start = std::time::Instant::now();
    let files = tokio::task::spawn_blocking(move || discover_files(&root, &config))
        .await
        .map_err(|e| AnalyzeError::Worker(e.to_string()))??;

    let compressed = files
        .iter()
        .filter(|f| f.path.extension().is_some_and(|ext| ext == "gz"))
        .count();
    info!(
        "Discovered {} files ({} gzip-compressed) in {}ms",
        files.len(),
        compressed,
        start.elapsed().as_millis()
    );

    Ok(files)
}
