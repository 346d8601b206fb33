//! Batch analysis of SQL script trees.
//!
//! The core is stateless per call, so a directory scan fans out one worker
//! per file. A file that cannot be read or decoded is logged and skipped; a
//! single bad file never aborts the run.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, anyhow};
use encoding_rs::{EUC_KR, Encoding, UTF_8};
use rayon::prelude::*;
use regex::Regex;
use serde::Serialize;
use walkdir::WalkDir;

use crate::extract::{LineageResult, TableExtractor};

/// Files above this size are skipped rather than analyzed.
const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Reads SQL files with a configured character encoding.
pub struct SqlReader {
    encoding: &'static Encoding,
    keyword_probe: Regex,
}

impl Default for SqlReader {
    fn default() -> Self {
        Self::new(UTF_8)
    }
}

impl SqlReader {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            keyword_probe: Regex::new(r"(?i)\b(?:INSERT|FROM|JOIN|UPDATE|DELETE|MERGE)\b")
                .expect("valid regex"),
        }
    }

    /// Resolves a WHATWG encoding label such as `utf-8` or `euc-kr`.
    pub fn for_label(label: &str) -> anyhow::Result<Self> {
        let encoding = Encoding::for_label(label.as_bytes())
            .ok_or_else(|| anyhow!("unknown encoding label: {}", label))?;
        Ok(Self::new(encoding))
    }

    /// Reads and decodes one file, replacing malformed sequences.
    ///
    /// Legacy trees mix encodings, so when the configured decoding surfaces
    /// none of the anchor SQL keywords the bytes are re-decoded as EUC-KR and
    /// that reading is kept if it does contain keywords.
    pub fn read(&self, path: &Path) -> anyhow::Result<String> {
        let bytes =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let (content, ..) = self.encoding.decode(&bytes);
        if self.encoding == EUC_KR || self.keyword_probe.is_match(&content) {
            return Ok(content.into_owned());
        }
        let (alt, ..) = EUC_KR.decode(&bytes);
        if self.keyword_probe.is_match(&alt) {
            log::debug!(
                "{}: no SQL keywords under {}, keeping EUC-KR decoding",
                path.display(),
                self.encoding.name()
            );
            return Ok(alt.into_owned());
        }
        Ok(content.into_owned())
    }
}

/// Recursively collects `.sql` files (case-insensitive extension) under
/// `root`, in a stable name order, skipping oversized files.
pub fn find_sql_files(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("skipping unreadable directory entry: {}", err);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
        })
        .filter(|entry| match entry.metadata() {
            Ok(meta) if meta.len() > MAX_FILE_SIZE => {
                log::warn!(
                    "skipping oversized file ({} bytes): {}",
                    meta.len(),
                    entry.path().display()
                );
                false
            }
            _ => true,
        })
        .map(|entry| entry.into_path())
        .collect()
}

/// Lineage of a single analyzed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileAnalysis {
    pub path: PathBuf,
    pub lineage: LineageResult,
}

/// Analyzes every `.sql` file under `root`, one rayon worker per file.
pub fn analyze_dir(
    root: &Path,
    reader: &SqlReader,
    extractor: &TableExtractor,
) -> Vec<FileAnalysis> {
    let files = find_sql_files(root);
    log::info!("analyzing {} SQL files under {}", files.len(), root.display());
    files
        .par_iter()
        .filter_map(|path| match reader.read(path) {
            Ok(sql) => Some(FileAnalysis {
                path: path.clone(),
                lineage: extractor.extract(&sql),
            }),
            Err(err) => {
                log::warn!("skipping {}: {}", path.display(), err);
                None
            }
        })
        .collect()
}
