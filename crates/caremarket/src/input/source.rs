//! Where a loaded dataset came from.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::data::Dataset;

/// Identity of a loaded input file, kept alongside analysis reports so a
/// result can be traced to the exact bytes it was computed from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub file: String,
    pub path: PathBuf,
    /// `sha256:<hex>` of the raw file contents.
    pub hash: String,
    pub size_bytes: u64,
    /// Format named after the delimiter (csv, tsv, ...).
    pub format: String,
    /// Title lines skipped before the header.
    pub skipped_lines: usize,
    pub row_count: usize,
    pub column_count: usize,
    pub loaded_at: DateTime<Utc>,
}

impl SourceMetadata {
    pub(crate) fn describe(
        path: &Path,
        contents: &[u8],
        delimiter: u8,
        skipped_lines: usize,
        dataset: &Dataset,
    ) -> Self {
        Self {
            file: path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path: path.to_path_buf(),
            hash: content_hash(contents),
            size_bytes: contents.len() as u64,
            format: format_name(delimiter).to_string(),
            skipped_lines,
            row_count: dataset.row_count(),
            column_count: dataset.column_count(),
            loaded_at: Utc::now(),
        }
    }

    /// Whether `contents` are the bytes this metadata was recorded from.
    pub fn matches(&self, contents: &[u8]) -> bool {
        self.hash == content_hash(contents)
    }
}

pub(crate) fn content_hash(contents: &[u8]) -> String {
    format!("sha256:{:x}", Sha256::digest(contents))
}

pub(crate) fn format_name(delimiter: u8) -> &'static str {
    match delimiter {
        b'\t' => "tsv",
        b',' => "csv",
        b';' => "csv-semicolon",
        b'|' => "psv",
        _ => "delimited",
    }
}
