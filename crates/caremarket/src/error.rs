//! Error types for the caremarket library.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Debug, Error)]
pub enum CaremarketError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A referenced column is absent, duplicated, or has the wrong type.
    #[error("Schema error for column '{column}': {message}")]
    Schema { column: String, message: String },

    /// A value could not be interpreted as the type an operation needs.
    #[error("Cannot coerce value '{value}' in column '{column}' at row {row} to {expected}")]
    TypeCoercion {
        column: String,
        row: usize,
        value: String,
        expected: String,
    },

    /// Join keys were required to be unique but are not.
    #[error("Duplicate keys on ({}): {} duplicated key group(s), first {}", .keys.join(", "), .groups.len(), first_group(.groups))]
    DuplicateKey {
        keys: Vec<String>,
        groups: Vec<Vec<String>>,
    },

    /// A contingency table on which the test is undefined.
    #[error("Degenerate contingency table: {0}")]
    DegenerateTable(String),

    /// An argument outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Empty file or no data to process.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Regex compilation error.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

fn first_group(groups: &[Vec<String>]) -> String {
    groups
        .first()
        .map(|g| format!("({})", g.join(", ")))
        .unwrap_or_else(|| "-".to_string())
}

impl CaremarketError {
    /// Shorthand for a missing-column schema error.
    pub(crate) fn missing_column(column: &str, available: &[&str]) -> Self {
        CaremarketError::Schema {
            column: column.to_string(),
            message: format!("column not found (available: {})", available.join(", ")),
        }
    }
}

/// Result type alias for caremarket operations.
pub type Result<T> = std::result::Result<T, CaremarketError>;
