//! Delimited-text loader with delimiter detection and column typing.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::source::SourceMetadata;
use crate::data::{Dataset, Provenance, Value};
use crate::error::{CaremarketError, Result};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};

/// Delimiters to try when auto-detecting.
const DELIMITERS: &[u8] = &[b'\t', b',', b';', b'|'];

/// Tokens read as missing values unless configured otherwise.
const DEFAULT_NULL_VALUES: &[&str] = &["", "NA", "N/A", "null", "none", "nil", ".", "-"];

/// Loader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Delimiter to use (None = auto-detect).
    pub delimiter: Option<u8>,
    /// Whether the file has a header row.
    pub has_header: bool,
    /// Maximum rows to read (None = all).
    pub max_rows: Option<usize>,
    /// Lines to skip before the header (title rows in exported reports).
    pub skip_rows: usize,
    /// Quote character.
    pub quote: u8,
    /// Load only these columns, in this order (None = all).
    pub columns: Option<Vec<String>>,
    /// Values read as null, compared case-insensitively after trimming.
    pub null_values: Vec<String>,
    /// Declared types overriding inference.
    pub column_types: IndexMap<String, ColumnType>,
    /// Columns that may not hold nulls, such as join keys.
    pub required_columns: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            delimiter: None,
            has_header: true,
            max_rows: None,
            skip_rows: 0,
            quote: b'"',
            columns: None,
            null_values: DEFAULT_NULL_VALUES.iter().map(|s| s.to_string()).collect(),
            column_types: IndexMap::new(),
            required_columns: Vec::new(),
        }
    }
}

impl LoaderConfig {
    /// Declare the type of one column.
    pub fn with_column_type(mut self, column: impl Into<String>, column_type: ColumnType) -> Self {
        self.column_types.insert(column.into(), column_type);
        self
    }

    /// Load only the given columns.
    pub fn with_columns<S: Into<String>>(mut self, columns: impl IntoIterator<Item = S>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Reject nulls in `column`.
    pub fn with_required_column(mut self, column: impl Into<String>) -> Self {
        self.required_columns.push(column.into());
        self
    }

    /// Add a token to read as null.
    pub fn with_null_value(mut self, token: impl Into<String>) -> Self {
        self.null_values.push(token.into());
        self
    }
}

/// Loads tabular data files into datasets.
pub struct Loader {
    config: LoaderConfig,
}

impl Loader {
    /// Create a new loader with default configuration.
    pub fn new() -> Self {
        Self {
            config: LoaderConfig::default(),
        }
    }

    /// Create a loader with custom configuration.
    pub fn with_config(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// Load a file and return the dataset and its metadata.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<(Dataset, SourceMetadata)> {
        let path = path.as_ref();
        let contents = fs::read(path).map_err(|e| CaremarketError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        let body = skip_lines(&contents, self.config.skip_rows);
        let delimiter = match self.config.delimiter {
            Some(d) => d,
            None => detect_delimiter(body)?,
        };

        let file_name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dataset = self
            .parse(body, delimiter)?
            .with_provenance(Provenance::new().with_step("load", file_name));

        let metadata =
            SourceMetadata::describe(path, &contents, delimiter, self.config.skip_rows, &dataset);
        info!(
            "Loaded {} ({} rows x {} columns, {})",
            metadata.file, metadata.row_count, metadata.column_count, metadata.format
        );

        Ok((dataset, metadata))
    }

    /// Load in-memory bytes.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<Dataset> {
        let body = skip_lines(bytes, self.config.skip_rows);
        let delimiter = match self.config.delimiter {
            Some(d) => d,
            None => detect_delimiter(body)?,
        };
        Ok(self
            .parse(body, delimiter)?
            .with_provenance(Provenance::new().with_step("load", "<memory>")))
    }

    /// Load an in-memory string.
    pub fn load_str(&self, text: &str) -> Result<Dataset> {
        self.load_bytes(text.as_bytes())
    }

    fn parse(&self, bytes: &[u8], delimiter: u8) -> Result<Dataset> {
        let (headers, raw_rows) = self.read_records(bytes, delimiter)?;

        let selected: Vec<usize> = match &self.config.columns {
            Some(wanted) => {
                let available: Vec<&str> = headers.iter().map(|h| h.as_str()).collect();
                wanted
                    .iter()
                    .map(|name| {
                        headers
                            .iter()
                            .position(|h| h == name)
                            .ok_or_else(|| CaremarketError::missing_column(name, &available))
                    })
                    .collect::<Result<_>>()?
            }
            None => (0..headers.len()).collect(),
        };

        for name in self
            .config
            .column_types
            .keys()
            .chain(self.config.required_columns.iter())
        {
            if !selected.iter().any(|&i| &headers[i] == name) {
                let available: Vec<&str> = selected.iter().map(|&i| headers[i].as_str()).collect();
                return Err(CaremarketError::missing_column(name, &available));
            }
        }

        let mut columns = Vec::with_capacity(selected.len());
        let mut typed_columns: Vec<Vec<Value>> = Vec::with_capacity(selected.len());

        for &col_idx in &selected {
            let name = &headers[col_idx];
            let column_type = match self.config.column_types.get(name) {
                Some(declared) => *declared,
                None => self.infer_type(raw_rows.iter().map(|r| r[col_idx].as_str())),
            };

            let mut values = Vec::with_capacity(raw_rows.len());
            for (row_idx, row) in raw_rows.iter().enumerate() {
                let raw = row[col_idx].as_str();
                if self.is_null_value(raw) {
                    values.push(Value::Null);
                    continue;
                }
                let value = Value::parse_as(raw, column_type).ok_or_else(|| {
                    CaremarketError::TypeCoercion {
                        column: name.clone(),
                        row: row_idx,
                        value: raw.to_string(),
                        expected: column_type.to_string(),
                    }
                })?;
                values.push(value);
            }

            debug!("Column '{}' loaded as {}", name, column_type);
            let column = ColumnSchema::new(name.clone(), column_type);
            columns.push(if self.config.required_columns.contains(name) {
                column.required()
            } else {
                column
            });
            typed_columns.push(values);
        }

        let rows = (0..raw_rows.len())
            .map(|row_idx| {
                typed_columns
                    .iter_mut()
                    .map(|col| std::mem::take(&mut col[row_idx]))
                    .collect()
            })
            .collect();

        Dataset::new(TableSchema::with_columns(columns)?, rows)
    }

    /// Read headers and raw string rows, padded to the header width.
    fn read_records(&self, bytes: &[u8], delimiter: u8) -> Result<(Vec<String>, Vec<Vec<String>>)> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(self.config.has_header)
            .quote(self.config.quote)
            .flexible(true)
            .from_reader(bytes);

        let mut headers: Vec<String> = if self.config.has_header {
            reader
                .headers()?
                .iter()
                .map(|s| s.trim().to_string())
                .collect()
        } else {
            Vec::new()
        };

        let mut rows = Vec::new();
        for (row_idx, result) in reader.records().enumerate() {
            if let Some(max) = self.config.max_rows {
                if row_idx >= max {
                    break;
                }
            }
            let record = result?;
            if !self.config.has_header && headers.is_empty() {
                headers = (0..record.len())
                    .map(|i| format!("column_{}", i + 1))
                    .collect();
            }

            let mut row: Vec<String> = record.iter().map(|s| s.to_string()).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(CaremarketError::EmptyData("No columns found".to_string()));
        }
        if rows.is_empty() {
            return Err(CaremarketError::EmptyData("No data rows found".to_string()));
        }

        Ok((headers, rows))
    }

    /// Check if a raw value is one of the configured null tokens.
    pub fn is_null_value(&self, value: &str) -> bool {
        let trimmed = value.trim();
        self.config
            .null_values
            .iter()
            .any(|token| token.trim().eq_ignore_ascii_case(trimmed))
    }

    /// Infer the narrowest type that reads every non-null value.
    fn infer_type<'a>(&self, values: impl Iterator<Item = &'a str>) -> ColumnType {
        let mut all_int = true;
        let mut all_float = true;
        let mut all_bool = true;
        let mut seen = false;

        for raw in values {
            if self.is_null_value(raw) {
                continue;
            }
            seen = true;
            let trimmed = raw.trim();
            if all_int && trimmed.parse::<i64>().is_err() {
                all_int = false;
            }
            if all_float && !trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false) {
                all_float = false;
            }
            if all_bool
                && !(trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false"))
            {
                all_bool = false;
            }
            if !all_int && !all_float && !all_bool {
                return ColumnType::String;
            }
        }

        if !seen {
            ColumnType::Unknown
        } else if all_int {
            ColumnType::Integer
        } else if all_float {
            ColumnType::Float
        } else if all_bool {
            ColumnType::Boolean
        } else {
            ColumnType::String
        }
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Drop the first `n` lines.
fn skip_lines(bytes: &[u8], n: usize) -> &[u8] {
    let mut rest = bytes;
    for _ in 0..n {
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => rest = &rest[pos + 1..],
            None => return &[],
        }
    }
    rest
}

/// Detect the delimiter by analyzing the first few lines.
fn detect_delimiter(bytes: &[u8]) -> Result<u8> {
    let reader = BufReader::new(bytes);
    let lines: Vec<String> = reader
        .lines()
        .take(10)
        .filter_map(|l| l.ok())
        .filter(|l| !l.trim().is_empty())
        .collect();

    if lines.is_empty() {
        return Err(CaremarketError::EmptyData("No lines to analyze".to_string()));
    }

    let mut best_delimiter = b',';
    let mut best_score = 0;

    for &delim in DELIMITERS {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_delimiter_in_line(line, delim))
            .collect();

        let first_count = counts[0];
        if first_count == 0 {
            continue;
        }

        let consistent = counts.iter().all(|&c| c == first_count);
        let variance: f64 = if counts.len() > 1 {
            let mean = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
            counts.iter().map(|&c| (c as f64 - mean).powi(2)).sum::<f64>() / counts.len() as f64
        } else {
            0.0
        };

        // Higher count with lower variance wins; tab breaks ties since it rarely appears in values.
        let score = if consistent {
            first_count * 1000 + (if delim == b'\t' { 100 } else { 0 })
        } else if variance < 1.0 {
            first_count * 100
        } else {
            first_count
        };

        if score > best_score {
            best_score = score;
            best_delimiter = delim;
        }
    }

    Ok(best_delimiter)
}

/// Count delimiter occurrences in a line, respecting quotes.
fn count_delimiter_in_line(line: &str, delimiter: u8) -> usize {
    let delim_char = delimiter as char;
    let mut count = 0;
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c == delim_char && !in_quotes => count += 1,
            _ => {}
        }
    }

    count
}
