//! Cross-tabulation of two categorical columns.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::{CaremarketError, Result};

/// An R×C table of counts over fixed row and column labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContingencyTable {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    /// `counts[r][c]` for `row_labels[r]` × `col_labels[c]`.
    pub counts: Vec<Vec<u64>>,
    /// Rows left out because a value was null or outside the label sets.
    pub excluded: usize,
}

impl ContingencyTable {
    /// Build a table from explicit counts.
    pub fn from_counts<S: AsRef<str>>(
        row_labels: &[S],
        col_labels: &[S],
        counts: Vec<Vec<u64>>,
    ) -> Result<Self> {
        let row_labels = check_labels("row", row_labels)?;
        let col_labels = check_labels("column", col_labels)?;
        if counts.len() != row_labels.len()
            || counts.iter().any(|r| r.len() != col_labels.len())
        {
            return Err(CaremarketError::InvalidArgument(format!(
                "counts do not form a {}x{} table",
                row_labels.len(),
                col_labels.len()
            )));
        }
        Ok(Self {
            row_labels,
            col_labels,
            counts,
            excluded: 0,
        })
    }

    /// Unlabeled 2×2 table `[[a, b], [c, d]]`.
    pub fn two_by_two(counts: [[u64; 2]; 2]) -> Self {
        Self {
            row_labels: vec!["0".to_string(), "1".to_string()],
            col_labels: vec!["0".to_string(), "1".to_string()],
            counts: counts.iter().map(|r| r.to_vec()).collect(),
            excluded: 0,
        }
    }

    /// (rows, columns).
    pub fn shape(&self) -> (usize, usize) {
        (self.row_labels.len(), self.col_labels.len())
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u64> {
        self.counts.get(row).and_then(|r| r.get(col)).copied()
    }

    /// Count for a pair of labels.
    pub fn count(&self, row_label: &str, col_label: &str) -> Option<u64> {
        let r = self.row_labels.iter().position(|l| l == row_label)?;
        let c = self.col_labels.iter().position(|l| l == col_label)?;
        self.get(r, c)
    }

    pub fn row_sums(&self) -> Vec<u64> {
        self.counts.iter().map(|r| r.iter().sum()).collect()
    }

    pub fn col_sums(&self) -> Vec<u64> {
        (0..self.col_labels.len())
            .map(|c| self.counts.iter().map(|r| r[c]).sum())
            .collect()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().flatten().sum()
    }

    /// Whether some row or column sums to zero.
    pub fn has_zero_margin(&self) -> bool {
        self.row_sums().contains(&0) || self.col_sums().contains(&0)
    }
}

/// Count rows by the values of two columns over fixed label universes.
///
/// Cells are matched by their text form, so an integer `1` matches the label
/// `"1"`. Rows whose values are null or outside the labels are not counted
/// but are tallied in [`ContingencyTable::excluded`].
pub fn build_contingency<S: AsRef<str>>(
    dataset: &Dataset,
    row_column: &str,
    col_column: &str,
    row_labels: &[S],
    col_labels: &[S],
) -> Result<ContingencyTable> {
    let row_col = dataset.schema().require(row_column)?;
    let col_col = dataset.schema().require(col_column)?;
    let row_labels = check_labels("row", row_labels)?;
    let col_labels = check_labels("column", col_labels)?;

    let row_index: IndexMap<&str, usize> = row_labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();
    let col_index: IndexMap<&str, usize> = col_labels
        .iter()
        .enumerate()
        .map(|(i, l)| (l.as_str(), i))
        .collect();

    let mut counts = vec![vec![0u64; col_labels.len()]; row_labels.len()];
    let mut excluded = 0;
    for row in dataset.rows() {
        let (rv, cv) = (&row[row_col], &row[col_col]);
        if rv.is_null() || cv.is_null() {
            excluded += 1;
            continue;
        }
        let r = row_index.get(rv.to_string().as_str()).copied();
        let c = col_index.get(cv.to_string().as_str()).copied();
        match (r, c) {
            (Some(r), Some(c)) => counts[r][c] += 1,
            _ => excluded += 1,
        }
    }

    debug!(
        "crosstab {} x {}: {} counted, {} excluded",
        row_column,
        col_column,
        dataset.row_count() - excluded,
        excluded
    );
    if excluded > 0 {
        warn!(
            "crosstab {} x {}: {} row(s) outside the label sets were not counted",
            row_column, col_column, excluded
        );
    }

    Ok(ContingencyTable {
        row_labels,
        col_labels,
        counts,
        excluded,
    })
}

fn check_labels<S: AsRef<str>>(axis: &str, labels: &[S]) -> Result<Vec<String>> {
    if labels.is_empty() {
        return Err(CaremarketError::InvalidArgument(format!(
            "{} labels must not be empty",
            axis
        )));
    }
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label.as_ref()) {
            return Err(CaremarketError::InvalidArgument(format!(
                "duplicate {} label '{}'",
                axis,
                label.as_ref()
            )));
        }
    }
    Ok(labels.iter().map(|l| l.as_ref().to_string()).collect())
}
