//! Herfindahl-Hirschman market concentration.

use std::collections::BTreeMap;
use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};

use super::rate::read_number;
use crate::data::{AggregatedMetric, Dataset, Row, SortOrder, Value};
use crate::error::{CaremarketError, Result};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};

/// Name of the column written by [`hhi_by_group`].
pub const HHI_COLUMN: &str = "HHI";

/// Unit of a market-share column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareScale {
    /// Shares in 0..=1.
    #[default]
    Fraction,
    /// Shares in 0..=100.
    Percent,
}

impl ShareScale {
    fn to_percent(self, share: f64) -> f64 {
        match self {
            ShareScale::Fraction => share * 100.0,
            ShareScale::Percent => share,
        }
    }
}

/// Sum of squared percentage shares, from 0 up to 10 000 for a monopoly.
pub fn hhi(shares: &[f64]) -> f64 {
    shares.iter().map(|s| s * s).sum()
}

/// HHI over every non-null value of `share_col`.
pub fn hhi_of(dataset: &Dataset, share_col: &str, scale: ShareScale) -> Result<AggregatedMetric> {
    let col = dataset.schema().require(share_col)?;
    let mut shares = Vec::with_capacity(dataset.row_count());
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        if let Some(s) = read_number(&row[col], share_col, row_idx)? {
            shares.push(scale.to_percent(s));
        }
    }
    Ok(AggregatedMetric {
        name: HHI_COLUMN.to_string(),
        value: hhi(&shares),
        provenance: dataset.provenance().clone(),
    })
}

/// HHI per group, one row per distinct key with an `HHI` float column.
///
/// Rows are ordered by HHI descending, ties broken by key ascending.
pub fn hhi_by_group<S: AsRef<str>>(
    dataset: &Dataset,
    group_keys: &[S],
    share_col: &str,
    scale: ShareScale,
) -> Result<Dataset> {
    if group_keys.is_empty() {
        return Err(CaremarketError::InvalidArgument(
            "grouping needs at least one key column".to_string(),
        ));
    }
    let key_cols = dataset.schema().require_all(group_keys)?;
    let share = dataset.schema().require(share_col)?;

    let mut groups: BTreeMap<Vec<Value>, f64> = BTreeMap::new();
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let key: Vec<Value> = key_cols.iter().map(|&c| row[c].clone()).collect();
        let sum = groups.entry(key).or_insert(0.0);
        if let Some(s) = read_number(&row[share], share_col, row_idx)? {
            let pct = scale.to_percent(s);
            *sum += pct * pct;
        }
    }

    let mut columns: Vec<ColumnSchema> = key_cols
        .iter()
        .map(|&c| dataset.schema().columns[c].clone())
        .collect();
    columns.push(ColumnSchema::new(HHI_COLUMN, ColumnType::Float));
    let schema = TableSchema::with_columns(columns)?;

    let rows: Vec<Row> = groups
        .into_iter()
        .map(|(mut key, index)| {
            key.push(Value::Float(index));
            key
        })
        .collect();
    debug!("hhi by {} groups over {}", rows.len(), share_col);

    let mut order = vec![(HHI_COLUMN, SortOrder::Descending)];
    let names: Vec<&str> = group_keys.iter().map(|k| k.as_ref()).collect();
    order.extend(names.iter().map(|&n| (n, SortOrder::Ascending)));

    Dataset::from_parts(schema, rows, dataset.provenance().clone())
        .with_step("hhi", format!("{} by {}", share_col, names.join(", ")))
        .sort_by(&order)
}

/// Concentration bands used in antitrust screening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcentrationBand {
    /// HHI below 1500.
    Low,
    /// HHI from 1500 to 2500.
    Moderate,
    /// HHI above 2500.
    High,
}

impl ConcentrationBand {
    pub fn classify(hhi: f64) -> Self {
        if hhi < 1500.0 {
            ConcentrationBand::Low
        } else if hhi <= 2500.0 {
            ConcentrationBand::Moderate
        } else {
            ConcentrationBand::High
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConcentrationBand::Low => "competitive",
            ConcentrationBand::Moderate => "moderately concentrated",
            ConcentrationBand::High => "highly concentrated",
        }
    }
}

impl fmt::Display for ConcentrationBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
