//! Group-by reductions.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Row, Value};
use crate::error::{CaremarketError, Result};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};

/// How a group's values collapse to one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reducer {
    Sum,
    /// Rows per group, whatever the value column holds.
    Count,
    Min,
    Max,
    Mean,
}

impl Reducer {
    fn needs_numeric(&self) -> bool {
        !matches!(self, Reducer::Count)
    }
}

#[derive(Debug, Default)]
struct Accumulator {
    rows: usize,
    present: usize,
    int_sum: i64,
    float_sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    int_min: Option<i64>,
    int_max: Option<i64>,
}

impl Accumulator {
    fn add(&mut self, value: &Value, column: &str, row: usize) -> Result<()> {
        self.rows += 1;
        let Some(x) = value.as_f64() else {
            return Ok(());
        };
        self.present += 1;
        if let Value::Integer(i) = value {
            self.int_min = Some(self.int_min.map_or(*i, |m| m.min(*i)));
            self.int_max = Some(self.int_max.map_or(*i, |m| m.max(*i)));
            self.int_sum = self.int_sum.checked_add(*i).ok_or_else(|| {
                CaremarketError::TypeCoercion {
                    column: column.to_string(),
                    row,
                    value: i.to_string(),
                    expected: "integer sum within 64-bit range".to_string(),
                }
            })?;
        }
        self.float_sum += x;
        self.min = Some(self.min.map_or(x, |m| m.min(x)));
        self.max = Some(self.max.map_or(x, |m| m.max(x)));
        Ok(())
    }

    fn finish(&self, reducer: Reducer, integral: bool) -> Value {
        // exact i64 extremes for integral columns
        match reducer {
            Reducer::Count => Value::Integer(self.rows as i64),
            Reducer::Sum if integral => Value::Integer(self.int_sum),
            Reducer::Sum => Value::Float(self.float_sum),
            Reducer::Min if integral => Value::from(self.int_min),
            Reducer::Max if integral => Value::from(self.int_max),
            Reducer::Min => Value::from(self.min),
            Reducer::Max => Value::from(self.max),
            Reducer::Mean if self.present == 0 => Value::Null,
            Reducer::Mean => Value::Float(self.float_sum / self.present as f64),
        }
    }
}

/// Group rows by `group_keys` and reduce `value_column` within each group.
///
/// Output has one row per distinct key tuple, sorted ascending by key. Null
/// keys form their own group. For numeric reducers every non-null value must
/// have a numeric reading (text such as `"1200"` is parsed); otherwise the
/// call fails naming the offending row. Nulls are skipped by numeric reducers.
pub fn group_and_reduce<S: AsRef<str>>(
    dataset: &Dataset,
    group_keys: &[S],
    value_column: &str,
    reducer: Reducer,
) -> Result<Dataset> {
    if group_keys.is_empty() {
        return Err(CaremarketError::InvalidArgument(
            "grouping needs at least one key column".to_string(),
        ));
    }
    let key_cols = dataset.schema().require_all(group_keys)?;
    let value_col = dataset.schema().require(value_column)?;

    let values: Vec<Value> = if reducer.needs_numeric() {
        numeric_column(dataset, value_col, value_column)?
    } else {
        Vec::new()
    };
    let integral = values.iter().all(|v| !matches!(v, Value::Float(_)));

    let null = Value::Null;
    let mut groups: BTreeMap<Vec<Value>, Accumulator> = BTreeMap::new();
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let key: Vec<Value> = key_cols.iter().map(|&c| row[c].clone()).collect();
        let value = values.get(row_idx).unwrap_or(&null);
        groups
            .entry(key)
            .or_default()
            .add(value, value_column, row_idx)?;
    }

    let output_type = match reducer {
        Reducer::Count => ColumnType::Integer,
        Reducer::Mean => ColumnType::Float,
        _ if integral => ColumnType::Integer,
        _ => ColumnType::Float,
    };
    let mut columns: Vec<ColumnSchema> = key_cols
        .iter()
        .map(|&c| dataset.schema().columns[c].clone())
        .collect();
    let output = ColumnSchema::new(value_column, output_type);
    columns.push(match reducer {
        Reducer::Count => output.required(),
        _ => output,
    });
    let schema = TableSchema::with_columns(columns)?;

    let rows: Vec<Row> = groups
        .into_iter()
        .map(|(mut key, acc)| {
            key.push(acc.finish(reducer, integral));
            key
        })
        .collect();

    let names: Vec<&str> = group_keys.iter().map(|k| k.as_ref()).collect();
    debug!(
        "group [{}] {:?}({}): {} rows -> {} groups",
        names.join(", "),
        reducer,
        value_column,
        dataset.row_count(),
        rows.len()
    );

    Ok(
        Dataset::from_parts(schema, rows, dataset.provenance().clone()).with_step(
            "aggregate",
            format!("{:?}({}) by {}", reducer, value_column, names.join(", ")),
        ),
    )
}

/// Number of rows per distinct key tuple, written to `output_column`.
///
/// Sorted ascending by key; null keys form their own group.
pub fn count_rows<S: AsRef<str>>(
    dataset: &Dataset,
    group_keys: &[S],
    output_column: &str,
) -> Result<Dataset> {
    if group_keys.is_empty() {
        return Err(CaremarketError::InvalidArgument(
            "grouping needs at least one key column".to_string(),
        ));
    }
    let key_cols = dataset.schema().require_all(group_keys)?;

    let mut columns: Vec<ColumnSchema> = key_cols
        .iter()
        .map(|&c| dataset.schema().columns[c].clone())
        .collect();
    columns.push(ColumnSchema::new(output_column, ColumnType::Integer).required());
    let schema = TableSchema::with_columns(columns)?;

    let mut counts: BTreeMap<Vec<Value>, i64> = BTreeMap::new();
    for row in dataset.rows() {
        let key: Vec<Value> = key_cols.iter().map(|&c| row[c].clone()).collect();
        *counts.entry(key).or_insert(0) += 1;
    }
    let rows: Vec<Row> = counts
        .into_iter()
        .map(|(mut key, n)| {
            key.push(Value::Integer(n));
            key
        })
        .collect();

    let names: Vec<&str> = group_keys.iter().map(|k| k.as_ref()).collect();
    debug!("count by [{}]: {} groups", names.join(", "), rows.len());
    Ok(
        Dataset::from_parts(schema, rows, dataset.provenance().clone())
            .with_step("count", format!("{} by {}", output_column, names.join(", "))),
    )
}

/// Keep, for each group, the first row holding the smallest `order_column` value.
///
/// Null order values are ignored; a group with only nulls keeps its first row.
/// Output preserves the original row order.
pub fn first_by_min<S: AsRef<str>>(
    dataset: &Dataset,
    group_keys: &[S],
    order_column: &str,
) -> Result<Dataset> {
    if group_keys.is_empty() {
        return Err(CaremarketError::InvalidArgument(
            "grouping needs at least one key column".to_string(),
        ));
    }
    let key_cols = dataset.schema().require_all(group_keys)?;
    let order_col = dataset.schema().require(order_column)?;

    let mut best: IndexMap<Vec<Value>, usize> = IndexMap::new();
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let key: Vec<Value> = key_cols.iter().map(|&c| row[c].clone()).collect();
        let candidate = &row[order_col];
        match best.get_mut(&key) {
            None => {
                best.insert(key, row_idx);
            }
            Some(current) => {
                let held = &dataset.rows()[*current][order_col];
                if !candidate.is_null() && (held.is_null() || candidate < held) {
                    *current = row_idx;
                }
            }
        }
    }

    let mut kept: Vec<usize> = best.into_values().collect();
    kept.sort_unstable();
    let rows = kept.iter().map(|&i| dataset.rows()[i].clone()).collect();

    let names: Vec<&str> = group_keys.iter().map(|k| k.as_ref()).collect();
    Ok(
        Dataset::from_parts(dataset.schema().clone(), rows, dataset.provenance().clone())
            .with_step(
                "first_by_min",
                format!("min {} by {}", order_column, names.join(", ")),
            ),
    )
}

/// Numeric readings of a column, failing on the first value without one.
fn numeric_column(dataset: &Dataset, col: usize, name: &str) -> Result<Vec<Value>> {
    dataset
        .rows()
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            row[col]
                .to_numeric()
                .ok_or_else(|| CaremarketError::TypeCoercion {
                    column: name.to_string(),
                    row: row_idx,
                    value: row[col].to_string(),
                    expected: "number".to_string(),
                })
        })
        .collect()
}
