//! Per-row ratios between two numeric columns.

use log::debug;

use crate::data::{Dataset, Value};
use crate::error::{CaremarketError, Result};
use crate::schema::{ColumnSchema, ColumnType};

/// Append `numerator / denominator * scale` as a new `Float` column.
///
/// A null in either input or a zero denominator gives a null result and the
/// row is kept. Text cells are read as numbers where they parse; any other
/// non-numeric value fails the call.
pub fn rate(
    dataset: &Dataset,
    numerator_col: &str,
    denominator_col: &str,
    scale: f64,
    output_col: &str,
) -> Result<Dataset> {
    let num = dataset.schema().require(numerator_col)?;
    let den = dataset.schema().require(denominator_col)?;
    if dataset.schema().index_of(output_col).is_some() {
        return Err(CaremarketError::Schema {
            column: output_col.to_string(),
            message: "output column already exists".to_string(),
        });
    }
    if !scale.is_finite() {
        return Err(CaremarketError::InvalidArgument(format!(
            "rate scale must be finite, got {}",
            scale
        )));
    }

    let mut values = Vec::with_capacity(dataset.row_count());
    let mut undefined = 0;
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        let n = read_number(&row[num], numerator_col, row_idx)?;
        let d = read_number(&row[den], denominator_col, row_idx)?;
        let value = match (n, d) {
            (Some(n), Some(d)) if d != 0.0 => Value::Float(n * scale / d),
            _ => {
                undefined += 1;
                Value::Null
            }
        };
        values.push(value);
    }

    debug!(
        "rate {} = {} / {} * {}: {} rows, {} undefined",
        output_col,
        numerator_col,
        denominator_col,
        scale,
        values.len(),
        undefined
    );

    dataset.with_column(ColumnSchema::new(output_col, ColumnType::Float), values)
}

/// Fraction of `whole_col` that `part_col` represents.
pub fn share(dataset: &Dataset, part_col: &str, whole_col: &str, output_col: &str) -> Result<Dataset> {
    rate(dataset, part_col, whole_col, 1.0, output_col)
}

/// Numeric reading of a cell; `None` for null.
pub(crate) fn read_number(value: &Value, column: &str, row: usize) -> Result<Option<f64>> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .to_numeric()
        .and_then(|v| v.as_f64())
        .map(Some)
        .ok_or_else(|| CaremarketError::TypeCoercion {
            column: column.to_string(),
            row,
            value: value.to_string(),
            expected: "number".to_string(),
        })
}
