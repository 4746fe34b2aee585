//! Immutable tabular datasets.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::Serialize;

use super::provenance::Provenance;
use super::value::Value;
use crate::error::{CaremarketError, Result};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};

/// A row, positionally aligned with its dataset's schema.
pub type Row = Vec<Value>;

/// Sort direction for [`Dataset::sort_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// An ordered sequence of rows sharing one schema.
///
/// Every row has exactly one value per schema column and every non-null value
/// matches its column's declared type. Datasets are never mutated: each
/// operation returns a new one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    schema: TableSchema,
    rows: Vec<Row>,
    provenance: Provenance,
}

impl Dataset {
    /// Create a dataset, validating every row against the schema.
    ///
    /// Integer values in a `Float` column are widened; any other type mismatch
    /// fails with a coercion error naming the column and row.
    pub fn new(schema: TableSchema, rows: Vec<Row>) -> Result<Self> {
        let width = schema.column_count();
        let mut validated = Vec::with_capacity(rows.len());

        for (row_idx, mut row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(CaremarketError::InvalidArgument(format!(
                    "row {} has {} values but the schema has {} columns",
                    row_idx,
                    row.len(),
                    width
                )));
            }
            for (col_idx, value) in row.iter_mut().enumerate() {
                let column = &schema.columns[col_idx];
                check_value(column, value, row_idx)?;
            }
            validated.push(row);
        }

        Ok(Self {
            schema,
            rows: validated,
            provenance: Provenance::new(),
        })
    }

    /// Create a dataset from column names and rows, inferring column types.
    ///
    /// A column holding only integers is `Integer`; integers mixed with floats
    /// become `Float`; only nulls gives `Unknown`. Any other mix is an error.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: Vec<Row>) -> Result<Self> {
        let mut columns = Vec::with_capacity(names.len());
        for (col_idx, name) in names.iter().enumerate() {
            let name = name.as_ref();
            let mut inferred = ColumnType::Unknown;
            for (row_idx, row) in rows.iter().enumerate() {
                let Some(value) = row.get(col_idx) else {
                    continue;
                };
                let Some(value_type) = value.column_type() else {
                    continue;
                };
                inferred = match (inferred, value_type) {
                    (ColumnType::Unknown, t) => t,
                    (a, b) if a == b => a,
                    (ColumnType::Integer, ColumnType::Float)
                    | (ColumnType::Float, ColumnType::Integer) => ColumnType::Float,
                    (a, _) => {
                        return Err(CaremarketError::TypeCoercion {
                            column: name.to_string(),
                            row: row_idx,
                            value: value.to_string(),
                            expected: a.to_string(),
                        });
                    }
                };
            }
            columns.push(ColumnSchema::new(name, inferred));
        }
        Self::new(TableSchema::with_columns(columns)?, rows)
    }

    /// Assemble a dataset from parts already known to be valid.
    pub(crate) fn from_parts(schema: TableSchema, rows: Vec<Row>, provenance: Provenance) -> Self {
        Self {
            schema,
            rows,
            provenance,
        }
    }

    /// Same dataset with one more provenance step.
    pub(crate) fn with_step(mut self, stage: &str, detail: impl Into<String>) -> Self {
        self.provenance = self.provenance.with_step(stage, detail);
        self
    }

    /// Replace the provenance, e.g. to record where loaded data came from.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    /// Get the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.schema.column_count()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema.column_names()
    }

    /// Get a cell by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.schema.index_of(column)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// All values of one column, in row order.
    pub fn column(&self, name: &str) -> Result<Vec<&Value>> {
        let col = self.schema.require(name)?;
        Ok(self.rows.iter().map(|r| &r[col]).collect())
    }

    /// A row as an ordered column name to value mapping.
    pub fn row_map(&self, row: usize) -> Option<IndexMap<&str, &Value>> {
        let values = self.rows.get(row)?;
        Some(
            self.schema
                .columns
                .iter()
                .map(|c| c.name.as_str())
                .zip(values.iter())
                .collect(),
        )
    }

    /// Keep only the named columns, in the given order.
    pub fn select<S: AsRef<str>>(&self, columns: &[S]) -> Result<Dataset> {
        let indices = self.schema.require_all(columns)?;
        let schema = TableSchema::with_columns(
            indices
                .iter()
                .map(|&i| self.schema.columns[i].clone())
                .collect(),
        )?;
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();
        let names: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
        Ok(Dataset::from_parts(schema, rows, self.provenance.clone())
            .with_step("select", names.join(", ")))
    }

    /// Rename one column.
    pub fn rename_column(&self, from: &str, to: &str) -> Result<Dataset> {
        let idx = self.schema.require(from)?;
        let mut columns = self.schema.columns.clone();
        columns[idx] = columns[idx].renamed(to);
        let schema = TableSchema::with_columns(columns)?;
        Ok(
            Dataset::from_parts(schema, self.rows.clone(), self.provenance.clone())
                .with_step("rename", format!("{} -> {}", from, to)),
        )
    }

    /// Stable sort by one or more columns.
    pub fn sort_by(&self, keys: &[(&str, SortOrder)]) -> Result<Dataset> {
        let mut resolved = Vec::with_capacity(keys.len());
        for (name, order) in keys {
            resolved.push((self.schema.require(name)?, *order));
        }

        let mut rows = self.rows.clone();
        rows.sort_by(|a, b| {
            for &(col, order) in &resolved {
                let ord = a[col].cmp(&b[col]);
                let ord = match order {
                    SortOrder::Ascending => ord,
                    SortOrder::Descending => ord.reverse(),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });

        let detail = keys
            .iter()
            .map(|(n, o)| format!("{} {:?}", n, o))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(
            Dataset::from_parts(self.schema.clone(), rows, self.provenance.clone())
                .with_step("sort", detail),
        )
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Dataset {
        let rows = self.rows.iter().take(n).cloned().collect();
        Dataset::from_parts(self.schema.clone(), rows, self.provenance.clone())
            .with_step("head", n.to_string())
    }

    /// Append a column. `values` must have one entry per row.
    pub fn with_column(
        &self,
        column: ColumnSchema,
        values: Vec<Value>,
    ) -> Result<Dataset> {
        if values.len() != self.rows.len() {
            return Err(CaremarketError::InvalidArgument(format!(
                "column '{}' has {} values for {} rows",
                column.name,
                values.len(),
                self.rows.len()
            )));
        }
        let name = column.name.clone();
        let mut columns = self.schema.columns.clone();
        columns.push(column);
        let schema = TableSchema::with_columns(columns)?;

        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(r, v)| {
                let mut row = r.clone();
                row.push(v);
                row
            })
            .collect();

        let mut dataset = Dataset::new(schema, rows)?;
        dataset.provenance = self.provenance.clone();
        Ok(dataset.with_step("derive", name))
    }

    /// Convert a column to another type.
    ///
    /// This is the explicit normalization step for identifiers stored as text
    /// in one source and as numbers in another. A value with no reading in the
    /// target type fails the whole call.
    pub fn cast(&self, column: &str, target: ColumnType) -> Result<Dataset> {
        let idx = self.schema.require(column)?;
        let mut rows = Vec::with_capacity(self.rows.len());
        for (row_idx, row) in self.rows.iter().enumerate() {
            let converted = row[idx]
                .cast(target)
                .ok_or_else(|| CaremarketError::TypeCoercion {
                    column: column.to_string(),
                    row: row_idx,
                    value: row[idx].to_string(),
                    expected: target.to_string(),
                })?;
            let mut row = row.clone();
            row[idx] = converted;
            rows.push(row);
        }

        let mut columns = self.schema.columns.clone();
        columns[idx].column_type = target;
        let schema = TableSchema::with_columns(columns)?;
        Ok(Dataset::from_parts(schema, rows, self.provenance.clone())
            .with_step("cast", format!("{} as {}", column, target)))
    }
}

/// Check one value against its column, widening integers in float columns.
fn check_value(column: &ColumnSchema, value: &mut Value, row: usize) -> Result<()> {
    let Some(value_type) = value.column_type() else {
        if !column.nullable {
            return Err(CaremarketError::Schema {
                column: column.name.clone(),
                message: format!("null at row {} in a non-nullable column", row),
            });
        }
        return Ok(());
    };

    if value_type == column.column_type {
        return Ok(());
    }
    if let (ColumnType::Float, Value::Integer(i)) = (column.column_type, &*value) {
        *value = Value::Float(*i as f64);
        return Ok(());
    }
    Err(CaremarketError::TypeCoercion {
        column: column.name.clone(),
        row,
        value: value.to_string(),
        expected: column.column_type.to_string(),
    })
}
