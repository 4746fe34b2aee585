//! Derived categorical columns from value sets.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Row, Value};
use crate::error::{CaremarketError, Result};
use crate::schema::{ColumnSchema, ColumnType, TableSchema};

/// A label and the source values that receive it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    pub values: Vec<Value>,
}

impl Category {
    pub fn new<V: Into<Value>>(label: impl Into<String>, values: impl IntoIterator<Item = V>) -> Self {
        Self {
            label: label.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    fn contains(&self, value: &Value) -> bool {
        self.values.iter().any(|v| v.loosely_equals(value))
    }
}

/// A configured [`categorize`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recode {
    /// Column whose values are looked up.
    pub column: String,
    /// Name of the derived label column.
    pub output_column: String,
    pub categories: Vec<Category>,
    /// Label for present values outside every category (None = null).
    #[serde(default)]
    pub otherwise: Option<String>,
}

impl Recode {
    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        categorize(
            dataset,
            &self.column,
            &self.categories,
            self.otherwise.as_deref(),
            &self.output_column,
        )
    }
}

/// Append `output_column` holding the label of the category each `column`
/// value belongs to.
///
/// Values compare the way filter conditions do, so Integer `1` matches Float
/// `1.0` but not the text `"1"`. Nulls stay null; other values outside every
/// category get `otherwise`, or null when it is `None`. A value listed under
/// two labels is rejected.
pub fn categorize(
    dataset: &Dataset,
    column: &str,
    categories: &[Category],
    otherwise: Option<&str>,
    output_column: &str,
) -> Result<Dataset> {
    let col = dataset.schema().require(column)?;
    if categories.is_empty() {
        return Err(CaremarketError::InvalidArgument(format!(
            "no categories given for '{}'",
            column
        )));
    }
    for (i, category) in categories.iter().enumerate() {
        for later in &categories[i + 1..] {
            if let Some(shared) = category.values.iter().find(|v| later.contains(v)) {
                return Err(CaremarketError::InvalidArgument(format!(
                    "value {} is listed under both '{}' and '{}'",
                    shared, category.label, later.label
                )));
            }
        }
    }

    let mut columns = dataset.schema().columns.clone();
    columns.push(ColumnSchema::new(output_column, ColumnType::String));
    let schema = TableSchema::with_columns(columns)?;

    let mut unmatched = 0usize;
    let rows: Vec<Row> = dataset
        .rows()
        .iter()
        .map(|row| {
            let value = &row[col];
            let label = if value.is_null() {
                Value::Null
            } else {
                match categories.iter().find(|c| c.contains(value)) {
                    Some(category) => Value::from(category.label.as_str()),
                    None => {
                        unmatched += 1;
                        Value::from(otherwise)
                    }
                }
            };
            let mut row = row.clone();
            row.push(label);
            row
        })
        .collect();

    debug!(
        "categorize {} -> {}: {} rows, {} outside every category",
        column,
        output_column,
        rows.len(),
        unmatched
    );

    let labels: Vec<&str> = categories.iter().map(|c| c.label.as_str()).collect();
    Ok(
        Dataset::from_parts(schema, rows, dataset.provenance().clone()).with_step(
            "categorize",
            format!("{} from {} as {}", output_column, column, labels.join("/")),
        ),
    )
}
