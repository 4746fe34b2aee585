//! Table-level schema definition.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::column::ColumnSchema;
use super::types::ColumnType;
use crate::error::{CaremarketError, Result};

/// Schema for an entire table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schemas for each column, in order.
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    /// Create a table schema with the given columns.
    ///
    /// Column names must be unique.
    pub fn with_columns(columns: Vec<ColumnSchema>) -> Result<Self> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(CaremarketError::Schema {
                    column: col.name.clone(),
                    message: "duplicate column name".to_string(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// Get a column by name.
    pub fn get_column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get the position of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Position of a column, or a schema error naming it.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name)
            .ok_or_else(|| CaremarketError::missing_column(name, &self.column_names()))
    }

    /// Positions of several columns, failing on the first missing one.
    pub fn require_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names.iter().map(|n| self.require(n.as_ref())).collect()
    }

    /// Declared type of a column.
    pub fn column_type(&self, index: usize) -> ColumnType {
        self.columns
            .get(index)
            .map(|c| c.column_type)
            .unwrap_or_default()
    }

    /// Get all column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::with_columns(vec![
            ColumnSchema::new("State", ColumnType::String),
            ColumnSchema::new("Enrollment", ColumnType::Integer),
        ])
        .unwrap()
    }

    #[test]
    fn test_require_existing_and_missing() {
        let s = schema();
        assert_eq!(s.require("Enrollment").unwrap(), 1);
        let err = s.require("County").unwrap_err();
        assert!(matches!(err, CaremarketError::Schema { ref column, .. } if column == "County"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = TableSchema::with_columns(vec![
            ColumnSchema::new("a", ColumnType::String),
            ColumnSchema::new("a", ColumnType::Integer),
        ]);
        assert!(result.is_err());
    }
}
