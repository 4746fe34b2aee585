//! Row filtering by conjunctions of column conditions.

use std::fmt;

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Value};
use crate::error::Result;

/// A condition on a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    /// Value is one of a set.
    In { column: String, values: Vec<Value> },
    /// Value equals a constant.
    Equals { column: String, value: Value },
    /// Value differs from a constant.
    NotEquals { column: String, value: Value },
    /// Value matches a regex at the start of its text. Nulls never match.
    Matches { column: String, pattern: String },
    /// Value is present.
    NotNull { column: String },
}

impl Condition {
    /// Column this condition reads.
    pub fn column(&self) -> &str {
        match self {
            Condition::In { column, .. }
            | Condition::Equals { column, .. }
            | Condition::NotEquals { column, .. }
            | Condition::Matches { column, .. }
            | Condition::NotNull { column } => column,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::In { column, values } => {
                let shown: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{} in {{{}}}", column, shown.join(", "))
            }
            Condition::Equals { column, value } => write!(f, "{} == {}", column, value),
            Condition::NotEquals { column, value } => write!(f, "{} != {}", column, value),
            Condition::Matches { column, pattern } => write!(f, "{} ~ /{}/", column, pattern),
            Condition::NotNull { column } => write!(f, "{} is not null", column),
        }
    }
}

/// A conjunction of conditions. An empty predicate keeps every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub conditions: Vec<Condition>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `column` to be one of `values`.
    pub fn is_in<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.conditions.push(Condition::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn equals(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::Equals {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn not_equals(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::NotEquals {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    pub fn matches(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.conditions.push(Condition::Matches {
            column: column.into(),
            pattern: pattern.into(),
        });
        self
    }

    pub fn not_null(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(Condition::NotNull {
            column: column.into(),
        });
        self
    }

    /// Conjunction of this predicate and another.
    pub fn and(mut self, other: Predicate) -> Self {
        self.conditions.extend(other.conditions);
        self
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("true");
        }
        let parts: Vec<String> = self.conditions.iter().map(|c| c.to_string()).collect();
        f.write_str(&parts.join(" and "))
    }
}

/// A condition bound to a column position, with its regex compiled.
enum Compiled<'a> {
    In(&'a [Value]),
    Equals(&'a Value),
    NotEquals(&'a Value),
    Matches(Regex),
    NotNull,
}

impl Compiled<'_> {
    fn test(&self, value: &Value) -> bool {
        match self {
            Compiled::In(values) => values.iter().any(|v| v.loosely_equals(value)),
            Compiled::Equals(expected) => expected.loosely_equals(value),
            Compiled::NotEquals(expected) => !expected.loosely_equals(value),
            Compiled::Matches(re) => match value {
                Value::Null => false,
                Value::String(s) => re.is_match(s),
                other => re.is_match(&other.to_string()),
            },
            Compiled::NotNull => !value.is_null(),
        }
    }
}

/// Keep the rows that satisfy every condition, in their original order.
///
/// All referenced columns are resolved, and all patterns compiled, before any
/// row is read.
pub fn filter(dataset: &Dataset, predicate: &Predicate) -> Result<Dataset> {
    let mut compiled = Vec::with_capacity(predicate.conditions.len());
    for condition in &predicate.conditions {
        let col = dataset.schema().require(condition.column())?;
        let test = match condition {
            Condition::In { values, .. } => Compiled::In(values),
            Condition::Equals { value, .. } => Compiled::Equals(value),
            Condition::NotEquals { value, .. } => Compiled::NotEquals(value),
            Condition::Matches { pattern, .. } => {
                Compiled::Matches(Regex::new(&format!("^(?:{})", pattern))?)
            }
            Condition::NotNull { .. } => Compiled::NotNull,
        };
        compiled.push((col, test));
    }

    let rows: Vec<_> = dataset
        .rows()
        .iter()
        .filter(|row| compiled.iter().all(|(col, test)| test.test(&row[*col])))
        .cloned()
        .collect();

    debug!(
        "filter [{}]: kept {} of {} rows",
        predicate,
        rows.len(),
        dataset.row_count()
    );

    Ok(Dataset::from_parts(
        dataset.schema().clone(),
        rows,
        dataset.provenance().clone(),
    )
    .with_step("filter", predicate.to_string()))
}
