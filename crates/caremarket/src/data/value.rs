//! Scalar cell values.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::schema::ColumnType;

/// A single cell value.
///
/// Equality and hashing are variant-strict: `Integer(1)` never equals
/// `String("1")` or `Float(1.0)`, so join keys only match within one type.
/// Ordering is total so group keys sort deterministically:
/// `Null < Boolean < numeric < String`, with integers and floats compared
/// numerically.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value.
    #[default]
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

/// Boolean spellings accepted by an explicit cast.
const TRUE_TOKENS: &[&str] = &["true", "t", "yes", "y", "1"];
const FALSE_TOKENS: &[&str] = &["false", "f", "no", "n", "0"];

impl Value {
    /// Returns true for the missing value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The declared type this value belongs to, `None` for null.
    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Float(_) => Some(ColumnType::Float),
            Value::String(_) => Some(ColumnType::String),
            Value::Boolean(_) => Some(ColumnType::Boolean),
        }
    }

    /// Numeric view of integer and float values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric interpretation, parsing strings when needed.
    ///
    /// Returns `Some(Value::Integer)` or `Some(Value::Float)`; `None` when the
    /// value has no numeric reading. Null stays null.
    pub fn to_numeric(&self) -> Option<Value> {
        match self {
            Value::Null => Some(Value::Null),
            Value::Integer(_) | Value::Float(_) => Some(self.clone()),
            Value::String(s) => {
                let trimmed = s.trim();
                if let Ok(i) = trimmed.parse::<i64>() {
                    Some(Value::Integer(i))
                } else {
                    trimmed
                        .parse::<f64>()
                        .ok()
                        .filter(|f| f.is_finite())
                        .map(Value::Float)
                }
            }
            Value::Boolean(_) => None,
        }
    }

    /// Equality that also treats integers and floats as comparable numbers.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Float(b)) | (Value::Float(b), Value::Integer(a)) => {
                (*a as f64) == *b
            }
            _ => self == other,
        }
    }

    /// Parse raw text as a value of the given type.
    ///
    /// Returns `None` when the text is not a valid value of that type.
    pub fn parse_as(raw: &str, column_type: ColumnType) -> Option<Value> {
        let trimmed = raw.trim();
        match column_type {
            ColumnType::Integer => parse_integer(trimmed).map(Value::Integer),
            ColumnType::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .map(Value::Float),
            ColumnType::Boolean => parse_boolean(trimmed).map(Value::Boolean),
            ColumnType::String => Some(Value::String(raw.to_string())),
            ColumnType::Unknown => None,
        }
    }

    /// Convert this value to another column type.
    pub fn cast(&self, column_type: ColumnType) -> Option<Value> {
        if self.is_null() {
            return Some(Value::Null);
        }
        match (self, column_type) {
            (_, ColumnType::Unknown) => None,
            (Value::String(s), _) => Value::parse_as(s, column_type),
            (_, ColumnType::String) => Some(Value::String(self.to_string())),
            (Value::Integer(i), ColumnType::Integer) => Some(Value::Integer(*i)),
            (Value::Integer(i), ColumnType::Float) => Some(Value::Float(*i as f64)),
            (Value::Float(f), ColumnType::Float) => Some(Value::Float(*f)),
            (Value::Float(f), ColumnType::Integer) => whole_float(*f).map(Value::Integer),
            (Value::Boolean(b), ColumnType::Boolean) => Some(Value::Boolean(*b)),
            (Value::Integer(i), ColumnType::Boolean) => match i {
                0 => Some(Value::Boolean(false)),
                1 => Some(Value::Boolean(true)),
                _ => None,
            },
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Boolean(_) => 1,
            Value::Integer(_) | Value::Float(_) => 2,
            Value::String(_) => 3,
        }
    }
}

fn parse_integer(text: &str) -> Option<i64> {
    text.parse::<i64>().ok().or_else(|| {
        // "12.0" is a whole number spelled as a float
        text.parse::<f64>().ok().and_then(whole_float)
    })
}

fn whole_float(f: f64) -> Option<i64> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn parse_boolean(text: &str) -> Option<bool> {
    let lower = text.to_lowercase();
    if TRUE_TOKENS.contains(&lower.as_str()) {
        Some(true)
    } else if FALSE_TOKENS.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b) == Ordering::Equal,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => f.to_bits().hash(state),
            Value::String(s) => s.hash(state),
            Value::Boolean(b) => b.hash(state),
        }
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            // Numeric tie between variants breaks toward Integer so Ord agrees with Eq.
            (Value::Integer(a), Value::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (Value::Float(a), Value::Integer(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Value {
    /// Null renders as the empty string, matching how it is written to CSV.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_equality_across_types() {
        assert_ne!(Value::Integer(1), Value::String("1".into()));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert!(Value::Integer(1).loosely_equals(&Value::Float(1.0)));
        assert!(!Value::Integer(1).loosely_equals(&Value::String("1".into())));
    }

    #[test]
    fn test_total_order() {
        let mut values = vec![
            Value::from("TX"),
            Value::Float(2.5),
            Value::Null,
            Value::Integer(3),
            Value::Boolean(true),
            Value::Integer(2),
            Value::from("AZ"),
        ];
        values.sort();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(2),
                Value::Float(2.5),
                Value::Integer(3),
                Value::from("AZ"),
                Value::from("TX"),
            ]
        );
    }

    #[test]
    fn test_parse_as() {
        assert_eq!(Value::parse_as(" 42 ", ColumnType::Integer), Some(Value::Integer(42)));
        assert_eq!(Value::parse_as("12.0", ColumnType::Integer), Some(Value::Integer(12)));
        assert_eq!(Value::parse_as("12.5", ColumnType::Integer), None);
        assert_eq!(Value::parse_as("*", ColumnType::Integer), None);
        assert_eq!(Value::parse_as("Y", ColumnType::Boolean), Some(Value::Boolean(true)));
    }

    #[test]
    fn test_cast_identifier_to_string() {
        assert_eq!(
            Value::Integer(1922486554).cast(ColumnType::String),
            Some(Value::from("1922486554"))
        );
        assert_eq!(
            Value::from("1922486554").cast(ColumnType::Integer),
            Some(Value::Integer(1922486554))
        );
        assert_eq!(Value::Float(1.5).cast(ColumnType::Integer), None);
        assert_eq!(Value::Null.cast(ColumnType::Integer), Some(Value::Null));
    }

    #[test]
    fn test_to_numeric() {
        assert_eq!(Value::from("100").to_numeric(), Some(Value::Integer(100)));
        assert_eq!(Value::from("0.5").to_numeric(), Some(Value::Float(0.5)));
        assert_eq!(Value::from("*").to_numeric(), None);
    }

    #[test]
    fn test_untagged_serde() {
        let values = vec![Value::Null, Value::Integer(3), Value::from("x")];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, "[null,3,\"x\"]");
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }
}
