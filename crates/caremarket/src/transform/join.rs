//! Key-based joins with explicit cardinality and duplicate-key reporting.

use std::fmt;

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Provenance, Row, Value};
use crate::error::{CaremarketError, Result};
use crate::schema::{ColumnSchema, TableSchema};

/// Key columns pairing a left dataset with a right one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinKeys {
    pub left: Vec<String>,
    pub right: Vec<String>,
}

impl JoinKeys {
    /// The same column names on both sides.
    pub fn on<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        let left: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            right: left.clone(),
            left,
        }
    }

    /// Differently named columns, matched position by position.
    pub fn pairs<L: Into<String>, R: Into<String>>(
        left: impl IntoIterator<Item = L>,
        right: impl IntoIterator<Item = R>,
    ) -> Self {
        Self {
            left: left.into_iter().map(Into::into).collect(),
            right: right.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for JoinKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.left == self.right {
            write!(f, "{}", self.left.join(", "))
        } else {
            let pairs: Vec<String> = self
                .left
                .iter()
                .zip(&self.right)
                .map(|(l, r)| format!("{} = {}", l, r))
                .collect();
            write!(f, "{}", pairs.join(", "))
        }
    }
}

/// Which rows a join keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    /// Only left rows with at least one match.
    #[default]
    Inner,
    /// Every left row; unmatched rows get nulls on the right side.
    LeftOuter,
}

/// Join configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    pub kind: JoinKind,
    /// Suffixes for non-key column names present on both sides.
    pub suffixes: (String, String),
    /// Fail instead of multiplying rows when the right key is not unique.
    pub expect_unique_right: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            kind: JoinKind::Inner,
            suffixes: ("_left".to_string(), "_right".to_string()),
            expect_unique_right: false,
        }
    }
}

impl JoinOptions {
    pub fn new(kind: JoinKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn with_suffixes(mut self, left: impl Into<String>, right: impl Into<String>) -> Self {
        self.suffixes = (left.into(), right.into());
        self
    }

    pub fn expect_unique_right(mut self) -> Self {
        self.expect_unique_right = true;
        self
    }
}

/// Cardinality facts about one join.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinReport {
    pub left_rows: usize,
    pub right_rows: usize,
    pub output_rows: usize,
    /// Left rows with no match (dropped by inner, null-filled by left outer).
    pub unmatched_left: usize,
    /// Key tuples appearing more than once on the right.
    pub right_duplicate_keys: Vec<Vec<Value>>,
}

/// A joined dataset with its report.
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub dataset: Dataset,
    pub report: JoinReport,
}

/// Rows sharing one key tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub key: Vec<Value>,
    /// Row indices in the input dataset.
    pub rows: Vec<usize>,
}

/// Join two datasets with default options for the given kind.
pub fn join(left: &Dataset, right: &Dataset, keys: &JoinKeys, kind: JoinKind) -> Result<Dataset> {
    join_with(left, right, keys, &JoinOptions::new(kind)).map(|outcome| outcome.dataset)
}

/// Join two datasets and report the join's cardinality.
///
/// Every left row is combined with every right row sharing its key tuple, so
/// duplicate keys on both sides multiply. Key tuples containing a null never
/// match.
pub fn join_with(
    left: &Dataset,
    right: &Dataset,
    keys: &JoinKeys,
    options: &JoinOptions,
) -> Result<JoinOutcome> {
    let (left_keys, right_keys) = resolve_keys(left, right, keys)?;

    let mut index: IndexMap<Vec<Value>, Vec<usize>> = IndexMap::new();
    for (row_idx, row) in right.rows().iter().enumerate() {
        let key = key_tuple(row, &right_keys);
        if key.iter().any(Value::is_null) {
            continue;
        }
        index.entry(key).or_default().push(row_idx);
    }

    let right_duplicate_keys: Vec<Vec<Value>> = index
        .iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, _)| key.clone())
        .collect();

    if options.expect_unique_right && !right_duplicate_keys.is_empty() {
        return Err(CaremarketError::DuplicateKey {
            keys: keys.right.clone(),
            groups: right_duplicate_keys
                .iter()
                .map(|k| k.iter().map(|v| v.to_string()).collect())
                .collect(),
        });
    }

    let right_payload: Vec<usize> = (0..right.column_count())
        .filter(|i| !right_keys.contains(i))
        .collect();
    let schema = joined_schema(left, right, &right_payload, options)?;

    let mut rows: Vec<Row> = Vec::new();
    let mut unmatched_left = 0;
    for left_row in left.rows() {
        let key = key_tuple(left_row, &left_keys);
        let matches = if key.iter().any(Value::is_null) {
            None
        } else {
            index.get(&key)
        };

        match matches {
            Some(right_rows) => {
                for &r in right_rows {
                    let right_row = &right.rows()[r];
                    let mut row = left_row.clone();
                    row.extend(right_payload.iter().map(|&i| right_row[i].clone()));
                    rows.push(row);
                }
            }
            None => {
                unmatched_left += 1;
                if options.kind == JoinKind::LeftOuter {
                    let mut row = left_row.clone();
                    row.resize(left_row.len() + right_payload.len(), Value::Null);
                    rows.push(row);
                }
            }
        }
    }

    let report = JoinReport {
        left_rows: left.row_count(),
        right_rows: right.row_count(),
        output_rows: rows.len(),
        unmatched_left,
        right_duplicate_keys,
    };

    debug!(
        "join {:?} on [{}]: {} x {} -> {} rows",
        options.kind, keys, report.left_rows, report.right_rows, report.output_rows
    );
    if report.unmatched_left > 0 {
        warn!(
            "join on [{}]: {} of {} left rows have no match",
            keys, report.unmatched_left, report.left_rows
        );
    }
    if !report.right_duplicate_keys.is_empty() {
        warn!(
            "join on [{}]: {} key(s) repeat on the right side and multiply matching rows",
            keys,
            report.right_duplicate_keys.len()
        );
    }

    let provenance = Provenance::merge(left.provenance(), right.provenance());
    let dataset = Dataset::from_parts(schema, rows, provenance).with_step(
        "join",
        format!(
            "{:?} on {} (unmatched left: {})",
            options.kind, keys, report.unmatched_left
        ),
    );

    Ok(JoinOutcome { dataset, report })
}

/// Groups of rows whose key tuple occurs more than once, in first-seen order.
///
/// Null key values take part like any other value here.
pub fn duplicate_groups<S: AsRef<str>>(dataset: &Dataset, keys: &[S]) -> Result<Vec<DuplicateGroup>> {
    if keys.is_empty() {
        return Err(CaremarketError::InvalidArgument(
            "duplicate detection needs at least one key column".to_string(),
        ));
    }
    let cols = dataset.schema().require_all(keys)?;

    let mut groups: IndexMap<Vec<Value>, Vec<usize>> = IndexMap::new();
    for (row_idx, row) in dataset.rows().iter().enumerate() {
        groups.entry(key_tuple(row, &cols)).or_default().push(row_idx);
    }

    Ok(groups
        .into_iter()
        .filter(|(_, rows)| rows.len() > 1)
        .map(|(key, rows)| DuplicateGroup { key, rows })
        .collect())
}

/// All rows whose key tuple occurs more than once, in original order.
pub fn detect_duplicates<S: AsRef<str>>(dataset: &Dataset, keys: &[S]) -> Result<Dataset> {
    let mut flagged: Vec<usize> = duplicate_groups(dataset, keys)?
        .into_iter()
        .flat_map(|g| g.rows)
        .collect();
    flagged.sort_unstable();

    let rows = flagged
        .iter()
        .map(|&i| dataset.rows()[i].clone())
        .collect();
    let names: Vec<&str> = keys.iter().map(|k| k.as_ref()).collect();

    Ok(Dataset::from_parts(
        dataset.schema().clone(),
        rows,
        dataset.provenance().clone(),
    )
    .with_step("duplicates", names.join(", ")))
}

fn resolve_keys(left: &Dataset, right: &Dataset, keys: &JoinKeys) -> Result<(Vec<usize>, Vec<usize>)> {
    if keys.left.is_empty() {
        return Err(CaremarketError::InvalidArgument(
            "join needs at least one key column".to_string(),
        ));
    }
    if keys.left.len() != keys.right.len() {
        return Err(CaremarketError::InvalidArgument(format!(
            "{} left key(s) but {} right key(s)",
            keys.left.len(),
            keys.right.len()
        )));
    }

    let left_cols = left.schema().require_all(&keys.left)?;
    let right_cols = right.schema().require_all(&keys.right)?;

    for (i, (&l, &r)) in left_cols.iter().zip(&right_cols).enumerate() {
        let lt = left.schema().column_type(l);
        let rt = right.schema().column_type(r);
        if !lt.is_join_compatible(rt) {
            return Err(CaremarketError::Schema {
                column: keys.left[i].clone(),
                message: format!(
                    "join key type mismatch: left is {} but right '{}' is {}; cast one side first",
                    lt, keys.right[i], rt
                ),
            });
        }
    }

    Ok((left_cols, right_cols))
}

fn joined_schema(
    left: &Dataset,
    right: &Dataset,
    right_payload: &[usize],
    options: &JoinOptions,
) -> Result<TableSchema> {
    let right_names: Vec<&str> = right_payload
        .iter()
        .map(|&i| right.schema().columns[i].name.as_str())
        .collect();
    let left_names = left.column_names();

    let mut columns: Vec<ColumnSchema> = left
        .schema()
        .columns
        .iter()
        .map(|c| {
            if right_names.contains(&c.name.as_str()) {
                c.renamed(format!("{}{}", c.name, options.suffixes.0))
            } else {
                c.clone()
            }
        })
        .collect();

    for &i in right_payload {
        let c = &right.schema().columns[i];
        let mut column = if left_names.contains(&c.name.as_str()) {
            c.renamed(format!("{}{}", c.name, options.suffixes.1))
        } else {
            c.clone()
        };
        if options.kind == JoinKind::LeftOuter {
            column.nullable = true;
        }
        columns.push(column);
    }

    TableSchema::with_columns(columns)
}

fn key_tuple(row: &Row, cols: &[usize]) -> Vec<Value> {
    cols.iter().map(|&c| row[c].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn plans() -> Dataset {
        Dataset::from_rows(
            &["Contract Number", "Plan ID", "Organization Marketing Name"],
            vec![
                vec!["H0001".into(), 1.into(), "Humana".into()],
                vec!["H0002".into(), 1.into(), "Aetna Medicare".into()],
                vec!["H0003".into(), 2.into(), "Local Plan".into()],
            ],
        )
        .unwrap()
    }

    fn orgs() -> Dataset {
        Dataset::from_rows(
            &["Organization Marketing Name", "MajorInsuranceOrgName"],
            vec![
                vec!["Humana".into(), "Humana".into()],
                vec!["Aetna Medicare".into(), "CVS Health".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_left_outer_keeps_unmatched_with_nulls() {
        let keys = JoinKeys::on(["Organization Marketing Name"]);
        let outcome = join_with(&plans(), &orgs(), &keys, &JoinOptions::new(JoinKind::LeftOuter))
            .unwrap();
        let ds = &outcome.dataset;
        assert_eq!(ds.row_count(), 3);
        assert_eq!(outcome.report.unmatched_left, 1);
        assert_eq!(ds.value(2, "MajorInsuranceOrgName"), Some(&Value::Null));
        assert_eq!(
            ds.column_names(),
            vec![
                "Contract Number",
                "Plan ID",
                "Organization Marketing Name",
                "MajorInsuranceOrgName"
            ]
        );
    }

    #[test]
    fn test_inner_drops_unmatched() {
        let keys = JoinKeys::on(["Organization Marketing Name"]);
        let ds = join(&plans(), &orgs(), &keys, JoinKind::Inner).unwrap();
        assert_eq!(ds.row_count(), 2);
    }

    #[test]
    fn test_duplicates_multiply_rows() {
        let left = Dataset::from_rows(
            &["k", "l"],
            vec![
                vec!["a".into(), 1.into()],
                vec!["a".into(), 2.into()],
                vec!["x".into(), 3.into()],
            ],
        )
        .unwrap();
        let right = Dataset::from_rows(
            &["k", "r"],
            vec![vec!["a".into(), 10.into()], vec!["a".into(), 20.into()]],
        )
        .unwrap();

        let outcome =
            join_with(&left, &right, &JoinKeys::on(["k"]), &JoinOptions::default()).unwrap();
        assert_eq!(outcome.dataset.row_count(), 4);
        assert_eq!(outcome.report.right_duplicate_keys, vec![vec![Value::from("a")]]);
        let ls: Vec<&Value> = outcome.dataset.column("l").unwrap();
        assert_eq!(
            ls,
            vec![
                &Value::Integer(1),
                &Value::Integer(1),
                &Value::Integer(2),
                &Value::Integer(2)
            ]
        );

        let strict = JoinOptions::default().expect_unique_right();
        assert!(matches!(
            join_with(&left, &right, &JoinKeys::on(["k"]), &strict),
            Err(CaremarketError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_colliding_columns_get_suffixes() {
        let left =
            Dataset::from_rows(&["id", "name"], vec![vec![1.into(), "left".into()]]).unwrap();
        let right =
            Dataset::from_rows(&["id", "name"], vec![vec![1.into(), "right".into()]]).unwrap();

        let ds = join_with(
            &left,
            &right,
            &JoinKeys::on(["id"]),
            &JoinOptions::default().with_suffixes("_1", "_2"),
        )
        .unwrap()
        .dataset;
        assert_eq!(ds.column_names(), vec!["id", "name_1", "name_2"]);
        assert_eq!(ds.value(0, "name_2"), Some(&Value::from("right")));
    }

    #[test]
    fn test_key_type_mismatch_is_rejected() {
        let left = Dataset::from_rows(&["npi"], vec![vec![1922486554.into()]]).unwrap();
        let right = Dataset::from_rows(&["npi"], vec![vec!["1922486554".into()]]).unwrap();
        let err = join(&left, &right, &JoinKeys::on(["npi"]), JoinKind::Inner).unwrap_err();
        assert!(matches!(err, CaremarketError::Schema { .. }));

        let normalized = right.cast("npi", ColumnType::Integer).unwrap();
        let ds = join(&left, &normalized, &JoinKeys::on(["npi"]), JoinKind::Inner).unwrap();
        assert_eq!(ds.row_count(), 1);
    }

    #[test]
    fn test_pairs_keys_drop_right_key_column() {
        let counts = Dataset::from_rows(
            &["Practice State", "MRI Counts"],
            vec![vec!["TX".into(), 40.into()], vec!["VT".into(), 2.into()]],
        )
        .unwrap();
        let population = Dataset::from_rows(
            &["State Code", "Population"],
            vec![vec!["TX".into(), 30_000_000.into()]],
        )
        .unwrap();

        let keys = JoinKeys::pairs(["Practice State"], ["State Code"]);
        let ds = join(&counts, &population, &keys, JoinKind::Inner).unwrap();
        assert_eq!(ds.column_names(), vec!["Practice State", "MRI Counts", "Population"]);
        assert_eq!(ds.row_count(), 1);
    }

    #[test]
    fn test_null_keys_never_match() {
        let left = Dataset::from_rows(&["k"], vec![vec![Value::Null], vec!["a".into()]]).unwrap();
        let right = Dataset::from_rows(
            &["k", "v"],
            vec![vec![Value::Null, 1.into()], vec!["a".into(), 2.into()]],
        )
        .unwrap();
        let outcome = join_with(
            &left,
            &right,
            &JoinKeys::on(["k"]),
            &JoinOptions::new(JoinKind::LeftOuter),
        )
        .unwrap();
        assert_eq!(outcome.report.unmatched_left, 1);
        assert_eq!(outcome.dataset.value(0, "v"), Some(&Value::Null));
        assert_eq!(outcome.dataset.value(1, "v"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_empty_keys_rejected() {
        let keys = JoinKeys::on(Vec::<String>::new());
        assert!(matches!(
            join(&plans(), &orgs(), &keys, JoinKind::Inner),
            Err(CaremarketError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_detect_duplicates() {
        let ds = Dataset::from_rows(
            &["Contract Number", "Plan ID", "segment_id"],
            vec![
                vec!["H0001".into(), 1.into(), 0.into()],
                vec!["H0002".into(), 1.into(), 0.into()],
                vec!["H0001".into(), 1.into(), 1.into()],
            ],
        )
        .unwrap();
        let dups = detect_duplicates(&ds, &["Contract Number", "Plan ID"]).unwrap();
        assert_eq!(dups.row_count(), 2);
        assert_eq!(dups.value(1, "segment_id"), Some(&Value::Integer(1)));

        let groups = duplicate_groups(&ds, &["Contract Number", "Plan ID"]).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].rows, vec![0, 2]);

        let unique = detect_duplicates(&ds, &["Contract Number", "segment_id"]).unwrap();
        assert!(unique.is_empty());
    }
}
