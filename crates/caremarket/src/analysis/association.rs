//! Exact test of association between two categorical columns.

use log::info;
use serde::{Deserialize, Serialize};

use crate::data::Dataset;
use crate::error::{CaremarketError, Result};
use crate::stats::{build_contingency, exact_test, ContingencyTable, ExactTestResult, Tail};
use crate::transform::{filter, Predicate, Recode};

/// Configuration for an association test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Rows kept before tabulating.
    pub predicate: Predicate,
    /// Derived label column, built after filtering; may feed either axis.
    pub recode: Option<Recode>,
    pub row_column: String,
    pub col_column: String,
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub tail: Tail,
    /// Significance level.
    pub alpha: f64,
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self {
            predicate: Predicate::new(),
            recode: None,
            row_column: "Provider Gender Code".to_string(),
            col_column: "Is Sole Proprietor".to_string(),
            row_labels: vec!["M".to_string(), "F".to_string()],
            col_labels: vec!["Y".to_string(), "N".to_string()],
            tail: Tail::TwoSided,
            alpha: 0.05,
        }
    }
}

/// Output of [`analyze_association`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssociationReport {
    pub table: ContingencyTable,
    pub result: ExactTestResult,
    pub alpha: f64,
    pub significant: bool,
}

/// Filter, cross-tabulate and run Fisher's exact test.
pub fn analyze_association(dataset: &Dataset, config: &AssociationConfig) -> Result<AssociationReport> {
    if !(config.alpha > 0.0 && config.alpha < 1.0) {
        return Err(CaremarketError::InvalidArgument(format!(
            "alpha must be in (0, 1), got {}",
            config.alpha
        )));
    }

    let mut records = filter(dataset, &config.predicate)?;
    if let Some(recode) = &config.recode {
        records = recode.apply(&records)?;
    }
    let table = build_contingency(
        &records,
        &config.row_column,
        &config.col_column,
        config.row_labels.as_slice(),
        config.col_labels.as_slice(),
    )?;
    let result = exact_test(&table, config.tail)?;
    let significant = result.is_significant(config.alpha);

    info!(
        "{} x {}: odds ratio {:.3}, p = {:.4} ({:?}), {}significant at {}",
        config.row_column,
        config.col_column,
        result.odds_ratio,
        result.p_value,
        config.tail,
        if significant { "" } else { "not " },
        config.alpha
    );

    Ok(AssociationReport {
        table,
        result,
        alpha: config.alpha,
        significant,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn counseling() -> Dataset {
        // [[6, 2], [1, 4]] for Risk x Reward among outpatient rows
        let mut rows = Vec::new();
        for (risk, reward, n) in [("Y", "Y", 6), ("Y", "N", 2), ("N", "Y", 1), ("N", "N", 4)] {
            for _ in 0..n {
                rows.push(vec!["outpatient".into(), risk.into(), reward.into()]);
            }
        }
        rows.push(vec!["inpatient".into(), "N".into(), "Y".into()]);
        rows.push(vec!["outpatient".into(), Value::Null, "Y".into()]);
        Dataset::from_rows(&["setting", "Risk", "Reward"], rows).unwrap()
    }

    fn config(tail: Tail) -> AssociationConfig {
        AssociationConfig {
            predicate: Predicate::new().equals("setting", "outpatient"),
            recode: None,
            row_column: "Risk".to_string(),
            col_column: "Reward".to_string(),
            row_labels: vec!["Y".to_string(), "N".to_string()],
            col_labels: vec!["Y".to_string(), "N".to_string()],
            tail,
            alpha: 0.1,
        }
    }

    #[test]
    fn test_one_sided_greater() {
        let report = analyze_association(&counseling(), &config(Tail::Greater)).unwrap();
        assert_eq!(report.table.counts, vec![vec![6, 2], vec![1, 4]]);
        assert_eq!(report.table.excluded, 1);
        assert!((report.result.p_value - 148.0 / 1716.0).abs() < 1e-9);
        assert!((report.result.odds_ratio - 12.0).abs() < 1e-12);
        assert!(report.significant);
    }

    #[test]
    fn test_two_sided_not_significant() {
        let report = analyze_association(&counseling(), &config(Tail::TwoSided)).unwrap();
        assert!((report.result.p_value - 176.0 / 1716.0).abs() < 1e-9);
        assert!(!report.significant);
    }

    #[test]
    fn test_recoded_column_feeds_the_table() {
        use crate::transform::Category;

        let mut rows: Vec<Vec<Value>> = Vec::new();
        for (gender, code, n) in [
            ("M", "208600000X", 3),
            ("M", "207V00000X", 1),
            ("F", "207X00000X", 1),
            ("F", "208000000X", 3),
        ] {
            for _ in 0..n {
                rows.push(vec![Value::from(gender), Value::from(code)]);
            }
        }
        let providers = Dataset::from_rows(&["Gender", "Taxonomy"], rows).unwrap();
        let cfg = AssociationConfig {
            predicate: Predicate::new(),
            recode: Some(Recode {
                column: "Taxonomy".to_string(),
                output_column: "Risk/Reward".to_string(),
                categories: vec![
                    Category::new("low", ["207V00000X", "208000000X"]),
                    Category::new("high", ["208600000X", "207X00000X"]),
                ],
                otherwise: None,
            }),
            row_column: "Gender".to_string(),
            col_column: "Risk/Reward".to_string(),
            row_labels: vec!["M".to_string(), "F".to_string()],
            col_labels: vec!["high".to_string(), "low".to_string()],
            tail: Tail::Greater,
            alpha: 0.05,
        };
        let report = analyze_association(&providers, &cfg).unwrap();
        assert_eq!(report.table.counts, vec![vec![3, 1], vec![1, 3]]);
        assert!((report.result.p_value - 17.0 / 70.0).abs() < 1e-9);
        assert!(!report.significant);

        let mut missing = cfg.clone();
        missing.recode = None;
        assert!(matches!(
            analyze_association(&providers, &missing),
            Err(CaremarketError::Schema { .. })
        ));
    }

    #[test]
    fn test_bad_alpha() {
        let mut cfg = config(Tail::Less);
        cfg.alpha = 1.5;
        assert!(matches!(
            analyze_association(&counseling(), &cfg),
            Err(CaremarketError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_serializes_report() {
        let report = analyze_association(&counseling(), &config(Tail::Greater)).unwrap();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["result"]["tail"], "greater");
        assert_eq!(json["significant"], true);
    }
}
