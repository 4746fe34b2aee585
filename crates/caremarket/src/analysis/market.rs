//! Market share and concentration per market.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Value};
use crate::error::{CaremarketError, Result};
use crate::metrics::{hhi_by_group, read_number, share, ConcentrationBand, ShareScale, HHI_COLUMN};
use crate::schema::{ColumnSchema, ColumnType};
use crate::transform::{filter, group_and_reduce, join_with, JoinKeys, JoinKind, JoinOptions, Predicate, Reducer};

/// Medicare contract identifiers: a plan type letter and four digits.
pub const CONTRACT_NUMBER_PATTERN: &str = r"[HRE]\d{4}";

/// Column holding each market's summed enrollment.
pub const TOTAL_COLUMN: &str = "Total Enrollment";
/// Column holding each firm's share of its market.
pub const SHARE_COLUMN: &str = "Market Share";
/// Column holding the concentration band of a market.
pub const BAND_COLUMN: &str = "Concentration";

/// Configuration for the market concentration analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Column identifying a market (e.g. state or county).
    pub market_column: String,
    /// Column identifying a firm within a market.
    pub firm_column: String,
    /// Numeric enrollment column.
    pub enrollment_column: String,
    /// Enrollment tokens marking suppressed counts; rows holding them are dropped.
    pub suppressed_values: Vec<String>,
    /// When set, keep only rows whose value here is a contract number.
    pub contract_column: Option<String>,
    /// Report only these markets (None = all).
    pub markets: Option<Vec<String>>,
    /// Leave rows with no firm out of every sum, so shares are over
    /// identified firms only. When false they count toward market totals.
    pub drop_null_firms: bool,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            market_column: "State".to_string(),
            firm_column: "Organization Marketing Name".to_string(),
            enrollment_column: "Enrollment".to_string(),
            suppressed_values: vec!["*".to_string()],
            contract_column: None,
            markets: None,
            drop_null_firms: true,
        }
    }
}

/// Largest firm of one market.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketLeader {
    pub market: Value,
    pub firm: Value,
    pub share: f64,
    pub hhi: f64,
    pub band: ConcentrationBand,
}

/// Output of [`analyze_market`].
#[derive(Debug, Clone, Serialize)]
pub struct MarketReport {
    /// One row per (market, firm): summed enrollment, market total and share.
    pub shares: Dataset,
    /// One row per market: HHI and band, most concentrated first.
    pub hhi: Dataset,
    /// Leading firm per market, in the order of `hhi`. Never a null firm.
    pub leaders: Vec<MarketLeader>,
    /// Rows left after filtering whose firm is null, e.g. contracts missing
    /// from the organization table.
    pub unattributed_rows: usize,
    /// Enrollment carried by those rows.
    pub unattributed_enrollment: f64,
}

/// Enrollment-weighted market shares, HHI and leading firm per market.
///
/// Enrollment is summed per (market, firm) and per market; each firm's share
/// is its sum over the market total. Markets whose total is zero get null
/// shares and contribute nothing to the index.
pub fn analyze_market(dataset: &Dataset, config: &MarketConfig) -> Result<MarketReport> {
    let market = config.market_column.as_str();
    let firm = config.firm_column.as_str();
    let enrollment = config.enrollment_column.as_str();
    dataset
        .schema()
        .require_all(&[market, firm, enrollment])?;
    if market == firm {
        return Err(CaremarketError::InvalidArgument(format!(
            "market and firm columns must differ, both are '{}'",
            market
        )));
    }

    let mut predicate = Predicate::new();
    for token in &config.suppressed_values {
        predicate = predicate.not_equals(enrollment, token.as_str());
    }
    if let Some(contract) = &config.contract_column {
        predicate = predicate.matches(contract.as_str(), CONTRACT_NUMBER_PATTERN);
    }
    let mut records = filter(dataset, &predicate)?;
    let dropped = dataset.row_count() - records.row_count();
    if dropped > 0 {
        warn!("market analysis: dropped {} suppressed or non-contract rows", dropped);
    }

    let firm_col = records.schema().require(firm)?;
    let enrollment_col = records.schema().require(enrollment)?;
    let mut unattributed_rows = 0;
    let mut unattributed_enrollment = 0.0;
    for (row_idx, row) in records.rows().iter().enumerate() {
        if row[firm_col].is_null() {
            unattributed_rows += 1;
            unattributed_enrollment +=
                read_number(&row[enrollment_col], enrollment, row_idx)?.unwrap_or(0.0);
        }
    }
    if unattributed_rows > 0 {
        warn!(
            "market analysis: {} rows ({} enrolled) have no {}{}",
            unattributed_rows,
            unattributed_enrollment,
            firm,
            if config.drop_null_firms { ", excluded" } else { "" }
        );
        if config.drop_null_firms {
            records = filter(&records, &Predicate::new().not_null(firm))?;
        }
    }
    if records.is_empty() {
        return Err(CaremarketError::EmptyData(
            "no enrollment rows left after filtering".to_string(),
        ));
    }

    let by_firm = group_and_reduce(&records, &[market, firm], enrollment, Reducer::Sum)?;
    let totals = group_and_reduce(&records, &[market], enrollment, Reducer::Sum)?
        .rename_column(enrollment, TOTAL_COLUMN)?;
    let joined = join_with(
        &by_firm,
        &totals,
        &JoinKeys::on([market]),
        &JoinOptions::new(JoinKind::LeftOuter).expect_unique_right(),
    )?;
    let mut shares = share(&joined.dataset, enrollment, TOTAL_COLUMN, SHARE_COLUMN)?;

    if let Some(markets) = &config.markets {
        let wanted = Predicate::new().is_in(market, markets.iter().map(String::as_str));
        shares = filter(&shares, &wanted)?;
    }

    let index = hhi_by_group(&shares, &[market], SHARE_COLUMN, ShareScale::Fraction)?;
    let bands: Vec<Value> = index
        .column(HHI_COLUMN)?
        .into_iter()
        .map(|v| {
            let h = v.as_f64().unwrap_or(0.0);
            Value::from(ConcentrationBand::classify(h).label())
        })
        .collect();
    let hhi = index.with_column(ColumnSchema::new(BAND_COLUMN, ColumnType::String), bands)?;

    let leaders = leaders(&shares, &hhi, market, firm)?;
    for leader in &leaders {
        info!(
            "{} {}: HHI {:.0} ({}), leader {} at {:.1}%",
            market,
            leader.market,
            leader.hhi,
            leader.band,
            leader.firm,
            leader.share * 100.0
        );
    }

    Ok(MarketReport {
        shares,
        hhi,
        leaders,
        unattributed_rows,
        unattributed_enrollment,
    })
}

/// Highest-share firm per market; ties go to the firm sorting first.
fn leaders(shares: &Dataset, hhi: &Dataset, market: &str, firm: &str) -> Result<Vec<MarketLeader>> {
    let market_col = shares.schema().require(market)?;
    let firm_col = shares.schema().require(firm)?;
    let share_col = shares.schema().require(SHARE_COLUMN)?;

    let mut leaders = Vec::with_capacity(hhi.row_count());
    for row in hhi.rows() {
        let key = &row[0];
        let index = row[1].as_f64().unwrap_or(0.0);

        let mut best: Option<(&Value, f64)> = None;
        for r in shares.rows().iter().filter(|r| &r[market_col] == key) {
            if r[firm_col].is_null() {
                continue;
            }
            let Some(s) = r[share_col].as_f64() else {
                continue;
            };
            if best.is_none_or(|(_, b)| s > b) {
                best = Some((&r[firm_col], s));
            }
        }
        if let Some((firm, share)) = best {
            leaders.push(MarketLeader {
                market: key.clone(),
                firm: firm.clone(),
                share,
                hhi: index,
                band: ConcentrationBand::classify(index),
            });
        }
    }
    Ok(leaders)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enrollment() -> Dataset {
        Dataset::from_rows(
            &["Contract Number", "State", "Organization Marketing Name", "Enrollment"],
            vec![
                vec!["H0001".into(), "TX".into(), "X".into(), "100".into()],
                vec!["H0002".into(), "TX".into(), "Y".into(), "300".into()],
                vec!["H0003".into(), "AZ".into(), "X".into(), "*".into()],
                vec!["S5601".into(), "AZ".into(), "Z".into(), "40".into()],
                vec!["R0004".into(), "AZ".into(), "Y".into(), "60".into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_texas_scenario() {
        let config = MarketConfig {
            markets: Some(vec!["TX".to_string()]),
            ..MarketConfig::default()
        };
        let report = analyze_market(&enrollment(), &config).unwrap();

        assert_eq!(report.shares.row_count(), 2);
        assert_eq!(report.shares.value(0, TOTAL_COLUMN), Some(&Value::Integer(400)));
        assert_eq!(report.shares.value(0, SHARE_COLUMN), Some(&Value::Float(0.25)));
        assert_eq!(report.shares.value(1, SHARE_COLUMN), Some(&Value::Float(0.75)));

        assert_eq!(report.hhi.row_count(), 1);
        assert_eq!(report.hhi.value(0, HHI_COLUMN), Some(&Value::Float(6250.0)));
        assert_eq!(
            report.hhi.value(0, BAND_COLUMN),
            Some(&Value::from("highly concentrated"))
        );

        let leader = &report.leaders[0];
        assert_eq!(leader.firm, Value::from("Y"));
        assert_eq!(leader.band, ConcentrationBand::High);
    }

    #[test]
    fn test_contract_filter_and_suppression() {
        let config = MarketConfig {
            contract_column: Some("Contract Number".to_string()),
            ..MarketConfig::default()
        };
        let report = analyze_market(&enrollment(), &config).unwrap();
        // AZ keeps only Y (R0004): X is suppressed, Z is not a contract number
        assert_eq!(report.hhi.row_count(), 2);
        let az = report
            .leaders
            .iter()
            .find(|l| l.market == Value::from("AZ"))
            .unwrap();
        assert_eq!(az.firm, Value::from("Y"));
        assert_eq!(az.share, 1.0);
        assert_eq!(az.hhi, 10_000.0);
        // monopoly sorts ahead of TX
        assert_eq!(report.hhi.value(0, "State"), Some(&Value::from("AZ")));
    }

    fn with_unknown_firms() -> Dataset {
        Dataset::from_rows(
            &["State", "Organization Marketing Name", "Enrollment"],
            vec![
                vec!["AZ".into(), "Humana".into(), 100.into()],
                vec!["AZ".into(), Value::Null, 500.into()],
                vec!["AZ".into(), "Aetna".into(), 100.into()],
                vec!["AZ".into(), Value::Null, 300.into()],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_null_firms_are_excluded_by_default() {
        let report = analyze_market(&with_unknown_firms(), &MarketConfig::default()).unwrap();
        assert_eq!(report.unattributed_rows, 2);
        assert_eq!(report.unattributed_enrollment, 800.0);

        assert_eq!(report.shares.row_count(), 2);
        assert_eq!(report.shares.value(0, TOTAL_COLUMN), Some(&Value::Integer(200)));
        assert_eq!(report.shares.value(0, SHARE_COLUMN), Some(&Value::Float(0.5)));
        assert_eq!(report.hhi.value(0, HHI_COLUMN), Some(&Value::Float(5000.0)));

        // tie goes to the firm sorting first
        assert_eq!(report.leaders[0].firm, Value::from("Aetna"));
        assert_eq!(report.leaders[0].share, 0.5);
    }

    #[test]
    fn test_kept_null_firms_never_lead() {
        let config = MarketConfig {
            drop_null_firms: false,
            ..MarketConfig::default()
        };
        let report = analyze_market(&with_unknown_firms(), &config).unwrap();
        assert_eq!(report.unattributed_rows, 2);
        assert_eq!(report.shares.row_count(), 3);
        assert_eq!(report.shares.value(0, TOTAL_COLUMN), Some(&Value::Integer(1000)));
        assert_eq!(report.hhi.value(0, HHI_COLUMN), Some(&Value::Float(6600.0)));

        let leader = &report.leaders[0];
        assert_eq!(leader.firm, Value::from("Aetna"));
        assert_eq!(leader.share, 0.1);
    }

    #[test]
    fn test_only_null_firms_is_empty_data() {
        let ds = Dataset::from_rows(
            &["State", "Organization Marketing Name", "Enrollment"],
            vec![vec!["AZ".into(), Value::Null, 500.into()]],
        )
        .unwrap();
        assert!(matches!(
            analyze_market(&ds, &MarketConfig::default()),
            Err(CaremarketError::EmptyData(_))
        ));
    }

    #[test]
    fn test_missing_column() {
        let config = MarketConfig {
            firm_column: "MajorInsuranceOrgName".to_string(),
            ..MarketConfig::default()
        };
        assert!(matches!(
            analyze_market(&enrollment(), &config),
            Err(CaremarketError::Schema { .. })
        ));
    }

    #[test]
    fn test_everything_filtered_is_empty_data() {
        let config = MarketConfig {
            suppressed_values: vec!["*".into(), "100".into(), "300".into(), "40".into(), "60".into()],
            ..MarketConfig::default()
        };
        assert!(matches!(
            analyze_market(&enrollment(), &config),
            Err(CaremarketError::EmptyData(_))
        ));
    }
}
