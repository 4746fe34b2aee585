//! Per-capita density of records by region.

use log::info;
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, SortOrder};
use crate::error::{CaremarketError, Result};
use crate::metrics::rate;
use crate::transform::{count_rows, filter, join_with, JoinKeys, JoinKind, JoinOptions, JoinReport, Predicate};

/// Configuration for a density analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DensityConfig {
    /// Records counted, e.g. one kind of facility.
    pub predicate: Predicate,
    /// Region column of the records.
    pub region_column: String,
    /// Region column of the population table.
    pub population_region_column: String,
    pub population_column: String,
    /// Column receiving the record count per region.
    pub count_column: String,
    /// Column receiving the density.
    pub output_column: String,
    /// Density unit, e.g. 1e6 for "per million residents".
    pub per: f64,
}

impl Default for DensityConfig {
    fn default() -> Self {
        Self {
            predicate: Predicate::new(),
            region_column: "Provider Business Practice Location Address State Name".to_string(),
            population_region_column: "State Code".to_string(),
            population_column: "Population".to_string(),
            count_column: "Count".to_string(),
            output_column: "Density".to_string(),
            per: 1_000_000.0,
        }
    }
}

/// Output of [`analyze_density`].
#[derive(Debug, Clone, Serialize)]
pub struct DensityReport {
    /// One row per matched region: count, population and density, densest first.
    pub densities: Dataset,
    /// How counted regions lined up with the population table.
    pub join: JoinReport,
}

/// Count records per region and scale by population.
///
/// Regions missing from the population table are dropped and reported in
/// [`DensityReport::join`]. A population table listing a region twice fails.
pub fn analyze_density(
    records: &Dataset,
    population: &Dataset,
    config: &DensityConfig,
) -> Result<DensityReport> {
    if !(config.per.is_finite() && config.per > 0.0) {
        return Err(CaremarketError::InvalidArgument(format!(
            "density unit must be positive, got {}",
            config.per
        )));
    }
    records.schema().require(&config.region_column)?;
    population
        .schema()
        .require_all(&[&config.population_region_column, &config.population_column])?;

    let selected = filter(records, &config.predicate)?;
    let counts = count_rows(&selected, &[&config.region_column], &config.count_column)?;
    let joined = join_with(
        &counts,
        &population.select(&[&config.population_region_column, &config.population_column])?,
        &JoinKeys::pairs([&config.region_column], [&config.population_region_column]),
        &JoinOptions::new(JoinKind::Inner).expect_unique_right(),
    )?;

    let densities = rate(
        &joined.dataset,
        &config.count_column,
        &config.population_column,
        config.per,
        &config.output_column,
    )?
    .sort_by(&[
        (config.output_column.as_str(), SortOrder::Descending),
        (config.region_column.as_str(), SortOrder::Ascending),
    ])?;

    info!(
        "density of {} records over {} regions ({} without population)",
        selected.row_count(),
        densities.row_count(),
        joined.report.unmatched_left
    );

    Ok(DensityReport {
        densities,
        join: joined.report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn facilities() -> Dataset {
        Dataset::from_rows(
            &["Entity Type Code", "Taxonomy", "State"],
            vec![
                vec![2.into(), "261QM1200X".into(), "TX".into()],
                vec![2.into(), "261QM1200X".into(), "TX".into()],
                vec![2.into(), "261QM1200X".into(), "VT".into()],
                vec![1.into(), "261QM1200X".into(), "VT".into()],
                vec![2.into(), "207R00000X".into(), "VT".into()],
                vec![2.into(), "261QM1200X".into(), "PR".into()],
            ],
        )
        .unwrap()
    }

    fn population() -> Dataset {
        Dataset::from_rows(
            &["State Code", "Population"],
            vec![
                vec!["TX".into(), 4_000_000.into()],
                vec!["VT".into(), 500_000.into()],
            ],
        )
        .unwrap()
    }

    fn config() -> DensityConfig {
        DensityConfig {
            predicate: Predicate::new()
                .equals("Entity Type Code", 2)
                .equals("Taxonomy", "261QM1200X"),
            region_column: "State".to_string(),
            ..DensityConfig::default()
        }
    }

    #[test]
    fn test_density_per_million() {
        let report = analyze_density(&facilities(), &population(), &config()).unwrap();
        let d = &report.densities;
        assert_eq!(d.column_names(), vec!["State", "Count", "Population", "Density"]);
        assert_eq!(d.row_count(), 2);
        assert_eq!(d.value(0, "State"), Some(&Value::from("VT")));
        assert_eq!(d.value(0, "Density"), Some(&Value::Float(2.0)));
        assert_eq!(d.value(1, "Density"), Some(&Value::Float(0.5)));
        assert_eq!(report.join.unmatched_left, 1);
    }

    #[test]
    fn test_duplicate_population_rows_fail() {
        let pop = Dataset::from_rows(
            &["State Code", "Population"],
            vec![
                vec!["TX".into(), 4_000_000.into()],
                vec!["TX".into(), 4_100_000.into()],
            ],
        )
        .unwrap();
        assert!(matches!(
            analyze_density(&facilities(), &pop, &config()),
            Err(CaremarketError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_invalid_unit() {
        let cfg = DensityConfig {
            per: 0.0,
            ..config()
        };
        assert!(analyze_density(&facilities(), &population(), &cfg).is_err());
    }
}
