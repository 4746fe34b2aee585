//! Study configuration loaded from JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::analysis::{AssociationConfig, DensityConfig, MarketConfig};
use crate::error::{CaremarketError, Result};
use crate::input::LoaderConfig;

/// Settings for every analysis of a study.
///
/// Sections missing from the file fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub loader: LoaderConfig,
    pub market: MarketConfig,
    pub association: AssociationConfig,
    pub density: DensityConfig,
}

impl AnalysisConfig {
    /// Load a configuration from a JSON file.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use caremarket::AnalysisConfig;
    /// # fn example() -> caremarket::Result<()> {
    /// let config = AnalysisConfig::from_json_file("study.json")?;
    /// println!("markets by {}", config.market.market_column);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| CaremarketError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            CaremarketError::Config(format!("invalid config '{}': {}", path.display(), e))
        })?;
        config.validate()?;
        info!("loaded analysis config from {}", path.display());
        Ok(config)
    }

    /// Write the configuration as pretty-printed JSON.
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| CaremarketError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Check values serde accepts but the analyses cannot use.
    pub fn validate(&self) -> Result<()> {
        let a = &self.association;
        if !(a.alpha > 0.0 && a.alpha < 1.0) {
            return Err(CaremarketError::Config(format!(
                "association.alpha must be in (0, 1), got {}",
                a.alpha
            )));
        }
        if a.row_labels.is_empty() || a.col_labels.is_empty() {
            return Err(CaremarketError::Config(
                "association labels must not be empty".to_string(),
            ));
        }
        if let Some(recode) = &a.recode {
            if recode.categories.is_empty() {
                return Err(CaremarketError::Config(format!(
                    "association.recode of '{}' has no categories",
                    recode.column
                )));
            }
        }
        if !(self.density.per.is_finite() && self.density.per > 0.0) {
            return Err(CaremarketError::Config(format!(
                "density.per must be positive, got {}",
                self.density.per
            )));
        }
        if self.market.market_column == self.market.firm_column {
            return Err(CaremarketError::Config(
                "market.market_column and market.firm_column must differ".to_string(),
            ));
        }
        Ok(())
    }
}
