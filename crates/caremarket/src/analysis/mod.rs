//! Analyses composed from the pipeline stages.
//!
//! Each analysis takes loaded datasets and a serde-configurable config struct
//! and returns a serializable report. [`Analyzer`] bundles the configs of a
//! whole study so they can be loaded from one JSON file.

mod association;
mod density;
mod market;

pub use association::{analyze_association, AssociationConfig, AssociationReport};
pub use density::{analyze_density, DensityConfig, DensityReport};
pub use market::{
    analyze_market, MarketConfig, MarketLeader, MarketReport, BAND_COLUMN,
    CONTRACT_NUMBER_PATTERN, SHARE_COLUMN, TOTAL_COLUMN,
};

use std::path::Path;

use crate::config::AnalysisConfig;
use crate::data::Dataset;
use crate::error::Result;
use crate::input::{Loader, SourceMetadata};

/// Runs configured analyses.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Load a delimited file with the configured loader settings.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<(Dataset, SourceMetadata)> {
        Loader::with_config(self.config.loader.clone()).load_file(path)
    }

    pub fn market(&self, enrollment: &Dataset) -> Result<MarketReport> {
        analyze_market(enrollment, &self.config.market)
    }

    pub fn association(&self, records: &Dataset) -> Result<AssociationReport> {
        analyze_association(records, &self.config.association)
    }

    pub fn density(&self, records: &Dataset, population: &Dataset) -> Result<DensityReport> {
        analyze_density(records, population, &self.config.density)
    }
}
