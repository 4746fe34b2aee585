//! In-memory tabular data: values, rows, datasets and their provenance.

mod dataset;
mod provenance;
mod value;

pub use dataset::{Dataset, Row, SortOrder};
pub use provenance::{AggregatedMetric, Provenance, ProvenanceStep};
pub use value::Value;
