//! caremarket: healthcare market and provider analyses over tabular data.
//!
//! The library is a small pipeline of pure stages over immutable [`Dataset`]s:
//! load delimited text, filter rows, join tables, group and reduce, then
//! either run an exact test of association or derive market metrics such as
//! shares, the Herfindahl-Hirschman index and per-capita density.
//!
//! # Core Principles
//!
//! - **Explicit cardinality**: joins report unmatched rows and duplicate keys
//! - **Fail early**: columns are resolved before any row is read
//! - **Provenance**: every dataset records the stages that produced it
//!
//! # Example
//!
//! ```no_run
//! use caremarket::{Analyzer, Loader};
//!
//! let (enrollment, _) = Loader::new().load_file("CPSC_Enrollment_Info_2023_01.csv")?;
//! let report = Analyzer::new().market(&enrollment)?;
//!
//! for leader in &report.leaders {
//!     println!("{}: {} ({:.0}, {})", leader.market, leader.firm, leader.hhi, leader.band);
//! }
//! # Ok::<(), caremarket::CaremarketError>(())
//! ```

pub mod analysis;
pub mod config;
pub mod data;
pub mod error;
pub mod input;
pub mod metrics;
pub mod schema;
pub mod stats;
pub mod transform;

pub use analysis::{Analyzer, AssociationReport, DensityReport, MarketReport};
pub use config::AnalysisConfig;
pub use data::{AggregatedMetric, Dataset, Provenance, Row, SortOrder, Value};
pub use error::{CaremarketError, Result};
pub use input::{Loader, LoaderConfig, SourceMetadata};
pub use schema::{ColumnSchema, ColumnType, TableSchema};
pub use stats::{ContingencyTable, ExactTestResult, Tail};
pub use transform::{Category, JoinKeys, JoinKind, JoinOptions, Predicate, Recode, Reducer};
