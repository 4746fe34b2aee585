//! Derived metrics over aggregated datasets.

mod concentration;
mod rate;

pub use concentration::{hhi, hhi_by_group, hhi_of, ConcentrationBand, ShareScale, HHI_COLUMN};
pub use rate::{rate, share};
pub(crate) use rate::read_number;
