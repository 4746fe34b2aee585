//! Contingency tables and exact tests of association.

mod contingency;
mod fisher;

pub use contingency::{build_contingency, ContingencyTable};
pub use fisher::{exact_test, exact_test_rxc, odds_ratio, ExactTestResult, Tail};
