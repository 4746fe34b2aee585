//! Dataset-to-dataset stages: filter, join, aggregate and categorize.
//!
//! Every stage validates the columns it references before reading any row and
//! returns a new dataset; inputs are never modified.

mod aggregate;
mod categorize;
mod filter;
mod join;

pub use aggregate::{count_rows, first_by_min, group_and_reduce, Reducer};
pub use categorize::{categorize, Category, Recode};
pub use filter::{filter, Condition, Predicate};
pub use join::{
    detect_duplicates, duplicate_groups, join, join_with, DuplicateGroup, JoinKeys, JoinKind,
    JoinOptions, JoinOutcome, JoinReport,
};
