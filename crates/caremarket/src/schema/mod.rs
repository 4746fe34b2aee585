//! Schema types describing the columns of a dataset.

mod column;
mod table;
mod types;

pub use column::ColumnSchema;
pub use table::TableSchema;
pub use types::ColumnType;
