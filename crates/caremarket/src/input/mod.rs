//! Loading delimited text into datasets and writing datasets back out.

mod loader;
mod source;
mod writer;

pub use loader::{Loader, LoaderConfig};
pub use source::SourceMetadata;
pub use writer::{write_csv, write_csv_file};
