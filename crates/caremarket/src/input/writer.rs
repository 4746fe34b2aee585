//! CSV output for datasets handed to a presentation layer.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::data::Dataset;
use crate::error::{CaremarketError, Result};

/// Write a dataset as CSV with a header row. Nulls are written as empty fields.
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(dataset.column_names())?;
    for row in dataset.rows() {
        out.write_record(row.iter().map(|v| v.to_string()))?;
    }
    out.flush().map_err(|e| CaremarketError::Io {
        path: "<writer>".into(),
        source: e,
    })?;
    Ok(())
}

/// Write a dataset to a CSV file.
pub fn write_csv_file(dataset: &Dataset, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| CaremarketError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    write_csv(dataset, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    #[test]
    fn test_write_csv_quotes_and_nulls() {
        let ds = Dataset::from_rows(
            &["org", "enroll"],
            vec![
                vec!["Humana, Inc.".into(), 10.into()],
                vec!["CVS".into(), Value::Null],
            ],
        )
        .unwrap();
        let mut buf = Vec::new();
        write_csv(&ds, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "org,enroll\n\"Humana, Inc.\",10\nCVS,\n");
    }
}
