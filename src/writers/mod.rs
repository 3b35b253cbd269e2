pub mod csv;
pub mod sav;

use std::path::Path;

use crate::table::Table;
use crate::types::{OutputFormat, Result};

/// Per-write settings
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions<'a> {
    pub format: OutputFormat,
    /// SPSS file label; ignored by CSV
    pub file_label: Option<&'a str>,
}

/// Writes a table to a destination file, creating or replacing it
pub trait TableWriter {
    fn write(&self, table: &Table, path: &Path, options: &WriteOptions<'_>) -> Result<()>;
}

/// Writer that picks a backend from the requested output format
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatWriter;

impl TableWriter for FormatWriter {
    fn write(&self, table: &Table, path: &Path, options: &WriteOptions<'_>) -> Result<()> {
        match options.format {
            OutputFormat::Spss => sav::SavWriter::new(options.file_label).write_file(table, path),
            OutputFormat::Csv => csv::write_csv_file(table, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use crate::types::Value;
    use tempfile::tempdir;

    fn table() -> Table {
        Table::new(vec![Column::new("ID", vec![Value::from(1.0)])]).unwrap()
    }

    #[test]
    fn test_dispatch_csv() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let options = WriteOptions {
            format: OutputFormat::Csv,
            file_label: None,
        };

        FormatWriter.write(&table(), &path, &options).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "ID\n1\n");
    }

    #[test]
    fn test_dispatch_spss() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.sav");
        let options = WriteOptions {
            format: OutputFormat::Spss,
            file_label: Some("out"),
        };

        FormatWriter.write(&table(), &path, &options).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"$FL2");
    }
}
