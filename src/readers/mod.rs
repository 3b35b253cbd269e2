pub mod csv;
pub mod sas;

use std::path::Path;

use crate::table::Table;
use crate::types::{InputFormat, Result};

/// Reads one data file into a table
pub trait TableReader {
    fn read(&self, path: &Path) -> Result<Table>;
}

/// Reader that picks a backend from the file extension
#[derive(Debug, Default, Clone, Copy)]
pub struct FormatReader;

impl TableReader for FormatReader {
    fn read(&self, path: &Path) -> Result<Table> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        let format = InputFormat::from_extension(ext).ok_or_else(|| {
            crate::error::Error::UnsupportedFormat(format!(
                "Unsupported file extension: .{}",
                ext
            ))
        })?;

        match format {
            InputFormat::Csv => csv::CsvReader::new(path).read(),
            InputFormat::Tsv => csv::CsvReader::new_tsv(path).read(),
            InputFormat::Sas => sas::SasReader::new(path).read(),
        }
    }
}
