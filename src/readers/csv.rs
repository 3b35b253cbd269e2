use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::{Reader, ReaderBuilder};

use crate::inference::parse_cell;
use crate::table::Table;
use crate::types::{Result, Value};

/// CSV/TSV file reader
pub struct CsvReader {
    path: PathBuf,
    delimiter: u8,
}

impl CsvReader {
    /// Create a new CSV reader
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: b',',
        }
    }

    /// Create a new TSV reader
    pub fn new_tsv(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            delimiter: b'\t',
        }
    }

    fn create_reader(&self) -> Result<Reader<BufReader<File>>> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let csv_reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(reader);
        Ok(csv_reader)
    }

    /// Read the whole file; ragged rows are an error
    pub fn read(&self) -> Result<Table> {
        let mut reader = self.create_reader()?;

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows: Vec<Vec<Value>> = Vec::new();
        for result in reader.records() {
            let record = result?;
            rows.push(record.iter().map(parse_cell).collect());
        }

        Table::from_rows(headers, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_csv_cells() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        write!(file, "ID,_score,name\n1,2.5,ann\n2,.,\n").unwrap();

        let table = CsvReader::new(file.path()).read().unwrap();
        assert_eq!(table.column_names(), vec!["ID", "_score", "name"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(
            table.row(0).unwrap(),
            vec![&Value::Number(1.0), &Value::Number(2.5), &Value::Text("ann".to_string())]
        );
        assert!(table.row(1).unwrap()[1].is_missing());
        assert!(table.row(1).unwrap()[2].is_missing());
    }

    #[test]
    fn test_read_tsv() {
        let mut file = NamedTempFile::with_suffix(".tsv").unwrap();
        write!(file, "ID\tgroup\n1\tcontrol\n").unwrap();

        let table = CsvReader::new_tsv(file.path()).read().unwrap();
        assert_eq!(table.column("group").unwrap().values, vec![Value::from("control")]);
    }

    #[test]
    fn test_ragged_rows_fail() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        write!(file, "a,b\n1,2\n3\n").unwrap();

        assert!(CsvReader::new(file.path()).read().is_err());
    }

    #[test]
    fn test_duplicate_header_fails() {
        let mut file = NamedTempFile::with_suffix(".csv").unwrap();
        write!(file, "a,a\n1,2\n").unwrap();

        let result = CsvReader::new(file.path()).read();
        assert!(matches!(result, Err(Error::DuplicateColumn(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = CsvReader::new(Path::new("/nonexistent/input.csv")).read();
        assert!(matches!(result, Err(Error::Io(_))));
    }
}
