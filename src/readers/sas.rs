//! SAS .sas7bdat file reader
//!
//! Binary SAS parsing is delegated to ReadStat, which has no crates.io
//! binding yet. Until one exists every read reports a `ReadStat` error, which
//! the batch records as a per-file failure.

use std::path::{Path, PathBuf};

use crate::table::Table;
use crate::types::Result;

/// SAS .sas7bdat file reader
pub struct SasReader {
    path: PathBuf,
}

impl SasReader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn read(&self) -> Result<Table> {
        Err(crate::error::Error::ReadStat(format!(
            "cannot read '{}': SAS reader is not available in this build; \
             export the dataset to CSV and rerun with --input-ext csv",
            self.path.display()
        )))
    }
}
