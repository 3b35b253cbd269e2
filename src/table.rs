use std::collections::HashSet;

use crate::error::Error;
use crate::types::{Result, Value};

/// A named column of cells
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// An ordered set of uniquely named, equal-length columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    /// Build a table, rejecting duplicate names and ragged columns
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let row_count = columns.first().map(|c| c.values.len()).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(Error::DuplicateColumn(column.name.clone()));
            }
            if column.values.len() != row_count {
                return Err(Error::InvalidTable(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.values.len(),
                    row_count
                )));
            }
        }

        Ok(Self { columns, row_count })
    }

    /// Build a table from a header and row-major cells
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut columns: Vec<Column> = names
            .into_iter()
            .map(|name| Column::new(name, Vec::with_capacity(rows.len())))
            .collect();

        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::InvalidTable(format!(
                    "row {} has {} cells, expected {}",
                    row_idx + 1,
                    row.len(),
                    columns.len()
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.values.push(value);
            }
        }

        Self::new(columns)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Cells of one row, in column order
    #[cfg(test)]
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Replace every column name, keeping cells untouched
    pub fn rename_columns(self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.columns.len() {
            return Err(Error::InvalidTable(format!(
                "{} names given for {} columns",
                names.len(),
                self.columns.len()
            )));
        }

        let columns = self
            .columns
            .into_iter()
            .zip(names)
            .map(|(column, name)| Column::new(name, column.values))
            .collect();

        Self::new(columns)
    }
}
