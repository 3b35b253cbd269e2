use std::fs;
use std::io::Write;
use std::path::Path;

use csv::Writer;

use crate::table::Table;
use crate::types::Result;

/// Write a table as UTF-8 CSV with a header row and no index column
pub fn write_csv_file(table: &Table, path: &Path) -> Result<()> {
    let mut buffer = Vec::new();
    write_csv(table, &mut buffer)?;
    fs::write(path, buffer)?;
    Ok(())
}

/// Write a table as CSV to any writer
pub fn write_csv<W: Write>(table: &Table, out: W) -> Result<()> {
    let mut writer = Writer::from_writer(out);

    if table.column_count() > 0 {
        writer.write_record(table.column_names())?;
    }

    for row in 0..table.row_count() {
        writer.write_record(table.columns().iter().map(|c| c.values[row].to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::Column;
    use crate::types::Value;

    #[test]
    fn test_write_csv() {
        let table = Table::new(vec![
            Column::new("ID", vec![Value::from(1.0), Value::from(2.0)]),
            Column::new("score", vec![Value::from(2.5), Value::Missing]),
            Column::new("note", vec![Value::from("a, b"), Value::from("plain")]),
        ])
        .unwrap();

        let mut buf = Vec::new();
        write_csv(&table, &mut buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "ID,score,note\n1,2.5,\"a, b\"\n2,,plain\n");
    }

    #[test]
    fn test_write_empty_table() {
        let mut buf = Vec::new();
        write_csv(&Table::default(), &mut buf).unwrap();
        assert!(buf.is_empty());
    }
}
