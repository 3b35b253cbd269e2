//! SPSS system file (.sav) writer.
//!
//! Writes uncompressed little-endian files with a UTF-8 encoding record.
//! Layout: file header, one variable record per 8-byte segment, extension
//! records (machine info, float info, long names, encoding), the dictionary
//! terminator, then the cases.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::Error;
use crate::inference::{infer_column_kind, ColumnKind};
use crate::table::Table;
use crate::types::{Result, Value};

const PRODUCT_NAME: &str = concat!("@(#) SPSS DATA FILE sas-convert ", env!("CARGO_PKG_VERSION"));
const PRODUCT_NAME_LEN: usize = 60;
const FILE_LABEL_LEN: usize = 64;
const LAYOUT_CODE: i32 = 2;
const COMPRESSION_NONE: i32 = 0;
const BIAS: f64 = 100.0;

const MAX_SHORT_NAME_LEN: usize = 8;
const MAX_LONG_NAME_LEN: usize = 64;

const FORMAT_A: i32 = 1;
const FORMAT_F: i32 = 5;

const RECORD_VARIABLE: i32 = 2;
const RECORD_EXTENSION: i32 = 7;
const RECORD_DICT_END: i32 = 999;

const SUBTYPE_MACHINE_INTEGER: i32 = 3;
const SUBTYPE_MACHINE_FLOAT: i32 = 4;
const SUBTYPE_LONG_NAMES: i32 = 13;
const SUBTYPE_ENCODING: i32 = 20;

const UTF8_CODE_PAGE: i32 = 65001;

/// System-missing value
pub const SYSMIS: f64 = -f64::MAX;

const RESERVED_WORDS: &[&str] = &[
    "ALL", "AND", "BY", "EQ", "GE", "GT", "LE", "LT", "NE", "NOT", "OR", "TO", "WITH",
];

static SHORT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z@][A-Z0-9@#$_.]{0,7}$").unwrap());

struct Variable {
    short_name: String,
    long_name: String,
    kind: ColumnKind,
}

impl Variable {
    fn segments(&self) -> usize {
        match self.kind {
            ColumnKind::Numeric => 1,
            ColumnKind::String(width) => width.div_ceil(8),
        }
    }

    fn format(&self) -> i32 {
        match self.kind {
            ColumnKind::Numeric => (FORMAT_F << 16) | (8 << 8) | 2,
            ColumnKind::String(width) => (FORMAT_A << 16) | ((width as i32) << 8),
        }
    }
}

/// SPSS system file writer
pub struct SavWriter<'a> {
    file_label: Option<&'a str>,
    timestamp: Option<NaiveDateTime>,
}

impl<'a> SavWriter<'a> {
    pub fn new(file_label: Option<&'a str>) -> Self {
        Self {
            file_label,
            timestamp: None,
        }
    }

    /// Fix the creation date stamped in the header
    #[cfg(test)]
    pub fn with_timestamp(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Encode the whole file in memory first so a table that cannot be
    /// written never leaves a partial file behind.
    pub fn write_file(&self, table: &Table, path: &Path) -> Result<()> {
        let mut buffer = Vec::new();
        self.write(table, &mut buffer)?;
        fs::write(path, buffer)?;
        Ok(())
    }

    pub fn write<W: Write>(&self, table: &Table, out: &mut W) -> Result<()> {
        let variables = build_variables(table)?;
        let case_size: usize = variables.iter().map(Variable::segments).sum();
        let n_cases = i32::try_from(table.row_count())
            .map_err(|_| Error::Sav(format!("too many rows: {}", table.row_count())))?;
        let case_size = i32::try_from(case_size)
            .map_err(|_| Error::Sav(format!("too many variables: {}", case_size)))?;

        self.write_header(out, case_size, n_cases)?;
        for variable in &variables {
            write_variable(out, variable)?;
        }
        write_machine_info(out)?;
        write_long_names(out, &variables)?;
        write_text_extension(out, SUBTYPE_ENCODING, "UTF-8")?;
        write_i32(out, RECORD_DICT_END)?;
        write_i32(out, 0)?;

        for row in 0..table.row_count() {
            for (variable, column) in variables.iter().zip(table.columns()) {
                write_cell(out, variable, &column.values[row])?;
            }
        }

        Ok(())
    }

    fn write_header<W: Write>(&self, out: &mut W, case_size: i32, n_cases: i32) -> Result<()> {
        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Local::now().naive_local());

        out.write_all(b"$FL2")?;
        out.write_all(&padded(PRODUCT_NAME, PRODUCT_NAME_LEN))?;
        write_i32(out, LAYOUT_CODE)?;
        write_i32(out, case_size)?;
        write_i32(out, COMPRESSION_NONE)?;
        write_i32(out, 0)?; // no weight variable
        write_i32(out, n_cases)?;
        out.write_all(&BIAS.to_le_bytes())?;
        out.write_all(&padded(&timestamp.format("%d %b %y").to_string(), 9))?;
        out.write_all(&padded(&timestamp.format("%H:%M:%S").to_string(), 8))?;
        out.write_all(&padded(self.file_label.unwrap_or(""), FILE_LABEL_LEN))?;
        out.write_all(&[0u8; 3])?;
        Ok(())
    }
}

fn build_variables(table: &Table) -> Result<Vec<Variable>> {
    let names = table.column_names();
    let short_names = short_names(&names);

    let mut long_names = HashSet::new();
    let mut variables = Vec::with_capacity(names.len());
    for ((column, short_name), name) in table.columns().iter().zip(short_names).zip(names) {
        let long_name = truncate_bytes(name, MAX_LONG_NAME_LEN).to_string();
        if !long_names.insert(long_name.to_uppercase()) {
            return Err(Error::Sav(format!(
                "variable name '{}' is not unique within {} bytes",
                name, MAX_LONG_NAME_LEN
            )));
        }
        variables.push(Variable {
            short_name,
            long_name,
            kind: infer_column_kind(&column.values),
        });
    }

    Ok(variables)
}

/// Derive unique 8-byte short names, falling back to `V<n>`
fn short_names(names: &[&str]) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::new();
    let mut result = Vec::with_capacity(names.len());

    for (idx, name) in names.iter().enumerate() {
        let candidate: String = name
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '@' | '#' | '$' | '_' | '.'))
            .map(|c| c.to_ascii_uppercase())
            .take(MAX_SHORT_NAME_LEN)
            .collect();

        let short = if is_valid_short_name(&candidate) && !used.contains(&candidate) {
            candidate
        } else {
            let mut n = idx + 1;
            loop {
                let fallback = format!("V{}", n);
                if !used.contains(&fallback) {
                    break fallback;
                }
                n += 1;
            }
        };

        used.insert(short.clone());
        result.push(short);
    }

    result
}

fn is_valid_short_name(name: &str) -> bool {
    SHORT_NAME.is_match(name)
        && !name.ends_with('.')
        && !name.ends_with('_')
        && !RESERVED_WORDS.contains(&name)
}

fn write_variable<W: Write>(out: &mut W, variable: &Variable) -> Result<()> {
    let var_type = match variable.kind {
        ColumnKind::Numeric => 0,
        ColumnKind::String(width) => width as i32,
    };

    write_i32(out, RECORD_VARIABLE)?;
    write_i32(out, var_type)?;
    write_i32(out, 0)?; // no variable label
    write_i32(out, 0)?; // no missing values
    write_i32(out, variable.format())?;
    write_i32(out, variable.format())?;
    out.write_all(&padded(&variable.short_name, MAX_SHORT_NAME_LEN))?;

    // continuation records for each extra 8-byte string segment
    for _ in 1..variable.segments() {
        write_i32(out, RECORD_VARIABLE)?;
        write_i32(out, -1)?;
        for _ in 0..4 {
            write_i32(out, 0)?;
        }
        out.write_all(&[b' '; MAX_SHORT_NAME_LEN])?;
    }

    Ok(())
}

fn write_machine_info<W: Write>(out: &mut W) -> Result<()> {
    // version, machine code, IEEE floats, compression code, little-endian, code page
    let integers: [i32; 8] = [1, 0, 0, -1, 1, 1, 2, UTF8_CODE_PAGE];
    write_i32(out, RECORD_EXTENSION)?;
    write_i32(out, SUBTYPE_MACHINE_INTEGER)?;
    write_i32(out, 4)?;
    write_i32(out, integers.len() as i32)?;
    for value in integers {
        write_i32(out, value)?;
    }

    let lowest = f64::from_bits((-f64::MAX).to_bits() - 1);
    let floats: [f64; 3] = [SYSMIS, f64::MAX, lowest];
    write_i32(out, RECORD_EXTENSION)?;
    write_i32(out, SUBTYPE_MACHINE_FLOAT)?;
    write_i32(out, 8)?;
    write_i32(out, floats.len() as i32)?;
    for value in floats {
        out.write_all(&value.to_le_bytes())?;
    }

    Ok(())
}

fn write_long_names<W: Write>(out: &mut W, variables: &[Variable]) -> Result<()> {
    let pairs: Vec<String> = variables
        .iter()
        .map(|v| format!("{}={}", v.short_name, v.long_name))
        .collect();
    write_text_extension(out, SUBTYPE_LONG_NAMES, &pairs.join("\t"))
}

fn write_text_extension<W: Write>(out: &mut W, subtype: i32, text: &str) -> Result<()> {
    let len = i32::try_from(text.len())
        .map_err(|_| Error::Sav(format!("extension record {} too large", subtype)))?;
    write_i32(out, RECORD_EXTENSION)?;
    write_i32(out, subtype)?;
    write_i32(out, 1)?;
    write_i32(out, len)?;
    out.write_all(text.as_bytes())?;
    Ok(())
}

fn write_cell<W: Write>(out: &mut W, variable: &Variable, value: &Value) -> Result<()> {
    match variable.kind {
        ColumnKind::Numeric => {
            let number = match value {
                Value::Number(n) => *n,
                _ => SYSMIS,
            };
            out.write_all(&number.to_le_bytes())?;
        }
        ColumnKind::String(width) => {
            let text = value.to_string();
            let text = truncate_bytes(&text, width);
            out.write_all(&padded(text, variable.segments() * 8))?;
        }
    }
    Ok(())
}

fn write_i32<W: Write>(out: &mut W, value: i32) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn padded(s: &str, len: usize) -> Vec<u8> {
    let mut bytes = truncate_bytes(s, len).as_bytes().to_vec();
    bytes.resize(len, b' ');
    bytes
}
