use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Input file extension scanned for by default
pub const DEFAULT_INPUT_EXTENSION: &str = "sas7bdat";

/// Merge key used when none is configured
pub const DEFAULT_MERGE_KEY: &str = "ID";

/// A single table cell
#[derive(Debug, Clone)]
pub enum Value {
    Number(f64),
    Text(String),
    Missing,
}

impl Value {
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    fn rank(&self) -> u8 {
        match self {
            Value::Number(_) => 0,
            Value::Text(_) => 1,
            Value::Missing => 2,
        }
    }

    // -0.0 and 0.0 must compare and hash equal
    fn normalized(n: f64) -> f64 {
        if n == 0.0 {
            0.0
        } else {
            n
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        if n.is_nan() {
            Value::Missing
        } else {
            Value::Number(n)
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

/// Numbers sort before text, text before missing.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                Value::normalized(*a).total_cmp(&Value::normalized(*b))
            }
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Value::Number(n) => Value::normalized(*n).to_bits().hash(state),
            Value::Text(s) => s.hash(state),
            Value::Missing => {}
        }
    }
}

/// Integral numbers render without a fractional part; missing renders empty.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
            Value::Missing => Ok(()),
        }
    }
}

/// Supported input file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Csv,
    Tsv,
    Sas,
}

impl InputFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(InputFormat::Csv),
            "tsv" | "tab" => Some(InputFormat::Tsv),
            "sas7bdat" => Some(InputFormat::Sas),
            _ => None,
        }
    }
}

/// Output file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Spss,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Spss => "sav",
            OutputFormat::Csv => "csv",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "spss" => Ok(OutputFormat::Spss),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(Error::UnsupportedFormat(format!(
                "Unknown output format '{}' (expected spss or csv)",
                other
            ))),
        }
    }
}

/// Relational join variants used by the merge accumulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum JoinHow {
    Inner,
    Outer,
    Left,
    Right,
}

impl JoinHow {
    /// Whether a key tuple present on the given sides survives the join
    pub fn keeps(&self, in_left: bool, in_right: bool) -> bool {
        match self {
            JoinHow::Inner => in_left && in_right,
            JoinHow::Outer => in_left || in_right,
            JoinHow::Left => in_left,
            JoinHow::Right => in_right,
        }
    }
}

/// Ordered merge key names. Matching is case-insensitive; the first spelling
/// of each name is kept as canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeKeySet {
    keys: Vec<String>,
}

impl MergeKeySet {
    pub fn new<I, S>(names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if name.trim().is_empty() {
                return Err(Error::Argument("merge key names must not be empty".to_string()));
            }
            if !keys.iter().any(|k| k.eq_ignore_ascii_case(&name)) {
                keys.push(name);
            }
        }

        if keys.is_empty() {
            return Err(Error::Argument("at least one merge key is required".to_string()));
        }

        Ok(Self { keys })
    }

    /// Canonical spelling of `name` if it is a merge key
    pub fn canonical(&self, name: &str) -> Option<&str> {
        self.keys
            .iter()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.as_str())
    }
}

impl Default for MergeKeySet {
    fn default() -> Self {
        Self {
            keys: vec![DEFAULT_MERGE_KEY.to_string()],
        }
    }
}

/// A per-file failure kept for the end-of-batch summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub identifier: String,
    pub message: String,
}

impl FailureRecord {
    pub fn new(identifier: impl Into<String>, message: impl ToString) -> Self {
        Self {
            identifier: identifier.into(),
            message: message.to_string(),
        }
    }
}

/// Batch conversion options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertOptions {
    /// Directory scanned for input files
    pub input_dir: PathBuf,

    /// Directory receiving converted files
    pub output_dir: PathBuf,

    /// Extension of input files, without the dot
    pub input_ext: String,

    /// Format of every written file
    pub output_format: OutputFormat,

    /// Merged output file name inside `output_dir`; merging is off when unset
    pub single_file: Option<String>,

    /// Join key columns
    pub merge_keys: MergeKeySet,

    /// Join type used when merging
    pub merge_how: JoinHow,

    /// Prefix non-key column names with the source file's base name
    pub prefix_vars: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            input_ext: DEFAULT_INPUT_EXTENSION.to_string(),
            output_format: OutputFormat::Spss,
            single_file: None,
            merge_keys: MergeKeySet::default(),
            merge_how: JoinHow::Outer,
            prefix_vars: false,
        }
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, crate::error::Error>;
