use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Glob pattern error: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Duplicate column name after cleaning: '{0}'")]
    DuplicateColumn(String),

    #[error("SPSS writer error: {0}")]
    Sav(String),

    #[error("ReadStat error: {0}")]
    ReadStat(String),
}

/// Reasons a table could not be joined into the merge accumulator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("merge key '{key}' not found in {side} table")]
    MissingKey { key: String, side: JoinSide },

    #[error("{side} table has duplicate merge key {key}; merge is not one-to-one")]
    DuplicateKeys { side: JoinSide, key: String },

    #[error("merge key '{key}' is numeric in one table and text in the other")]
    KeyTypeMismatch { key: String },

    #[error("merged table is invalid: {0}")]
    InvalidTable(String),
}

/// Which input of a join an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

impl std::fmt::Display for JoinSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinSide::Left => write!(f, "left"),
            JoinSide::Right => write!(f, "right"),
        }
    }
}
