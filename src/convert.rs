use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::merge::Accumulator;
use crate::naming::clean_columns;
use crate::readers::TableReader;
use crate::table::Table;
use crate::error::Error;
use crate::types::{ConvertOptions, FailureRecord, Result};
use crate::writers::{TableWriter, WriteOptions};

/// What happened to one input file
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Converted { output: PathBuf },
    /// Destination already existed; nothing was written
    Skipped { output: PathBuf },
    Failed(FailureRecord),
}

/// What happened to the merged output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MergedOutcome {
    NotRequested,
    /// Destination already existed; merging was disabled
    Skipped { path: PathBuf },
    /// No table was contributed
    Empty,
    Written { path: PathBuf, rows: usize, columns: usize },
    Failed { path: PathBuf, message: String },
}

/// Summary of one batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub files_copied: usize,
    pub skipped: Vec<String>,
    pub failures: Vec<FailureRecord>,
    pub merge_failures: Vec<FailureRecord>,
    pub merged: MergedOutcome,
}

impl BatchReport {
    fn new() -> Self {
        Self {
            files_copied: 0,
            skipped: Vec::new(),
            failures: Vec::new(),
            merge_failures: Vec::new(),
            merged: MergedOutcome::NotRequested,
        }
    }
}

/// List `*.<ext>` files in `input_dir`, sorted by path
pub fn discover_inputs(input_dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&input_dir.display().to_string()),
        Pattern::escape(ext)
    );

    let mut files = Vec::new();
    for entry in glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable entry: {}", e),
        }
    }
    files.sort();
    Ok(files)
}

/// File name without directory or extension
pub fn file_root(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Destination of a converted file
pub fn output_path(options: &ConvertOptions, root: &str) -> PathBuf {
    options
        .output_dir
        .join(format!("{}.{}", root, options.output_format.extension()))
}

/// Refuse a merged file name that is also the output of one of the inputs.
///
/// Without this the merged write would be skipped or would clobber a
/// converted file, depending on which came first.
pub fn check_merged_target(options: &ConvertOptions, inputs: &[PathBuf]) -> Result<()> {
    let Some(single_file) = &options.single_file else {
        return Ok(());
    };
    let merged = options.output_dir.join(single_file);

    match inputs
        .iter()
        .find(|path| output_path(options, &file_root(path)) == merged)
    {
        Some(path) => Err(Error::Argument(format!(
            "merged file '{}' would overwrite the converted output of '{}'",
            single_file,
            path.display()
        ))),
        None => Ok(()),
    }
}

/// Read, clean and write one input file.
///
/// The cleaned table is returned for merging unless the file failed.
pub fn convert_file(
    path: &Path,
    options: &ConvertOptions,
    reader: &dyn TableReader,
    writer: &dyn TableWriter,
) -> (FileOutcome, Option<Table>) {
    let root = file_root(path);
    let output = output_path(options, &root);

    let result = reader.read(path).and_then(|table| {
        let prefix = options.prefix_vars.then_some(root.as_str());
        clean_columns(table, &options.merge_keys, prefix)
    });

    let table = match result {
        Ok(table) => table,
        Err(e) => {
            warn!("failed to read {}: {}", path.display(), e);
            return (FileOutcome::Failed(FailureRecord::new(root, e)), None);
        }
    };

    if output.exists() {
        info!("{} already exists, skipping", output.display());
        return (FileOutcome::Skipped { output }, Some(table));
    }

    info!("converting {} to {}", path.display(), output.display());
    let write_options = WriteOptions {
        format: options.output_format,
        file_label: Some(root.as_str()),
    };
    match writer.write(&table, &output, &write_options) {
        Ok(()) => (FileOutcome::Converted { output }, Some(table)),
        Err(e) => {
            warn!("failed to write {}: {}", output.display(), e);
            (FileOutcome::Failed(FailureRecord::new(root, e)), None)
        }
    }
}

/// Convert every input file and, when `single_file` is set, merge them.
///
/// Per-file and per-merge failures are recorded in the report; only input
/// discovery errors and a clashing merged file name are returned.
pub fn run_batch(
    options: &ConvertOptions,
    reader: &dyn TableReader,
    writer: &dyn TableWriter,
) -> Result<BatchReport> {
    let mut report = BatchReport::new();
    let inputs = discover_inputs(&options.input_dir, &options.input_ext)?;
    info!(
        "found {} .{} file(s) in {}",
        inputs.len(),
        options.input_ext,
        options.input_dir.display()
    );
    check_merged_target(options, &inputs)?;

    let merged_path = options.single_file.as_ref().map(|f| options.output_dir.join(f));
    let mut accumulator = match &merged_path {
        Some(path) if path.exists() => {
            info!("{} already exists, merging disabled", path.display());
            report.merged = MergedOutcome::Skipped { path: path.clone() };
            None
        }
        Some(_) => Some(Accumulator::new(options.merge_keys.clone(), options.merge_how)),
        None => None,
    };

    for path in &inputs {
        let (outcome, table) = convert_file(path, options, reader, writer);
        match outcome {
            FileOutcome::Converted { .. } => report.files_copied += 1,
            FileOutcome::Skipped { output } => report.skipped.push(output.display().to_string()),
            FileOutcome::Failed(record) => report.failures.push(record),
        }

        if let (Some(acc), Some(table)) = (accumulator.as_mut(), table) {
            if let Err(e) = acc.contribute(table) {
                warn!("failed to merge {}: {}", path.display(), e);
                report
                    .merge_failures
                    .push(FailureRecord::new(file_root(path), e));
            }
        }
    }

    if let (Some(acc), Some(path)) = (accumulator, merged_path) {
        report.merged = write_merged(acc, path, options, writer);
    }

    Ok(report)
}

fn write_merged(
    acc: Accumulator,
    path: PathBuf,
    options: &ConvertOptions,
    writer: &dyn TableWriter,
) -> MergedOutcome {
    let contributions = acc.contributions();
    let Some(table) = acc.into_table() else {
        info!("no tables were merged");
        return MergedOutcome::Empty;
    };

    info!(
        "writing merged table of {} file(s) to {}",
        contributions,
        path.display()
    );
    let write_options = WriteOptions {
        format: options.output_format,
        file_label: None,
    };
    match writer.write(&table, &path, &write_options) {
        Ok(()) => MergedOutcome::Written {
            path,
            rows: table.row_count(),
            columns: table.column_count(),
        },
        Err(e) => {
            warn!("failed to write merged table {}: {}", path.display(), e);
            MergedOutcome::Failed {
                path,
                message: e.to_string(),
            }
        }
    }
}
