use crate::convert::{BatchReport, MergedOutcome};
use crate::types::Result;
use std::io::Write;
use std::path::Path;

/// Write the batch report to a JSON file
pub fn write_json_file(report: &BatchReport, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Render the batch report as a JSON string
pub fn to_json_string(report: &BatchReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Write the batch report to stdout
pub fn write_json_stdout(report: &BatchReport) -> Result<()> {
    let json = to_json_string(report)?;
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json)?;
    Ok(())
}

/// Write the human-readable end-of-batch summary
pub fn write_summary<W: Write>(report: &BatchReport, output_dir: &Path, out: &mut W) -> Result<()> {
    writeln!(out, "{} files copied to {}", report.files_copied, output_dir.display())?;

    if !report.skipped.is_empty() {
        writeln!(out, "{} files skipped (output already exists):", report.skipped.len())?;
        for path in &report.skipped {
            writeln!(out, "  {}", path)?;
        }
    }

    if !report.failures.is_empty() {
        writeln!(out, "{} files failed:", report.failures.len())?;
        for failure in &report.failures {
            writeln!(out, "  {}: {}", failure.identifier, failure.message)?;
        }
    }

    if !report.merge_failures.is_empty() {
        writeln!(out, "{} merges failed:", report.merge_failures.len())?;
        for failure in &report.merge_failures {
            writeln!(out, "  {}: {}", failure.identifier, failure.message)?;
        }
    }

    match &report.merged {
        MergedOutcome::NotRequested => {}
        MergedOutcome::Skipped { path } => {
            writeln!(out, "Merged file skipped (already exists): {}", path.display())?
        }
        MergedOutcome::Empty => writeln!(out, "Nothing to merge")?,
        MergedOutcome::Written { path, rows, columns } => writeln!(
            out,
            "Merged {} rows x {} columns into {}",
            rows,
            columns,
            path.display()
        )?,
        MergedOutcome::Failed { path, message } => {
            writeln!(out, "Failed to write merged file {}: {}", path.display(), message)?
        }
    }

    Ok(())
}
