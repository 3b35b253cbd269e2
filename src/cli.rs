use clap::Parser;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Error;
use crate::types::{
    ConvertOptions, JoinHow, MergeKeySet, OutputFormat, Result, DEFAULT_INPUT_EXTENSION,
    DEFAULT_MERGE_KEY,
};

/// Batch-convert SAS data files to SPSS or CSV, optionally merging them
#[derive(Parser, Debug)]
#[command(name = "sas-convert")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory containing input files
    #[arg(long)]
    pub input_dir: PathBuf,

    /// Directory to save converted files
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Merge all converted files into this file inside the output directory
    #[arg(long)]
    pub single_file: Option<String>,

    /// Key columns used when merging (matched case-insensitively)
    #[arg(long, num_args = 1.., default_values_t = [DEFAULT_MERGE_KEY.to_string()])]
    pub merge_keys: Vec<String>,

    /// Prefix variable names with the source file name
    #[arg(long, default_value_t = false)]
    pub prefix_vars: bool,

    /// Join type used when merging
    #[arg(long, value_enum, default_value_t = JoinHow::Outer)]
    pub merge_how: JoinHow,

    /// Output file format
    #[arg(long, value_enum, default_value_t = OutputFormat::Spss)]
    pub output_format: OutputFormat,

    /// Extension of input files
    #[arg(long, default_value = DEFAULT_INPUT_EXTENSION)]
    pub input_ext: String,

    /// Write a JSON batch report to this path (`-` for stdout)
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Create a missing output directory without asking
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,
}

impl Cli {
    /// Build conversion options from the parsed arguments
    pub fn to_options(&self) -> Result<ConvertOptions> {
        Ok(ConvertOptions {
            input_dir: self.input_dir.clone(),
            output_dir: self.output_dir.clone(),
            input_ext: self.input_ext.trim_start_matches('.').to_string(),
            output_format: self.output_format,
            single_file: self.single_file.clone(),
            merge_keys: MergeKeySet::new(self.merge_keys.iter().cloned())?,
            merge_how: self.merge_how,
            prefix_vars: self.prefix_vars,
        })
    }
}

/// Ask a y/n question until one of the two is given. End of input counts as no.
pub fn confirm_yes_no<R: BufRead, W: Write>(
    text: &str,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    loop {
        write!(output, "{} (y/n): ", text)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }

        match line.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
            Some('y') => return Ok(true),
            Some('n') => return Ok(false),
            _ => continue,
        }
    }
}

/// Check the input directory exists and make sure the output directory does.
///
/// A missing output directory is created when `assume_yes` is set or the
/// operator confirms. Every problem is reported before failing.
pub fn validate_directories<R: BufRead, W: Write>(
    input_dir: &Path,
    output_dir: &Path,
    assume_yes: bool,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let mut problems = Vec::new();

    if !input_dir.is_dir() {
        problems.push(format!("directory does not exist: '{}'", input_dir.display()));
    }

    if !output_dir.is_dir() {
        let create = assume_yes
            || confirm_yes_no(
                &format!(
                    "Directory does not exist: '{}'! Do you want to create it?",
                    output_dir.display()
                ),
                input,
                output,
            )?;

        if create {
            info!("creating directory {}", output_dir.display());
            std::fs::create_dir_all(output_dir)?;
        } else {
            problems.push(format!("not creating directory '{}'", output_dir.display()));
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(Error::Argument(problems.join("; ")))
    }
}
