mod cli;
mod convert;
mod error;
mod inference;
mod merge;
mod naming;
mod output;
mod readers;
mod table;
mod types;
mod writers;

use clap::Parser;
use cli::Cli;
use readers::FormatReader;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use types::Result;
use writers::FormatWriter;

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let stdin = std::io::stdin();
    let validated = cli.to_options().and_then(|options| {
        cli::validate_directories(
            &options.input_dir,
            &options.output_dir,
            cli.yes,
            &mut stdin.lock(),
            &mut std::io::stdout(),
        )?;
        let inputs = convert::discover_inputs(&options.input_dir, &options.input_ext)?;
        convert::check_merged_target(&options, &inputs)?;
        Ok(options)
    });

    let options = match validated {
        Ok(options) => options,
        Err(e) => {
            error!("{}", e);
            eprintln!("An error occurred while parsing the command line arguments. Goodbye.");
            std::process::exit(1);
        }
    };

    let report = convert::run_batch(&options, &FormatReader, &FormatWriter)?;

    match &cli.report {
        Some(path) if path.as_os_str() == "-" => output::write_json_stdout(&report)?,
        Some(path) => {
            output::write_json_file(&report, path)?;
            info!("report written to {}", path.display());
        }
        None => {}
    }

    output::write_summary(&report, &options.output_dir, &mut std::io::stdout().lock())?;
    println!();
    println!("All done! Have a nice day :)");

    Ok(())
}
