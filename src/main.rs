use anyhow::{Context, Result};
use clap::Parser;
use cusum_flatten::batch::{run_batch, BatchReport, Mode};
use cusum_flatten::cli::{Cli, Command, OutputArgs, OutputFormat};
use cusum_flatten::compare::compare_records;
use cusum_flatten::csv_output::{comparison_to_csv, CsvCusumOutput, CsvOutput};
use cusum_flatten::decision::FlattenConfig;
use cusum_flatten::json_output::{JsonComparisonOutput, JsonOutput};
use cusum_flatten::record::read_records;
use std::fs;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber (stderr); --debug raises the level to TRACE
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the base configuration from --config, or defaults
fn load_config(path: Option<&Path>) -> Result<FlattenConfig> {
    match path {
        Some(path) => {
            let config = FlattenConfig::from_file(path)?;
            tracing::info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        None => Ok(FlattenConfig::default()),
    }
}

/// Write rendered output to --output or stdout
fn emit(rendered: &str, output: &OutputArgs) -> Result<()> {
    match &output.output {
        Some(path) => {
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write output file {}", path.display()))?;
            tracing::info!("Wrote {}", path.display());
        }
        None => print!("{}", rendered),
    }
    Ok(())
}

fn render_batch(report: &BatchReport, format: OutputFormat) -> Result<String> {
    Ok(match (format, report.mode) {
        (OutputFormat::Text, _) => report.to_report_string(),
        (OutputFormat::Json, _) => JsonOutput::from_report(report).to_json()?,
        (OutputFormat::Csv, Mode::Cusum) => CsvCusumOutput::from_report(report).to_csv(),
        (OutputFormat::Csv, _) => CsvOutput::from_report(report).to_csv(),
    })
}

fn main() -> Result<()> {
    let args = Cli::parse();

    init_tracing(args.debug);

    let base = load_config(args.config.as_deref())?;

    match &args.command {
        Command::Flatten(run) | Command::Inspect(run) => {
            let mode = if matches!(args.command, Command::Flatten(_)) {
                Mode::Flatten
            } else {
                Mode::Inspect
            };
            let records = read_records(&run.selection.input)?;
            let report = run_batch(records, &run.batch_options(mode, base))?;
            emit(&render_batch(&report, run.output.format)?, &run.output)?;
        }
        Command::Cusum(cusum) => {
            let records = read_records(&cusum.selection.input)?;
            let report = run_batch(records, &cusum.batch_options(base))?;
            emit(&render_batch(&report, cusum.output.format)?, &cusum.output)?;
        }
        Command::Compare(compare) => {
            let options = compare.compare_options(base)?;
            let records = read_records(&compare.selection.input)?;
            let report = compare_records(&records, &options)?;
            let rendered = match compare.output.format {
                OutputFormat::Text => report.to_report_string(),
                OutputFormat::Json => JsonComparisonOutput::from_report(&report).to_json()?,
                OutputFormat::Csv => comparison_to_csv(&report),
            };
            emit(&rendered, &compare.output)?;
        }
    }

    Ok(())
}
