//! CLI argument parsing for cusum-flatten

use crate::batch::{BatchOptions, Mode, OutcomeFilter, SortKey, SortOrder};
use crate::compare::{CompareOptions, ComparisonFilter, Method, DEFAULT_DERIVATIVE_THRESHOLD};
use crate::decision::{FlattenConfig, SanityCheck};
use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format (default)
    Text,
    /// JSON format for machine parsing
    Json,
    /// CSV format, same column layout as the input
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "cusum-flatten")]
#[command(version)]
#[command(
    about = "CUSUM change-point detection and curve flattening for qPCR readings",
    long_about = None
)]
pub struct Cli {
    /// Enable debug tracing output (TRACE level, to stderr)
    #[arg(long, global = true)]
    pub debug: bool,

    /// TOML configuration file; command-line flags override its values
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect and flatten downward drift, writing corrected readings
    Flatten(RunArgs),
    /// Report what would be flattened without correcting anything
    Inspect(RunArgs),
    /// Record the CUSUM trace, minimum and negative-slope flag per curve
    Cusum(CusumArgs),
    /// Compare two detection methods (CUSUM k values or derivative)
    Compare(CompareArgs),
}

/// Input file and record selection
#[derive(Args, Debug)]
pub struct SelectionArgs {
    /// Input CSV file (id, results, readings0..readingsN)
    #[arg(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Only process these record IDs (comma-separated)
    #[arg(long, value_name = "IDS", value_delimiter = ',')]
    pub ids: Option<Vec<u64>>,

    /// Maximum number of records listed
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Skip records with fewer readings
    #[arg(long, value_name = "N")]
    pub min_readings: Option<usize>,
}

/// Ordering and parallelism for batch runs
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Sort key for listed records
    #[arg(long, value_enum, default_value = "cusum")]
    pub sort_by: SortKey,

    /// Sort direction
    #[arg(long, value_enum, default_value = "down")]
    pub sort_order: SortOrder,

    /// Worker threads (0 = all available cores)
    #[arg(long, value_name = "N", default_value = "1")]
    pub jobs: usize,

    /// Seed for correction jitter (random when omitted)
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
}

/// CUSUM threshold and sanity checks
#[derive(Args, Debug)]
pub struct DetectionArgs {
    /// Flatten when the CUSUM minimum is <= this value
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub threshold: Option<f64>,

    /// CUSUM slack parameter
    #[arg(long, value_name = "K", allow_negative_numbers = true)]
    pub k: Option<f64>,

    /// Require the reading at the change point to be below the early-cycle average
    #[arg(long)]
    pub sanity_check_slope: bool,

    /// Require a negative line-of-best-fit slope up to the change point
    #[arg(long)]
    pub sanity_lob: bool,

    /// Enable a sanity check by name (repeatable)
    #[arg(long = "check", value_enum, value_name = "CHECK")]
    pub checks: Vec<SanityCheck>,
}

impl DetectionArgs {
    /// Apply flag overrides on top of a base configuration
    pub fn apply(&self, config: &mut FlattenConfig) {
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(k) = self.k {
            config.k = k;
        }
        if self.sanity_check_slope {
            config.sanity_checks.insert(SanityCheck::AverageComparison);
        }
        if self.sanity_lob {
            config.sanity_checks.insert(SanityCheck::LineOfBestFit);
        }
        for check in &self.checks {
            config.sanity_checks.insert(*check);
        }
    }
}

/// Output format and destination
#[derive(Args, Debug)]
pub struct OutputArgs {
    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write output to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub batch: BatchArgs,

    #[command(flatten)]
    pub detection: DetectionArgs,

    /// Only list records with this outcome
    #[arg(long, value_enum, value_name = "OUTCOME")]
    pub only: Option<OutcomeFilter>,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl RunArgs {
    pub fn batch_options(&self, mode: Mode, mut config: FlattenConfig) -> BatchOptions {
        self.detection.apply(&mut config);
        if let Some(min) = self.selection.min_readings {
            config.min_readings = min;
        }
        BatchOptions {
            mode,
            config,
            ids: self.selection.ids.clone(),
            limit: self.selection.limit,
            sort_by: self.batch.sort_by,
            sort_order: self.batch.sort_order,
            only: self.only,
            jobs: self.batch.jobs,
            seed: self.batch.seed,
        }
    }
}

#[derive(Args, Debug)]
pub struct CusumArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub batch: BatchArgs,

    /// CUSUM slack parameter
    #[arg(long, value_name = "K", allow_negative_numbers = true)]
    pub k: Option<f64>,

    /// Negative slope when the CUSUM minimum is < this value
    #[arg(
        long,
        value_name = "VALUE",
        default_value = "-10",
        allow_negative_numbers = true
    )]
    pub threshold: f64,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl CusumArgs {
    pub fn batch_options(&self, mut config: FlattenConfig) -> BatchOptions {
        config.threshold = self.threshold;
        if let Some(k) = self.k {
            config.k = k;
        }
        if let Some(min) = self.selection.min_readings {
            config.min_readings = min;
        }
        BatchOptions {
            ids: self.selection.ids.clone(),
            limit: self.selection.limit,
            sort_by: self.batch.sort_by,
            sort_order: self.batch.sort_order,
            jobs: self.batch.jobs,
            seed: self.batch.seed,
            ..BatchOptions::new(Mode::Cusum, config)
        }
    }
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    #[command(flatten)]
    pub selection: SelectionArgs,

    #[command(flatten)]
    pub detection: DetectionArgs,

    /// Slack for the default CUSUM method
    #[arg(long, value_name = "K", default_value = "0.0")]
    pub default_k: f64,

    /// Slack for the test CUSUM method (`--k` is accepted as an alias)
    #[arg(long, value_name = "K")]
    pub test_k: Option<f64>,

    /// Use the derivative minimum as the default method
    #[arg(long)]
    pub use_default_derivative: bool,

    /// Use the derivative minimum as the test method
    #[arg(long)]
    pub use_test_derivative: bool,

    /// Derivative minimum at or below this value counts as flattened
    #[arg(
        long,
        value_name = "VALUE",
        default_value_t = DEFAULT_DERIVATIVE_THRESHOLD,
        allow_negative_numbers = true
    )]
    pub derivative_threshold: f64,

    /// Sort key for listed records (`cusum` uses the default method's statistic)
    #[arg(long, value_enum, default_value = "id")]
    pub sort_by: SortKey,

    /// Sort direction
    #[arg(long, value_enum, default_value = "down")]
    pub sort_order: SortOrder,

    /// Only list records matching this filter
    #[arg(long, value_enum, value_name = "FILTER", conflicts_with = "only_changes")]
    pub only_failed: Option<ComparisonFilter>,

    /// Only list records whose flattening changed (same as --only-failed changes)
    #[arg(long)]
    pub only_changes: bool,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl CompareArgs {
    pub fn compare_options(&self, mut config: FlattenConfig) -> Result<CompareOptions> {
        self.detection.apply(&mut config);
        if let Some(min) = self.selection.min_readings {
            config.min_readings = min;
        }

        let default = if self.use_default_derivative {
            Method::Derivative
        } else {
            Method::Cusum { k: self.default_k }
        };
        if let (Some(test_k), Some(k)) = (self.test_k, self.detection.k) {
            if test_k != k {
                tracing::warn!("--k {} ignored, --test-k {} takes precedence", k, test_k);
            }
        }
        let test = match (self.use_test_derivative, self.test_k.or(self.detection.k)) {
            (true, _) => Method::Derivative,
            (false, Some(k)) => Method::Cusum { k },
            (false, None) => {
                bail!("--test-k (or --k) is required unless --use-test-derivative is set")
            }
        };

        Ok(CompareOptions {
            derivative_threshold: self.derivative_threshold,
            ids: self.selection.ids.clone(),
            limit: self.selection.limit,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            only: self
                .only_failed
                .or(self.only_changes.then_some(ComparisonFilter::Changes)),
            ..CompareOptions::new(default, test, config)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(cli: Cli) -> RunArgs {
        match cli.command {
            Command::Flatten(args) | Command::Inspect(args) => args,
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_flatten_defaults() {
        let cli = Cli::parse_from(["cusum-flatten", "flatten", "--input", "curves.csv"]);
        assert!(!cli.debug);
        assert!(cli.config.is_none());

        let args = run_args(cli);
        assert_eq!(args.selection.input, PathBuf::from("curves.csv"));
        assert_eq!(args.batch.sort_by, SortKey::Cusum);
        assert_eq!(args.batch.sort_order, SortOrder::Down);
        assert_eq!(args.batch.jobs, 1);
        assert_eq!(args.output.format, OutputFormat::Text);

        let options = args.batch_options(Mode::Flatten, FlattenConfig::default());
        assert_eq!(options.config, FlattenConfig::default());
    }

    #[test]
    fn test_cli_sanity_flags() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "inspect",
            "-i",
            "curves.csv",
            "--sanity-check-slope",
            "--sanity-lob",
        ]);
        let options = run_args(cli).batch_options(Mode::Inspect, FlattenConfig::default());
        assert!(options
            .config
            .sanity_checks
            .contains(SanityCheck::AverageComparison));
        assert!(options.config.sanity_checks.contains(SanityCheck::LineOfBestFit));
    }

    #[test]
    fn test_cli_check_by_name() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "inspect",
            "-i",
            "curves.csv",
            "--check",
            "lob",
        ]);
        let options = run_args(cli).batch_options(Mode::Inspect, FlattenConfig::default());
        assert_eq!(options.config.sanity_checks.len(), 1);
        assert!(options.config.sanity_checks.contains(SanityCheck::LineOfBestFit));
    }

    #[test]
    fn test_cli_negative_threshold_and_k() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "flatten",
            "-i",
            "curves.csv",
            "--threshold",
            "-60",
            "--k",
            "0.5",
        ]);
        let options = run_args(cli).batch_options(Mode::Flatten, FlattenConfig::default());
        assert_eq!(options.config.threshold, -60.0);
        assert_eq!(options.config.k, 0.5);
    }

    #[test]
    fn test_cli_flags_override_config_file_values() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "flatten",
            "-i",
            "curves.csv",
            "--min-readings",
            "20",
        ]);
        let base = FlattenConfig::strict();
        let options = run_args(cli).batch_options(Mode::Flatten, base);
        assert_eq!(options.config.min_readings, 20);
        assert_eq!(options.config.sanity_checks.len(), 2);
    }

    #[test]
    fn test_cli_selection_flags() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "flatten",
            "-i",
            "curves.csv",
            "--ids",
            "3,5,8",
            "--limit",
            "2",
            "--sort-by",
            "id",
            "--sort-order",
            "up",
            "--only",
            "sanity-lob",
            "--jobs",
            "4",
            "--seed",
            "42",
        ]);
        let options = run_args(cli).batch_options(Mode::Flatten, FlattenConfig::default());
        assert_eq!(options.ids, Some(vec![3, 5, 8]));
        assert_eq!(options.limit, Some(2));
        assert_eq!(options.sort_by, SortKey::Id);
        assert_eq!(options.sort_order, SortOrder::Up);
        assert_eq!(options.only, Some(OutcomeFilter::SanityLob));
        assert_eq!(options.jobs, 4);
        assert_eq!(options.seed, Some(42));
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "flatten",
            "-i",
            "curves.csv",
            "--debug",
            "--config",
            "flatten.toml",
        ]);
        assert!(cli.debug);
        assert_eq!(cli.config, Some(PathBuf::from("flatten.toml")));
    }

    #[test]
    fn test_cli_cusum_threshold_default() {
        let cli = Cli::parse_from(["cusum-flatten", "cusum", "-i", "curves.csv"]);
        match cli.command {
            Command::Cusum(args) => {
                assert_eq!(args.threshold, -10.0);
                let options = args.batch_options(FlattenConfig::default());
                assert_eq!(options.mode, Mode::Cusum);
                assert_eq!(options.config.threshold, -10.0);
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_compare_requires_test_method() {
        let cli = Cli::parse_from(["cusum-flatten", "compare", "-i", "curves.csv"]);
        match cli.command {
            Command::Compare(args) => {
                assert!(args.compare_options(FlattenConfig::default()).is_err());
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_compare_methods() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "compare",
            "-i",
            "curves.csv",
            "--default-k",
            "0.2",
            "--use-test-derivative",
            "--derivative-threshold",
            "-5",
            "--only-changes",
        ]);
        match cli.command {
            Command::Compare(args) => {
                let options = args.compare_options(FlattenConfig::default()).unwrap();
                assert_eq!(options.default, Method::Cusum { k: 0.2 });
                assert_eq!(options.test, Method::Derivative);
                assert_eq!(options.derivative_threshold, -5.0);
                assert_eq!(options.only, Some(ComparisonFilter::Changes));
                assert_eq!(options.sort_by, SortKey::Id);
                assert_eq!(options.sort_order, SortOrder::Down);
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_compare_k_alias() {
        let cli = Cli::parse_from(["cusum-flatten", "compare", "-i", "curves.csv", "--k", "0.5"]);
        match cli.command {
            Command::Compare(args) => {
                let options = args.compare_options(FlattenConfig::default()).unwrap();
                assert_eq!(options.test, Method::Cusum { k: 0.5 });
                assert_eq!(options.default, Method::Cusum { k: 0.0 });
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_compare_test_k_wins_over_alias() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "compare",
            "-i",
            "curves.csv",
            "--k",
            "5",
            "--test-k",
            "1",
        ]);
        match cli.command {
            Command::Compare(args) => {
                let options = args.compare_options(FlattenConfig::default()).unwrap();
                assert_eq!(options.test, Method::Cusum { k: 1.0 });
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_compare_sort_and_filter() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "compare",
            "-i",
            "curves.csv",
            "--test-k",
            "1",
            "--sort-by",
            "cusum",
            "--sort-order",
            "up",
            "--only-failed",
            "sanity-lob",
        ]);
        match cli.command {
            Command::Compare(args) => {
                let options = args.compare_options(FlattenConfig::default()).unwrap();
                assert_eq!(options.sort_by, SortKey::Cusum);
                assert_eq!(options.sort_order, SortOrder::Up);
                assert_eq!(options.only, Some(ComparisonFilter::SanityLob));
            }
            other => panic!("Unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_compare_filter_flags_conflict() {
        let result = Cli::try_parse_from([
            "cusum-flatten",
            "compare",
            "-i",
            "curves.csv",
            "--test-k",
            "1",
            "--only-changes",
            "--only-failed",
            "threshold",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_format_json() {
        let cli = Cli::parse_from([
            "cusum-flatten",
            "inspect",
            "-i",
            "curves.csv",
            "--format",
            "json",
            "-o",
            "out.json",
        ]);
        let args = run_args(cli);
        assert_eq!(args.output.format, OutputFormat::Json);
        assert_eq!(args.output.output, Some(PathBuf::from("out.json")));
    }
}
