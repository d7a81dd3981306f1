use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "The AtoML Developers",
    version,
    about = "AtoML CLI - fingerprinting, feature screening and model building for candidates of a genetic-algorithm search.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Split relaxed candidates, store their fingerprints and fit a predictive model.
    BuildModel(BuildModelArgs),
    /// Fingerprint a split of the candidates and run every feature screening routine.
    Screen(ScreenArgs),
    /// Split relaxed candidates into test and train sets and write the assignment as CSV.
    Split(SplitArgs),
}

/// Arguments for the `build-model` subcommand.
#[derive(Args, Debug)]
pub struct BuildModelArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the GA database path from the config file.
    #[arg(short, long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    // --- Split Overrides ---
    /// Override the number of test candidates.
    #[arg(long, value_name = "INT")]
    pub test_size: Option<usize>,

    /// Override the number of train candidates.
    #[arg(long, value_name = "INT")]
    pub train_size: Option<usize>,

    /// Override the key-value pair used as the target.
    #[arg(short, long, value_name = "KEY")]
    pub key: Option<String>,

    /// Seed the random split for reproducible runs.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    // --- Stage Overrides ---
    /// Skip building the descriptor stores from the GA database.
    #[arg(long)]
    pub no_build_db: bool,

    /// Re-fit the model from the descriptor stores alone.
    #[arg(long)]
    pub test_model: bool,

    /// Keep the descriptor stores after the run.
    #[arg(long)]
    pub no_cleanup: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S model.expand=false
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `screen` subcommand.
#[derive(Args, Debug)]
pub struct ScreenArgs {
    /// Path to the configuration file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub config: PathBuf,

    /// Override the GA database path from the config file.
    #[arg(short, long, value_name = "PATH")]
    pub database: Option<PathBuf>,

    /// Override the number of features each routine keeps.
    #[arg(long, value_name = "INT")]
    pub size: Option<usize>,

    /// Override the number of features picked per round of iterative screening.
    #[arg(long, value_name = "INT")]
    pub step: Option<usize>,

    /// Keep cached neighbour matrices instead of clearing them before fingerprinting.
    #[arg(long)]
    pub keep_cache: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S screening.components=3
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `split` subcommand.
#[derive(Args, Debug)]
pub struct SplitArgs {
    /// Path to the GA database.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub database: PathBuf,

    /// Number of test candidates.
    #[arg(long, required = true, value_name = "INT")]
    pub test_size: usize,

    /// Number of train candidates.
    #[arg(long, required = true, value_name = "INT")]
    pub train_size: usize,

    /// Key-value pair used as the target.
    #[arg(short, long, default_value = "raw_score", value_name = "KEY")]
    pub key: String,

    /// Seed the random split for reproducible runs.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Include candidates flagged as extinct.
    #[arg(long)]
    pub use_extinct: bool,

    /// Write the CSV here instead of standard output.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,
}
