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
    author,
    version,
    about = "rotapack - A command-line interface for combinatorial side-chain packing by simulated annealing.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pack a problem by running many simulated-annealing trajectories and keeping the best results.
    Pack(PackArgs),
    /// Print a summary of a packing problem file.
    Inspect(InspectArgs),
}

/// Arguments for the `pack` subcommand.
#[derive(Args, Debug)]
pub struct PackArgs {
    // --- Core Arguments ---
    /// Path to the packing problem file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Path for the TOML report of the kept results.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Run Overrides ---
    /// Override the number of independent annealing runs.
    #[arg(short = 'n', long, value_name = "INT")]
    pub runs: Option<usize>,

    /// Override the base random seed; run `k` uses `seed + k`.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the trial budget of every run with a fixed count.
    #[arg(long, value_name = "INT")]
    pub trials: Option<usize>,

    /// Override the number of result partitions.
    #[arg(long, value_name = "INT")]
    pub partitions: Option<usize>,

    /// Override how many results are kept per partition.
    #[arg(short = 'k', long, value_name = "INT")]
    pub keep: Option<usize>,

    /// Stop submitting runs once every partition has received this many results.
    #[arg(long, value_name = "INT")]
    pub threshold: Option<usize>,

    /// Disable the final refinement stage, overriding the config file.
    #[arg(long)]
    pub no_refinement: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S annealing.initial-temperature=5.0
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `inspect` subcommand.
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Path to the packing problem file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,
}
