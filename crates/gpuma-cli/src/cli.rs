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
    author = "GPUMA Developers",
    version,
    about = "GPUMA CLI - Geometry optimization of molecular structures with machine-learning interatomic potentials, one by one or in batches.",
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

    /// Number of threads used to evaluate systems in batch mode.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Optimize the geometry of one or more structures read from XYZ files.
    Optimize(OptimizeArgs),
    /// Print the default configuration as TOML.
    Config,
}

/// Arguments for the `optimize` subcommand.
#[derive(Args, Debug)]
pub struct OptimizeArgs {
    // --- Input / Output ---
    /// Input XYZ file, or a directory whose `*.xyz` files are read one structure per file.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output multi-frame XYZ file for the optimized structures.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Treat the input file as a multi-frame XYZ file.
    #[arg(long)]
    pub multi: bool,

    // --- Electronic State ---
    /// Total charge assigned to every input structure.
    #[arg(long, value_name = "INT", allow_negative_numbers = true)]
    pub charge: Option<i32>,

    /// Spin multiplicity assigned to every input structure.
    #[arg(long, value_name = "INT")]
    pub multiplicity: Option<u32>,

    // --- Optimization Overrides ---
    /// Override the potential model name (e.g., 'lennard-jones').
    #[arg(short, long = "model", value_name = "NAME")]
    pub model: Option<String>,

    /// Override the compute device ('cpu', 'cuda', 'cuda:N').
    #[arg(short, long, value_name = "SPEC")]
    pub device: Option<String>,

    /// Override the batch optimization mode ('sequential' or 'batch').
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Override the force convergence threshold in eV/Angstrom.
    #[arg(long, value_name = "FLOAT")]
    pub fmax: Option<f64>,

    /// Override the maximum number of optimizer steps.
    #[arg(long, value_name = "INT")]
    pub max_steps: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S optimization.max-steps=200
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
