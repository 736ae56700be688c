//! solconf cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; solconf ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load, override and resolve a configuration
    #[command(alias = "eval")]
    Evaluate(EvaluateCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct EvaluateCommand {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub output: OutputArgs,

    /// Only print the value at this path of the resolved configuration
    #[clap(short = 's', long = "select")]
    pub select: Option<String>,
}

#[derive(Parser, Debug)]
pub struct InputArgs {
    /// The `*.solconf` file to load
    pub config: PathBuf,

    /// Overrides, e.g. `model.size = 3`
    pub overrides: Vec<String>,

    /// Read overrides from a file, one per line
    ///
    /// Overrides given on the command line replace overrides of the same target.
    #[clap(short = 'o', long = "overrides-file")]
    pub overrides_file: Option<PathBuf>,

    /// Package name, random when not set
    #[clap(long = "package-name")]
    pub package_name: Option<String>,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Print parsed override records
    Overrides { specs: Vec<String> },
    /// Print a loaded but unresolved module
    Module { config: PathBuf },
}
