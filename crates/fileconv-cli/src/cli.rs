use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fileconv::{ConflictPolicy, OutputFormat};

#[derive(Parser, Debug)]
#[command(name = "fileconv")]
#[command(version, about = "Batch file converter driving ImageMagick, FFmpeg and LibreOffice", long_about = None)]
pub struct Cli {
    /// JSON config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert files and directories to one output format
    Convert(ConvertArgs),
    /// List the conversions available with the current configuration
    Formats,
}

#[derive(clap::Args, Debug)]
pub struct ConvertArgs {
    /// Input files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Target format, e.g. jpeg, mp4, pdf, flac
    #[arg(short = 't', long = "to")]
    pub to: OutputFormat,

    /// Output directory (defaults to the config value, then to each input's directory)
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Maximum number of conversions running at once
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Conversion option as key=value, repeatable (quality=high, resolution=1280x720, ...)
    #[arg(short = 'O', long = "option", value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// Per-file deadline in seconds, overriding the configured default
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// What to do when an output file already exists
    #[arg(long, value_enum)]
    pub on_conflict: Option<ConflictArg>,

    /// Descend into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Print the final report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Do not print per-file progress
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum ConflictArg {
    Overwrite,
    Rename,
    Fail,
}

impl From<ConflictArg> for ConflictPolicy {
    fn from(arg: ConflictArg) -> Self {
        match arg {
            ConflictArg::Overwrite => ConflictPolicy::Overwrite,
            ConflictArg::Rename => ConflictPolicy::Rename,
            ConflictArg::Fail => ConflictPolicy::Fail,
        }
    }
}
