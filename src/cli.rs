//! CLI argument parsing for jetdiff

use crate::algorithm::Preset;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for run reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text summary (default)
    Text,
    /// JSON document with histograms and curves
    Json,
    /// CSV table for spreadsheet analysis
    Csv,
}

#[derive(Parser, Debug)]
#[command(name = "jetdiff")]
#[command(version)]
#[command(
    about = "Cross-check jet tagger outputs between two producers and build ROC curves",
    long_about = None
)]
pub struct Cli {
    /// Enable debug tracing output to stderr
    #[arg(long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Match reference jets to candidate jets and histogram the algorithm differences
    Compare(CompareArgs),
    /// Fill score histograms per sample and build efficiency curves
    Roc(RocArgs),
}

/// Where and how to write a report
#[derive(Args, Debug, Clone)]
pub struct OutputArgs {
    /// Output format
    #[arg(long = "format", value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Write the report to this file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// TOML file describing the inputs and algorithms
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Reference records to process (0 = all)
    #[arg(short = 'n', long = "max-records", value_name = "N")]
    pub max_records: Option<usize>,

    /// Diagnostic verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Threshold on the largest Higgs-mass |diff| per pair
    #[arg(long = "diff-h", value_name = "DIFF")]
    pub diff_h: Option<f64>,

    /// Threshold on the largest a-mass |diff| per pair
    #[arg(long = "diff-a", value_name = "DIFF")]
    pub diff_a: Option<f64>,

    /// Threshold on the largest tagger |diff| per pair
    #[arg(long = "diff-t", value_name = "DIFF")]
    pub diff_t: Option<f64>,

    /// Use a built-in algorithm selection instead of the configured one
    #[arg(long = "preset", value_enum)]
    pub preset: Option<Preset>,

    /// Only compare algorithms whose name matches this regex
    #[arg(long = "select", value_name = "REGEX")]
    pub select: Option<String>,

    /// Worker threads for the matching loop
    #[arg(short = 'j', long = "threads", value_name = "N")]
    pub threads: Option<usize>,

    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Args, Debug)]
pub struct RocArgs {
    /// TOML file describing inputs, samples and score variables
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Records to process per input, overriding per-input caps (0 = all)
    #[arg(short = 'n', long = "max-records", value_name = "N")]
    pub max_records: Option<usize>,

    #[command(flatten)]
    pub output: OutputArgs,
}
