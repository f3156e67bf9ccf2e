//! Command-line parsing for the `cider` binary.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the config and data-store code.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::datastore::DEFAULT_SEED;
use crate::domain::DataType;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cider", version, about = "Pipeline configuration and data-store checks")]
pub struct Cli {
    /// Config file (defaults to $CIDER_CONFIG, then configs/config.yml).
    #[arg(short, long, global = true, value_name = "YAML")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv). RUST_LOG overrides this.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and validate the config, listing every problem found.
    Validate,
    /// Print a summary of the config: paths, parameters and grid sizes.
    Show,
    /// Expand hyperparameter grids.
    Grid(GridArgs),
    /// Load datasets into a data store and print row counts.
    Load(LoadArgs),
}

#[derive(Debug, Args, Clone)]
pub struct GridArgs {
    /// Model to expand (e.g. `ridge`). All models when omitted.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Number of candidates to list per model.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,

    /// Print the listed candidates as JSON instead of a table.
    #[arg(long)]
    pub json: bool,

    /// Write every candidate as JSON (refused for very large grids).
    #[arg(long, value_name = "JSON")]
    pub out: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct LoadArgs {
    /// Datasets to load (comma-separated). All configured datasets when omitted.
    #[arg(short, long, value_enum, value_delimiter = ',')]
    pub datasets: Vec<DataType>,

    /// Keep events on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Keep events on or before this date (YYYY-MM-DD).
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Drop duplicate events after loading.
    #[arg(long)]
    pub dedup: bool,

    /// Apply subscriber consent from `user_consent`.
    #[arg(long)]
    pub opt_in: bool,

    /// Join features with labels after loading.
    #[arg(long)]
    pub merge: bool,

    /// Write the merged training data to CSV (implies --merge).
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,

    /// Seed for the `random` column of targeting/fairness data.
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
}
