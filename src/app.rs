//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - locates and loads the config
//! - dispatches to the subcommand handlers
//! - prints reports and writes optional exports

use std::collections::BTreeMap;
use std::path::Path;

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Command, GridArgs, LoadArgs};
use crate::config::{collect_issues, load, load_validated, resolve_config_path};
use crate::error::AppError;
use crate::grid::{Candidate, candidates, expand, size};

/// Largest grid `cider grid --out` will materialize.
const MAX_EXPORT_CANDIDATES: usize = 1_000_000;

pub mod logging;
pub mod pipeline;

/// Entry point for the `cider` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config_path = resolve_config_path(cli.config.as_deref());
    match cli.command {
        Command::Validate => handle_validate(&config_path),
        Command::Show => handle_show(&config_path),
        Command::Grid(args) => handle_grid(&config_path, &args),
        Command::Load(args) => handle_load(&config_path, &args),
    }
}

fn handle_validate(path: &Path) -> Result<(), AppError> {
    let config = load(path)?;
    let issues = collect_issues(&config);
    print!("{}", crate::report::format_issues(&issues));
    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::new(2, format!("Config '{}' is invalid.", path.display())))
    }
}

fn handle_show(path: &Path) -> Result<(), AppError> {
    let config = load_validated(path)?;
    print!("{}", crate::report::format_config_summary(&config, path));
    Ok(())
}

fn handle_grid(path: &Path, args: &GridArgs) -> Result<(), AppError> {
    let config = load_validated(path)?;

    let models: Vec<&String> = match &args.model {
        Some(name) => {
            let Some((key, _)) = config.hyperparams.get_key_value(name) else {
                let available: Vec<&str> = config.hyperparams.keys().map(String::as_str).collect();
                return Err(AppError::new(
                    2,
                    format!("Unknown model '{name}' (available: {}).", available.join(", ")),
                ));
            };
            vec![key]
        }
        None => config.hyperparams.keys().collect(),
    };

    let listed: BTreeMap<&str, Vec<Candidate>> = models
        .iter()
        .map(|name| (name.as_str(), candidates(&config.hyperparams[*name]).take(args.limit).collect()))
        .collect();

    if args.json {
        let text = serde_json::to_string_pretty(&listed)
            .map_err(|e| AppError::new(4, format!("Failed to encode grid JSON: {e}")))?;
        println!("{text}");
    } else {
        for (name, shown) in &listed {
            let total = size(&config.hyperparams[*name]);
            print!("{}", crate::report::format_grid(name, total, shown));
        }
    }

    if let Some(out) = &args.out {
        if let Some(name) = models.iter().find(|name| size(&config.hyperparams[**name]) > MAX_EXPORT_CANDIDATES) {
            return Err(AppError::new(
                2,
                format!("Grid for model '{name}' has more than {MAX_EXPORT_CANDIDATES} candidates; refusing to export it."),
            ));
        }
        let expanded: BTreeMap<&str, Vec<Candidate>> = models
            .iter()
            .map(|name| (name.as_str(), expand(&config.hyperparams[*name])))
            .collect();
        crate::io::export::write_json(out, &expanded)?;
        info!(path = %out.display(), "wrote expanded grid");
    }
    Ok(())
}

fn handle_load(path: &Path, args: &LoadArgs) -> Result<(), AppError> {
    let config = load_validated(path)?;
    let run = pipeline::run_load(config, args)?;

    println!("{}", crate::report::format_store_summary(&run.counts));
    if let Some(dropped) = run.consent_dropped {
        println!("Dropped {dropped} row(s) without consent.");
    }
    if let Some(removed) = run.duplicates_removed {
        println!("Removed {removed} duplicate event(s).");
    }
    if let Some(merged) = &run.merged {
        println!(
            "Merged {} labelled row(s) with {} feature(s).",
            merged.len(),
            merged.feature_columns.len()
        );
    }

    // Optional export.
    if let (Some(out), Some(merged)) = (&args.export, &run.merged) {
        crate::io::export::write_merged_csv(out, merged)?;
        info!(path = %out.display(), rows = merged.len(), "wrote merged data");
    }

    Ok(())
}
