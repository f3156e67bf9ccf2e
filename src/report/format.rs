//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - config and data-store code stays free of presentation concerns
//! - output changes are localized

use std::path::Path;

use crate::config::Config;
use crate::domain::DataType;
use crate::error::ConfigIssue;
use crate::grid::Candidate;

/// Format the config overview printed by `cider show`.
pub fn format_config_summary(config: &Config, path: &Path) -> String {
    let mut out = String::new();

    out.push_str("=== cider - pipeline configuration ===\n");
    out.push_str(&format!("Config: {}\n", path.display()));
    out.push_str(&format!(
        "Spark: app={} | driver.memory={} | max_result_size={} | loglevel={}\n",
        config.spark.app_name,
        config.spark.driver.memory,
        config.spark.driver.max_result_size,
        config.spark.loglevel,
    ));
    out.push_str(&format!(
        "Input dir: {}\nWorking dir: {}\n",
        config.path.input_data.directory_path.display(),
        config.working_dir().display(),
    ));

    out.push_str("\nInput files:\n");
    out.push_str(format!("{:<20} {}", "dataset", "file").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<30}", "", "").trim_end());
    out.push('\n');
    for (key, file) in config.path.input_data.file_paths.entries() {
        out.push_str(format!("{:<20} {}", key, file.unwrap_or("-")).trim_end());
        out.push('\n');
    }
    for (name, path) in config.shapefile_paths() {
        out.push_str(format!("{:<20} {}", format!("shapefile:{name}"), path.display()).trim_end());
        out.push('\n');
    }

    let cdr = &config.params.cdr;
    out.push_str("\nParameters:\n");
    out.push_str(&format!("- weekend: {:?}\n", cdr.weekend));
    out.push_str(&format!("- day: {:02}:00-{:02}:00\n", cdr.start_of_day, cdr.end_of_day));
    match &config.params.home_location.filter_hours {
        Some(hours) => out.push_str(&format!("- home filter hours: {hours:?}\n")),
        None => out.push_str("- home filter hours: all\n"),
    }
    let automl = &config.params.automl.autogluon;
    out.push_str(&format!(
        "- automl: time_limit={}s eval_metric={}\n",
        automl.time_limit, automl.eval_metric
    ));
    out.push_str(&format!("- opt-in default: {}\n", config.params.opt_in_default));

    out.push_str("\nModels:\n");
    for (name, size) in crate::grid::sizes(&config.hyperparams) {
        out.push_str(&format!("- {name:<20} {size} candidate(s)\n"));
    }

    out
}

/// Format validation issues, one per line.
pub fn format_issues(issues: &[ConfigIssue]) -> String {
    if issues.is_empty() {
        return "Config OK.\n".to_string();
    }
    let mut out = format!("Config has {} problem(s):\n", issues.len());
    for issue in issues {
        out.push_str(&format!("- {issue}\n"));
    }
    out
}

/// Format a model grid listing: the total count, then the candidates shown.
pub fn format_grid(model: &str, total: usize, shown: &[Candidate]) -> String {
    let mut out = format!("Model {model}: {total} candidate(s)\n");
    for (i, candidate) in shown.iter().enumerate() {
        let parts: Vec<String> = candidate.iter().map(|(k, v)| format!("{k}={v}")).collect();
        out.push_str(&format!("{:>4}  {}\n", i, parts.join(" ")));
    }
    if total > shown.len() {
        out.push_str(&format!("  ... {} more\n", total - shown.len()));
    }
    out
}

/// Format per-dataset row counts after `cider load`.
pub fn format_store_summary(counts: &[(DataType, usize)]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<20} {:>12}", "dataset", "rows").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<20} {:-<12}", "", "").trim_end());
    out.push('\n');
    for (data_type, rows) in counts {
        out.push_str(format!("{:<20} {:>12}", truncate(data_type.key(), 20), rows).trim_end());
        out.push('\n');
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
