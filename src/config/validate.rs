//! Config validation.
//!
//! Parsing already guarantees types (a file path is a string or null, a
//! threshold list holds numbers, ...). The checks here cover relationships and
//! ranges that types alone cannot express. Every issue is collected so a user
//! sees all problems in one pass.

use std::collections::BTreeSet;

use crate::config::types::{Config, ModelGrid};
use crate::error::{ConfigError, ConfigIssue};

/// Spark log levels accepted by `spark.loglevel`.
pub const SPARK_LOG_LEVELS: &[&str] = &["ALL", "DEBUG", "ERROR", "FATAL", "INFO", "OFF", "TRACE", "WARN"];

/// Accepted values for `col_names.geo`.
pub const GEO_COLUMNS: &[&str] = &["antenna_id", "tower_id"];

/// Validate a parsed config, returning every issue found.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let issues = collect_issues(config);
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid(issues))
    }
}

pub fn collect_issues(config: &Config) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();
    check_spark(config, &mut issues);
    check_paths(config, &mut issues);
    check_columns(config, &mut issues);
    check_params(config, &mut issues);
    for (name, grid) in &config.hyperparams {
        check_model_grid(name, grid, &mut issues);
    }
    issues
}

fn check_spark(config: &Config, issues: &mut Vec<ConfigIssue>) {
    let spark = &config.spark;
    if spark.app_name.trim().is_empty() {
        issues.push(ConfigIssue::new("spark.app_name", "must not be empty"));
    }
    if spark.files.max_partition_bytes == 0 {
        issues.push(ConfigIssue::new("spark.files.max_partition_bytes", "must be greater than 0"));
    }
    if !is_size_string(&spark.driver.memory) {
        issues.push(ConfigIssue::new(
            "spark.driver.memory",
            format!("'{}' is not a size like 8g or 512m", spark.driver.memory),
        ));
    }
    if !is_size_string(&spark.driver.max_result_size) {
        issues.push(ConfigIssue::new(
            "spark.driver.max_result_size",
            format!("'{}' is not a size like 2g or 512m", spark.driver.max_result_size),
        ));
    }
    if !SPARK_LOG_LEVELS.contains(&spark.loglevel.to_ascii_uppercase().as_str()) {
        issues.push(ConfigIssue::new(
            "spark.loglevel",
            format!("'{}' must be one of {:?}", spark.loglevel, SPARK_LOG_LEVELS),
        ));
    }
}

/// `<digits>` optionally followed by one of `k`, `m`, `g`, `t` (case-insensitive, optional `b`).
fn is_size_string(value: &str) -> bool {
    let value = value.trim().to_ascii_lowercase();
    let value = value.strip_suffix('b').unwrap_or(&value);
    let digits = value.trim_end_matches(['k', 'm', 'g', 't']);
    let unit_len = value.len() - digits.len();
    unit_len <= 1 && !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn check_paths(config: &Config, issues: &mut Vec<ConfigIssue>) {
    let input = &config.path.input_data;
    if input.directory_path.as_os_str().is_empty() {
        issues.push(ConfigIssue::new("path.input_data.directory_path", "must not be empty"));
    }
    if config.path.working.directory_path.as_os_str().is_empty() {
        issues.push(ConfigIssue::new("path.working.directory_path", "must not be empty"));
    }

    for (key, value) in input.file_paths.entries() {
        if let Some(file) = value {
            if file.trim().is_empty() {
                issues.push(ConfigIssue::new(
                    format!("path.input_data.file_paths.{key}"),
                    "must be a file name or null, not an empty string",
                ));
            }
        }
    }

    for (name, file) in input.file_paths.shapefiles.iter().flatten() {
        if file.trim().is_empty() {
            issues.push(ConfigIssue::new(
                format!("path.input_data.file_paths.shapefiles.{name}"),
                "must be a file name",
            ));
        }
    }
}

fn check_columns(config: &Config, issues: &mut Vec<ConfigIssue>) {
    if let Some(geo) = &config.col_names.geo {
        if !GEO_COLUMNS.contains(&geo.as_str()) {
            issues.push(ConfigIssue::new(
                "col_names.geo",
                format!("'{geo}' must be one of {GEO_COLUMNS:?}"),
            ));
        }
    }

    let survey = &config.col_types.survey;
    let groups = [
        ("continuous", &survey.continuous),
        ("categorical", &survey.categorical),
        ("binary", &survey.binary),
    ];
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for (group, columns) in groups {
        for column in columns.iter() {
            if !seen.insert(column.as_str()) {
                issues.push(ConfigIssue::new(
                    format!("col_types.survey.{group}"),
                    format!("column '{column}' is listed under more than one type"),
                ));
            }
        }
    }
}

fn check_params(config: &Config, issues: &mut Vec<ConfigIssue>) {
    let cdr = &config.params.cdr;

    if cdr.weekend.len() != 2 {
        issues.push(ConfigIssue::new(
            "params.cdr.weekend",
            format!("must hold exactly two days, got {}", cdr.weekend.len()),
        ));
    }
    for day in &cdr.weekend {
        if !(1..=7).contains(day) {
            issues.push(ConfigIssue::new(
                "params.cdr.weekend",
                format!("day {day} is outside 1..=7"),
            ));
        }
    }
    if cdr.weekend.windows(2).any(|w| w[0] >= w[1]) {
        issues.push(ConfigIssue::new(
            "params.cdr.weekend",
            "days must be listed in increasing order",
        ));
    }

    if cdr.start_of_day > 24 || cdr.end_of_day > 24 {
        issues.push(ConfigIssue::new(
            "params.cdr",
            "start_of_day and end_of_day must be hours within 0..=24",
        ));
    }
    if cdr.start_of_day >= cdr.end_of_day {
        issues.push(ConfigIssue::new(
            "params.cdr.start_of_day",
            format!(
                "start_of_day ({}) must be before end_of_day ({})",
                cdr.start_of_day, cdr.end_of_day
            ),
        ));
    }

    if let Some(hours) = &config.params.home_location.filter_hours {
        if let Some(bad) = hours.iter().find(|h| **h > 23) {
            issues.push(ConfigIssue::new(
                "params.home_location.filter_hours",
                format!("hour {bad} is outside 0..=23"),
            ));
        }
    }

    let autogluon = &config.params.automl.autogluon;
    if autogluon.time_limit == 0 {
        issues.push(ConfigIssue::new(
            "params.automl.autogluon.time_limit",
            "must be greater than 0",
        ));
    }
    if autogluon.eval_metric.trim().is_empty() {
        issues.push(ConfigIssue::new(
            "params.automl.autogluon.eval_metric",
            "must not be empty",
        ));
    }
}

fn check_model_grid(name: &str, grid: &ModelGrid, issues: &mut Vec<ConfigIssue>) {
    let thresholds = [
        ("dropmissing__threshold", &grid.dropmissing_threshold),
        ("droplowvariance__threshold", &grid.droplowvariance_threshold),
    ];
    for (key, values) in thresholds {
        let path = format!("hyperparams.{name}.{key}");
        match values {
            None => issues.push(ConfigIssue::new(path, "is required")),
            Some(values) if values.is_empty() => {
                issues.push(ConfigIssue::new(path, "must list at least one value"))
            }
            Some(values) => {
                if let Some(bad) = values.iter().find(|v| !(v.is_finite() && (0.0..=1.0).contains(*v))) {
                    issues.push(ConfigIssue::new(path, format!("{bad} is outside [0, 1]")));
                }
            }
        }
    }

    for &(lower, upper) in &grid.winsorizer_limits {
        let ok = lower.is_finite() && upper.is_finite() && 0.0 <= lower && lower < upper && upper <= 1.0;
        if !ok {
            issues.push(ConfigIssue::new(
                format!("hyperparams.{name}.winsorizer__limits"),
                format!("[{lower}, {upper}] must satisfy 0 <= lower < upper <= 1"),
            ));
        }
    }

    for (key, values) in &grid.model {
        if values.is_empty() {
            issues.push(ConfigIssue::new(
                format!("hyperparams.{name}.{key}"),
                "must list at least one value",
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load::from_yaml_str;

    fn base_yaml() -> String {
        r#"
spark:
  app_name: cider
  files:
    max_partition_bytes: 67108864
  driver:
    memory: 8g
    max_result_size: 2g
  loglevel: ERROR
path:
  input_data:
    directory_path: data
    file_paths:
      cdr: cdr.csv
      poverty_scores: null
      user_consent: null
  working:
    directory_path: outputs
params:
  cdr:
    weekend: [1, 7]
    start_of_day: 7
    end_of_day: 19
  home_location:
    filter_hours: null
  automl:
    autogluon:
      time_limit: 3600
      eval_metric: r2
  opt_in_default: false
hyperparams:
  lasso:
    dropmissing__threshold: [0.9, 1]
    droplowvariance__threshold: [0, 0.01]
    winsorizer__limits: [[0.0, 1.0], [0.005, 0.995]]
    model__alpha: [0.001, 0.01]
"#
        .to_string()
    }

    fn issues_for(yaml: &str) -> Vec<ConfigIssue> {
        collect_issues(&from_yaml_str(yaml).unwrap())
    }

    #[test]
    fn valid_config_has_no_issues() {
        assert!(issues_for(&base_yaml()).is_empty());
    }

    #[test]
    fn weekend_must_be_two_ordered_days() {
        let issues = issues_for(&base_yaml().replace("weekend: [1, 7]", "weekend: [7, 1]"));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "params.cdr.weekend");

        let issues = issues_for(&base_yaml().replace("weekend: [1, 7]", "weekend: [6, 7, 8]"));
        assert!(issues.iter().any(|i| i.message.contains("exactly two")));
        assert!(issues.iter().any(|i| i.message.contains("outside 1..=7")));
    }

    #[test]
    fn day_must_start_before_it_ends() {
        let issues = issues_for(&base_yaml().replace("start_of_day: 7", "start_of_day: 19"));
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "params.cdr.start_of_day");
    }

    #[test]
    fn missing_threshold_is_reported_per_model() {
        let yaml = base_yaml().replace("    droplowvariance__threshold: [0, 0.01]\n", "");
        let issues = issues_for(&yaml);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "hyperparams.lasso.droplowvariance__threshold");
    }

    #[test]
    fn non_numeric_threshold_fails_to_parse() {
        let yaml = base_yaml().replace("[0.9, 1]", "[high, low]");
        assert!(from_yaml_str(&yaml).is_err());
    }

    #[test]
    fn winsorizer_limits_must_be_ordered_quantiles() {
        let yaml = base_yaml().replace("[0.005, 0.995]", "[0.995, 0.005]");
        let issues = issues_for(&yaml);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "hyperparams.lasso.winsorizer__limits");
    }

    #[test]
    fn all_issues_are_collected() {
        let yaml = base_yaml()
            .replace("loglevel: ERROR", "loglevel: LOUD")
            .replace("memory: 8g", "memory: lots")
            .replace("start_of_day: 7", "start_of_day: 20")
            .replace("time_limit: 3600", "time_limit: 0");
        let err = validate(&from_yaml_str(&yaml).unwrap()).unwrap_err();
        let paths: Vec<&str> = err.issues().iter().map(|i| i.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "spark.driver.memory",
                "spark.loglevel",
                "params.cdr.start_of_day",
                "params.automl.autogluon.time_limit",
            ]
        );
    }

    #[test]
    fn survey_types_must_be_disjoint() {
        let yaml = format!(
            "{}col_types:\n  survey:\n    continuous: [con0]\n    binary: [con0]\n",
            base_yaml()
        );
        let issues = issues_for(&yaml);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].path, "col_types.survey.binary");
    }

    fn single_issue_path(yaml: &str) -> String {
        let issues = issues_for(yaml);
        assert_eq!(issues.len(), 1, "{issues:?}");
        issues[0].path.clone()
    }

    #[test]
    fn empty_file_path_is_rejected() {
        let yaml = base_yaml().replace("cdr: cdr.csv", "cdr: \"\"");
        assert_eq!(single_issue_path(&yaml), "path.input_data.file_paths.cdr");
    }

    #[test]
    fn empty_shapefile_entry_is_rejected() {
        let yaml = base_yaml().replace(
            "      user_consent: null\n",
            "      user_consent: null\n      shapefiles:\n        regions: \"\"\n",
        );
        assert_eq!(single_issue_path(&yaml), "path.input_data.file_paths.shapefiles.regions");
    }

    #[test]
    fn filter_hours_must_be_clock_hours() {
        let yaml = base_yaml().replace("filter_hours: null", "filter_hours: [0, 6, 24]");
        assert_eq!(single_issue_path(&yaml), "params.home_location.filter_hours");

        let yaml = base_yaml().replace("filter_hours: null", "filter_hours: [0, 23]");
        assert!(issues_for(&yaml).is_empty());
    }

    #[test]
    fn geo_column_must_be_an_antenna_key() {
        let yaml = format!("{}col_names:\n  geo: cell_id\n", base_yaml());
        assert_eq!(single_issue_path(&yaml), "col_names.geo");

        let yaml = format!("{}col_names:\n  geo: antenna_id\n", base_yaml());
        assert!(issues_for(&yaml).is_empty());
    }

    #[test]
    fn partition_bytes_must_be_positive() {
        let yaml = base_yaml().replace("max_partition_bytes: 67108864", "max_partition_bytes: 0");
        assert_eq!(single_issue_path(&yaml), "spark.files.max_partition_bytes");
    }

    #[test]
    fn max_result_size_must_be_a_size() {
        let yaml = base_yaml().replace("max_result_size: 2g", "max_result_size: huge");
        assert_eq!(single_issue_path(&yaml), "spark.driver.max_result_size");
    }

    #[test]
    fn eval_metric_must_be_named() {
        let yaml = base_yaml().replace("eval_metric: r2", "eval_metric: \"\"");
        assert_eq!(single_issue_path(&yaml), "params.automl.autogluon.eval_metric");
    }

    #[test]
    fn size_strings() {
        assert!(is_size_string("8g"));
        assert!(is_size_string("512M"));
        assert!(is_size_string("1024"));
        assert!(is_size_string("2gb"));
        assert!(!is_size_string("g"));
        assert!(!is_size_string("8gg"));
        assert!(!is_size_string("lots"));
    }
}
