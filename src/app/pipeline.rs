//! Shared "load pipeline" logic behind `cider load`.
//!
//! The workflow is:
//! resolve datasets -> load (optionally with consent) -> date filter -> dedup -> merge
//!
//! `app` only handles presentation (printing and exports).

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::info;

use crate::cli::LoadArgs;
use crate::config::Config;
use crate::datastore::{DataStore, OptDataStore};
use crate::domain::{DataType, MergedData, Table};
use crate::error::AppError;

/// All computed outputs of a single `cider load` run.
#[derive(Debug, Clone)]
pub struct LoadOutput {
    pub counts: Vec<(DataType, usize)>,
    /// Rows dropped for lack of consent (`--opt-in` only).
    pub consent_dropped: Option<usize>,
    /// Duplicate events removed (`--dedup` only).
    pub duplicates_removed: Option<usize>,
    pub merged: Option<MergedData>,
}

/// Datasets to load: the explicit list, or every dataset with a configured file.
pub fn requested_datasets(config: &Config, explicit: &[DataType]) -> Vec<DataType> {
    if !explicit.is_empty() {
        let mut out = explicit.to_vec();
        out.sort();
        out.dedup();
        return out;
    }
    DataType::LOADABLE
        .into_iter()
        .filter(|dt| match dt {
            DataType::Shapefiles => !config.shapefile_paths().is_empty(),
            _ => config.input_path(*dt).is_some(),
        })
        .collect()
}

/// Execute the load pipeline and return the computed outputs.
pub fn run_load(config: Config, args: &LoadArgs) -> Result<LoadOutput, AppError> {
    let datasets = requested_datasets(&config, &args.datasets);
    if datasets.is_empty() {
        return Err(AppError::new(2, "No datasets requested and none configured under path.input_data.file_paths."));
    }
    info!(datasets = ?datasets, opt_in = args.opt_in, "loading datasets");
    let requests: BTreeMap<DataType, Option<Table>> = datasets.into_iter().map(|dt| (dt, None)).collect();

    // 1) Load, with or without consent filtering.
    let mut consent_dropped = None;
    let mut store = if args.opt_in {
        let mut store = OptDataStore::new(config)?.with_seed(args.seed);
        consent_dropped = Some(store.load_data(requests)?);
        store.into_inner()
    } else {
        let mut store = DataStore::new(config)?.with_seed(args.seed);
        store.load_data(requests)?;
        store
    };

    // 2) Restrict event logs to the requested window.
    if args.start.is_some() || args.end.is_some() {
        store.filter_dates(
            args.start.unwrap_or(NaiveDate::MIN),
            args.end.unwrap_or(NaiveDate::MAX),
        )?;
    }

    // 3) Drop duplicate events.
    let duplicates_removed = if args.dedup { Some(store.deduplicate()?) } else { None };

    // 4) Join features with labels.
    let merged = if args.merge || args.export.is_some() {
        Some(store.merge()?.clone())
    } else {
        None
    };

    Ok(LoadOutput {
        counts: store.loaded_counts(),
        consent_dropped,
        duplicates_removed,
        merged,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_yaml_str;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &std::path::Path) -> Config {
        let yaml = format!(
            r#"
spark:
  app_name: cider-test
path:
  input_data:
    directory_path: {}
    file_paths:
      recharges: recharges.csv
      features: features.csv
      labels: labels.csv
      user_consent: consent.csv
      antennas: null
  working:
    directory_path: outputs
params:
  cdr:
    weekend: [1, 7]
    start_of_day: 7
    end_of_day: 19
  automl:
    autogluon:
      time_limit: 60
      eval_metric: r2
  opt_in_default: true
"#,
            dir.display()
        );
        from_yaml_str(&yaml).unwrap()
    }

    fn fixtures() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("recharges.csv"),
            "caller_id,amount,timestamp\nA,100,2020-01-01\nA,100,2020-01-01\nB,5,2020-03-01\n",
        )
        .unwrap();
        fs::write(dir.path().join("features.csv"), "name,f0\nA,1\nB,2\n").unwrap();
        fs::write(dir.path().join("labels.csv"), "name,label\nA,10\nB,20\n").unwrap();
        fs::write(dir.path().join("consent.csv"), "user_id,include\nB,false\n").unwrap();
        dir
    }

    fn args() -> LoadArgs {
        LoadArgs {
            datasets: vec![],
            start: None,
            end: None,
            dedup: false,
            opt_in: false,
            merge: false,
            export: None,
            seed: 42,
        }
    }

    #[test]
    fn default_datasets_are_the_configured_ones() {
        let dir = fixtures();
        let datasets = requested_datasets(&config(dir.path()), &[]);
        assert_eq!(datasets, vec![DataType::Recharges, DataType::Features, DataType::Labels]);

        let explicit = requested_datasets(&config(dir.path()), &[DataType::Labels, DataType::Cdr, DataType::Labels]);
        assert_eq!(explicit, vec![DataType::Cdr, DataType::Labels]);
    }

    #[test]
    fn full_run_filters_dedups_and_merges() {
        let dir = fixtures();
        let args = LoadArgs {
            end: NaiveDate::from_ymd_opt(2020, 1, 31),
            dedup: true,
            merge: true,
            ..args()
        };
        let out = run_load(config(dir.path()), &args).unwrap();

        assert_eq!(out.duplicates_removed, Some(1));
        assert_eq!(out.consent_dropped, None);
        assert!(out.counts.contains(&(DataType::Recharges, 1)));
        assert_eq!(out.merged.unwrap().len(), 2);
    }

    #[test]
    fn opt_in_run_drops_refusals() {
        let dir = fixtures();
        let args = LoadArgs {
            opt_in: true,
            merge: true,
            ..args()
        };
        let out = run_load(config(dir.path()), &args).unwrap();

        // B refused: one recharge, one feature row and one label.
        assert_eq!(out.consent_dropped, Some(3));
        assert_eq!(out.merged.unwrap().names, vec!["A"]);
    }

    #[test]
    fn missing_file_is_a_data_error() {
        let dir = fixtures();
        fs::remove_file(dir.path().join("labels.csv")).unwrap();
        let err = run_load(config(dir.path()), &args()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }
}
