//! The data store: every dataset named in the config, loaded and validated.
//!
//! A `DataStore` owns a validated `Config` and one optional slot per dataset.
//! Datasets are loaded on demand (`load_data`, or one of the `load_*`
//! helpers), after which the store can restrict event logs to a date window,
//! drop duplicate events and join features with labels for training.
//!
//! `OptDataStore` (in `consent`) layers subscriber consent on top.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{Config, validate};
use crate::domain::{
    AntennaRecord, CdrRecord, ConsentRecord, DataType, EventRecord, Features, LabelRecord, MergedData,
    MobileDataRecord, MobileMoneyRecord, RechargeRecord, Region, Table,
};
use crate::error::{ConfigError, DataError};

pub mod consent;
pub mod loaders;
pub mod tables;

pub use consent::*;
pub use loaders::{Loaded, load_dataset};
pub use tables::*;

/// Default seed for the `random` column of targeting/fairness data.
pub const DEFAULT_SEED: u64 = 42;

/// Columns never treated as features when merging.
const NON_FEATURE_COLUMNS: [&str; 3] = ["name", "label", "weight"];

#[derive(Debug, Clone)]
pub struct DataStore {
    config: Config,
    seed: u64,

    pub cdr: Option<Vec<CdrRecord>>,
    pub antennas: Option<Vec<AntennaRecord>>,
    pub recharges: Option<Vec<RechargeRecord>>,
    pub mobiledata: Option<Vec<MobileDataRecord>>,
    pub mobilemoney: Option<Vec<MobileMoneyRecord>>,
    pub shapefiles: Option<BTreeMap<String, Vec<Region>>>,
    pub home_ground_truth: Option<Table>,
    pub poverty_scores: Option<Table>,
    pub features: Option<Features>,
    pub labels: Option<Vec<LabelRecord>>,
    pub survey: Option<SurveyData>,
    pub targeting: Option<WeightedTable>,
    pub fairness: Option<WeightedTable>,
    pub user_consent: Option<Vec<ConsentRecord>>,

    /// Output of the last `merge`.
    pub merged: Option<MergedData>,
}

impl DataStore {
    /// Create an empty store. The config is validated up front.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        validate(&config)?;
        Ok(Self {
            config,
            seed: DEFAULT_SEED,
            cdr: None,
            antennas: None,
            recharges: None,
            mobiledata: None,
            mobilemoney: None,
            shapefiles: None,
            home_ground_truth: None,
            poverty_scores: None,
            features: None,
            labels: None,
            survey: None,
            targeting: None,
            fairness: None,
            user_consent: None,
            merged: None,
        })
    }

    /// Seed for random draws; each dataset derives its own stream from it.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn seed_for(&self, data_type: DataType) -> u64 {
        self.seed.wrapping_add(data_type as u64)
    }

    /// Load a single dataset from disk, or from `source` when given.
    pub fn load(&mut self, data_type: DataType, source: Option<Table>) -> Result<(), DataError> {
        let loaded = load_dataset(&self.config, data_type, source, self.seed_for(data_type))?;
        self.install(loaded);
        Ok(())
    }

    pub fn load_cdr(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Cdr, source)
    }

    pub fn load_antennas(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Antennas, source)
    }

    pub fn load_recharges(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Recharges, source)
    }

    pub fn load_mobiledata(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::MobileData, source)
    }

    pub fn load_mobilemoney(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::MobileMoney, source)
    }

    pub fn load_shapefiles(&mut self) -> Result<(), DataError> {
        self.load(DataType::Shapefiles, None)
    }

    pub fn load_home_ground_truth(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::HomeGroundTruth, source)
    }

    pub fn load_poverty_scores(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::PovertyScores, source)
    }

    pub fn load_features(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Features, source)
    }

    pub fn load_labels(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Labels, source)
    }

    pub fn load_survey(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Survey, source)
    }

    pub fn load_targeting(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Targeting, source)
    }

    pub fn load_fairness(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::Fairness, source)
    }

    pub fn load_user_consent(&mut self, source: Option<Table>) -> Result<(), DataError> {
        self.load(DataType::UserConsent, source)
    }

    /// Load several datasets at once.
    ///
    /// Reads and parsing run in parallel. Nothing is installed unless every
    /// requested dataset loads successfully.
    pub fn load_data(&mut self, requests: BTreeMap<DataType, Option<Table>>) -> Result<(), DataError> {
        let config = &self.config;
        let seeds: BTreeMap<DataType, u64> = requests.keys().map(|dt| (*dt, self.seed_for(*dt))).collect();

        let loaded: Vec<Loaded> = requests
            .into_par_iter()
            .map(|(data_type, source)| load_dataset(config, data_type, source, seeds[&data_type]))
            .collect::<Result<Vec<_>, _>>()?;

        for item in loaded {
            self.install(item);
        }
        Ok(())
    }

    pub(crate) fn install(&mut self, loaded: Loaded) {
        let rows = loaded.len();
        let data_type = match loaded {
            Loaded::Cdr(v) => {
                self.cdr = Some(v);
                DataType::Cdr
            }
            Loaded::Antennas(v) => {
                self.antennas = Some(v);
                DataType::Antennas
            }
            Loaded::Recharges(v) => {
                self.recharges = Some(v);
                DataType::Recharges
            }
            Loaded::MobileData(v) => {
                self.mobiledata = Some(v);
                DataType::MobileData
            }
            Loaded::MobileMoney(v) => {
                self.mobilemoney = Some(v);
                DataType::MobileMoney
            }
            Loaded::Shapefiles(v) => {
                self.shapefiles = Some(v);
                DataType::Shapefiles
            }
            Loaded::HomeGroundTruth(v) => {
                self.home_ground_truth = Some(v);
                DataType::HomeGroundTruth
            }
            Loaded::PovertyScores(v) => {
                self.poverty_scores = Some(v);
                DataType::PovertyScores
            }
            Loaded::Features(v) => {
                self.features = Some(v);
                DataType::Features
            }
            Loaded::Labels(v) => {
                self.labels = Some(v);
                DataType::Labels
            }
            Loaded::Survey(v) => {
                self.survey = Some(v);
                DataType::Survey
            }
            Loaded::Targeting(v) => {
                self.targeting = Some(v);
                DataType::Targeting
            }
            Loaded::Fairness(v) => {
                self.fairness = Some(v);
                DataType::Fairness
            }
            Loaded::UserConsent(v) => {
                self.user_consent = Some(v);
                DataType::UserConsent
            }
        };
        info!(dataset = %data_type, rows, "loaded dataset");
    }

    /// Row counts of every loaded dataset.
    pub fn loaded_counts(&self) -> Vec<(DataType, usize)> {
        let counts = [
            (DataType::Cdr, self.cdr.as_ref().map(Vec::len)),
            (DataType::Antennas, self.antennas.as_ref().map(Vec::len)),
            (DataType::Recharges, self.recharges.as_ref().map(Vec::len)),
            (DataType::MobileData, self.mobiledata.as_ref().map(Vec::len)),
            (DataType::MobileMoney, self.mobilemoney.as_ref().map(Vec::len)),
            (
                DataType::Shapefiles,
                self.shapefiles.as_ref().map(|m| m.values().map(Vec::len).sum()),
            ),
            (DataType::HomeGroundTruth, self.home_ground_truth.as_ref().map(Table::len)),
            (DataType::PovertyScores, self.poverty_scores.as_ref().map(Table::len)),
            (DataType::Features, self.features.as_ref().map(|f| f.rows.len())),
            (DataType::Labels, self.labels.as_ref().map(Vec::len)),
            (DataType::Survey, self.survey.as_ref().map(|s| s.table.len())),
            (DataType::Targeting, self.targeting.as_ref().map(|t| t.table.len())),
            (DataType::Fairness, self.fairness.as_ref().map(|t| t.table.len())),
            (DataType::UserConsent, self.user_consent.as_ref().map(Vec::len)),
        ];
        counts
            .into_iter()
            .filter_map(|(dt, n)| n.map(|n| (dt, n)))
            .collect()
    }

    /// Keep only events whose `day` lies within `[start, end]` (inclusive).
    ///
    /// Applies to every loaded event log (cdr, recharges, mobiledata, mobilemoney).
    pub fn filter_dates(&mut self, start: NaiveDate, end: NaiveDate) -> Result<(), DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }
        let removed = retain_days(&mut self.cdr, start, end)
            + retain_days(&mut self.recharges, start, end)
            + retain_days(&mut self.mobiledata, start, end)
            + retain_days(&mut self.mobilemoney, start, end);
        info!(%start, %end, removed, "filtered event logs by date");
        Ok(())
    }

    /// Drop exact duplicate events from every loaded event log.
    ///
    /// Returns the number of rows removed.
    pub fn deduplicate(&mut self) -> Result<usize, DataError> {
        let removed = dedup_records(&mut self.cdr)?
            + dedup_records(&mut self.recharges)?
            + dedup_records(&mut self.mobiledata)?
            + dedup_records(&mut self.mobilemoney)?;
        info!(removed, "removed duplicate events");
        Ok(removed)
    }

    /// Inner-join features with labels on `name`.
    ///
    /// Requires both datasets to be loaded. The result is stored in `merged`
    /// and also returned.
    pub fn merge(&mut self) -> Result<&MergedData, DataError> {
        let features = self.features.as_ref().ok_or(DataError::NotLoaded(DataType::Features))?;
        let labels = self.labels.as_ref().ok_or(DataError::NotLoaded(DataType::Labels))?;

        let keep: Vec<usize> = features
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| !NON_FEATURE_COLUMNS.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();

        let mut by_name: HashMap<&str, &[Option<f64>]> = HashMap::new();
        for row in &features.rows {
            by_name.entry(row.name.as_str()).or_insert(row.values.as_slice());
        }
        let duplicates = features.rows.len() - by_name.len();
        if duplicates > 0 {
            warn!(duplicates, "feature rows repeat a name; keeping the first of each");
        }

        let mut merged = MergedData {
            feature_columns: keep.iter().map(|&i| features.columns[i].clone()).collect(),
            ..MergedData::default()
        };
        for label in labels {
            let Some(values) = by_name.get(label.name.as_str()) else {
                continue;
            };
            merged.names.push(label.name.clone());
            merged.x.push(keep.iter().map(|&i| values[i]).collect());
            merged.y.push(label.label);
            merged.weights.push(label.weight);
        }

        info!(
            rows = merged.len(),
            features = merged.feature_columns.len(),
            unmatched = labels.len() - merged.len(),
            "merged features with labels"
        );
        Ok(self.merged.insert(merged))
    }
}

fn retain_days<T: EventRecord>(records: &mut Option<Vec<T>>, start: NaiveDate, end: NaiveDate) -> usize {
    let Some(rows) = records.as_mut() else { return 0 };
    let before = rows.len();
    rows.retain(|r| (start..=end).contains(&r.day()));
    before - rows.len()
}

fn dedup_records<T: EventRecord>(records: &mut Option<Vec<T>>) -> Result<usize, DataError> {
    let Some(rows) = records.as_mut() else { return Ok(0) };

    let mut seen = HashSet::with_capacity(rows.len());
    let mut keep = Vec::with_capacity(rows.len());
    for row in rows.iter() {
        keep.push(seen.insert(serde_json::to_vec(row)?));
    }

    let before = rows.len();
    let mut flags = keep.into_iter();
    rows.retain(|_| flags.next().unwrap_or(true));
    debug!(removed = before - rows.len(), "deduplicated event log");
    Ok(before - rows.len())
}
