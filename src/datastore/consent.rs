//! Consent-aware store.
//!
//! Subscribers listed in `user_consent` either opted in (`include = true`),
//! opted out (`include = false`) or left it blank. Blank and unlisted
//! subscribers fall back to `params.opt_in_default`. Without a consent
//! table every subscriber falls back to it.

use std::collections::{BTreeMap, HashMap};
use std::ops::Deref;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Config;
use crate::datastore::DataStore;
use crate::domain::{ConsentRecord, DataType, EventRecord, MergedData, Table};
use crate::error::{ConfigError, DataError};

/// Per-subscriber consent decisions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsentRegistry {
    default_opt_in: bool,
    decisions: HashMap<String, bool>,
}

impl ConsentRegistry {
    pub fn new(records: &[ConsentRecord], default_opt_in: bool) -> Self {
        let decisions = records
            .iter()
            .filter_map(|r| r.include.map(|include| (r.user_id.clone(), include)))
            .collect();
        Self {
            default_opt_in,
            decisions,
        }
    }

    pub fn allows(&self, user_id: &str) -> bool {
        self.decisions.get(user_id).copied().unwrap_or(self.default_opt_in)
    }

    pub fn explicit_decisions(&self) -> usize {
        self.decisions.len()
    }
}

/// A `DataStore` that drops data of subscribers without consent.
///
/// Reads go through `Deref`. Mutation is limited to the methods below, so
/// nothing can load data around the consent filter.
#[derive(Debug, Clone)]
pub struct OptDataStore {
    inner: DataStore,
    registry: Option<ConsentRegistry>,
}

impl OptDataStore {
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: DataStore::new(config)?,
            registry: None,
        })
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.inner = self.inner.with_seed(seed);
        self
    }

    pub fn registry(&self) -> Option<&ConsentRegistry> {
        self.registry.as_ref()
    }

    pub fn into_inner(self) -> DataStore {
        self.inner
    }

    /// Load the requested datasets together with `user_consent`, then filter
    /// everything loaded so far by consent.
    ///
    /// Returns the number of rows dropped.
    pub fn load_data(&mut self, requests: BTreeMap<DataType, Option<Table>>) -> Result<usize, DataError> {
        let mut requests = requests;
        let consent_available = self.inner.config().input_path(DataType::UserConsent).is_some()
            || requests.get(&DataType::UserConsent).is_some_and(Option::is_some);
        if consent_available {
            requests.entry(DataType::UserConsent).or_insert(None);
        } else {
            requests.remove(&DataType::UserConsent);
            warn!(
                default_opt_in = self.inner.config().params.opt_in_default,
                "no user_consent configured; every subscriber gets the default"
            );
        }
        self.inner.load_data(requests)?;

        let records = self.inner.user_consent.as_deref().unwrap_or_default();
        let registry = ConsentRegistry::new(records, self.inner.config().params.opt_in_default);
        let dropped = apply_consent(&mut self.inner, &registry);
        info!(
            dropped,
            explicit = registry.explicit_decisions(),
            default_opt_in = self.inner.config().params.opt_in_default,
            "applied subscriber consent"
        );
        self.registry = Some(registry);
        Ok(dropped)
    }

    pub fn filter_dates(&mut self, start: NaiveDate, end: NaiveDate) -> Result<(), DataError> {
        self.inner.filter_dates(start, end)
    }

    pub fn deduplicate(&mut self) -> Result<usize, DataError> {
        self.inner.deduplicate()
    }

    pub fn merge(&mut self) -> Result<&MergedData, DataError> {
        self.inner.merge()
    }
}

impl Deref for OptDataStore {
    type Target = DataStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Drop every row that touches a subscriber without consent.
pub fn apply_consent(store: &mut DataStore, registry: &ConsentRegistry) -> usize {
    let mut dropped = retain_consented(&mut store.cdr, registry)
        + retain_consented(&mut store.recharges, registry)
        + retain_consented(&mut store.mobiledata, registry)
        + retain_consented(&mut store.mobilemoney, registry);

    if let Some(labels) = store.labels.as_mut() {
        let before = labels.len();
        labels.retain(|l| registry.allows(&l.name));
        dropped += before - labels.len();
    }
    if let Some(features) = store.features.as_mut() {
        let before = features.rows.len();
        features.rows.retain(|r| registry.allows(&r.name));
        dropped += before - features.rows.len();
    }
    dropped
}

fn retain_consented<T: EventRecord>(records: &mut Option<Vec<T>>, registry: &ConsentRegistry) -> usize {
    let Some(rows) = records.as_mut() else { return 0 };
    let before = rows.len();
    rows.retain(|r| r.subscribers().into_iter().all(|id| registry.allows(id)));
    before - rows.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::from_yaml_str;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &std::path::Path, consent: Option<&str>, opt_in_default: bool) -> Config {
        let consent = consent.map_or("null".to_string(), str::to_string);
        let yaml = format!(
            r#"
spark:
  app_name: cider-test
path:
  input_data:
    directory_path: {}
    file_paths:
      cdr: cdr.csv
      labels: labels.csv
      user_consent: {consent}
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
  opt_in_default: {opt_in_default}
"#,
            dir.display()
        );
        from_yaml_str(&yaml).unwrap()
    }

    fn fixtures() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("cdr.csv"),
            "txn_type,caller_id,recipient_id,timestamp,duration,caller_antenna,recipient_antenna,international\n\
             call,A,B,2020-01-01 10:00:00,60,a1,a2,domestic\n\
             text,B,C,2020-01-01 11:00:00,,a2,a3,domestic\n\
             call,C,A,2020-01-02 12:00:00,30,a3,a1,domestic\n",
        )
        .unwrap();
        fs::write(dir.path().join("labels.csv"), "name,label\nA,1\nB,2\nC,3\n").unwrap();
        fs::write(dir.path().join("consent.csv"), "user_id,include\nA,true\nB,false\nC,\n").unwrap();
        dir
    }

    fn requests() -> BTreeMap<DataType, Option<Table>> {
        [(DataType::Cdr, None), (DataType::Labels, None)].into_iter().collect()
    }

    #[test]
    fn registry_falls_back_to_default() {
        let records = vec![
            ConsentRecord { user_id: "A".into(), include: Some(true) },
            ConsentRecord { user_id: "B".into(), include: Some(false) },
            ConsentRecord { user_id: "C".into(), include: None },
        ];

        let opt_out = ConsentRegistry::new(&records, false);
        assert!(opt_out.allows("A"));
        assert!(!opt_out.allows("B"));
        assert!(!opt_out.allows("C"));
        assert!(!opt_out.allows("unknown"));

        let opt_in = ConsentRegistry::new(&records, true);
        assert!(!opt_in.allows("B"));
        assert!(opt_in.allows("C"));
        assert!(opt_in.allows("unknown"));
    }

    #[test]
    fn opt_out_default_keeps_only_explicit_consent() {
        let dir = fixtures();
        let mut store = OptDataStore::new(config(dir.path(), Some("consent.csv"), false)).unwrap();
        let dropped = store.load_data(requests()).unwrap();

        // Every call involves B or C, and only A opted in.
        assert_eq!(store.cdr.as_ref().unwrap().len(), 0);
        let labels: Vec<&str> = store.labels.as_ref().unwrap().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(labels, vec!["A"]);
        assert_eq!(dropped, 5);
    }

    #[test]
    fn opt_in_default_drops_only_explicit_refusals() {
        let dir = fixtures();
        let mut store = OptDataStore::new(config(dir.path(), Some("consent.csv"), true)).unwrap();
        store.load_data(requests()).unwrap();

        let cdr = store.cdr.as_ref().unwrap();
        assert_eq!(cdr.len(), 1);
        assert_eq!(cdr[0].caller_id, "C");
        assert_eq!(store.labels.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn missing_consent_file_falls_back_to_default() {
        let dir = fixtures();
        let mut store = OptDataStore::new(config(dir.path(), None, true)).unwrap();
        assert_eq!(store.load_data(requests()).unwrap(), 0);
        assert_eq!(store.cdr.as_ref().unwrap().len(), 3);
        assert_eq!(store.registry().unwrap().explicit_decisions(), 0);

        let mut store = OptDataStore::new(config(dir.path(), None, false)).unwrap();
        assert_eq!(store.load_data(requests()).unwrap(), 6);
        assert_eq!(store.cdr.as_ref().unwrap().len(), 0);
        assert_eq!(store.labels.as_ref().unwrap().len(), 0);
    }

    #[test]
    fn reloading_keeps_consent_applied() {
        let dir = fixtures();
        let mut store = OptDataStore::new(config(dir.path(), Some("consent.csv"), false)).unwrap();
        store.load_data(requests()).unwrap();
        store.load_data([(DataType::Cdr, None)].into_iter().collect()).unwrap();
        assert_eq!(store.cdr.as_ref().unwrap().len(), 0);
    }

    #[test]
    fn store_operations_pass_through() {
        let dir = fixtures();
        let mut store = OptDataStore::new(config(dir.path(), Some("consent.csv"), true)).unwrap();
        store.load_data(requests()).unwrap();
        assert_eq!(store.deduplicate().unwrap(), 0);
        store
            .filter_dates(
                NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
                NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            )
            .unwrap();
        assert_eq!(store.cdr.as_ref().unwrap().len(), 1);
        assert!(store.registry().is_some());
    }
}
