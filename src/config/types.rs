//! Typed configuration sections.
//!
//! The YAML file has six top-level keys (`spark`, `path`, `col_names`,
//! `col_types`, `params`, `hyperparams`). Each maps onto one struct here.
//! Values that the file allows to be `null` are `Option`s; everything else
//! must be present and of the right type or parsing fails.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::DataType;

/// Parsed pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub spark: SparkSettings,
    pub path: PathSettings,
    #[serde(default)]
    pub col_names: ColumnNames,
    #[serde(default)]
    pub col_types: ColumnTypes,
    pub params: Params,
    /// Search spaces keyed by model name (`linear`, `lasso`, ...).
    #[serde(default)]
    pub hyperparams: BTreeMap<String, ModelGrid>,
}

impl Config {
    /// Resolved on-disk path of a tabular dataset, or `None` when the entry is null.
    pub fn input_path(&self, data_type: DataType) -> Option<PathBuf> {
        let file = self.path.input_data.file_paths.file_name(data_type)?;
        Some(self.path.input_data.directory_path.join(file))
    }

    /// Resolved on-disk paths of every configured shapefile.
    pub fn shapefile_paths(&self) -> BTreeMap<String, PathBuf> {
        let dir = &self.path.input_data.directory_path;
        self.path
            .input_data
            .file_paths
            .shapefiles
            .iter()
            .flatten()
            .map(|(name, file)| (name.clone(), dir.join(file)))
            .collect()
    }

    /// Resolved path of an auxiliary input that has no loader (raster, salt, RWI).
    pub fn auxiliary_path(&self, file: Option<&str>) -> Option<PathBuf> {
        file.map(|f| self.path.input_data.directory_path.join(f))
    }

    pub fn working_dir(&self) -> &Path {
        &self.path.working.directory_path
    }
}

// ---------------------------------------------------------------------------
// spark
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparkSettings {
    pub app_name: String,
    #[serde(default)]
    pub files: SparkFiles,
    #[serde(default)]
    pub driver: SparkDriver,
    #[serde(default = "default_spark_loglevel")]
    pub loglevel: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparkFiles {
    /// Upper bound on bytes packed into a single input partition.
    pub max_partition_bytes: u64,
}

impl Default for SparkFiles {
    fn default() -> Self {
        Self {
            max_partition_bytes: 128 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SparkDriver {
    /// JVM-style size string, e.g. `8g`.
    pub memory: String,
    pub max_result_size: String,
}

impl Default for SparkDriver {
    fn default() -> Self {
        Self {
            memory: "1g".to_string(),
            max_result_size: "1g".to_string(),
        }
    }
}

fn default_spark_loglevel() -> String {
    "WARN".to_string()
}

// ---------------------------------------------------------------------------
// path
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSettings {
    pub input_data: InputData,
    pub working: WorkingData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputData {
    pub directory_path: PathBuf,
    pub file_paths: FilePaths,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingData {
    pub directory_path: PathBuf,
}

/// Per-dataset file names, relative to `input_data.directory_path`.
///
/// Every key must be either a file name or an explicit `null`; unknown keys
/// are rejected so that stale configs fail loudly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilePaths {
    #[serde(default)]
    pub antennas: Option<String>,
    #[serde(default)]
    pub cdr: Option<String>,
    #[serde(default)]
    pub fairness: Option<String>,
    #[serde(default)]
    pub home_ground_truth: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub mobiledata: Option<String>,
    #[serde(default)]
    pub mobilemoney: Option<String>,
    #[serde(default)]
    pub population: Option<String>,
    #[serde(default)]
    pub poverty_scores: Option<String>,
    #[serde(default)]
    pub recharges: Option<String>,
    #[serde(default)]
    pub rwi: Option<String>,
    /// Shapefile name (e.g. `regions`) to GeoJSON file name.
    #[serde(default)]
    pub shapefiles: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub survey: Option<String>,
    #[serde(default)]
    pub targeting: Option<String>,
    #[serde(default)]
    pub user_consent: Option<String>,
    /// Salt used when anonymizing subscriber identifiers.
    #[serde(default)]
    pub salt: Option<String>,
    #[serde(default)]
    pub features: Option<String>,
}

impl FilePaths {
    /// File name of a tabular dataset. Shapefiles are a mapping, see `Config::shapefile_paths`.
    pub fn file_name(&self, data_type: DataType) -> Option<&str> {
        let entry = match data_type {
            DataType::Cdr => &self.cdr,
            DataType::Antennas => &self.antennas,
            DataType::Recharges => &self.recharges,
            DataType::MobileData => &self.mobiledata,
            DataType::MobileMoney => &self.mobilemoney,
            DataType::Shapefiles => return None,
            DataType::HomeGroundTruth => &self.home_ground_truth,
            DataType::PovertyScores => &self.poverty_scores,
            DataType::Features => &self.features,
            DataType::Labels => &self.labels,
            DataType::Survey => &self.survey,
            DataType::Targeting => &self.targeting,
            DataType::Fairness => &self.fairness,
            DataType::UserConsent => &self.user_consent,
        };
        entry.as_deref()
    }

    /// All single-file entries as `(key, value)` pairs, in file order.
    pub fn entries(&self) -> Vec<(&'static str, Option<&str>)> {
        vec![
            ("antennas", self.antennas.as_deref()),
            ("cdr", self.cdr.as_deref()),
            ("fairness", self.fairness.as_deref()),
            ("home_ground_truth", self.home_ground_truth.as_deref()),
            ("labels", self.labels.as_deref()),
            ("mobiledata", self.mobiledata.as_deref()),
            ("mobilemoney", self.mobilemoney.as_deref()),
            ("population", self.population.as_deref()),
            ("poverty_scores", self.poverty_scores.as_deref()),
            ("recharges", self.recharges.as_deref()),
            ("rwi", self.rwi.as_deref()),
            ("survey", self.survey.as_deref()),
            ("targeting", self.targeting.as_deref()),
            ("user_consent", self.user_consent.as_deref()),
            ("salt", self.salt.as_deref()),
            ("features", self.features.as_deref()),
        ]
    }
}

// ---------------------------------------------------------------------------
// col_names / col_types
// ---------------------------------------------------------------------------

/// Logical column name to physical (on-disk) column name.
pub type ColumnMapping = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnNames {
    #[serde(default)]
    pub cdr: Option<ColumnMapping>,
    #[serde(default)]
    pub antennas: Option<ColumnMapping>,
    #[serde(default)]
    pub recharges: Option<ColumnMapping>,
    #[serde(default)]
    pub mobiledata: Option<ColumnMapping>,
    #[serde(default)]
    pub mobilemoney: Option<ColumnMapping>,
    /// Antenna column used to place subscribers geographically (`antenna_id` or `tower_id`).
    #[serde(default)]
    pub geo: Option<String>,
    #[serde(default)]
    pub labels: Option<ColumnMapping>,
    #[serde(default)]
    pub fairness: Option<ColumnMapping>,
    #[serde(default)]
    pub targeting: Option<ColumnMapping>,
    #[serde(default)]
    pub survey: Option<ColumnMapping>,
    #[serde(default)]
    pub home_ground_truth: Option<ColumnMapping>,
    #[serde(default)]
    pub poverty_scores: Option<ColumnMapping>,
    #[serde(default)]
    pub features: Option<ColumnMapping>,
    #[serde(default)]
    pub user_consent: Option<ColumnMapping>,
}

impl ColumnNames {
    pub fn mapping(&self, data_type: DataType) -> Option<&ColumnMapping> {
        match data_type {
            DataType::Cdr => self.cdr.as_ref(),
            DataType::Antennas => self.antennas.as_ref(),
            DataType::Recharges => self.recharges.as_ref(),
            DataType::MobileData => self.mobiledata.as_ref(),
            DataType::MobileMoney => self.mobilemoney.as_ref(),
            DataType::Shapefiles => None,
            DataType::HomeGroundTruth => self.home_ground_truth.as_ref(),
            DataType::PovertyScores => self.poverty_scores.as_ref(),
            DataType::Features => self.features.as_ref(),
            DataType::Labels => self.labels.as_ref(),
            DataType::Survey => self.survey.as_ref(),
            DataType::Targeting => self.targeting.as_ref(),
            DataType::Fairness => self.fairness.as_ref(),
            DataType::UserConsent => self.user_consent.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnTypes {
    #[serde(default)]
    pub survey: SurveyColumnTypes,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyColumnTypes {
    #[serde(default)]
    pub continuous: Vec<String>,
    #[serde(default)]
    pub categorical: Vec<String>,
    #[serde(default)]
    pub binary: Vec<String>,
}

// ---------------------------------------------------------------------------
// params
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Params {
    pub cdr: CdrParams,
    #[serde(default)]
    pub home_location: HomeLocationParams,
    pub automl: AutomlParams,
    /// Whether subscribers are included unless they explicitly opt out.
    #[serde(default)]
    pub opt_in_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrParams {
    /// Two day-of-week numbers (1 = Sunday .. 7 = Saturday).
    pub weekend: Vec<i64>,
    /// Hour at which the "day" period starts.
    pub start_of_day: u32,
    /// Hour at which the "day" period ends.
    pub end_of_day: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomeLocationParams {
    /// Hours of the day used for home-location inference; `null` keeps all hours.
    #[serde(default)]
    pub filter_hours: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutomlParams {
    pub autogluon: AutogluonParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutogluonParams {
    /// Training time budget in seconds.
    pub time_limit: u64,
    pub eval_metric: String,
    #[serde(default = "default_label_column")]
    pub label: String,
    #[serde(default = "default_weight_column")]
    pub sample_weight: String,
}

fn default_label_column() -> String {
    "label".to_string()
}

fn default_weight_column() -> String {
    "weight".to_string()
}

// ---------------------------------------------------------------------------
// hyperparams
// ---------------------------------------------------------------------------

/// Search space for one model.
///
/// The preprocessing keys are shared by every model; everything else
/// (`model__alpha`, `model__max_depth`, ...) lands in `model`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelGrid {
    #[serde(rename = "dropmissing__threshold", default)]
    pub dropmissing_threshold: Option<Vec<f64>>,
    #[serde(rename = "droplowvariance__threshold", default)]
    pub droplowvariance_threshold: Option<Vec<f64>>,
    /// Lower/upper quantiles for winsorizing, one interval per candidate.
    #[serde(rename = "winsorizer__limits", default)]
    pub winsorizer_limits: Vec<(f64, f64)>,
    #[serde(flatten)]
    pub model: BTreeMap<String, Vec<GridValue>>,
}

/// One candidate value in a hyperparameter list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GridValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Interval(f64, f64),
}

impl std::fmt::Display for GridValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GridValue::Null => write!(f, "null"),
            GridValue::Bool(b) => write!(f, "{b}"),
            GridValue::Int(i) => write!(f, "{i}"),
            GridValue::Float(x) => write!(f, "{x}"),
            GridValue::Text(s) => write!(f, "{s}"),
            GridValue::Interval(lo, hi) => write!(f, "[{lo}, {hi}]"),
        }
    }
}
