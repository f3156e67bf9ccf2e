//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - held in the data store after loading
//! - exported to CSV/JSON
//! - compared in tests

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Every dataset the data store knows how to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Cdr,
    Antennas,
    Recharges,
    #[serde(rename = "mobiledata")]
    #[value(name = "mobiledata")]
    MobileData,
    #[serde(rename = "mobilemoney")]
    #[value(name = "mobilemoney")]
    MobileMoney,
    Shapefiles,
    #[value(name = "home_ground_truth")]
    HomeGroundTruth,
    #[value(name = "poverty_scores")]
    PovertyScores,
    Features,
    Labels,
    Survey,
    Targeting,
    Fairness,
    #[value(name = "user_consent")]
    UserConsent,
}

impl DataType {
    /// Datasets a caller can request through `load_data`.
    ///
    /// `UserConsent` is loaded implicitly by the opt-in store.
    pub const LOADABLE: [DataType; 13] = [
        DataType::Cdr,
        DataType::Antennas,
        DataType::Recharges,
        DataType::MobileData,
        DataType::MobileMoney,
        DataType::Shapefiles,
        DataType::HomeGroundTruth,
        DataType::PovertyScores,
        DataType::Features,
        DataType::Labels,
        DataType::Survey,
        DataType::Targeting,
        DataType::Fairness,
    ];

    /// Key used in the config file for this dataset.
    pub fn key(self) -> &'static str {
        match self {
            DataType::Cdr => "cdr",
            DataType::Antennas => "antennas",
            DataType::Recharges => "recharges",
            DataType::MobileData => "mobiledata",
            DataType::MobileMoney => "mobilemoney",
            DataType::Shapefiles => "shapefiles",
            DataType::HomeGroundTruth => "home_ground_truth",
            DataType::PovertyScores => "poverty_scores",
            DataType::Features => "features",
            DataType::Labels => "labels",
            DataType::Survey => "survey",
            DataType::Targeting => "targeting",
            DataType::Fairness => "fairness",
            DataType::UserConsent => "user_consent",
        }
    }

    /// Whether rows carry a `day` and take part in date filtering and deduplication.
    pub fn is_event_log(self) -> bool {
        matches!(
            self,
            DataType::Cdr | DataType::Recharges | DataType::MobileData | DataType::MobileMoney
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A raw, untyped table: a header row plus string cells.
///
/// Files are read into a `Table` first; loaders then rename columns and
/// convert rows into typed records. Callers can also hand a `Table` to a
/// loader directly instead of reading from disk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builder-style row append; short rows are padded with empty cells.
    pub fn with_row<S: Into<String>>(mut self, cells: impl IntoIterator<Item = S>) -> Self {
        self.push_row(cells);
        self
    }

    pub fn push_row<S: Into<String>>(&mut self, cells: impl IntoIterator<Item = S>) {
        let mut row: Vec<String> = cells.into_iter().map(Into::into).collect();
        row.resize(self.columns.len(), String::new());
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Cell value by row and column name; empty cells read as `None`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows
            .get(row)?
            .get(idx)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    /// Append a column, filling each row from `value(row_index)`.
    pub fn add_column(&mut self, name: impl Into<String>, mut value: impl FnMut(usize) -> String) {
        self.columns.push(name.into());
        for (idx, row) in self.rows.iter_mut().enumerate() {
            row.push(value(idx));
        }
    }

    /// Overwrite every cell of an existing column.
    pub fn set_column(&mut self, name: &str, mut value: impl FnMut(usize) -> String) {
        if let Some(col) = self.column_index(name) {
            for (idx, row) in self.rows.iter_mut().enumerate() {
                row[col] = value(idx);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Event logs (have a `day`)
// ---------------------------------------------------------------------------

/// Shared behaviour of time-stamped subscriber records.
pub trait EventRecord: Serialize {
    fn day(&self) -> NaiveDate;

    /// Subscriber identifiers appearing on this record.
    fn subscribers(&self) -> Vec<&str>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CdrTxnType {
    Text,
    Call,
}

impl CdrTxnType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "call" => Some(Self::Call),
            _ => None,
        }
    }
}

/// Whether a call/text stayed within the country.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reach {
    Domestic,
    International,
    Other,
}

impl Reach {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "domestic" => Some(Self::Domestic),
            "international" => Some(Self::International),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// One call detail record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CdrRecord {
    pub txn_type: CdrTxnType,
    pub caller_id: String,
    pub recipient_id: String,
    pub timestamp: NaiveDateTime,
    pub day: NaiveDate,
    /// Seconds; texts usually have none.
    pub duration: Option<f64>,
    pub caller_antenna: Option<String>,
    pub recipient_antenna: Option<String>,
    pub international: Reach,
}

impl EventRecord for CdrRecord {
    fn day(&self) -> NaiveDate {
        self.day
    }

    fn subscribers(&self) -> Vec<&str> {
        vec![self.caller_id.as_str(), self.recipient_id.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RechargeRecord {
    pub caller_id: String,
    pub amount: f64,
    pub timestamp: NaiveDateTime,
    pub day: NaiveDate,
}

impl EventRecord for RechargeRecord {
    fn day(&self) -> NaiveDate {
        self.day
    }

    fn subscribers(&self) -> Vec<&str> {
        vec![self.caller_id.as_str()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileDataRecord {
    pub caller_id: String,
    /// Data volume in the operator's unit (usually MB).
    pub volume: f64,
    pub timestamp: NaiveDateTime,
    pub day: NaiveDate,
}

impl EventRecord for MobileDataRecord {
    fn day(&self) -> NaiveDate {
        self.day
    }

    fn subscribers(&self) -> Vec<&str> {
        vec![self.caller_id.as_str()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileMoneyTxnType {
    Cashin,
    Cashout,
    P2p,
    Billpay,
    Other,
}

impl MobileMoneyTxnType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "cashin" => Some(Self::Cashin),
            "cashout" => Some(Self::Cashout),
            "p2p" => Some(Self::P2p),
            "billpay" => Some(Self::Billpay),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Optional balance snapshots around a mobile-money transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances {
    pub sender_balance_before: Option<f64>,
    pub sender_balance_after: Option<f64>,
    pub recipient_balance_before: Option<f64>,
    pub recipient_balance_after: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MobileMoneyRecord {
    pub txn_type: MobileMoneyTxnType,
    pub caller_id: String,
    /// Absent for cash-in/cash-out at an agent.
    pub recipient_id: Option<String>,
    pub timestamp: NaiveDateTime,
    pub day: NaiveDate,
    pub amount: f64,
    pub balances: Balances,
}

impl EventRecord for MobileMoneyRecord {
    fn day(&self) -> NaiveDate {
        self.day
    }

    fn subscribers(&self) -> Vec<&str> {
        let mut ids = vec![self.caller_id.as_str()];
        if let Some(recipient) = &self.recipient_id {
            ids.push(recipient.as_str());
        }
        ids
    }
}

// ---------------------------------------------------------------------------
// Reference and training data
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AntennaRecord {
    pub antenna_id: String,
    pub tower_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

/// Ground-truth poverty label for one subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelRecord {
    pub name: String,
    pub label: f64,
    /// Sample weight; defaults to 1 and is always positive.
    pub weight: f64,
}

/// Featurized subscribers: one numeric vector per `name`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Features {
    /// Feature column names, excluding `name`.
    pub columns: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub name: String,
    /// Aligned with `Features::columns`; missing cells are `None`.
    pub values: Vec<Option<f64>>,
}

/// Consent decision for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsentRecord {
    pub user_id: String,
    /// `None` means no explicit decision; the configured default applies.
    pub include: Option<bool>,
}

/// One administrative area from a GeoJSON shapefile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub region: String,
    /// GeoJSON geometry object, kept as-is.
    pub geometry: serde_json::Value,
}

/// Feature matrix and targets produced by joining features with labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedData {
    pub names: Vec<String>,
    pub feature_columns: Vec<String>,
    /// One row per merged subscriber, aligned with `feature_columns`.
    pub x: Vec<Vec<Option<f64>>>,
    pub y: Vec<f64>,
    pub weights: Vec<f64>,
}

impl MergedData {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
