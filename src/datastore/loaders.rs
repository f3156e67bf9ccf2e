//! Per-dataset loaders.
//!
//! Every loader is a pure function from a renamed `Table` to typed records,
//! so `load_data` can run them in parallel and tests can feed them tables
//! built in memory.

use std::collections::BTreeMap;

use rand::prelude::*;
use rand::rngs::StdRng;
use tracing::{debug, warn};

use crate::config::{Config, SurveyColumnTypes};
use crate::datastore::tables::{RANDOM_COLUMN, SurveyData, WeightedTable, ensure_weights};
use crate::domain::{
    AntennaRecord, Balances, CdrRecord, CdrTxnType, ConsentRecord, DataType, FeatureRow, Features, LabelRecord,
    MobileDataRecord, MobileMoneyRecord, MobileMoneyTxnType, Reach, RechargeRecord, Region, Table,
};
use crate::error::DataError;
use crate::io::geo::read_shapefile;
use crate::io::ingest::{RowReader, apply_column_mapping, parse_bool, read_table, require_columns};

/// Result of loading one dataset, ready to be installed in a store.
#[derive(Debug, Clone)]
pub enum Loaded {
    Cdr(Vec<CdrRecord>),
    Antennas(Vec<AntennaRecord>),
    Recharges(Vec<RechargeRecord>),
    MobileData(Vec<MobileDataRecord>),
    MobileMoney(Vec<MobileMoneyRecord>),
    Shapefiles(BTreeMap<String, Vec<Region>>),
    HomeGroundTruth(Table),
    PovertyScores(Table),
    Features(Features),
    Labels(Vec<LabelRecord>),
    Survey(SurveyData),
    Targeting(WeightedTable),
    Fairness(WeightedTable),
    UserConsent(Vec<ConsentRecord>),
}

impl Loaded {
    pub fn len(&self) -> usize {
        match self {
            Loaded::Cdr(v) => v.len(),
            Loaded::Antennas(v) => v.len(),
            Loaded::Recharges(v) => v.len(),
            Loaded::MobileData(v) => v.len(),
            Loaded::MobileMoney(v) => v.len(),
            Loaded::Shapefiles(m) => m.values().map(Vec::len).sum(),
            Loaded::HomeGroundTruth(t) | Loaded::PovertyScores(t) => t.len(),
            Loaded::Features(f) => f.rows.len(),
            Loaded::Labels(v) => v.len(),
            Loaded::Survey(s) => s.table.len(),
            Loaded::Targeting(w) | Loaded::Fairness(w) => w.table.len(),
            Loaded::UserConsent(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load one dataset from its configured file, or from `source` when given.
pub fn load_dataset(
    config: &Config,
    data_type: DataType,
    source: Option<Table>,
    seed: u64,
) -> Result<Loaded, DataError> {
    if data_type == DataType::Shapefiles {
        if source.is_some() {
            warn!("shapefiles are read from GeoJSON files; ignoring in-memory table");
        }
        return load_shapefiles(config);
    }

    let mut table = match source {
        Some(table) => table,
        None => {
            let path = config
                .input_path(data_type)
                .ok_or(DataError::NotConfigured(data_type))?;
            read_table(&path)?
        }
    };
    apply_column_mapping(&mut table, config.col_names.mapping(data_type));

    let loaded = parse_table(config, data_type, table, seed)?;
    debug!(dataset = %data_type, rows = loaded.len(), "parsed dataset");
    Ok(loaded)
}

/// Convert an already-renamed table into typed records.
pub fn parse_table(config: &Config, data_type: DataType, table: Table, seed: u64) -> Result<Loaded, DataError> {
    Ok(match data_type {
        DataType::Cdr => Loaded::Cdr(parse_cdr(&table)?),
        DataType::Antennas => Loaded::Antennas(parse_antennas(&table)?),
        DataType::Recharges => Loaded::Recharges(parse_recharges(&table)?),
        DataType::MobileData => Loaded::MobileData(parse_mobiledata(&table)?),
        DataType::MobileMoney => Loaded::MobileMoney(parse_mobilemoney(&table)?),
        DataType::Shapefiles => return load_shapefiles(config),
        DataType::HomeGroundTruth => Loaded::HomeGroundTruth(table),
        DataType::PovertyScores => Loaded::PovertyScores(table),
        DataType::Features => Loaded::Features(parse_features(&table)?),
        DataType::Labels => Loaded::Labels(parse_labels(&table)?),
        DataType::Survey => Loaded::Survey(parse_survey(table, &config.col_types.survey)?),
        DataType::Targeting => Loaded::Targeting(parse_weighted(DataType::Targeting, table, seed)?),
        DataType::Fairness => Loaded::Fairness(parse_weighted(DataType::Fairness, table, seed)?),
        DataType::UserConsent => Loaded::UserConsent(parse_consent(&table)?),
    })
}

pub fn parse_cdr(table: &Table) -> Result<Vec<CdrRecord>, DataError> {
    let dataset = DataType::Cdr;
    require_columns(
        dataset,
        table,
        &["txn_type", "caller_id", "recipient_id", "timestamp", "duration", "international"],
    )?;

    (0..table.len())
        .map(|row| -> Result<CdrRecord, DataError> {
            let r = RowReader::new(dataset, table, row);
            let raw_type = r.required("txn_type")?;
            let txn_type = CdrTxnType::parse(raw_type)
                .ok_or_else(|| r.invalid("txn_type", format!("'{raw_type}' must be 'text' or 'call'")))?;
            let raw_reach = r.required("international")?;
            let international = Reach::parse(raw_reach).ok_or_else(|| {
                r.invalid(
                    "international",
                    format!("'{raw_reach}' must be 'domestic', 'international' or 'other'"),
                )
            })?;
            let timestamp = r.timestamp("timestamp")?;

            Ok(CdrRecord {
                txn_type,
                caller_id: r.required("caller_id")?.to_string(),
                recipient_id: r.required("recipient_id")?.to_string(),
                timestamp,
                day: timestamp.date(),
                duration: r.optional_f64("duration")?,
                caller_antenna: r.optional("caller_antenna").map(str::to_string),
                recipient_antenna: r.optional("recipient_antenna").map(str::to_string),
                international,
            })
        })
        .collect()
}

pub fn parse_antennas(table: &Table) -> Result<Vec<AntennaRecord>, DataError> {
    let dataset = DataType::Antennas;
    require_columns(dataset, table, &["antenna_id", "latitude", "longitude"])?;

    (0..table.len())
        .map(|row| -> Result<AntennaRecord, DataError> {
            let r = RowReader::new(dataset, table, row);
            let latitude = r.required_f64("latitude")?;
            if !(-90.0..=90.0).contains(&latitude) {
                return Err(r.invalid("latitude", format!("{latitude} is outside [-90, 90]")));
            }
            let longitude = r.required_f64("longitude")?;
            if !(-180.0..=180.0).contains(&longitude) {
                return Err(r.invalid("longitude", format!("{longitude} is outside [-180, 180]")));
            }
            Ok(AntennaRecord {
                antenna_id: r.required("antenna_id")?.to_string(),
                tower_id: r.optional("tower_id").map(str::to_string),
                latitude,
                longitude,
            })
        })
        .collect()
}

pub fn parse_recharges(table: &Table) -> Result<Vec<RechargeRecord>, DataError> {
    let dataset = DataType::Recharges;
    require_columns(dataset, table, &["caller_id", "amount", "timestamp"])?;

    (0..table.len())
        .map(|row| -> Result<RechargeRecord, DataError> {
            let r = RowReader::new(dataset, table, row);
            let timestamp = r.timestamp("timestamp")?;
            Ok(RechargeRecord {
                caller_id: r.required("caller_id")?.to_string(),
                amount: r.required_f64("amount")?,
                timestamp,
                day: timestamp.date(),
            })
        })
        .collect()
}

pub fn parse_mobiledata(table: &Table) -> Result<Vec<MobileDataRecord>, DataError> {
    let dataset = DataType::MobileData;
    require_columns(dataset, table, &["caller_id", "volume", "timestamp"])?;

    (0..table.len())
        .map(|row| -> Result<MobileDataRecord, DataError> {
            let r = RowReader::new(dataset, table, row);
            let timestamp = r.timestamp("timestamp")?;
            Ok(MobileDataRecord {
                caller_id: r.required("caller_id")?.to_string(),
                volume: r.required_f64("volume")?,
                timestamp,
                day: timestamp.date(),
            })
        })
        .collect()
}

pub fn parse_mobilemoney(table: &Table) -> Result<Vec<MobileMoneyRecord>, DataError> {
    let dataset = DataType::MobileMoney;
    require_columns(
        dataset,
        table,
        &["txn_type", "caller_id", "recipient_id", "timestamp", "amount"],
    )?;

    (0..table.len())
        .map(|row| -> Result<MobileMoneyRecord, DataError> {
            let r = RowReader::new(dataset, table, row);
            let raw_type = r.required("txn_type")?;
            let txn_type = MobileMoneyTxnType::parse(raw_type).ok_or_else(|| {
                r.invalid(
                    "txn_type",
                    format!("'{raw_type}' must be one of cashin, cashout, p2p, billpay, other"),
                )
            })?;
            let timestamp = r.timestamp("timestamp")?;
            Ok(MobileMoneyRecord {
                txn_type,
                caller_id: r.required("caller_id")?.to_string(),
                recipient_id: r.optional("recipient_id").map(str::to_string),
                timestamp,
                day: timestamp.date(),
                amount: r.required_f64("amount")?,
                balances: Balances {
                    sender_balance_before: r.optional_f64("sender_balance_before")?,
                    sender_balance_after: r.optional_f64("sender_balance_after")?,
                    recipient_balance_before: r.optional_f64("recipient_balance_before")?,
                    recipient_balance_after: r.optional_f64("recipient_balance_after")?,
                },
            })
        })
        .collect()
}

pub fn parse_labels(table: &Table) -> Result<Vec<LabelRecord>, DataError> {
    let dataset = DataType::Labels;
    require_columns(dataset, table, &["name", "label"])?;

    (0..table.len())
        .map(|row| -> Result<LabelRecord, DataError> {
            let r = RowReader::new(dataset, table, row);
            let weight = r.optional_f64("weight")?.unwrap_or(1.0);
            if weight <= 0.0 {
                return Err(r.invalid("weight", format!("weight {weight} must be > 0")));
            }
            Ok(LabelRecord {
                name: r.required("name")?.to_string(),
                label: r.required_f64("label")?,
                weight,
            })
        })
        .collect()
}

pub fn parse_features(table: &Table) -> Result<Features, DataError> {
    let dataset = DataType::Features;
    require_columns(dataset, table, &["name"])?;

    let columns: Vec<String> = table.columns.iter().filter(|c| *c != "name").cloned().collect();
    let rows = (0..table.len())
        .map(|row| -> Result<FeatureRow, DataError> {
            let r = RowReader::new(dataset, table, row);
            let values = columns
                .iter()
                .map(|c| r.optional_f64(c))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FeatureRow {
                name: r.required("name")?.to_string(),
                values,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Features { columns, rows })
}

pub fn parse_survey(mut table: Table, types: &SurveyColumnTypes) -> Result<SurveyData, DataError> {
    let dataset = DataType::Survey;
    require_columns(dataset, &table, &["unique_id"])?;
    ensure_weights(dataset, &mut table)?;

    let keep = |cols: &[String]| -> Vec<String> {
        cols.iter()
            .filter(|c| {
                let present = table.has_column(c);
                if !present {
                    warn!(column = %c, "survey column listed in col_types is absent from the data");
                }
                present
            })
            .cloned()
            .collect()
    };
    let types = SurveyColumnTypes {
        continuous: keep(&types.continuous[..]),
        categorical: keep(&types.categorical[..]),
        binary: keep(&types.binary[..]),
    };

    Ok(SurveyData { table, types })
}

pub fn parse_weighted(dataset: DataType, mut table: Table, seed: u64) -> Result<WeightedTable, DataError> {
    ensure_weights(dataset, &mut table)?;

    let mut rng = StdRng::seed_from_u64(seed);
    let draws: Vec<String> = (0..table.len()).map(|_| rng.r#gen::<f64>().to_string()).collect();
    if table.has_column(RANDOM_COLUMN) {
        table.set_column(RANDOM_COLUMN, |row| draws[row].clone());
    } else {
        table.add_column(RANDOM_COLUMN, |row| draws[row].clone());
    }

    Ok(WeightedTable { table })
}

pub fn parse_consent(table: &Table) -> Result<Vec<ConsentRecord>, DataError> {
    let dataset = DataType::UserConsent;
    require_columns(dataset, table, &["user_id"])?;

    (0..table.len())
        .map(|row| -> Result<ConsentRecord, DataError> {
            let r = RowReader::new(dataset, table, row);
            let include = match r.optional("include") {
                None => None,
                Some(raw) => Some(
                    parse_bool(raw).ok_or_else(|| r.invalid("include", format!("'{raw}' is not a boolean")))?,
                ),
            };
            Ok(ConsentRecord {
                user_id: r.required("user_id")?.to_string(),
                include,
            })
        })
        .collect()
}

pub fn load_shapefiles(config: &Config) -> Result<Loaded, DataError> {
    let paths = config.shapefile_paths();
    if paths.is_empty() {
        return Err(DataError::NotConfigured(DataType::Shapefiles));
    }

    let mut shapefiles = BTreeMap::new();
    for (name, path) in paths {
        let regions = read_shapefile(&path)?;
        debug!(shapefile = %name, regions = regions.len(), "read shapefile");
        shapefiles.insert(name, regions);
    }
    Ok(Loaded::Shapefiles(shapefiles))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cdr_table(txn_type: &str, international: &str) -> Table {
        Table::new(["txn_type", "caller_id", "recipient_id", "timestamp", "duration", "international"])
            .with_row([txn_type, "A", "B", "2021-01-01", "60", international])
    }

    #[test]
    fn cdr_minimal_row_gets_a_day() {
        let records = parse_cdr(&cdr_table("text", "domestic")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].day, chrono::NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
        assert_eq!(records[0].duration, Some(60.0));
        assert_eq!(records[0].caller_antenna, None);
    }

    #[test]
    fn cdr_rejects_unknown_txn_type() {
        let err = parse_cdr(&cdr_table("text_message", "domestic")).unwrap_err();
        match err {
            DataError::InvalidValue { column, .. } => assert_eq!(column, "txn_type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cdr_rejects_missing_columns() {
        let table = Table::new(["txn_type", "caller_id", "recipient_id", "timestamp"])
            .with_row(["text", "A", "B", "2021-01-01"]);
        let err = parse_cdr(&table).unwrap_err();
        match err {
            DataError::MissingColumns { columns, .. } => assert_eq!(columns, vec!["duration", "international"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cdr_rejects_unknown_reach() {
        let err = parse_cdr(&cdr_table("call", "abroad")).unwrap_err();
        assert!(matches!(err, DataError::InvalidValue { .. }));
    }

    #[test]
    fn antennas_require_longitude() {
        let table = Table::new(["antenna_id", "latitude"]).with_row(["1", "10"]);
        assert!(matches!(parse_antennas(&table), Err(DataError::MissingColumns { .. })));

        let table = Table::new(["antenna_id", "latitude", "longitude"]).with_row(["1", "10", "25.3"]);
        let antennas = parse_antennas(&table).unwrap();
        assert!((antennas[0].latitude - 10.0).abs() < 1e-12);
    }

    #[test]
    fn recharges_and_mobiledata_require_all_columns() {
        let table = Table::new(["caller_id", "amount"]).with_row(["A", "100"]);
        assert!(matches!(parse_recharges(&table), Err(DataError::MissingColumns { .. })));

        let table = Table::new(["caller_id", "timestamp"]).with_row(["A", "2020-01-01"]);
        assert!(matches!(parse_mobiledata(&table), Err(DataError::MissingColumns { .. })));

        let table = Table::new(["caller_id", "volume", "timestamp"]).with_row(["A", "100", "2020-01-01"]);
        assert_eq!(parse_mobiledata(&table).unwrap().len(), 1);
    }

    #[test]
    fn mobilemoney_validates_txn_type() {
        let columns = ["txn_type", "caller_id", "recipient_id", "timestamp", "amount"];
        let ok = Table::new(columns).with_row(["cashin", "A", "", "2021-01-01", "10"]);
        let records = parse_mobilemoney(&ok).unwrap();
        assert_eq!(records[0].recipient_id, None);
        assert_eq!(records[0].balances, Balances::default());

        let bad = Table::new(columns).with_row(["cash-in", "A", "B", "2021-01-01", "10"]);
        assert!(matches!(parse_mobilemoney(&bad), Err(DataError::InvalidValue { .. })));

        let missing = Table::new(["txn_type", "caller_id", "recipient_id", "timestamp"]);
        assert!(matches!(parse_mobilemoney(&missing), Err(DataError::MissingColumns { .. })));
    }

    #[test]
    fn labels_need_name_and_label() {
        assert!(parse_labels(&Table::new(["name"]).with_row(["A"])).is_err());
        assert!(parse_labels(&Table::new(["label"]).with_row(["50"])).is_err());

        let labels = parse_labels(&Table::new(["name", "label"]).with_row(["A", "50"])).unwrap();
        assert_eq!(labels[0].weight, 1.0);
    }

    #[test]
    fn features_need_a_name_column() {
        let table = Table::new(["user_id", "feat0"]).with_row(["X", "50"]);
        assert!(matches!(parse_features(&table), Err(DataError::MissingColumns { .. })));

        let table = Table::new(["name", "feat0", "feat1"]).with_row(["X", "50", ""]);
        let features = parse_features(&table).unwrap();
        assert_eq!(features.columns, vec!["feat0", "feat1"]);
        assert_eq!(features.rows[0].values, vec![Some(50.0), None]);
    }

    #[test]
    fn survey_gains_weight_column() {
        let table = Table::new(["unique_id", "bin0", "con0"]).with_row(["XYZ", "0", "25"]);
        let types = SurveyColumnTypes {
            continuous: vec!["con0".to_string(), "con9".to_string()],
            categorical: vec![],
            binary: vec!["bin0".to_string()],
        };
        let survey = parse_survey(table, &types).unwrap();
        assert_eq!(survey.table.columns.len(), 4);
        assert!(survey.table.has_column("weight"));
        assert_eq!(survey.types.continuous, vec!["con0"]);
    }

    #[test]
    fn weighted_tables_get_reproducible_random_column() {
        let table = Table::new(["name", "weight"]).with_row(["A", "2"]).with_row(["B", "1"]);
        let first = parse_weighted(DataType::Targeting, table.clone(), 7).unwrap();
        let second = parse_weighted(DataType::Targeting, table, 7).unwrap();
        assert!(first.table.has_column(RANDOM_COLUMN));
        assert_eq!(first, second);

        let draw: f64 = first.table.cell(0, RANDOM_COLUMN).unwrap().parse().unwrap();
        assert!((0.0..1.0).contains(&draw));
    }

    #[test]
    fn consent_parses_optional_include() {
        let table = Table::new(["user_id", "include"])
            .with_row(["A", "true"])
            .with_row(["B", ""])
            .with_row(["C", "no"]);
        let consent = parse_consent(&table).unwrap();
        assert_eq!(consent[0].include, Some(true));
        assert_eq!(consent[1].include, None);
        assert_eq!(consent[2].include, Some(false));
    }
}
