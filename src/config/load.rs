//! Reading configuration files from disk.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::types::Config;
use crate::config::validate::validate;
use crate::error::ConfigError;

/// Environment variable that selects the config file when no explicit path is given.
pub const CONFIG_ENV_VAR: &str = "CIDER_CONFIG";

/// Fallback location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "configs/config.yml";

/// Pick the config file to use.
///
/// Precedence: explicit path > `CIDER_CONFIG` (including `.env`) > `configs/config.yml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    dotenvy::dotenv().ok();
    match std::env::var(CONFIG_ENV_VAR) {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value.trim()),
        _ => PathBuf::from(DEFAULT_CONFIG_PATH),
    }
}

/// Parse a config from YAML text.
pub fn from_yaml_str(text: &str) -> Result<Config, serde_yaml::Error> {
    serde_yaml::from_str(text)
}

/// Read and parse a config file without validating it.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if path.as_os_str().is_empty() || !path.is_file() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config = from_yaml_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    debug!(path = %path.display(), models = config.hyperparams.len(), "parsed config");
    Ok(config)
}

/// Read, parse and validate a config file.
pub fn load_validated(path: &Path) -> Result<Config, ConfigError> {
    let config = load(path)?;
    validate(&config)?;
    info!(path = %path.display(), app = %config.spark.app_name, "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
spark:
  app_name: cider
path:
  input_data:
    directory_path: data
    file_paths:
      cdr: cdr.csv
      labels: null
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
"#;

    #[test]
    fn shipped_config_loads_and_validates() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("configs/config.yml");
        let config = load_validated(&path).unwrap();
        assert_eq!(config.spark.app_name, "cider");
        assert!(config.hyperparams.contains_key("gradientboosting"));
    }

    #[test]
    fn missing_paths_are_not_found() {
        for raw in ["", "\\malformed#$directory!!!(38"] {
            let err = load(Path::new(raw)).unwrap_err();
            assert!(matches!(err, ConfigError::NotFound { .. }), "{raw}: {err}");
        }
    }

    #[test]
    fn directory_is_not_a_config_file() {
        let dir = TempDir::new().unwrap();
        let err = load(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn reload_yields_identical_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, MINIMAL).unwrap();

        let first = load(&path).unwrap();
        let second = load(&path).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn null_file_path_is_none() {
        let config = from_yaml_str(MINIMAL).unwrap();
        assert_eq!(config.path.input_data.file_paths.cdr.as_deref(), Some("cdr.csv"));
        assert!(config.path.input_data.file_paths.labels.is_none());
        assert_eq!(
            config.input_path(crate::domain::DataType::Cdr),
            Some(PathBuf::from("data/cdr.csv"))
        );
    }

    #[test]
    fn non_string_file_path_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, MINIMAL.replace("cdr: cdr.csv", "cdr: [1, 2]")).unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err}");
    }

    #[test]
    fn unknown_file_path_key_is_rejected() {
        let text = MINIMAL.replace("labels: null", "labelz: labels.csv");
        assert!(from_yaml_str(&text).is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("custom.yml")));
        assert_eq!(path, PathBuf::from("custom.yml"));
    }
}
