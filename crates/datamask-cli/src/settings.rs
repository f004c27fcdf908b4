use std::path::{Path, PathBuf};

use datamask_engine::CoverageMode;
use serde::{Deserialize, Serialize};

use crate::CliError;

/// Settings file looked up in the working directory when `--config` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "datamask.toml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Coverage applied to every plan unless `--coverage` is given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageMode>,
    /// `EnvFilter` directive for stderr and file logs. `RUST_LOG` wins when set.
    pub log_level: String,
    /// JSON log file, appended to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            coverage: None,
            log_level: "warn".to_string(),
            log_file: None,
        }
    }
}

/// Load settings from `path`, or from `datamask.toml` when it exists.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, CliError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let fallback = PathBuf::from(DEFAULT_SETTINGS_FILE);
            if !fallback.exists() {
                return Ok(Settings::default());
            }
            fallback
        }
    };
    let content = std::fs::read_to_string(&path).map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_toml() {
        let settings = Settings {
            coverage: Some(CoverageMode::Include),
            log_level: "datamask_engine=debug,info".to_string(),
            log_file: Some(PathBuf::from("logs/datamask.jsonl")),
        };
        let encoded = toml::to_string_pretty(&settings).expect("encode");
        let decoded: Settings = toml::from_str(&encoded).expect("decode");
        assert_eq!(decoded, settings);
    }

    #[test]
    fn missing_keys_use_defaults() {
        let decoded: Settings = toml::from_str("coverage = \"exclude\"\n").expect("decode");
        assert_eq!(decoded.coverage, Some(CoverageMode::Exclude));
        assert_eq!(decoded.log_level, "warn");
        assert_eq!(decoded.log_file, None);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(toml::from_str::<Settings>("colour = true\n").is_err());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err = load_settings(Some(Path::new("does/not/exist.toml"))).expect_err("missing");
        assert!(matches!(err, CliError::Read { .. }));
    }
}
