//! Configuration management for telerecorder.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "telerecorder";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "TELEREC_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `TELEREC_`, `__` between sections)
/// 2. TOML config file at `~/.config/telerecorder/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Field catalog configuration.
    pub catalog: CatalogConfig,
    /// Recorder invocation and default parameters.
    pub recorder: RecorderConfig,
    /// Data file retrieval configuration.
    pub retrieval: RetrievalConfig,
}

/// Field catalog configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Path to the catalog of available fields.
    pub path: PathBuf,
    /// Key of the recipe element holding the fields.
    pub recipe_key: String,
    /// Where the selection document is written before each recording.
    pub selection_path: PathBuf,
}

/// Recorder invocation and the default recording parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Program to execute (e.g. the Python interpreter).
    pub program: String,
    /// Arguments placed before the recording flags (e.g. the script path).
    pub args: Vec<String>,
    /// Robot controller host.
    pub host: String,
    /// Robot controller port.
    pub port: u16,
    /// Number of samples to record. 0 records until stopped.
    pub samples: u64,
    /// Sampling frequency in Hz.
    pub frequency_hz: f64,
    /// Data file written by the recorder.
    pub output: PathBuf,
    /// How long a graceful stop waits before killing the recorder.
    pub stop_grace_ms: u64,
    /// Interval between liveness checks while a recording runs.
    pub poll_interval_ms: u64,
}

/// Data file retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Extension appended to a save destination that has none.
    pub default_extension: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("record_configuration.xml"),
            recipe_key: "out".to_string(),
            selection_path: PathBuf::from("selected_fields_config.xml"),
        }
    }
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["record.py".to_string()],
            host: "192.168.56.101".to_string(),
            port: 30004,
            samples: 0,
            frequency_hz: 125.0,
            output: PathBuf::from("robot_data.csv"),
            stop_grace_ms: 2_000,
            poll_interval_ms: 500,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_extension: "csv".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file at `config_path`, or the default path (if it exists)
    /// 3. Environment variables (prefixed with `TELEREC_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.recipe_key.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "catalog.recipe_key must not be empty".to_string(),
            });
        }

        if self.recorder.program.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "recorder.program must not be empty".to_string(),
            });
        }

        if self.recorder.port == 0 {
            return Err(Error::ConfigValidation {
                message: "recorder.port must be greater than 0".to_string(),
            });
        }

        if !(self.recorder.frequency_hz.is_finite() && self.recorder.frequency_hz > 0.0) {
            return Err(Error::ConfigValidation {
                message: format!(
                    "recorder.frequency_hz must be a positive number (got {})",
                    self.recorder.frequency_hz
                ),
            });
        }

        if self.recorder.poll_interval_ms == 0 {
            return Err(Error::ConfigValidation {
                message: "recorder.poll_interval_ms must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// Get the graceful stop window as a Duration.
    #[must_use]
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.recorder.stop_grace_ms)
    }

    /// Get the liveness poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.recorder.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_config() {
        let catalog = CatalogConfig::default();

        assert_eq!(catalog.path, PathBuf::from("record_configuration.xml"));
        assert_eq!(catalog.recipe_key, "out");
        assert_eq!(
            catalog.selection_path,
            PathBuf::from("selected_fields_config.xml")
        );
    }

    #[test]
    fn test_default_recorder_config() {
        let recorder = RecorderConfig::default();

        assert_eq!(recorder.program, "python");
        assert_eq!(recorder.args, vec!["record.py".to_string()]);
        assert_eq!(recorder.host, "192.168.56.101");
        assert_eq!(recorder.port, 30004);
        assert_eq!(recorder.samples, 0);
        assert!((recorder.frequency_hz - 125.0).abs() < f64::EPSILON);
        assert_eq!(recorder.output, PathBuf::from("robot_data.csv"));
    }

    #[test]
    fn test_default_retrieval_config() {
        assert_eq!(RetrievalConfig::default().default_extension, "csv");
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_program() {
        let mut config = Config::default();
        config.recorder.program = "  ".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("recorder.program"));
    }

    #[test]
    fn test_validate_empty_recipe_key() {
        let mut config = Config::default();
        config.catalog.recipe_key = String::new();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("recipe_key"));
    }

    #[test]
    fn test_validate_zero_port() {
        let mut config = Config::default();
        config.recorder.port = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("recorder.port"));
    }

    #[test]
    fn test_validate_bad_frequency() {
        let mut config = Config::default();
        config.recorder.frequency_hz = 0.0;
        assert!(config.validate().is_err());

        config.recorder.frequency_hz = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_poll_interval() {
        let mut config = Config::default();
        config.recorder.poll_interval_ms = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("poll_interval_ms"));
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.stop_grace(), Duration::from_secs(2));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("telerecorder"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_toml_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[recorder]
host = "10.0.0.5"
frequency_hz = 500.0
args = ["/opt/rtde/record.py", "--verbose"]

[catalog]
selection_path = "/tmp/selection.xml"
"#,
        )
        .unwrap();

        let config = Config::load_from(Some(path)).unwrap();
        assert_eq!(config.recorder.host, "10.0.0.5");
        assert!((config.recorder.frequency_hz - 500.0).abs() < f64::EPSILON);
        assert_eq!(config.recorder.args.len(), 2);
        assert_eq!(
            config.catalog.selection_path,
            PathBuf::from("/tmp/selection.xml")
        );
        // Untouched values keep their defaults
        assert_eq!(config.recorder.port, 30004);
    }

    #[test]
    fn test_load_rejects_invalid_toml_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[recorder]\nport = 0\n").unwrap();

        let err = Config::load_from(Some(path)).unwrap_err();
        assert!(matches!(err, Error::ConfigValidation { .. }));
    }

    #[test]
    fn test_recorder_config_serialize() {
        let recorder = RecorderConfig::default();
        let json = serde_json::to_string(&recorder).unwrap();
        assert!(json.contains("frequency_hz"));
        assert!(json.contains("stop_grace_ms"));
    }

    #[test]
    fn test_recorder_config_deserialize() {
        let json = r#"{"host": "robot.local", "samples": 1000}"#;
        let recorder: RecorderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(recorder.host, "robot.local");
        assert_eq!(recorder.samples, 1000);
        assert_eq!(recorder.port, 30004);
    }
}
