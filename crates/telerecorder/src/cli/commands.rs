//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::config::RecorderConfig;

/// Fields command arguments.
#[derive(Debug, Args)]
pub struct FieldsCommand {
    /// Catalog to read instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Select command arguments.
#[derive(Debug, Args)]
pub struct SelectCommand {
    /// Field names, in the order the recorder should write them
    #[arg(required = true)]
    pub fields: Vec<String>,

    /// Catalog to read instead of the configured one
    #[arg(long, value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Where to write the selection document
    #[arg(short, long, value_name = "FILE")]
    pub out: Option<PathBuf>,
}

/// Record command arguments.
///
/// Unset parameters fall back to the `[recorder]` configuration.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Field to record (repeatable)
    #[arg(short, long = "field", value_name = "NAME", required_unless_present = "all")]
    pub fields: Vec<String>,

    /// Record every field in the catalog
    #[arg(long, conflicts_with = "fields")]
    pub all: bool,

    /// Robot controller host
    #[arg(long)]
    pub host: Option<String>,

    /// Robot controller port
    #[arg(long)]
    pub port: Option<u16>,

    /// Number of samples (0 records until stopped)
    #[arg(long)]
    pub samples: Option<u64>,

    /// Sampling frequency in Hz
    #[arg(long)]
    pub frequency: Option<f64>,

    /// Data file the recorder writes
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl RecordCommand {
    /// Apply the command-line overrides on top of configured defaults.
    #[must_use]
    pub fn apply(&self, defaults: &RecorderConfig) -> RecorderConfig {
        let mut params = defaults.clone();
        if let Some(host) = &self.host {
            params.host.clone_from(host);
        }
        if let Some(port) = self.port {
            params.port = port;
        }
        if let Some(samples) = self.samples {
            params.samples = samples;
        }
        if let Some(frequency) = self.frequency {
            params.frequency_hz = frequency;
        }
        if let Some(output) = &self.output {
            params.output.clone_from(output);
        }
        params
    }
}

/// Fetch command arguments.
#[derive(Debug, Args)]
pub struct FetchCommand {
    /// Data file to copy instead of the configured one
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Destination; asks on stdin when omitted
    #[arg(short, long, value_name = "DEST")]
    pub to: Option<PathBuf>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RecordCommand {
        RecordCommand {
            fields: vec!["timestamp".to_string()],
            all: false,
            host: None,
            port: None,
            samples: None,
            frequency: None,
            output: None,
        }
    }

    #[test]
    fn test_apply_without_overrides() {
        let defaults = RecorderConfig::default();
        assert_eq!(record().apply(&defaults), defaults);
    }

    #[test]
    fn test_apply_overrides() {
        let cmd = RecordCommand {
            host: Some("robot.local".to_string()),
            port: Some(30002),
            samples: Some(500),
            frequency: Some(250.0),
            output: Some(PathBuf::from("run.csv")),
            ..record()
        };
        let params = cmd.apply(&RecorderConfig::default());

        assert_eq!(params.host, "robot.local");
        assert_eq!(params.port, 30002);
        assert_eq!(params.samples, 500);
        assert!((params.frequency_hz - 250.0).abs() < f64::EPSILON);
        assert_eq!(params.output, PathBuf::from("run.csv"));
        assert_eq!(params.program, "python");
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
