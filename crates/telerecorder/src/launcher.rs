//! Building and spawning the external recorder command.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::config::RecorderConfig;
use crate::error::{Error, Result};
use crate::selection::SelectionDocument;

/// Everything needed to start one recording.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingRequest {
    /// Robot controller host.
    pub host: String,
    /// Robot controller port.
    pub port: u16,
    /// Number of samples to record (0 = until stopped).
    pub samples: u64,
    /// Sampling frequency in Hz.
    pub frequency_hz: f64,
    /// Data file the recorder writes.
    pub output_path: PathBuf,
    /// Fields to record.
    pub selection: SelectionDocument,
}

impl RecordingRequest {
    /// Create a request using the configured default parameters.
    #[must_use]
    pub fn from_defaults(defaults: &RecorderConfig, selection: SelectionDocument) -> Self {
        Self {
            host: defaults.host.clone(),
            port: defaults.port,
            samples: defaults.samples,
            frequency_hz: defaults.frequency_hz,
            output_path: defaults.output.clone(),
            selection,
        }
    }

    /// Check that the parameters can be handed to the recorder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] naming the first unusable parameter.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::invalid_request("host is empty"));
        }
        if self.port == 0 {
            return Err(Error::invalid_request("port must be greater than 0"));
        }
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            return Err(Error::invalid_request(format!(
                "frequency must be a positive number (got {})",
                self.frequency_hz
            )));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(Error::invalid_request("output path is empty"));
        }
        Ok(())
    }
}

/// Knows how to invoke the recorder program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Launcher {
    program: String,
    leading_args: Vec<String>,
}

impl Launcher {
    /// Create a launcher for `program`, passing `leading_args` before the
    /// recording flags.
    #[must_use]
    pub fn new(program: impl Into<String>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// Create a launcher from configuration.
    #[must_use]
    pub fn from_config(config: &RecorderConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    /// The program that will be executed.
    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for one recording, `config_path` being the selection
    /// document the recorder should read.
    #[must_use]
    pub fn args(&self, request: &RecordingRequest, config_path: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.leading_args.iter().map(OsString::from).collect();
        let flags: [OsString; 12] = [
            "--host".into(),
            request.host.clone().into(),
            "--port".into(),
            request.port.to_string().into(),
            "--samples".into(),
            request.samples.to_string().into(),
            "--frequency".into(),
            request.frequency_hz.to_string().into(),
            "--config".into(),
            config_path.as_os_str().to_owned(),
            "--output".into(),
            request.output_path.as_os_str().to_owned(),
        ];
        args.extend(flags);
        args
    }

    /// Start the recorder without waiting for it.
    ///
    /// The recorder's stdout and stderr go straight to ours.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if the program cannot be spawned.
    pub fn spawn(&self, request: &RecordingRequest, config_path: &Path) -> Result<Child> {
        let args = self.args(request, config_path);
        debug!("Launching {} {:?}", self.program, args);

        let child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| Error::Launch {
                program: self.program.clone(),
                source,
            })?;

        info!(
            pid = child.id(),
            host = %request.host,
            output = %request.output_path.display(),
            "Recorder started"
        );
        Ok(child)
    }
}
