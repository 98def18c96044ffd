//! Error types for telerecorder.
//!
//! This module defines all error types used throughout the telerecorder crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for telerecorder operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Catalog Errors ===
    /// The field catalog could not be read from disk.
    #[error("failed to read field catalog at {path}: {source}")]
    CatalogRead {
        /// Path to the catalog file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The field catalog is not a well-formed document.
    #[error("malformed field catalog {path}: {message}")]
    CatalogParse {
        /// Path (or label) of the catalog document.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    /// The field catalog has no recipe with the expected key.
    #[error("field catalog {path} has no recipe with key '{key}'")]
    CatalogMissingRecipe {
        /// Path (or label) of the catalog document.
        path: PathBuf,
        /// The recipe key that was looked for.
        key: String,
    },

    /// The selection document could not be written.
    #[error("failed to write selection document {path}: {source}")]
    CatalogWrite {
        /// Destination of the selection document.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Recorder Errors ===
    /// The recording parameters are unusable.
    #[error("invalid recording request: {message}")]
    InvalidRequest {
        /// Description of the rejected parameter.
        message: String,
    },

    /// A recording is already in progress.
    #[error("a recording is already running (pid {pid})")]
    RecorderBusy {
        /// Process id of the running recorder.
        pid: u32,
    },

    /// The recorder process could not be started.
    #[error("failed to launch recorder '{program}': {source}")]
    Launch {
        /// The program that was invoked.
        program: String,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The termination signal could not be delivered.
    #[error("failed to terminate recorder (pid {pid}): {source}")]
    Terminate {
        /// Process id of the recorder.
        pid: u32,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Retrieval Errors ===
    /// The recorded data file does not exist.
    #[error("recorded data file not found: {path}")]
    OutputMissing {
        /// Expected location of the data file.
        path: PathBuf,
    },

    /// Copying the data file failed.
    #[error("failed to copy {from} to {to}: {source}")]
    Copy {
        /// Source data file.
        from: PathBuf,
        /// Chosen destination.
        to: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The copied file does not match the source.
    #[error("copy at {to} does not match the recorded data")]
    CopyMismatch {
        /// Chosen destination.
        to: PathBuf,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },
}

/// A specialized Result type for telerecorder operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a catalog parse error.
    #[must_use]
    pub fn catalog_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CatalogParse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Check if this error indicates a recording is already running.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::RecorderBusy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn io_err(kind: std::io::ErrorKind) -> std::io::Error {
        std::io::Error::new(kind, "boom")
    }

    #[test]
    fn test_catalog_read_display() {
        let err = Error::CatalogRead {
            path: PathBuf::from("record_configuration.xml"),
            source: io_err(std::io::ErrorKind::NotFound),
        };
        let msg = err.to_string();
        assert!(msg.contains("record_configuration.xml"));
        assert!(msg.contains("boom"));
        assert!(matches!(err, Error::CatalogRead { .. }));
    }

    #[test]
    fn test_catalog_parse_display() {
        let err = Error::catalog_parse("catalog.xml", "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "malformed field catalog catalog.xml: unexpected end of file"
        );
    }

    #[test]
    fn test_missing_recipe_display() {
        let err = Error::CatalogMissingRecipe {
            path: PathBuf::from("catalog.xml"),
            key: "out".to_string(),
        };
        assert!(err.to_string().contains("key 'out'"));
    }

    #[test]
    fn test_catalog_write_display() {
        let err = Error::CatalogWrite {
            path: PathBuf::from("/readonly/selected.xml"),
            source: io_err(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/readonly/selected.xml"));
        assert!(!err.is_busy());
    }

    #[test]
    fn test_busy_error() {
        let err = Error::RecorderBusy { pid: 4242 };
        assert_eq!(err.to_string(), "a recording is already running (pid 4242)");
        assert!(err.is_busy());
    }

    #[test]
    fn test_launch_error_display() {
        let err = Error::Launch {
            program: "python".to_string(),
            source: io_err(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("'python'"));
        assert!(!err.is_busy());
    }

    #[test]
    fn test_invalid_request() {
        let err = Error::invalid_request("host is empty");
        assert_eq!(err.to_string(), "invalid recording request: host is empty");
        assert!(!err.is_busy());
    }

    #[test]
    fn test_copy_errors() {
        let missing = Error::OutputMissing {
            path: PathBuf::from("robot_data.csv"),
        };
        assert!(missing.to_string().contains("robot_data.csv"));

        let copy = Error::Copy {
            from: PathBuf::from("robot_data.csv"),
            to: PathBuf::from("/out/run1.csv"),
            source: io_err(std::io::ErrorKind::PermissionDenied),
        };
        let msg = copy.to_string();
        assert!(msg.contains("robot_data.csv"));
        assert!(msg.contains("/out/run1.csv"));

        let mismatch = Error::CopyMismatch {
            to: PathBuf::from("/out/run1.csv"),
        };
        assert!(mismatch.to_string().contains("/out/run1.csv"));
    }

    #[test]
    fn test_terminate_display() {
        let err = Error::Terminate {
            pid: 7,
            source: io_err(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("pid 7"));
    }

    #[test]
    fn test_config_validation_error_display() {
        let err = Error::ConfigValidation {
            message: "port must be nonzero".to_string(),
        };
        assert!(err.to_string().contains("port must be nonzero"));
    }

}
