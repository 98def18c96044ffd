//! Retrieving the recorded data file.
//!
//! The recorder writes its data file on its own schedule, so [`OutputFile::exists`]
//! is only a hint while a recording may still be running.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Chooses where a retrieved file should go (the "save as" dialog).
pub trait DestinationPrompt {
    /// Ask the operator for a destination. `suggested` is the data file's
    /// current name, `extension` the expected file type. `None` means the
    /// operator cancelled.
    fn choose_destination(&mut self, suggested: &Path, extension: &str) -> Option<PathBuf>;
}

/// A destination decided up front; yields it once.
impl DestinationPrompt for Option<PathBuf> {
    fn choose_destination(&mut self, _suggested: &Path, _extension: &str) -> Option<PathBuf> {
        self.take()
    }
}

/// Result of a copy request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CopyOutcome {
    /// The file was copied and verified.
    Copied {
        /// Where the copy was written.
        destination: PathBuf,
        /// Number of bytes copied.
        bytes: u64,
        /// BLAKE3 digest of the copied data.
        digest: String,
    },
    /// The operator withdrew the destination; nothing was touched.
    Cancelled,
}

impl std::fmt::Display for CopyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Copied { destination, .. } => {
                write!(f, "File saved to {}", destination.display())
            }
            Self::Cancelled => write!(f, "Download cancelled."),
        }
    }
}

/// The data file a recording is expected to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    path: PathBuf,
    default_extension: String,
}

impl OutputFile {
    /// Track the data file at `path`, completing extension-less
    /// destinations with `.csv`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            default_extension: "csv".to_string(),
        }
    }

    /// Use `extension` (without the dot) for extension-less destinations.
    /// An empty string disables completion.
    #[must_use]
    pub fn with_default_extension(mut self, extension: impl Into<String>) -> Self {
        self.default_extension = extension.into();
        self
    }

    /// Location of the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the data file is currently present.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Destination actually used for a chosen path.
    #[must_use]
    pub fn resolve_destination(&self, chosen: &Path) -> PathBuf {
        if chosen.extension().is_none() && !self.default_extension.is_empty() {
            chosen.with_extension(&self.default_extension)
        } else {
            chosen.to_path_buf()
        }
    }

    /// Ask `prompt` for a destination and copy the data file there.
    ///
    /// # Errors
    ///
    /// See [`OutputFile::copy_to`].
    pub fn fetch(&self, prompt: &mut impl DestinationPrompt) -> Result<CopyOutcome> {
        let suggested = self
            .path
            .file_name()
            .map_or_else(|| self.path.clone(), PathBuf::from);
        let chosen = prompt.choose_destination(&suggested, &self.default_extension);
        self.copy_to(chosen.as_deref())
    }

    /// Copy the data file byte-for-byte to `destination`.
    ///
    /// `None` means the operator cancelled and yields
    /// [`CopyOutcome::Cancelled`] without touching anything.
    ///
    /// # Errors
    ///
    /// - [`Error::OutputMissing`] if the data file is gone
    /// - [`Error::Copy`] if the destination cannot be written
    /// - [`Error::CopyMismatch`] if the written copy differs from the source.
    ///   The source is hashed before copying, so a file that the recorder is
    ///   still appending to also ends up here.
    pub fn copy_to(&self, destination: Option<&Path>) -> Result<CopyOutcome> {
        let Some(chosen) = destination else {
            info!("Retrieval of {} cancelled", self.path.display());
            return Ok(CopyOutcome::Cancelled);
        };
        let destination = self.resolve_destination(chosen);

        if !self.exists() {
            return Err(Error::OutputMissing {
                path: self.path.clone(),
            });
        }

        let copy_err = |source| Error::Copy {
            from: self.path.clone(),
            to: destination.clone(),
            source,
        };

        let source_digest = digest(&self.path).map_err(|e| self.missing_or(e, copy_err))?;

        if is_same_file(&self.path, &destination) {
            debug!("Destination is the data file itself; nothing to copy");
        } else {
            std::fs::copy(&self.path, &destination).map_err(|e| self.missing_or(e, copy_err))?;
        }

        self.verify(destination, &source_digest)
    }

    /// Check the file at `destination` against the digest of the source.
    fn verify(&self, destination: PathBuf, expected: &blake3::Hash) -> Result<CopyOutcome> {
        let copy_err = |source| Error::Copy {
            from: self.path.clone(),
            to: destination.clone(),
            source,
        };

        let copied_digest = digest(&destination).map_err(copy_err)?;
        if copied_digest != *expected {
            return Err(Error::CopyMismatch { to: destination });
        }

        let bytes = std::fs::metadata(&destination).map_err(copy_err)?.len();
        info!(
            bytes,
            "Copied {} to {}",
            self.path.display(),
            destination.display()
        );
        Ok(CopyOutcome::Copied {
            destination,
            bytes,
            digest: copied_digest.to_hex().to_string(),
        })
    }

    /// Report a vanished source as missing rather than as a failed copy.
    fn missing_or(&self, err: io::Error, other: impl FnOnce(io::Error) -> Error) -> Error {
        if err.kind() == io::ErrorKind::NotFound && !self.path.exists() {
            Error::OutputMissing {
                path: self.path.clone(),
            }
        } else {
            other(err)
        }
    }
}

fn digest(path: &Path) -> io::Result<blake3::Hash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hasher.finalize())
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
