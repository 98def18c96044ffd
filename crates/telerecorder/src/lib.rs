//! `telerecorder` - Configure, launch and retrieve robot telemetry recordings
//!
//! This library holds the operator-facing backend: reading the catalog of
//! recordable fields, writing the selection document, running one external
//! recorder process at a time, and retrieving the data file it produces.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod platform;
pub mod retrieval;
pub mod selection;
pub mod session;

pub use catalog::{FieldCatalog, FieldDescriptor};
pub use config::Config;
pub use console::Console;
pub use error::{Error, Result};
pub use launcher::{Launcher, RecordingRequest};
pub use logging::init_logging;
pub use retrieval::{CopyOutcome, DestinationPrompt, OutputFile};
pub use selection::{Selection, SelectionDocument};
pub use session::{RecorderSession, RecorderState, StopOutcome, TerminateOutcome};
