//! Command-line interface for telerecorder.
//!
//! This module provides the CLI structure for the `telerec` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, FetchCommand, FieldsCommand, RecordCommand, SelectCommand, StatusCommand,
};

/// telerec - Record robot telemetry
///
/// Pick fields from the recorder's field catalog, run the external recorder
/// against a robot controller, and save the data file it produces.
#[derive(Debug, Parser)]
#[command(name = "telerec")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the fields available for recording
    Fields(FieldsCommand),

    /// Write a selection document without recording
    Select(SelectCommand),

    /// Record the selected fields until the recorder exits or Ctrl-C
    Record(RecordCommand),

    /// Copy the recorded data file to a destination
    Fetch(FetchCommand),

    /// Interactive operator console
    Console,

    /// Show paths and whether a data file is present
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
