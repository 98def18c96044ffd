//! `telerec` - CLI for telerecorder
//!
//! This binary lists recordable fields, writes selection documents, runs the
//! external recorder and retrieves the data file it produces.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{debug, info, warn};

use telerecorder::cli::{
    Cli, Command, ConfigCommand, FetchCommand, FieldsCommand, RecordCommand, SelectCommand,
};
use telerecorder::{
    init_logging, platform, Config, Console, DestinationPrompt, FieldCatalog, OutputFile,
    RecorderSession, RecorderState, RecordingRequest, SelectionDocument, StopOutcome,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    platform::init().map_err(|e| anyhow::anyhow!("platform initialization failed: {e}"))?;
    debug!("Running on {}", platform::platform_name());

    // Execute the command
    match cli.command {
        Command::Fields(cmd) => handle_fields(&config, &cmd),
        Command::Select(cmd) => handle_select(&config, &cmd),
        Command::Record(cmd) => handle_record(&config, &cmd).await,
        Command::Fetch(cmd) => handle_fetch(&config, &cmd),
        Command::Console => handle_console(config).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn load_catalog(config: &Config, path: Option<&Path>) -> Result<FieldCatalog> {
    let path = path.unwrap_or(&config.catalog.path);
    let catalog = FieldCatalog::load(path, &config.catalog.recipe_key)?;
    debug!("Loaded {} fields from {}", catalog.len(), path.display());
    Ok(catalog)
}

fn handle_fields(config: &Config, cmd: &FieldsCommand) -> Result<()> {
    let catalog = load_catalog(config, cmd.catalog.as_deref())?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(catalog.fields())?);
        return Ok(());
    }

    if catalog.is_empty() {
        println!("No fields in recipe '{}'.", catalog.key());
        return Ok(());
    }

    let width = catalog.names().map(str::len).max().unwrap_or(0);
    for (index, field) in catalog.fields().iter().enumerate() {
        println!(
            "{index:>4}  {:<width$}  {}",
            field.name,
            field.field_type,
            width = width
        );
    }
    Ok(())
}

fn handle_select(config: &Config, cmd: &SelectCommand) -> Result<()> {
    let catalog = load_catalog(config, cmd.catalog.as_deref())?;
    let selection = SelectionDocument::from_catalog(&catalog, cmd.fields.as_slice());

    for name in &selection.skipped {
        eprintln!("Skipped unknown field: {name}");
    }

    let out = cmd
        .out
        .clone()
        .unwrap_or_else(|| config.catalog.selection_path.clone());
    selection.document.write_to(&out)?;
    println!(
        "Wrote {} field(s) to {}",
        selection.document.len(),
        out.display()
    );
    Ok(())
}

async fn handle_record(config: &Config, cmd: &RecordCommand) -> Result<()> {
    let catalog = load_catalog(config, None)?;

    let document = if cmd.all {
        SelectionDocument::all(&catalog)
    } else {
        let selection = SelectionDocument::from_catalog(&catalog, cmd.fields.as_slice());
        for name in &selection.skipped {
            eprintln!("Skipped unknown field: {name}");
        }
        selection.document
    };
    if document.is_empty() {
        bail!("no known fields selected; nothing to record");
    }

    let params = cmd.apply(&config.recorder);
    let request = RecordingRequest::from_defaults(&params, document);

    let mut session = RecorderSession::from_config(config);
    let pid = session.launch(&request)?;
    println!(
        "Recording {} field(s) from {}:{} (pid {pid}). Press Ctrl-C to stop.",
        request.selection.len(),
        request.host,
        request.port
    );

    let mut interval = tokio::time::interval(config.poll_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let RecorderState::Idle = session.poll() {
                    info!("Recorder finished");
                    break;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                match session.stop(config.stop_grace()).await? {
                    StopOutcome::Exited { status, .. } => println!("Recorder stopped ({status})."),
                    StopOutcome::Killed { .. } => println!("Recorder did not stop in time; killed."),
                    StopOutcome::NotRunning => println!("No process running."),
                }
                break;
            }
        }
    }

    let output = OutputFile::new(&request.output_path);
    if output.exists() {
        println!("Output file {} is ready.", output.path().display());
    } else {
        warn!("Recorder left no output at {}", output.path().display());
        println!("Output file {} was not created.", output.path().display());
    }
    Ok(())
}

/// Asks for the destination on stdin; an empty answer cancels.
#[derive(Debug)]
struct StdinPrompt;

impl DestinationPrompt for StdinPrompt {
    fn choose_destination(&mut self, suggested: &Path, extension: &str) -> Option<PathBuf> {
        print!(
            "Save {} as (.{extension}, empty to cancel): ",
            suggested.display()
        );
        io::stdout().flush().ok()?;

        let mut answer = String::new();
        io::stdin().lock().read_line(&mut answer).ok()?;
        let answer = answer.trim();
        if answer.is_empty() {
            None
        } else {
            Some(PathBuf::from(answer))
        }
    }
}

fn handle_fetch(config: &Config, cmd: &FetchCommand) -> Result<()> {
    let path = cmd
        .output
        .clone()
        .unwrap_or_else(|| config.recorder.output.clone());
    let output =
        OutputFile::new(path).with_default_extension(&config.retrieval.default_extension);

    let outcome = match &cmd.to {
        Some(to) => output.copy_to(Some(to.as_path()))?,
        None => output.fetch(&mut StdinPrompt)?,
    };
    println!("{outcome}");
    Ok(())
}

async fn handle_console(config: Config) -> Result<()> {
    let mut console = Console::new(config);
    console
        .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
        .await
        .context("console I/O failed")?;
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let output = OutputFile::new(&config.recorder.output);

    if json {
        let status = serde_json::json!({
            "platform": platform::platform_name(),
            "catalog_path": config.catalog.path,
            "selection_path": config.catalog.selection_path,
            "output_path": output.path(),
            "output_exists": output.exists(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("telerec status");
        println!("--------------");
        println!("Platform:      {}", platform::platform_name());
        println!("Catalog:       {}", config.catalog.path.display());
        println!("Selection:     {}", config.catalog.selection_path.display());
        println!(
            "Output:        {} ({})",
            output.path().display(),
            if output.exists() { "present" } else { "missing" }
        );
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Catalog]");
                println!("  Path:               {}", config.catalog.path.display());
                println!("  Recipe key:         {}", config.catalog.recipe_key);
                println!(
                    "  Selection path:     {}",
                    config.catalog.selection_path.display()
                );
                println!();
                println!("[Recorder]");
                println!(
                    "  Command:            {} {}",
                    config.recorder.program,
                    config.recorder.args.join(" ")
                );
                println!(
                    "  Controller:         {}:{}",
                    config.recorder.host, config.recorder.port
                );
                println!("  Samples:            {}", config.recorder.samples);
                println!("  Frequency (Hz):     {}", config.recorder.frequency_hz);
                println!("  Output:             {}", config.recorder.output.display());
                println!("  Stop grace (ms):    {}", config.recorder.stop_grace_ms);
                println!();
                println!("[Retrieval]");
                println!(
                    "  Default extension:  {}",
                    config.retrieval.default_extension
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
