//! Interactive operator console.
//!
//! A line-oriented front-end over the recording backend. Every operator event
//! is turned into a [`Reply`]; failures are reported, never propagated, so a
//! bad catalog or a failed copy does not end the session.

use std::fmt::{self, Write as _};
use std::path::PathBuf;

use chrono::Utc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::catalog::FieldCatalog;
use crate::config::{Config, RecorderConfig};
use crate::error::Error;
use crate::launcher::RecordingRequest;
use crate::retrieval::OutputFile;
use crate::selection::SelectionDocument;
use crate::session::{RecorderSession, RecorderState, StopOutcome, TerminateOutcome};

const HELP: &str = "\
Commands:
  load                         read the field catalog
  fields                       list catalog fields ([x] = selected)
  select <name|number>...      add fields to the selection ('select all' for every field)
  clear                        empty the selection
  set <param> <value>          host, port, samples, frequency, output
  params                       show recording parameters
  run                          write the selection and start the recorder
  status                       show whether the recorder is running
  stop                         stop the recorder, waiting for it to exit
  kill                         request termination without waiting
  check                        check for the recorded data file
  save [destination]           copy the data file (empty destination cancels)
  help                         show this help
  quit                         leave the console";

/// The console's answer to one line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Normal output.
    Info(String),
    /// Something failed; the console carries on.
    Error(String),
    /// The next line answers a question.
    Prompt(String),
    /// The console is done.
    Quit(String),
}

impl Reply {
    /// Text shown to the operator.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Info(text) | Self::Error(text) | Self::Prompt(text) | Self::Quit(text) => text,
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(text) => write!(f, "error: {text}"),
            other => f.write_str(other.text()),
        }
    }
}

/// Operator console state.
#[derive(Debug)]
pub struct Console {
    config: Config,
    params: RecorderConfig,
    session: RecorderSession,
    catalog: Option<FieldCatalog>,
    selected: Vec<String>,
    awaiting_destination: bool,
}

impl Console {
    /// Create a console using `config` for paths and default parameters.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let session = RecorderSession::from_config(&config);
        Self {
            params: config.recorder.clone(),
            config,
            session,
            catalog: None,
            selected: Vec::new(),
            awaiting_destination: false,
        }
    }

    /// Currently selected field names, in selection order.
    #[must_use]
    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// The loaded catalog, if any.
    #[must_use]
    pub fn catalog(&self) -> Option<&FieldCatalog> {
        self.catalog.as_ref()
    }

    /// Read commands from `input` until `quit` or end of input, writing
    /// replies to `output`. A running recorder is stopped on the way out.
    ///
    /// # Errors
    ///
    /// Returns an error only if reading input or writing output fails.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        output
            .write_all(b"telerec console. Type 'help' for commands.\n> ")
            .await?;
        output.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let reply = self.handle(&line).await;
            output.write_all(format!("{reply}\n").as_bytes()).await?;
            if matches!(reply, Reply::Quit(_)) {
                output.flush().await?;
                return Ok(());
            }
            if !matches!(reply, Reply::Prompt(_)) {
                output.write_all(b"> ").await?;
            }
            output.flush().await?;
        }

        let farewell = self.shutdown().await;
        output.write_all(format!("\n{farewell}\n").as_bytes()).await?;
        output.flush().await
    }

    /// Handle one line of operator input.
    pub async fn handle(&mut self, line: &str) -> Reply {
        if self.awaiting_destination {
            self.awaiting_destination = false;
            return self.save(line.trim());
        }

        let line = line.trim();
        let (command, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(c, r)| (c, r.trim()));
        debug!(command, "console event");

        match command {
            "" => Reply::Info(String::new()),
            "load" => self.load(),
            "fields" => self.fields(),
            "select" => self.select(rest),
            "clear" => {
                self.selected.clear();
                Reply::Info("Selection cleared.".to_string())
            }
            "set" => self.set(rest),
            "params" => self.params(),
            "run" => self.run_recorder(),
            "status" => self.status(),
            "stop" => self.stop().await,
            "kill" => self.kill(),
            "check" => self.check(),
            "save" if rest.is_empty() => {
                self.awaiting_destination = true;
                Reply::Prompt(format!(
                    "Save as (*.{}, empty line cancels): ",
                    self.config.retrieval.default_extension
                ))
            }
            "save" => self.save(rest),
            "help" => Reply::Info(HELP.to_string()),
            "quit" | "exit" => Reply::Quit(self.shutdown().await),
            other => Reply::Error(format!("unknown command '{other}'; type 'help'")),
        }
    }

    fn load(&mut self) -> Reply {
        self.selected.clear();
        match FieldCatalog::load(&self.config.catalog.path, &self.config.catalog.recipe_key) {
            Ok(catalog) => {
                self.catalog = Some(catalog);
                self.fields()
            }
            Err(e) => {
                self.catalog = None;
                Reply::Error(format!("could not load catalog: {e}"))
            }
        }
    }

    fn fields(&self) -> Reply {
        let Some(catalog) = &self.catalog else {
            return Reply::Error("no catalog loaded; run 'load' first".to_string());
        };

        let mut text = format!("{} fields available:", catalog.len());
        for (i, field) in catalog.fields().iter().enumerate() {
            let mark = if self.selected.contains(&field.name) {
                "x"
            } else {
                " "
            };
            let _ = write!(
                text,
                "\n  [{mark}] {:>3}. {} ({})",
                i + 1,
                field.name,
                field.field_type
            );
        }
        Reply::Info(text)
    }

    fn select(&mut self, args: &str) -> Reply {
        let Some(catalog) = &self.catalog else {
            return Reply::Error("no catalog loaded; run 'load' first".to_string());
        };
        if args.is_empty() {
            return Reply::Error("usage: select <name|number>... | select all".to_string());
        }

        let mut picked: Vec<String> = Vec::new();
        let mut unknown: Vec<&str> = Vec::new();
        if args == "all" {
            picked.extend(catalog.names().map(String::from));
        } else {
            for token in args.split_whitespace() {
                let by_number = token
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| catalog.get(i));
                match by_number {
                    Some(field) => picked.push(field.name.clone()),
                    None if catalog.type_of(token).is_some() => picked.push(token.to_string()),
                    None => unknown.push(token),
                }
            }
        }

        for name in picked {
            if !self.selected.contains(&name) {
                self.selected.push(name);
            }
        }

        let mut text = format!("Selected: {}", self.selected.join(", "));
        if !unknown.is_empty() {
            let _ = write!(text, "\nNot in catalog: {}", unknown.join(", "));
        }
        Reply::Info(text)
    }

    fn set(&mut self, args: &str) -> Reply {
        let Some((param, value)) = args.split_once(char::is_whitespace) else {
            return Reply::Error("usage: set <host|port|samples|frequency|output> <value>".to_string());
        };
        let value = value.trim();

        let result = match param {
            "host" => {
                self.params.host = value.to_string();
                Ok(())
            }
            "port" => value
                .parse()
                .map(|port| self.params.port = port)
                .map_err(|e| format!("invalid port '{value}': {e}")),
            "samples" => value
                .parse()
                .map(|samples| self.params.samples = samples)
                .map_err(|e| format!("invalid sample count '{value}': {e}")),
            "frequency" => value
                .parse()
                .map(|hz| self.params.frequency_hz = hz)
                .map_err(|e| format!("invalid frequency '{value}': {e}")),
            "output" => {
                self.params.output = PathBuf::from(value);
                Ok(())
            }
            other => Err(format!("unknown parameter '{other}'")),
        };

        match result {
            Ok(()) => Reply::Info(format!("{param} = {value}")),
            Err(message) => Reply::Error(message),
        }
    }

    fn params(&self) -> Reply {
        let p = &self.params;
        let samples = if p.samples == 0 {
            "until stopped".to_string()
        } else {
            p.samples.to_string()
        };
        Reply::Info(format!(
            "host:      {}\nport:      {}\nsamples:   {}\nfrequency: {} Hz\noutput:    {}\nrecorder:  {} {}",
            p.host,
            p.port,
            samples,
            p.frequency_hz,
            p.output.display(),
            p.program,
            p.args.join(" ")
        ))
    }

    fn run_recorder(&mut self) -> Reply {
        let Some(catalog) = &self.catalog else {
            return Reply::Error("no catalog loaded; run 'load' first".to_string());
        };
        if self.selected.is_empty() {
            return Reply::Error("no fields selected".to_string());
        }

        let selection = SelectionDocument::from_catalog(catalog, self.selected.as_slice());
        let request = RecordingRequest::from_defaults(&self.params, selection.document);

        match self.session.launch(&request) {
            Ok(pid) => {
                let mut text = format!(
                    "Recorder started (pid {pid}) recording {} fields to {}",
                    request.selection.len(),
                    request.output_path.display()
                );
                if !selection.skipped.is_empty() {
                    let _ = write!(text, "\nSkipped: {}", selection.skipped.join(", "));
                }
                Reply::Info(text)
            }
            Err(e) if e.is_busy() => Reply::Error(format!("{e}; use 'stop' or 'kill' first")),
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    fn status(&mut self) -> Reply {
        let output = self.output_file();
        let data = if output.exists() {
            "present"
        } else {
            "not present"
        };

        match self.session.poll() {
            RecorderState::Idle => Reply::Info(format!(
                "No recording running. Data file {}: {data}",
                output.path().display()
            )),
            RecorderState::Running { pid, started_at } => {
                let elapsed = (Utc::now() - started_at).num_seconds();
                Reply::Info(format!(
                    "Recording (pid {pid}) for {elapsed}s. Data file {}: {data}",
                    output.path().display()
                ))
            }
        }
    }

    async fn stop(&mut self) -> Reply {
        match self.session.stop(self.config.stop_grace()).await {
            Ok(StopOutcome::NotRunning) => Reply::Info("No process running.".to_string()),
            Ok(StopOutcome::Exited { pid, status }) => {
                Reply::Info(format!("Recorder (pid {pid}) stopped: {status}"))
            }
            Ok(StopOutcome::Killed { pid }) => {
                Reply::Info(format!("Recorder (pid {pid}) did not exit in time and was killed."))
            }
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    fn kill(&mut self) -> Reply {
        match self.session.terminate() {
            Ok(TerminateOutcome::NotRunning) => Reply::Info("No process running.".to_string()),
            Ok(TerminateOutcome::AlreadyExited) => {
                Reply::Info("Recorder had already finished.".to_string())
            }
            Ok(TerminateOutcome::Signalled { pid }) => {
                Reply::Info(format!("Termination requested for recorder (pid {pid})."))
            }
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    fn check(&mut self) -> Reply {
        let output = self.output_file();
        let running = if self.session.is_running() {
            " (recording still in progress)"
        } else {
            ""
        };
        if output.exists() {
            Reply::Info(format!(
                "{} is ready to save{running}.",
                output.path().display()
            ))
        } else {
            Reply::Info(format!("{} is not present{running}.", output.path().display()))
        }
    }

    fn save(&mut self, destination: &str) -> Reply {
        let output = self.output_file();
        let destination = (!destination.is_empty()).then(|| PathBuf::from(destination));

        match output.copy_to(destination.as_deref()) {
            Ok(outcome) => Reply::Info(outcome.to_string()),
            Err(e @ Error::CopyMismatch { .. }) if self.session.is_running() => {
                Reply::Error(format!("{e}; the recording is still in progress"))
            }
            Err(e) => Reply::Error(e.to_string()),
        }
    }

    async fn shutdown(&mut self) -> String {
        match self.stop().await {
            Reply::Info(text) if text.starts_with("No process") => "Goodbye.".to_string(),
            reply => format!("{reply}\nGoodbye."),
        }
    }

    /// The data file of the last launch, or of the current parameters.
    fn output_file(&self) -> OutputFile {
        let path = self
            .session
            .last_output()
            .map_or_else(|| self.params.output.clone(), PathBuf::from);
        OutputFile::new(path).with_default_extension(&self.config.retrieval.default_extension)
    }
}
