//! The recording session: owner of the single recorder process slot.
//!
//! A session is either idle or tracking exactly one running recorder. It is
//! owned by the control task and never shared, so no locking is involved.
//! Launching while a recorder is still alive is rejected with
//! [`Error::RecorderBusy`]; the operator has to stop the running one first.

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::Child;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::launcher::{Launcher, RecordingRequest};
use crate::platform;

/// Observable state of the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecorderState {
    /// No recorder is tracked.
    Idle,
    /// A recorder is tracked and was alive at the last check.
    Running {
        /// Process id of the recorder.
        pid: u32,
        /// When the recorder was launched.
        started_at: DateTime<Utc>,
    },
}

impl RecorderState {
    /// Check if a recorder is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Result of a fire-and-forget [`RecorderSession::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    /// There was nothing to terminate.
    NotRunning,
    /// The recorder had already exited on its own.
    AlreadyExited,
    /// A termination request was sent; exit is not awaited.
    Signalled {
        /// Process id of the recorder.
        pid: u32,
    },
}

/// Result of a graceful [`RecorderSession::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// There was nothing to stop.
    NotRunning,
    /// The recorder exited, on its own or after the termination request.
    Exited {
        /// Process id of the recorder.
        pid: u32,
        /// Its exit status.
        status: ExitStatus,
    },
    /// The recorder ignored the termination request and was killed.
    Killed {
        /// Process id of the recorder.
        pid: u32,
    },
}

#[derive(Debug)]
struct ActiveRecording {
    child: Child,
    pid: u32,
    started_at: DateTime<Utc>,
}

/// Launches, polls and terminates the recorder.
#[derive(Debug)]
pub struct RecorderSession {
    launcher: Launcher,
    selection_path: PathBuf,
    active: Option<ActiveRecording>,
    last_output: Option<PathBuf>,
}

impl RecorderSession {
    /// Create an idle session. Selection documents are written to
    /// `selection_path` before each launch.
    #[must_use]
    pub fn new(launcher: Launcher, selection_path: impl Into<PathBuf>) -> Self {
        Self {
            launcher,
            selection_path: selection_path.into(),
            active: None,
            last_output: None,
        }
    }

    /// Create an idle session from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Launcher::from_config(&config.recorder),
            config.catalog.selection_path.clone(),
        )
    }

    /// Where selection documents are written.
    #[must_use]
    pub fn selection_path(&self) -> &Path {
        &self.selection_path
    }

    /// Output path of the most recent successful launch.
    #[must_use]
    pub fn last_output(&self) -> Option<&Path> {
        self.last_output.as_deref()
    }

    /// Write the request's selection document and start the recorder.
    ///
    /// Returns the recorder's process id. Must be called within a tokio
    /// runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::RecorderBusy`] if a recorder is still running
    /// - [`Error::InvalidRequest`] for unusable parameters
    /// - [`Error::CatalogWrite`] if the selection document cannot be written;
    ///   nothing is spawned in that case
    /// - [`Error::Launch`] if the recorder cannot be started
    pub fn launch(&mut self, request: &RecordingRequest) -> Result<u32> {
        if let RecorderState::Running { pid, .. } = self.poll() {
            return Err(Error::RecorderBusy { pid });
        }

        request.validate()?;
        request.selection.write_to(&self.selection_path)?;

        let child = self.launcher.spawn(request, &self.selection_path)?;
        let pid = child.id().ok_or_else(|| Error::Launch {
            program: self.launcher.program().to_string(),
            source: io::Error::other("recorder exited before it could be tracked"),
        })?;

        self.active = Some(ActiveRecording {
            child,
            pid,
            started_at: Utc::now(),
        });
        self.last_output = Some(request.output_path.clone());
        Ok(pid)
    }

    /// Check, without blocking, whether the recorder is still alive.
    ///
    /// A recorder that has exited, cleanly or not, is forgotten and the
    /// session reports [`RecorderState::Idle`].
    pub fn poll(&mut self) -> RecorderState {
        let Some(active) = self.active.as_mut() else {
            return RecorderState::Idle;
        };

        match active.child.try_wait() {
            Ok(None) => RecorderState::Running {
                pid: active.pid,
                started_at: active.started_at,
            },
            Ok(Some(status)) => {
                info!(pid = active.pid, %status, "Recorder exited");
                self.active = None;
                RecorderState::Idle
            }
            Err(e) => {
                warn!(pid = active.pid, "Lost track of recorder: {}", e);
                self.active = None;
                RecorderState::Idle
            }
        }
    }

    /// Shorthand for `poll().is_running()`.
    pub fn is_running(&mut self) -> bool {
        self.poll().is_running()
    }

    /// Ask the recorder to terminate and forget it immediately.
    ///
    /// Does not wait for the process to exit, so its output file may still be
    /// in the middle of being written when this returns.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Terminate`] if the request could not be delivered. A
    /// recorder that is still alive after such a failure stays tracked.
    pub fn terminate(&mut self) -> Result<TerminateOutcome> {
        self.terminate_with(platform::request_terminate)
    }

    fn terminate_with(
        &mut self,
        request: impl FnOnce(u32) -> io::Result<()>,
    ) -> Result<TerminateOutcome> {
        let Some(mut active) = self.active.take() else {
            debug!("Terminate requested with no recorder running");
            return Ok(TerminateOutcome::NotRunning);
        };

        if let Ok(Some(status)) = active.child.try_wait() {
            info!(pid = active.pid, %status, "Recorder had already exited");
            return Ok(TerminateOutcome::AlreadyExited);
        }

        let pid = active.pid;
        self.signal(active, request)?;
        info!(pid, "Termination requested");
        Ok(TerminateOutcome::Signalled { pid })
    }

    /// Ask the recorder to terminate and wait up to `grace` for it to exit,
    /// killing it if it does not.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Terminate`] if signalling, waiting or killing fails.
    /// A recorder that could not be signalled stays tracked.
    pub async fn stop(&mut self, grace: Duration) -> Result<StopOutcome> {
        let Some(mut active) = self.active.take() else {
            return Ok(StopOutcome::NotRunning);
        };
        let pid = active.pid;

        if let Ok(Some(status)) = active.child.try_wait() {
            return Ok(StopOutcome::Exited { pid, status });
        }

        let mut active = self.signal(active, platform::request_terminate)?;

        match tokio::time::timeout(grace, active.child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid, %status, "Recorder stopped");
                Ok(StopOutcome::Exited { pid, status })
            }
            Ok(Err(source)) => Err(Error::Terminate { pid, source }),
            Err(_) => {
                warn!(pid, "Recorder ignored termination after {:?}; killing", grace);
                active
                    .child
                    .kill()
                    .await
                    .map_err(|source| Error::Terminate { pid, source })?;
                Ok(StopOutcome::Killed { pid })
            }
        }
    }
}

impl RecorderSession {
    /// Deliver a termination request. On failure the recorder is put back
    /// into the slot unless it has exited meanwhile.
    fn signal(
        &mut self,
        mut active: ActiveRecording,
        request: impl FnOnce(u32) -> io::Result<()>,
    ) -> Result<ActiveRecording> {
        match send_terminate(&mut active, request) {
            Ok(()) => Ok(active),
            Err(e) => {
                if matches!(active.child.try_wait(), Ok(None)) {
                    warn!(pid = active.pid, "Recorder still running after failed termination");
                    self.active = Some(active);
                }
                Err(e)
            }
        }
    }
}

fn send_terminate(
    active: &mut ActiveRecording,
    request: impl FnOnce(u32) -> io::Result<()>,
) -> Result<()> {
    let pid = active.pid;
    match request(pid) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::Unsupported => active
            .child
            .start_kill()
            .map_err(|source| Error::Terminate { pid, source }),
        Err(source) => Err(Error::Terminate { pid, source }),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::catalog::{FieldCatalog, FieldDescriptor};
    use crate::selection::SelectionDocument;

    /// A stand-in recorder: waits `delay` seconds, then writes the file named
    /// by `--output`.
    fn fake_recorder(delay: &str) -> Launcher {
        let script = format!(
            r#"out=""
while [ $# -gt 0 ]; do
  case "$1" in --output) out="$2"; shift ;; esac
  shift
done
sleep {delay}
printf 'timestamp\n0.008\n' > "$out""#
        );
        Launcher::new("sh", vec!["-c".to_string(), script, "recorder".to_string()])
    }

    fn shell(script: &str) -> Launcher {
        Launcher::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "recorder".to_string()],
        )
    }

    fn request(dir: &Path) -> RecordingRequest {
        RecordingRequest {
            host: "127.0.0.1".to_string(),
            port: 30004,
            samples: 10,
            frequency_hz: 125.0,
            output_path: dir.join("robot_data.csv"),
            selection: SelectionDocument::new(vec![FieldDescriptor::new("timestamp", "DOUBLE")]),
        }
    }

    async fn wait_idle(session: &mut RecorderSession) {
        for _ in 0..200 {
            if !session.is_running() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("recorder did not exit");
    }

    #[tokio::test]
    async fn test_idle_session() {
        let mut session = RecorderSession::new(fake_recorder("0"), "unused.xml");
        assert_eq!(session.poll(), RecorderState::Idle);
        assert!(!session.is_running());
        assert!(session.last_output().is_none());
    }

    #[tokio::test]
    async fn test_terminate_when_idle_reports_not_running() {
        let mut session = RecorderSession::new(fake_recorder("0"), "unused.xml");
        assert_eq!(session.terminate().unwrap(), TerminateOutcome::NotRunning);
        assert_eq!(
            session.stop(Duration::from_millis(10)).await.unwrap(),
            StopOutcome::NotRunning
        );
    }

    #[tokio::test]
    async fn test_recording_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let selection_path = dir.path().join("selected_fields_config.xml");
        let mut session = RecorderSession::new(fake_recorder("1"), &selection_path);
        let req = request(dir.path());

        let pid = session.launch(&req).unwrap();
        assert!(matches!(session.poll(), RecorderState::Running { pid: p, .. } if p == pid));
        assert_eq!(session.last_output(), Some(req.output_path.as_path()));

        // Selection document is written before the recorder starts
        let written = FieldCatalog::load(&selection_path, "out").unwrap();
        assert_eq!(written.fields(), req.selection.fields());

        // Not there until the recorder gets around to it
        assert!(!req.output_path.exists());

        wait_idle(&mut session).await;
        assert!(req.output_path.exists());
        assert_eq!(session.poll(), RecorderState::Idle);
    }

    #[tokio::test]
    async fn test_overlapping_launch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecorderSession::new(shell("exec sleep 30"), dir.path().join("sel.xml"));
        let req = request(dir.path());

        let pid = session.launch(&req).unwrap();
        let err = session.launch(&req).unwrap_err();
        assert!(matches!(err, Error::RecorderBusy { pid: p } if p == pid));

        assert_eq!(
            session.terminate().unwrap(),
            TerminateOutcome::Signalled { pid }
        );
        assert_eq!(session.poll(), RecorderState::Idle);
        assert_eq!(session.terminate().unwrap(), TerminateOutcome::NotRunning);
    }

    #[tokio::test]
    async fn test_failed_terminate_keeps_recorder_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecorderSession::new(shell("exec sleep 30"), dir.path().join("sel.xml"));
        let req = request(dir.path());

        let pid = session.launch(&req).unwrap();
        let err = session
            .terminate_with(|_| Err(io::Error::from(io::ErrorKind::PermissionDenied)))
            .unwrap_err();
        assert!(matches!(err, Error::Terminate { pid: p, .. } if p == pid));

        // Still alive, so the slot stays taken
        assert!(session.is_running());
        assert!(session.launch(&req).unwrap_err().is_busy());

        assert!(matches!(
            session.stop(Duration::from_secs(5)).await.unwrap(),
            StopOutcome::Exited { .. }
        ));
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_launch_after_exit_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecorderSession::new(fake_recorder("0"), dir.path().join("sel.xml"));
        let req = request(dir.path());

        session.launch(&req).unwrap();
        wait_idle(&mut session).await;
        assert!(session.launch(&req).is_ok());
        wait_idle(&mut session).await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecorderSession::new(shell("exec sleep 30"), dir.path().join("sel.xml"));

        let pid = session.launch(&request(dir.path())).unwrap();
        let outcome = session.stop(Duration::from_secs(5)).await.unwrap();

        assert!(matches!(outcome, StopOutcome::Exited { pid: p, status } if p == pid && !status.success()));
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_stop_kills_stubborn_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecorderSession::new(
            shell("trap '' TERM; exec sleep 30"),
            dir.path().join("sel.xml"),
        );

        let pid = session.launch(&request(dir.path())).unwrap();
        // Give the shell time to install the trap before signalling.
        tokio::time::sleep(Duration::from_millis(300)).await;

        let outcome = session.stop(Duration::from_millis(300)).await.unwrap();
        assert_eq!(outcome, StopOutcome::Killed { pid });
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_selection_write_failure_aborts_launch() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecorderSession::new(
            fake_recorder("0"),
            dir.path().join("missing").join("sel.xml"),
        );

        let err = session.launch(&request(dir.path())).unwrap_err();
        assert!(matches!(err, Error::CatalogWrite { .. }));
        assert!(!session.is_running());
        assert!(session.last_output().is_none());
    }

    #[tokio::test]
    async fn test_invalid_request_not_launched() {
        let dir = tempfile::tempdir().unwrap();
        let selection_path = dir.path().join("sel.xml");
        let mut session = RecorderSession::new(fake_recorder("0"), &selection_path);

        let mut req = request(dir.path());
        req.host = String::new();
        let err = session.launch(&req).unwrap_err();

        assert!(matches!(err, Error::InvalidRequest { .. }));
        assert!(!selection_path.exists());
    }

    #[tokio::test]
    async fn test_missing_program_leaves_session_idle() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = RecorderSession::new(
            Launcher::new("telerec-test-no-such-recorder", Vec::new()),
            dir.path().join("sel.xml"),
        );

        let err = session.launch(&request(dir.path())).unwrap_err();
        assert!(matches!(err, Error::Launch { .. }));
        assert_eq!(session.poll(), RecorderState::Idle);
    }
}
