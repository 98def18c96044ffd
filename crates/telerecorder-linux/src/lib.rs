//! Linux-specific implementation for telerecorder
//!
//! This crate provides Linux-specific functionality for the telerecorder project,
//! chiefly delivering termination signals to the recorder process.

#![cfg(target_os = "linux")]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io;

/// Initialize Linux-specific components
///
/// # Errors
///
/// Returns an error if initialization fails
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    tracing::debug!("Initializing Linux platform components");
    Ok(())
}

/// Get platform name
#[must_use]
pub fn platform_name() -> &'static str {
    "Linux"
}

/// Ask the process `pid` to terminate by sending it `SIGTERM`.
///
/// Returns as soon as the signal is queued; the process may still be running.
///
/// # Errors
///
/// Returns the OS error from `kill(2)`, e.g. `ESRCH` if the process is gone.
#[allow(unsafe_code)]
pub fn request_terminate(pid: u32) -> io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;

    // SAFETY: kill(2) takes plain integers and touches no memory we own.
    let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
    if rc == 0 {
        tracing::debug!(pid, "sent SIGTERM");
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
