//! Platform-specific process control, selected at compile time.

#[cfg(target_os = "linux")]
pub use telerecorder_linux::{init, platform_name, request_terminate};

#[cfg(target_os = "macos")]
pub use telerecorder_mac::{init, platform_name, request_terminate};

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub use fallback::{init, platform_name, request_terminate};

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod fallback {
    use std::io;

    /// Nothing to initialize.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        Ok(())
    }

    /// Name of the current OS.
    #[must_use]
    pub fn platform_name() -> &'static str {
        std::env::consts::OS
    }

    /// Termination signals are not available here; callers fall back to
    /// killing the child directly.
    ///
    /// # Errors
    ///
    /// Always returns [`io::ErrorKind::Unsupported`].
    pub fn request_terminate(_pid: u32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "termination signals are not supported on this platform",
        ))
    }
}
