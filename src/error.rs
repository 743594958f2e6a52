//! Error types for telemetry access.
//!
//! Every fallible operation in the crate returns [`TelemetryError`]. The variants
//! follow the failure modes of the two channels:
//!
//! ## Error Categories
//!
//! - **Source state**: `Unavailable`, `Disconnected`, `Inconsistent`. These are
//!   expected while the simulator starts, stops or is mid-write and callers retry.
//! - **Structural**: `Truncated`, `Malformed`, `Version`. The header, catalog or
//!   file cannot be decoded; the channel is unusable.
//! - **Playback**: `SessionTimeMissing` stops frame processing.
//! - **I/O and platform**: `File`, `Timeout`, `UnsupportedPlatform`, `WindowsApi`.
//!
//! An unknown variable name is not an error. It surfaces as an unresolved
//! [`VariableHandle`](crate::VariableHandle) that returns defaults.
//!
//! ```rust
//! use irtelemetry::TelemetryError;
//!
//! let error = TelemetryError::unavailable("simulator not running");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::registry::RegistryError;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Telemetry source unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Telemetry source disconnected: {reason}")]
    Disconnected { reason: String },

    #[error("Sample torn by concurrent write after {attempts} attempts")]
    Inconsistent { attempts: u32 },

    #[error("Truncated {context}: needed {needed} bytes, {available} available")]
    Truncated { context: String, needed: usize, available: usize },

    #[error("Malformed {context}: {details}")]
    Malformed { context: String, details: String },

    #[error("Header version mismatch: expected {expected}, found {found}")]
    Version { expected: i32, found: i32 },

    #[error("Session time unreadable at sample {index}")]
    SessionTimeMissing { index: usize },

    #[error("Telemetry file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Unavailable { .. } => true,
            TelemetryError::Disconnected { .. } => true,
            TelemetryError::Inconsistent { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Truncated { .. } => false,
            TelemetryError::Malformed { .. } => false,
            TelemetryError::Version { .. } => false,
            TelemetryError::SessionTimeMissing { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            TelemetryError::Registry(_) => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Unavailable { .. } => vec![
                "Start the simulator and join a session",
                "Poll again after a short delay",
            ],
            TelemetryError::Disconnected { .. } => vec![
                "Re-open the live channel",
                "Re-resolve variable handles against the new catalog",
            ],
            TelemetryError::Inconsistent { .. } => vec![
                "Retry the read on the next data-ready signal",
                "Check system load if torn reads persist",
            ],
            TelemetryError::Truncated { .. } | TelemetryError::Malformed { .. } => vec![
                "Verify the recording was closed cleanly by the simulator",
                "Re-copy the file if it was transferred",
            ],
            TelemetryError::Version { .. } => vec![
                "Update the simulator to a supported SDK version",
                "Check the file was produced by a supported simulator build",
            ],
            TelemetryError::SessionTimeMissing { .. } => vec![
                "Check the recording contains the SessionTime variable",
                "Discard the recording if its sample records are corrupt",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::Parse { .. } => vec![
                "Verify the session info text is complete",
                "Inspect the text for unsupported constructs",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase the wait timeout",
                "Verify the simulator is responding",
            ],
            TelemetryError::UnsupportedPlatform { .. } => vec![
                "Use a disk recording on this platform",
                "Run live capture on Windows",
            ],
            TelemetryError::Registry(_) => vec![
                "Use a client id other than the reserved live id",
                "Remove the existing client before re-adding it",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Verify system resources availability",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TelemetryError::File { path: path.into(), source }
    }

    /// Helper constructor for an absent live source.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        TelemetryError::Unavailable { reason: reason.into() }
    }

    /// Helper constructor for a reset live source.
    pub fn disconnected(reason: impl Into<String>) -> Self {
        TelemetryError::Disconnected { reason: reason.into() }
    }

    /// Helper constructor for short reads and undersized buffers.
    pub fn truncated(context: impl Into<String>, needed: usize, available: usize) -> Self {
        TelemetryError::Truncated { context: context.into(), needed, available }
    }

    /// Helper constructor for structurally invalid data.
    pub fn malformed(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Malformed { context: context.into(), details: details.into() }
    }

    /// Helper constructor for text parse failures.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        TelemetryError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

#[cfg(windows)]
impl From<core::Error> for TelemetryError {
    fn from(err: core::Error) -> Self {
        TelemetryError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}
