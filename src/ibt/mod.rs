//! Disk recordings (`.ibt`), readable on every platform.
//!
//! - [`format`] holds the disk sub-header and the sample record layout
//! - [`reader`] provides [`DiskChannel`], the random-access sample reader
//! - [`overrides`] loads the session-info snapshots of race recording directories

pub mod format;
pub mod overrides;
pub mod reader;

pub use format::{DiskSubHeader, FILL_PATTERNS, SampleLayout, is_valid_tick};
pub use overrides::{RecordingFiles, SessionOverride, SessionOverrides};
pub use reader::DiskChannel;
