//! Shared-memory seam between the live channel and the operating system.
//!
//! The channel only needs four things from the simulator's mapping: its size, a
//! volatile read of one 32-bit field, a bulk copy, and a bounded wait on the
//! data-ready event. [`SharedRegion`] captures exactly that so the torn-read and
//! reconnect logic runs, and is tested, on every platform.

use std::time::Duration;

use crate::Result;

/// Outcome of waiting on the data-ready event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResult {
    Signaled,
    Timeout,
}

/// A mapped view of the simulator's telemetry memory plus its data-ready event.
///
/// Implementations read the live mapping, so two reads of the same offset may
/// differ. Out-of-range accesses fail with `Truncated`.
pub trait SharedRegion: Send {
    /// Mapped length in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the little-endian `i32` at `offset` without caching.
    fn read_i32(&self, offset: usize) -> Result<i32>;

    /// Copy `target.len()` bytes starting at `offset`.
    fn copy_to(&self, offset: usize, target: &mut [u8]) -> Result<()>;

    /// Block until the writer signals new data or `timeout` elapses.
    fn wait(&self, timeout: Duration) -> Result<WaitResult>;
}

/// Opens the shared region.
///
/// `open` fails with `Unavailable` while the simulator is not running.
pub trait RegionOpener: Send {
    type Region: SharedRegion;

    fn open(&mut self) -> Result<Self::Region>;
}

#[cfg(windows)]
pub use crate::windows::SharedMemoryOpener as SystemOpener;

#[cfg(not(windows))]
pub use unsupported::SystemOpener;

#[cfg(not(windows))]
mod unsupported {
    use super::*;
    use crate::TelemetryError;

    /// Live telemetry is published through Windows shared memory only.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct SystemOpener;

    /// Region type that can never be constructed off Windows.
    #[derive(Debug)]
    pub enum NoRegion {}

    impl SharedRegion for NoRegion {
        fn len(&self) -> usize {
            match *self {}
        }

        fn read_i32(&self, _offset: usize) -> Result<i32> {
            match *self {}
        }

        fn copy_to(&self, _offset: usize, _target: &mut [u8]) -> Result<()> {
            match *self {}
        }

        fn wait(&self, _timeout: Duration) -> Result<WaitResult> {
            match *self {}
        }
    }

    impl RegionOpener for SystemOpener {
        type Region = NoRegion;

        fn open(&mut self) -> Result<NoRegion> {
            Err(TelemetryError::unsupported_platform("Live telemetry", "Windows"))
        }
    }
}
