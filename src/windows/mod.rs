//! Simulator shared memory on Windows.
//!
//! The simulator publishes telemetry through a named file mapping and signals a
//! named event after every write. [`SharedMemoryOpener`] opens both read-only and
//! hands the live channel a [`SharedMemoryRegion`]:
//!
//! ```rust,ignore
//! use irtelemetry::live::{LiveChannel, SharedRegion};
//! use irtelemetry::windows::SharedMemoryOpener;
//!
//! let mut live = LiveChannel::with_opener(SharedMemoryOpener, Default::default());
//! live.open()?;
//! ```

mod connection;

pub use connection::{DATA_VALID_EVENT_NAME, MEMMAP_NAME, SharedMemoryOpener, SharedMemoryRegion};
