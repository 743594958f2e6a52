//! Telemetry access for iRacing: live shared memory and `.ibt` recordings.
//!
//! Both sources publish the same thing: a catalog of named, typed variables and a
//! fixed-size sample buffer that the catalog describes. This crate reads them
//! through one model.
//!
//! # Features
//!
//! - **Disk channel**: random access over the samples of a recording, on any platform
//! - **Live channel**: torn-read-safe copies from the simulator's shared memory (Windows)
//! - **Variable handles**: name lookups cached per channel generation, with typed getters
//! - **Session info**: path queries over the raw session text and a typed subset
//! - **Async feeds**: a tokio driver publishing frames from live or recorded sources
//!
//! # Quick Start
//!
//! ## Reading a recording
//!
//! ```rust,no_run
//! use irtelemetry::{DiskChannel, VariableHandle};
//!
//! let mut disk = DiskChannel::open("session.ibt")?;
//! let mut speed = VariableHandle::new("Speed");
//! let mut lap = VariableHandle::new("Lap");
//!
//! while disk.next()? {
//!     println!("lap {} speed {:.1}", lap.get_i32(&disk, 0), speed.get_f32(&disk, 0));
//! }
//! # Ok::<(), irtelemetry::TelemetryError>(())
//! ```
//!
//! ## Streaming frames
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use irtelemetry::{PlaybackOptions, Telemetry, VariableHandle};
//!
//! #[tokio::main]
//! async fn main() -> irtelemetry::Result<()> {
//!     let driver = Telemetry::replay("session.ibt", PlaybackOptions::default())?;
//!     let mut rpm = VariableHandle::new("RPM");
//!
//!     let mut frames = Box::pin(irtelemetry::stream::frames(driver.frames.clone()));
//!     while let Some(frame) = frames.next().await {
//!         println!("{}: {}", frame.tick, rpm.get_f32(frame.as_ref(), 0));
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod accessor;
pub mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;
pub mod yaml_utils;

// Channels
pub mod ibt;
pub mod live;
pub mod schema;
pub mod session;

// Composition
pub mod laps;
pub mod processor;
pub mod registry;

// Async feeds
pub mod driver;
pub mod provider;
pub mod providers;
pub mod stream;

// Platform-specific modules
#[cfg(windows)]
pub mod windows;

// Core exports
pub use accessor::{TelemetrySource, VariableHandle};
pub use config::{LiveConfig, PlaybackOptions, TelemetryConfig};
pub use error::*;
pub use types::*;

// Channel exports
pub use ibt::DiskChannel;
pub use live::{FrameResult, LiveChannel};
pub use session::SessionDocument;

// Composition exports
pub use processor::{FrameContext, FrameProcessor, SequentialSource};
pub use registry::{ClientId, ClientRegistry, LIVE_CLIENT_ID, RegistryError};

use driver::{Driver, DriverHandle};
use providers::{DiskPlayback, LiveFeed};

/// Entry points for the common setups.
pub struct Telemetry;

impl Telemetry {
    /// Open a recording synchronously.
    ///
    /// `path` may be an `.ibt` file or a race-recording directory holding one
    /// plus `session-info*` snapshots.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<DiskChannel> {
        let path = path.as_ref();
        if path.is_dir() { DiskChannel::open_recording(path) } else { DiskChannel::open(path) }
    }

    /// Play a recording back on the current tokio runtime.
    pub fn replay<P: AsRef<std::path::Path>>(path: P, options: PlaybackOptions) -> Result<DriverHandle> {
        let playback = DiskPlayback::open(path, options)?;
        Ok(Driver::spawn(playback))
    }

    /// Follow the live simulator on the current tokio runtime.
    ///
    /// The feed waits for the simulator to start. Off Windows every attach fails
    /// with `UnsupportedPlatform` and the driver stops after its error limit.
    pub fn connect(config: LiveConfig) -> DriverHandle {
        Driver::spawn(LiveFeed::new(config))
    }
}
