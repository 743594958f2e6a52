//! `Stream` views of a running [`Driver`](crate::driver::Driver).
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use futures::StreamExt;
//! use irtelemetry::config::PlaybackOptions;
//! use irtelemetry::driver::Driver;
//! use irtelemetry::providers::DiskPlayback;
//! use irtelemetry::stream::{ThrottleExt, frames};
//!
//! # async fn run() -> irtelemetry::Result<()> {
//! let playback = DiskPlayback::open("session.ibt", PlaybackOptions::default())?;
//! let driver = Driver::spawn(playback);
//! let mut updates = Box::pin(frames(driver.frames.clone()).throttle(Duration::from_millis(100)));
//! while let Some(frame) = updates.next().await {
//!     println!("tick {}", frame.tick);
//! }
//! # Ok(())
//! # }
//! ```

mod throttle;

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use crate::driver::{FrameReceiver, SessionReceiver, SessionSnapshot};
use crate::types::FramePacket;

pub use throttle::{Throttle, ThrottleExt};

/// Frames published by the driver, starting with the current one if any.
///
/// Latest-wins: a consumer slower than the provider skips frames. The stream ends
/// when the driver stops.
pub fn frames(rx: FrameReceiver) -> impl Stream<Item = Arc<FramePacket>> + Send + 'static {
    WatchStream::new(rx).filter_map(|frame| async move { frame })
}

/// Session snapshots published by the driver, starting with the current one if any.
pub fn sessions(rx: SessionReceiver) -> impl Stream<Item = Arc<SessionSnapshot>> + Send + 'static {
    WatchStream::new(rx).filter_map(|session| async move { session })
}
