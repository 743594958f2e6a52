//! Async frame sources.

use crate::Result;
use crate::types::FramePacket;

/// A telemetry source the [`Driver`](crate::driver::Driver) can pull frames from.
///
/// Providers pace themselves: a live provider waits for the simulator, a disk
/// provider sleeps to reproduce the recorded timing.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Next frame.
    ///
    /// - `Ok(Some(packet))`: a new frame
    /// - `Ok(None)`: the source ended normally
    /// - `Err(e)`: a read failed; the caller may retry
    async fn next_frame(&mut self) -> Result<Option<FramePacket>>;

    /// Raw session text for a frame's `session_version`, or `None` when the source
    /// has none.
    async fn session_info(&mut self, version: i32) -> Result<Option<String>>;

    /// Native frame rate in Hz.
    fn tick_rate(&self) -> f64;
}
