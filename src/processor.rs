//! Frame-driven processing of sequential sources.
//!
//! [`FrameProcessor`] walks a source from its current position to the end, hands
//! each frame to a callback together with a caller-owned accumulator, and stops
//! when the callback returns `false`. Every frame must carry a readable
//! `SessionTime`; a frame without one ends the run with
//! [`TelemetryError::SessionTimeMissing`].

use std::time::Duration;

use tracing::{debug, warn};

use crate::{Result, TelemetryError};

/// A source that yields frames one after another.
pub trait SequentialSource {
    /// Load the next frame. `Ok(false)` at end of data.
    fn advance(&mut self) -> Result<bool>;

    /// Index of the loaded frame.
    fn current_index(&self) -> usize;

    /// Total frames in the source.
    fn sample_count(&self) -> usize;

    /// `SessionTime` of the loaded frame, if the source publishes it.
    fn session_time_seconds(&self) -> Option<f64>;
}

/// Position and time of the frame handed to a callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub index: usize,
    pub count: usize,
    pub session_time_seconds: f64,
    pub session_time: Duration,
}

impl FrameContext {
    fn new(index: usize, count: usize, session_time_seconds: f64) -> Self {
        Self {
            index,
            count,
            session_time_seconds,
            session_time: Duration::try_from_secs_f64(session_time_seconds).unwrap_or_default(),
        }
    }
}

/// Drives one source to completion.
#[derive(Debug)]
pub struct FrameProcessor<'a, S: SequentialSource> {
    source: &'a mut S,
}

impl<'a, S: SequentialSource> FrameProcessor<'a, S> {
    pub fn new(source: &'a mut S) -> Self {
        Self { source }
    }

    /// Run `callback` on every remaining frame. Returns the number of frames handed
    /// to the callback, including the one on which it asked to stop.
    pub fn run<A, F>(&mut self, accumulator: &mut A, mut callback: F) -> Result<usize>
    where
        F: FnMut(&FrameContext, &mut A, &S) -> bool,
    {
        let count = self.source.sample_count();
        let mut frames = 0;

        while self.source.advance()? {
            let index = self.source.current_index();
            let seconds = match self.source.session_time_seconds() {
                Some(seconds) if seconds.is_finite() => seconds,
                _ => {
                    warn!(index, frames, "Frame without a readable SessionTime; stopping");
                    return Err(TelemetryError::SessionTimeMissing { index });
                }
            };

            let context = FrameContext::new(index, count, seconds);
            frames += 1;
            if !callback(&context, accumulator, &*self.source) {
                debug!(index, frames, "Processing stopped by callback");
                return Ok(frames);
            }
        }

        debug!(frames, count, "Processing reached end of data");
        Ok(frames)
    }
}
