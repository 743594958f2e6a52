//! Disk recording playback

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, trace};

use crate::config::PlaybackOptions;
use crate::processor::SequentialSource;
use crate::provider::Provider;
use crate::types::FramePacket;
use crate::{DiskChannel, Result};

/// Longest pause between two frames; larger `SessionTime` gaps are skipped over.
const MAX_FRAME_GAP: Duration = Duration::from_secs(1);

/// Plays a [`DiskChannel`] back as a frame source.
///
/// In real-time mode frames are spaced by the difference of their recorded
/// `SessionTime`, divided by the playback speed. Recordings without `SessionTime`
/// fall back to the header's tick rate.
#[derive(Debug)]
pub struct DiskPlayback {
    channel: DiskChannel,
    options: PlaybackOptions,
    last_session_time: Option<f64>,
    deliver_loaded: bool,
    frames: u64,
}

impl DiskPlayback {
    pub fn new(channel: DiskChannel, options: PlaybackOptions) -> Self {
        info!(
            path = %channel.path().display(),
            samples = channel.sample_count(),
            speed = options.speed(),
            realtime = options.realtime,
            looping = options.loop_at_end,
            "Disk playback ready"
        );
        Self { channel, options, last_session_time: None, deliver_loaded: false, frames: 0 }
    }

    /// Open a recording file or race-recording directory.
    pub fn open<P: AsRef<Path>>(path: P, options: PlaybackOptions) -> Result<Self> {
        Ok(Self::new(crate::Telemetry::open(path)?, options))
    }

    pub fn channel(&self) -> &DiskChannel {
        &self.channel
    }

    pub fn options(&self) -> &PlaybackOptions {
        &self.options
    }

    /// Frames delivered so far, across loops.
    pub fn frames_played(&self) -> u64 {
        self.frames
    }

    /// Make `index` the next frame delivered. `false` when out of range.
    pub fn seek(&mut self, index: usize) -> Result<bool> {
        if !self.channel.seek(index)? {
            return Ok(false);
        }
        self.deliver_loaded = true;
        self.last_session_time = None;
        Ok(true)
    }

    /// Load the next record, looping when configured. `false` at end of data.
    fn advance(&mut self) -> Result<bool> {
        if std::mem::take(&mut self.deliver_loaded) {
            return Ok(true);
        }
        if self.channel.advance()? {
            return Ok(true);
        }
        if !self.options.loop_at_end || self.channel.sample_count() == 0 {
            return Ok(false);
        }
        debug!(frames = self.frames, "End of recording; looping");
        self.last_session_time = None;
        self.channel.seek_to_first_valid()
    }

    /// Time to wait before delivering the loaded record.
    fn frame_delay(&mut self) -> Duration {
        let session_time = self.channel.session_time_seconds();
        let previous = std::mem::replace(&mut self.last_session_time, session_time);

        let seconds = match (session_time, previous) {
            (None, _) if self.frames > 0 => 1.0 / self.channel.tick_rate(),
            (Some(current), Some(previous)) if current > previous => current - previous,
            // First frame, session boundary or rewind
            _ => 0.0,
        };
        Duration::try_from_secs_f64(seconds / self.options.speed()).unwrap_or_default().min(MAX_FRAME_GAP)
    }
}

#[async_trait::async_trait]
impl Provider for DiskPlayback {
    async fn next_frame(&mut self) -> Result<Option<FramePacket>> {
        if !self.advance()? {
            info!(frames = self.frames, "Playback finished");
            return Ok(None);
        }

        let delay = if self.options.realtime { self.frame_delay() } else { Duration::ZERO };
        if delay.is_zero() {
            // Never waits here; give other tasks a turn
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        self.frames += 1;
        let packet = self.channel.packet();
        trace!(index = packet.index, tick = packet.tick, "Playback frame");
        Ok(Some(packet))
    }

    async fn session_info(&mut self, _version: i32) -> Result<Option<String>> {
        let text = self.channel.session_info_text();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    fn tick_rate(&self) -> f64 {
        self.channel.tick_rate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{IbtFixtureBuilder, SESSION_YAML, lap_recording};
    use crate::VariableType;
    use tokio::time::Instant;

    fn playback(laps: usize, options: PlaybackOptions) -> DiskPlayback {
        let channel = DiskChannel::from_bytes(lap_recording(laps, 1000).build()).unwrap();
        DiskPlayback::new(channel, options)
    }

    #[tokio::test]
    async fn unpaced_playback_delivers_every_frame() {
        let mut playback = playback(1, PlaybackOptions::unpaced());
        let mut indices = Vec::new();
        while let Some(packet) = playback.next_frame().await.unwrap() {
            indices.push(packet.index);
        }
        assert_eq!(indices, (0..60).collect::<Vec<_>>());
        assert_eq!(playback.frames_played(), 60);
        assert!(playback.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn packets_carry_tick_and_generation() {
        let mut playback = playback(1, PlaybackOptions::unpaced());
        let packet = playback.next_frame().await.unwrap().unwrap();
        assert_eq!(packet.tick, 1000);
        assert_eq!(packet.generation, crate::accessor::TelemetrySource::generation(playback.channel()));
        assert_eq!(packet.data.len(), playback.channel().sample_len());
    }

    #[tokio::test]
    async fn looping_restarts_at_first_valid_sample() {
        let mut playback = playback(1, PlaybackOptions::unpaced().loop_at_end(true));
        let mut indices = Vec::new();
        for _ in 0..62 {
            indices.push(playback.next_frame().await.unwrap().unwrap().index);
        }
        assert_eq!(&indices[58..], &[58, 59, 0, 1]);
    }

    #[tokio::test]
    async fn seek_sets_next_frame() {
        let mut playback = playback(1, PlaybackOptions::unpaced());
        assert!(playback.seek(10).unwrap());
        assert_eq!(playback.next_frame().await.unwrap().unwrap().index, 10);
        assert_eq!(playback.next_frame().await.unwrap().unwrap().index, 11);
        assert!(!playback.seek(60).unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn realtime_playback_follows_session_time() {
        let mut playback = playback(1, PlaybackOptions::default());
        playback.next_frame().await.unwrap();

        let start = Instant::now();
        for _ in 0..30 {
            playback.next_frame().await.unwrap();
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(495), "elapsed {elapsed:?}");
        // the timer rounds each sleep up to whole milliseconds
        assert!(elapsed <= Duration::from_millis(530), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn speed_scales_frame_spacing() {
        let mut playback = playback(1, PlaybackOptions::default().with_speed(2.0));
        playback.next_frame().await.unwrap();

        let start = Instant::now();
        for _ in 0..30 {
            playback.next_frame().await.unwrap();
        }
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(245), "elapsed {elapsed:?}");
        assert!(elapsed <= Duration::from_millis(280), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn recordings_without_session_time_use_tick_rate() {
        let bytes = IbtFixtureBuilder::new()
            .variable("Speed", VariableType::Float32, 1)
            .tick_rate(10)
            .samples(3, |i, s| {
                s.set_f32("Speed", i as f32);
            })
            .build();
        let mut playback = DiskPlayback::new(DiskChannel::from_bytes(bytes).unwrap(), PlaybackOptions::default());

        let start = Instant::now();
        while playback.next_frame().await.unwrap().is_some() {}
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed <= Duration::from_millis(205), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn session_info_is_the_embedded_text() {
        let mut playback = playback(1, PlaybackOptions::unpaced());
        assert_eq!(playback.session_info(0).await.unwrap().as_deref(), Some(SESSION_YAML));
        assert_eq!(playback.tick_rate(), 60.0);
    }
}
