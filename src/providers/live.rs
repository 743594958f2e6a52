//! Live simulator feed

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

use crate::config::LiveConfig;
use crate::live::{FrameResult, LiveChannel, RegionOpener, SystemOpener};
use crate::provider::Provider;
use crate::types::FramePacket;
use crate::{Result, TelemetryError};

/// Pause between attach attempts while the simulator is not running.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Consecutive torn frames after which the feed reports `Inconsistent`.
pub const MAX_TORN_FRAMES: u32 = 3;

/// Frame source over a [`LiveChannel`].
///
/// The channel's blocking wait runs on tokio's blocking pool; the feed never ends
/// on its own unless an idle limit is set, because live sessions come and go.
///
/// While attached, a simulator that stops delivering frames for the configured
/// connection timeout yields `Timeout`, and [`MAX_TORN_FRAMES`] torn frames in a
/// row yield `Inconsistent`. If the reader thread panics, that call fails with
/// `Disconnected` naming the panic and the feed ends.
pub struct LiveFeed<O: RegionOpener = SystemOpener> {
    channel: Option<LiveChannel<O>>,
    frame_timeout: Duration,
    stall_limit: Duration,
    torn_read_attempts: u32,
    retry_delay: Duration,
    idle_limit: Option<Duration>,
}

impl LiveFeed<SystemOpener> {
    pub fn new(config: LiveConfig) -> Self {
        Self::with_channel(LiveChannel::new(config))
    }
}

impl<O> LiveFeed<O>
where
    O: RegionOpener + 'static,
    O::Region: 'static,
{
    pub fn with_channel(channel: LiveChannel<O>) -> Self {
        let config = channel.config();
        Self {
            frame_timeout: config.frame_timeout,
            stall_limit: config.connection_timeout,
            torn_read_attempts: config.torn_read_attempts.max(1),
            channel: Some(channel),
            retry_delay: DEFAULT_RETRY_DELAY,
            idle_limit: None,
        }
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// End the feed after the simulator has been unavailable this long.
    pub fn idle_limit(mut self, limit: Duration) -> Self {
        self.idle_limit = Some(limit);
        self
    }

    pub fn channel(&self) -> Option<&LiveChannel<O>> {
        self.channel.as_ref()
    }

    /// Run one bounded wait on the blocking pool. `None` once the reader is gone.
    async fn wait(&mut self) -> Result<Option<FrameResult>> {
        let Some(mut channel) = self.channel.take() else {
            return Ok(None);
        };
        let timeout = self.frame_timeout;

        let joined = tokio::task::spawn_blocking(move || {
            let result = channel.wait_for_frame(timeout);
            (channel, result)
        })
        .await;

        match joined {
            Ok((channel, result)) => {
                self.channel = Some(channel);
                result.map(Some)
            }
            Err(e) => {
                let cause = if e.is_panic() { "panicked" } else { "was cancelled" };
                error!(error = %e, "Live reader thread {cause}; ending live feed");
                Err(TelemetryError::disconnected(format!("live reader thread {cause}: {e}")))
            }
        }
    }
}

#[async_trait::async_trait]
impl<O> Provider for LiveFeed<O>
where
    O: RegionOpener + 'static,
    O::Region: 'static,
{
    async fn next_frame(&mut self) -> Result<Option<FramePacket>> {
        let mut unavailable_since: Option<Instant> = None;
        let mut stalled_since: Option<Instant> = None;
        let mut torn = 0u32;

        loop {
            let Some(result) = self.wait().await? else {
                warn!("Live reader is gone; ending live feed");
                return Ok(None);
            };
            if !matches!(result, FrameResult::Timeout) {
                stalled_since = None;
            }
            if !matches!(result, FrameResult::Inconsistent) {
                torn = 0;
            }

            match result {
                FrameResult::Fresh { tick } => {
                    if unavailable_since.is_some() {
                        info!("Simulator detected, resuming telemetry");
                    }
                    let Some(channel) = self.channel.as_ref() else {
                        continue;
                    };
                    let version = channel.session_info_update()?.unwrap_or(0);
                    trace!(tick, version, "Live frame");
                    return Ok(Some(channel.packet(version)));
                }
                FrameResult::Unavailable => {
                    let since = *unavailable_since.get_or_insert_with(|| {
                        info!("Waiting for the simulator to publish telemetry");
                        Instant::now()
                    });
                    if let Some(limit) = self.idle_limit {
                        if since.elapsed() >= limit {
                            warn!(?limit, "Simulator unavailable for too long; ending live feed");
                            return Ok(None);
                        }
                    }
                    tokio::time::sleep(self.retry_delay).await;
                }
                FrameResult::Disconnected => {
                    info!("Simulator restarted; re-attaching");
                }
                FrameResult::Inconsistent => {
                    torn += 1;
                    debug!(torn, "Torn frame skipped");
                    if torn >= MAX_TORN_FRAMES {
                        return Err(TelemetryError::Inconsistent { attempts: torn * self.torn_read_attempts });
                    }
                }
                FrameResult::Timeout => {
                    let since = *stalled_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= self.stall_limit {
                        warn!(limit = ?self.stall_limit, "Simulator attached but no new frames");
                        return Err(TelemetryError::Timeout { duration: self.stall_limit });
                    }
                }
            }
        }
    }

    async fn session_info(&mut self, _version: i32) -> Result<Option<String>> {
        match self.channel.as_ref() {
            Some(channel) => channel.session_info_text(),
            None => Ok(None),
        }
    }

    fn tick_rate(&self) -> f64 {
        self.channel.as_ref().map_or(60.0, |c| c.tick_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accessor::TelemetrySource;
    use crate::test_utils::live::{ScriptedOpener, ScriptedRegion};
    use crate::VariableHandle;

    const SESSION: &str = "WeekendInfo:\n TrackName: lagunaseca\n";

    fn feed(opener: ScriptedOpener) -> LiveFeed<ScriptedOpener> {
        let config = LiveConfig::default().frame_timeout(Duration::from_millis(2));
        LiveFeed::with_channel(LiveChannel::with_opener(opener, config)).retry_delay(Duration::from_millis(1))
    }

    fn running_region() -> ScriptedRegion {
        let region = ScriptedRegion::new(SESSION);
        {
            let mut memory = region.memory();
            memory.publish(0, 40);
            memory.publish(1, 41);
        }
        region
    }

    #[tokio::test]
    async fn delivers_fresh_frames_as_packets() {
        let region = running_region();
        let mut feed = feed(ScriptedOpener::running(region.clone()));

        let packet = feed.next_frame().await.unwrap().unwrap();
        assert_eq!(packet.tick, 41);
        assert_eq!(packet.session_version, 1);
        let mut speed = VariableHandle::new("Speed");
        assert_eq!(speed.get_f32(&packet, 0), 41.0);

        region.on_wait(|memory| memory.publish(2, 42));
        let packet = feed.next_frame().await.unwrap().unwrap();
        assert_eq!(packet.tick, 42);
        assert_eq!(speed.get_f32(&packet, 0), 42.0);
    }

    #[tokio::test]
    async fn ends_after_idle_limit() {
        let mut feed = feed(ScriptedOpener::default()).idle_limit(Duration::from_millis(20));
        assert!(feed.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn waits_for_late_simulator() {
        let opener = ScriptedOpener::default();
        let mut feed = feed(opener.clone());

        let region = running_region();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            opener.install(Some(region));
        });

        let packet = feed.next_frame().await.unwrap().unwrap();
        assert_eq!(packet.tick, 41);
    }

    #[tokio::test]
    async fn restart_reattaches_with_new_generation() {
        let region = running_region();
        let mut feed = feed(ScriptedOpener::running(region.clone()));
        let first = feed.next_frame().await.unwrap().unwrap();

        region.on_wait(|memory| {
            memory.publish(0, 1);
            memory.publish(1, 2);
            memory.publish(2, 0);
        });
        let second = feed.next_frame().await.unwrap().unwrap();
        assert_eq!(second.tick, 2);
        assert_ne!(second.generation, first.generation);
        assert_eq!(feed.channel().map(|c| c.generation()), Some(second.generation));
    }

    #[tokio::test]
    async fn persistent_tearing_is_an_inconsistent_error() {
        let region = running_region();
        region.tear_next_copies(1000);
        let mut feed = feed(ScriptedOpener::running(region));

        let err = feed.next_frame().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Inconsistent { attempts } if attempts == MAX_TORN_FRAMES * 2));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn stalled_simulator_times_out() {
        let config = LiveConfig::default()
            .frame_timeout(Duration::from_millis(2))
            .connection_timeout(Duration::from_millis(10));
        let opener = ScriptedOpener::running(running_region());
        let mut feed = LiveFeed::with_channel(LiveChannel::with_opener(opener, config));

        assert_eq!(feed.next_frame().await.unwrap().unwrap().tick, 41);
        let err = feed.next_frame().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Timeout { duration } if duration == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn reader_panic_ends_the_feed() {
        let region = running_region();
        let mut feed = feed(ScriptedOpener::running(region.clone()));
        feed.next_frame().await.unwrap();

        region.on_wait(|_| panic!("writer crashed"));
        let err = feed.next_frame().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Disconnected { ref reason } if reason.contains("panicked")));
        assert!(feed.channel().is_none());
        assert!(feed.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn session_info_is_read_from_the_region() {
        let mut feed = feed(ScriptedOpener::running(running_region()));
        assert_eq!(feed.session_info(0).await.unwrap(), None);

        feed.next_frame().await.unwrap();
        assert_eq!(feed.session_info(1).await.unwrap().as_deref(), Some(SESSION));
        assert_eq!(feed.tick_rate(), 60.0);
    }
}
