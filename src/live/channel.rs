//! Live channel state machine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::region::{RegionOpener, SharedRegion, SystemOpener, WaitResult};
use crate::accessor::TelemetrySource;
use crate::config::LiveConfig;
use crate::schema::{TelemetryHeader, VarBuf, parse_catalog};
use crate::{Catalog, FramePacket, Generation, Result, SampleBuffer, TelemetryError, yaml_utils};

/// Lifecycle of a live channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Closed,
    Opening,
    Attached,
}

/// Outcome of [`LiveChannel::wait_for_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameResult {
    /// A new, consistent sample is in the buffer
    Fresh { tick: i32 },
    /// The simulator is not running or not publishing
    Unavailable,
    /// Every copy attempt was torn by a concurrent write
    Inconsistent,
    /// The tick counter went backwards; the channel closed and will re-open
    Disconnected,
    /// No new sample arrived within the timeout
    Timeout,
}

impl FrameResult {
    pub fn is_fresh(&self) -> bool {
        matches!(self, FrameResult::Fresh { .. })
    }
}

/// Reader of the simulator's shared-memory telemetry.
///
/// One reader thread per channel. The writer never waits for readers: a reader
/// copies the newest slot, re-reads that slot's tick, and retries when the tick
/// moved during the copy.
pub struct LiveChannel<O: RegionOpener = SystemOpener> {
    opener: O,
    config: LiveConfig,
    region: Option<O::Region>,
    state: ChannelState,
    catalog: Arc<Catalog>,
    sample: SampleBuffer,
    generation: Generation,
    tick_rate: i32,
    last_seen: Option<i32>,
    last_fresh: Option<Instant>,
    status_connected: bool,
    layout_stale: bool,
    frames: usize,
}

impl LiveChannel<SystemOpener> {
    /// Channel over the simulator's well-known shared memory objects.
    pub fn new(config: LiveConfig) -> Self {
        Self::with_opener(SystemOpener::default(), config)
    }
}

impl<O: RegionOpener> LiveChannel<O> {
    pub fn with_opener(opener: O, config: LiveConfig) -> Self {
        Self {
            opener,
            config,
            region: None,
            state: ChannelState::Closed,
            catalog: Arc::new(Catalog::default()),
            sample: SampleBuffer::default(),
            generation: Generation::NONE,
            tick_rate: 0,
            last_seen: None,
            last_fresh: None,
            status_connected: false,
            layout_stale: false,
            frames: 0,
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Attach to the shared region: validate the header, parse the catalog and size
    /// the sample buffer. Fails with `Unavailable` while the simulator is not running.
    pub fn open(&mut self) -> Result<()> {
        if self.state == ChannelState::Attached {
            return Ok(());
        }
        self.state = ChannelState::Opening;
        match self.attach() {
            Ok(()) => Ok(()),
            Err(e) => {
                self.reset();
                Err(e)
            }
        }
    }

    fn attach(&mut self) -> Result<()> {
        let region = self.opener.open()?;
        let (header, catalog) = read_layout(&region)?;
        self.install_layout(&header, catalog);
        self.region = Some(region);
        self.state = ChannelState::Attached;

        info!(
            variables = self.catalog.len(),
            sample_len = header.sample_len(),
            tick_rate = header.tick_rate,
            buffers = header.num_buf,
            generation = self.generation.get(),
            "Attached to live telemetry"
        );
        Ok(())
    }

    /// Adopt a freshly read header and catalog under a new generation.
    fn install_layout(&mut self, header: &TelemetryHeader, catalog: Catalog) {
        self.sample.reset(header.sample_len());
        self.catalog = Arc::new(catalog);
        self.generation = Generation::next();
        self.tick_rate = header.tick_rate;
        self.status_connected = header.is_connected();
        self.layout_stale = false;
        self.last_seen = None;
        self.last_fresh = None;
        self.frames = 0;
    }

    /// Re-read the layout after the simulator stopped publishing.
    ///
    /// A new session may reuse the mapping with a different variable table, so the
    /// catalog is parsed again and the generation bumped. `false` while the status
    /// still reports not connected.
    fn reload_layout(&mut self) -> Result<bool> {
        let Some(region) = self.region.as_ref() else {
            return Ok(false);
        };
        let header = read_header(region)?;
        if !header.is_connected() {
            return Ok(false);
        }
        let (header, catalog) = read_layout(region)?;
        let previous = self.generation;
        self.install_layout(&header, catalog);
        info!(
            variables = self.catalog.len(),
            previous = previous.get(),
            generation = self.generation.get(),
            "Simulator publishing again; layout reloaded"
        );
        Ok(true)
    }

    /// Release the region and return to `Closed`.
    pub fn close(&mut self) {
        if self.state != ChannelState::Closed {
            debug!(generation = self.generation.get(), "Closing live channel");
        }
        self.reset();
    }

    fn reset(&mut self) {
        self.region = None;
        self.state = ChannelState::Closed;
        self.last_seen = None;
        self.last_fresh = None;
        self.status_connected = false;
        self.layout_stale = false;
    }

    /// Wait up to `timeout` for a new consistent sample.
    ///
    /// Opens the channel first when closed. A missing simulator is reported as
    /// [`FrameResult::Unavailable`], not as an error.
    pub fn wait_for_frame(&mut self, timeout: Duration) -> Result<FrameResult> {
        if self.state != ChannelState::Attached {
            match self.open() {
                Ok(()) => {}
                Err(TelemetryError::Unavailable { reason }) => {
                    trace!(%reason, "Live telemetry unavailable");
                    return Ok(FrameResult::Unavailable);
                }
                Err(e) => return Err(e),
            }
        }
        match self.poll(timeout) {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(error = %e, "Live channel read failed; closing");
                self.close();
                Err(e)
            }
        }
    }

    fn poll(&mut self, timeout: Duration) -> Result<FrameResult> {
        if self.layout_stale && !self.reload_layout()? {
            trace!("Simulator attached but not publishing");
            return Ok(FrameResult::Unavailable);
        }
        let Some(region) = self.region.as_ref() else {
            return Ok(FrameResult::Unavailable);
        };
        let max_attempts = self.config.torn_read_attempts.max(1);
        let mut attempts = 0;
        let mut waited = false;

        loop {
            let header = read_header(region)?;
            self.status_connected = header.is_connected();
            if !self.status_connected {
                if self.last_seen.take().is_some() {
                    debug!("Simulator stopped publishing; layout will be re-read");
                }
                trace!("Simulator attached but not publishing");
                self.layout_stale = true;
                return Ok(FrameResult::Unavailable);
            }
            let Some(slot) = header.latest_buf() else {
                return Ok(FrameResult::Unavailable);
            };
            let latest = header.var_buf[slot];

            match self.last_seen {
                Some(last) if latest.tick_count < last => {
                    warn!(last, tick = latest.tick_count, "Tick counter went backwards; simulator restarted");
                    self.close();
                    return Ok(FrameResult::Disconnected);
                }
                Some(last) if latest.tick_count == last => {
                    if waited {
                        return Ok(FrameResult::Timeout);
                    }
                    waited = true;
                    match region.wait(timeout)? {
                        WaitResult::Signaled => continue,
                        WaitResult::Timeout => {
                            trace!(?timeout, "No new frame before timeout");
                            return Ok(FrameResult::Timeout);
                        }
                    }
                }
                _ => {}
            }

            let offset = usize::try_from(latest.buf_offset).map_err(|_| {
                TelemetryError::malformed("live buffer", format!("slot {slot} offset {}", latest.buf_offset))
            })?;
            if self.sample.len() != header.sample_len() {
                return Err(TelemetryError::malformed(
                    "live buffer",
                    format!("sample length changed from {} to {}", self.sample.len(), header.sample_len()),
                ));
            }
            region.copy_to(offset, self.sample.as_mut_bytes())?;
            let tick_after = region.read_i32(VarBuf::tick_field_offset(slot))?;

            attempts += 1;
            if tick_after != latest.tick_count {
                debug!(attempt = attempts, before = latest.tick_count, after = tick_after, "Torn read");
                if attempts >= max_attempts {
                    warn!(attempts, "Frame torn on every attempt");
                    return Ok(FrameResult::Inconsistent);
                }
                continue;
            }

            self.last_seen = Some(latest.tick_count);
            self.last_fresh = Some(Instant::now());
            self.frames += 1;
            trace!(tick = latest.tick_count, slot, "Fresh frame");
            return Ok(FrameResult::Fresh { tick: latest.tick_count });
        }
    }

    /// Attached, publishing, and fresh data seen within the connection timeout.
    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Attached
            && self.status_connected
            && self.last_fresh.is_some_and(|at| at.elapsed() <= self.config.connection_timeout)
    }

    /// Session text currently published, cut at its terminator.
    pub fn session_info_text(&self) -> Result<Option<String>> {
        let Some(region) = self.region.as_ref() else {
            return Ok(None);
        };
        let header = read_header(region)?;
        let range = header.session_info_range();
        if range.is_empty() {
            return Ok(None);
        }
        let mut bytes = vec![0u8; range.len()];
        region.copy_to(range.start, &mut bytes)?;
        Ok(Some(yaml_utils::text_until_nul(&bytes)))
    }

    /// Session-info update counter, bumped by the simulator whenever the text changes.
    pub fn session_info_update(&self) -> Result<Option<i32>> {
        self.region.as_ref().map(|region| read_header(region).map(|h| h.session_info_update)).transpose()
    }

    /// Tick of the last fresh frame.
    pub fn last_tick(&self) -> Option<i32> {
        self.last_seen
    }

    /// Fresh frames delivered since attaching.
    pub fn frame_count(&self) -> usize {
        self.frames
    }

    pub fn tick_rate(&self) -> f64 {
        if self.tick_rate > 0 { self.tick_rate as f64 } else { 60.0 }
    }

    pub fn catalog_arc(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Owned snapshot of the current sample.
    pub fn packet(&self, session_version: i32) -> FramePacket {
        FramePacket::new(
            self.sample.as_bytes().to_vec(),
            self.frames,
            self.last_seen.unwrap_or(0),
            session_version,
            self.generation,
            Arc::clone(&self.catalog),
        )
    }
}

impl<O: RegionOpener> TelemetrySource for LiveChannel<O> {
    fn generation(&self) -> Generation {
        self.generation
    }

    fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn sample(&self) -> &[u8] {
        self.sample.as_bytes()
    }
}

impl<O: RegionOpener> std::fmt::Debug for LiveChannel<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveChannel")
            .field("state", &self.state)
            .field("generation", &self.generation)
            .field("variables", &self.catalog.len())
            .field("last_seen", &self.last_seen)
            .field("frames", &self.frames)
            .finish()
    }
}

/// Header plus the catalog its variable table describes.
fn read_layout<R: SharedRegion>(region: &R) -> Result<(TelemetryHeader, Catalog)> {
    let header = read_header(region)?;
    let var_range = header.var_table_range();
    let mut var_bytes = vec![0u8; var_range.len()];
    region.copy_to(var_range.start, &mut var_bytes)?;
    let catalog = parse_catalog(&var_bytes, header.var_count(), header.sample_len())?;
    Ok((header, catalog))
}

fn read_header<R: SharedRegion>(region: &R) -> Result<TelemetryHeader> {
    let mut bytes = [0u8; TelemetryHeader::LEN];
    region.copy_to(0, &mut bytes)?;
    TelemetryHeader::parse(&bytes)
}
