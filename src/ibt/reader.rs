//! Disk channel over a recorded `.ibt` file.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use irtelemetry::{DiskChannel, VariableHandle};
//!
//! fn average_speed() -> irtelemetry::Result<f64> {
//!     let mut disk = DiskChannel::open("session.ibt")?;
//!     let mut speed = VariableHandle::new("Speed");
//!
//!     let mut total = 0.0;
//!     while disk.next()? {
//!         total += speed.get_f64(&disk, 0);
//!     }
//!     Ok(total / disk.sample_count().max(1) as f64)
//! }
//! ```
//!
//! ## Cursor model
//!
//! `current_index()` is the record held in the sample buffer and `position()` is the
//! record the next call to [`DiskChannel::next`] loads. A fresh channel has loaded
//! nothing: `position() == 0` and the buffer is zeroed.
//!
//! The whole file is read into memory when the channel opens; `next` and `seek` copy
//! one record into the sample buffer and never touch the file again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use super::format::{DiskSubHeader, SampleLayout, is_valid_tick};
use super::overrides::{RecordingFiles, SessionOverrides};
use crate::accessor::TelemetrySource;
use crate::processor::SequentialSource;
use crate::schema::{TelemetryHeader, parse_catalog};
use crate::types::read_value;
use crate::{Catalog, FramePacket, Generation, Result, SampleBuffer, TelemetryError, yaml_utils};

const SESSION_TICK: &str = "SessionTick";
const SESSION_TIME: &str = "SessionTime";
const SESSION_NUM: &str = "SessionNum";
const SESSION_TIME_REMAIN: &str = "SessionTimeRemain";

/// Random-access reader over the sample records of one recording.
///
/// Single-threaded by contract: `next` and `seek` mutate the cursor and the sample
/// buffer. Use one channel per worker.
#[derive(Debug)]
pub struct DiskChannel {
    data: Vec<u8>,
    path: PathBuf,
    header: TelemetryHeader,
    sub_header: DiskSubHeader,
    layout: SampleLayout,
    catalog: Arc<Catalog>,
    sample: SampleBuffer,
    session_info: String,
    overrides: SessionOverrides,
    generation: Generation,
    current_index: usize,
    position: usize,
    first_valid_index: usize,
    session_tick_offset: i32,
    session_tick_var: Option<usize>,
    session_time_var: Option<usize>,
}

impl DiskChannel {
    /// Open a recording.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| TelemetryError::file_error(path, e))?;
        info!(path = %path.display(), bytes = data.len(), "Opening disk recording");
        Self::from_bytes_with_path(data, path.to_path_buf())
    }

    /// Open a race recording directory: its `.ibt` file plus any `session-info*`
    /// snapshots, which then take precedence over the embedded session text.
    pub fn open_recording<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let files = RecordingFiles::discover(dir.as_ref())?;
        let mut channel = Self::open(&files.ibt)?;
        if let Some(session_dir) = files.session_info_dir {
            channel.overrides = SessionOverrides::load_dir(&session_dir)?;
        }
        Ok(channel)
    }

    /// Build a channel over an in-memory recording.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_bytes_with_path(data, PathBuf::from("<memory>"))
    }

    fn from_bytes_with_path(data: Vec<u8>, path: PathBuf) -> Result<Self> {
        let header = TelemetryHeader::parse(&data)?;
        let sub_header = DiskSubHeader::parse(&data)?;

        let var_range = header.var_table_range();
        let var_bytes = data
            .get(var_range.clone())
            .ok_or_else(|| TelemetryError::truncated("variable table", var_range.end, data.len()))?;
        let catalog = parse_catalog(var_bytes, header.var_count(), header.sample_len())?;

        let info_range = header.session_info_range();
        let info_bytes = data
            .get(info_range.clone())
            .ok_or_else(|| TelemetryError::truncated("session info", info_range.end, data.len()))?;
        let session_info = yaml_utils::text_until_nul(info_bytes);

        let layout = SampleLayout::resolve(&header, &sub_header, data.len())?;

        let mut channel = Self {
            session_tick_var: catalog.index_of(SESSION_TICK),
            session_time_var: catalog.index_of(SESSION_TIME),
            sample: SampleBuffer::new(layout.stride),
            catalog: Arc::new(catalog),
            data,
            path,
            header,
            sub_header,
            layout,
            session_info,
            overrides: SessionOverrides::default(),
            generation: Generation::next(),
            current_index: 0,
            position: 0,
            first_valid_index: 0,
            session_tick_offset: 0,
        };
        channel.locate_first_valid_tick();

        info!(
            path = %channel.path.display(),
            variables = channel.catalog.len(),
            samples = channel.layout.count,
            stride = channel.layout.stride,
            first_valid = channel.first_valid_index,
            tick_offset = channel.session_tick_offset,
            generation = channel.generation.get(),
            "Disk channel open"
        );
        Ok(channel)
    }

    /// Find the first record with a usable `SessionTick` and derive the tick of record 0.
    fn locate_first_valid_tick(&mut self) {
        let Some(var) = self.session_tick_var else {
            debug!("Recording has no SessionTick; tick offset is 0");
            return;
        };
        let found = (0..self.layout.count).find_map(|index| {
            let tick = self.record_value(index, var)?.as_i32();
            is_valid_tick(tick).then_some((index, tick))
        });
        match found {
            Some((index, tick)) => {
                self.first_valid_index = index;
                self.session_tick_offset = tick.wrapping_sub(index as i32);
                if index > 0 {
                    debug!(index, tick, "Skipped records without a valid SessionTick");
                }
            }
            None => warn!(path = %self.path.display(), "No record carries a valid SessionTick"),
        }
    }

    fn record(&self, index: usize) -> Option<&[u8]> {
        self.data.get(self.layout.record_range(index)?)
    }

    fn record_value(&self, index: usize, var: usize) -> Option<crate::Value> {
        read_value(self.record(index)?, self.catalog.descriptor_at(var)?, 0)
    }

    fn load(&mut self, index: usize) -> Result<()> {
        let range = self.layout.record_range(index).ok_or_else(|| {
            TelemetryError::malformed("sample seek", format!("record {index} outside 0..{}", self.layout.count))
        })?;
        let bytes = self
            .data
            .get(range.clone())
            .ok_or_else(|| TelemetryError::truncated("sample record", range.end, self.data.len()))?;
        self.sample.as_mut_bytes().copy_from_slice(bytes);
        self.current_index = index;
        trace!(index, "Loaded sample record");
        Ok(())
    }

    /// Load the record at `position()` and advance. Returns `false` at end of data,
    /// leaving the cursor and buffer unchanged.
    pub fn next(&mut self) -> Result<bool> {
        if !self.has_next() {
            return Ok(false);
        }
        self.load(self.position)?;
        self.position += 1;
        Ok(true)
    }

    /// Whether another record is available to [`DiskChannel::next`].
    pub fn has_next(&self) -> bool {
        self.position < self.layout.count
    }

    /// Load record `index`. Returns `false` without moving when `index` is out of
    /// range. Seeking to the same index twice yields identical buffers.
    pub fn seek(&mut self, index: usize) -> Result<bool> {
        if index >= self.layout.count {
            debug!(index, samples = self.layout.count, "Seek outside recording");
            return Ok(false);
        }
        self.load(index)?;
        self.position = index + 1;
        debug!(index, tick = self.tick(), "Seeked");
        Ok(true)
    }

    /// Seek to the first record carrying a valid `SessionTick`.
    pub fn seek_to_first_valid(&mut self) -> Result<bool> {
        self.seek(self.first_valid_index)
    }

    /// Seek to the start of session `session_num`.
    ///
    /// Scans forward from the current record for the first record whose `SessionNum`
    /// matches and whose `SessionTimeRemain` is positive. Returns `false` when the
    /// recording lacks those variables or no record matches.
    pub fn seek_to_session_num(&mut self, session_num: i32) -> Result<bool> {
        let (Some(num_var), Some(remain_var)) =
            (self.catalog.index_of(SESSION_NUM), self.catalog.index_of(SESSION_TIME_REMAIN))
        else {
            debug!("Recording lacks SessionNum or SessionTimeRemain");
            return Ok(false);
        };

        let found = (self.current_index..self.layout.count).find(|&index| {
            let num = self.record_value(index, num_var).map(|v| v.as_i32());
            let remain = self.record_value(index, remain_var).map(|v| v.as_f64());
            num == Some(session_num) && remain.is_some_and(|r| r > 0.0)
        });

        match found {
            Some(index) => self.seek(index),
            None => {
                debug!(session_num, "Session not found in remaining records");
                Ok(false)
            }
        }
    }

    /// Copy the current record into `target`, which must be exactly one stride long.
    pub fn copy_sample_into(&self, target: &mut [u8]) -> Result<()> {
        if target.len() != self.layout.stride {
            return Err(TelemetryError::truncated("sample copy target", self.layout.stride, target.len()));
        }
        target.copy_from_slice(self.sample.as_bytes());
        Ok(())
    }

    /// Owned snapshot of the current record.
    pub fn packet(&self) -> FramePacket {
        FramePacket::new(
            self.sample.as_bytes().to_vec(),
            self.current_index,
            self.tick(),
            self.session_info_version(),
            self.generation,
            Arc::clone(&self.catalog),
        )
    }

    /// Session text in effect for the current record.
    ///
    /// With race-recording snapshots loaded, the snapshot chosen by the current
    /// record's `SessionTick`; otherwise the text embedded in the file.
    pub fn session_info_text(&self) -> &str {
        self.current_override()
            .and_then(|index| self.overrides.get(index))
            .map_or(self.session_info.as_str(), |o| o.text.as_str())
    }

    /// Changes whenever [`DiskChannel::session_info_text`] would return different text.
    pub fn session_info_version(&self) -> i32 {
        let base = self.header.session_info_update;
        match self.current_override() {
            Some(index) => base.wrapping_add(index as i32 + 1),
            None => base,
        }
    }

    fn current_override(&self) -> Option<usize> {
        if self.overrides.is_empty() {
            return None;
        }
        let tick = self
            .session_tick_var
            .and_then(|var| read_value(self.sample.as_bytes(), self.catalog.descriptor_at(var)?, 0))
            .map(|v| v.as_i32())
            .filter(|tick| is_valid_tick(*tick))
            .unwrap_or_else(|| self.tick());
        self.overrides.index_for_tick(tick)
    }

    /// Text embedded in the recording, ignoring snapshots.
    pub fn embedded_session_info(&self) -> &str {
        &self.session_info
    }

    pub fn overrides(&self) -> &SessionOverrides {
        &self.overrides
    }

    /// Tick of the current record.
    pub fn tick(&self) -> i32 {
        self.tick_at(self.current_index)
    }

    /// Tick of record `index`: `session_tick_offset() + index`.
    pub fn tick_at(&self, index: usize) -> i32 {
        self.session_tick_offset.wrapping_add(index as i32)
    }

    pub fn session_tick_offset(&self) -> i32 {
        self.session_tick_offset
    }

    /// Tick one past the last record.
    pub fn session_tick_count(&self) -> i32 {
        self.tick_at(self.layout.count)
    }

    pub fn first_valid_index(&self) -> usize {
        self.first_valid_index
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn sample_count(&self) -> usize {
        self.layout.count
    }

    /// Bytes per record.
    pub fn sample_len(&self) -> usize {
        self.layout.stride
    }

    /// Recording frequency, or 60 Hz when the header does not say.
    pub fn tick_rate(&self) -> f64 {
        if self.header.tick_rate > 0 { self.header.tick_rate as f64 } else { 60.0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &TelemetryHeader {
        &self.header
    }

    pub fn sub_header(&self) -> &DiskSubHeader {
        &self.sub_header
    }

    pub fn catalog_arc(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn sample_buffer(&self) -> &SampleBuffer {
        &self.sample
    }
}

impl TelemetrySource for DiskChannel {
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

impl SequentialSource for DiskChannel {
    fn advance(&mut self) -> Result<bool> {
        self.next()
    }

    fn current_index(&self) -> usize {
        self.current_index
    }

    fn sample_count(&self) -> usize {
        self.layout.count
    }

    fn session_time_seconds(&self) -> Option<f64> {
        let descriptor = self.catalog.descriptor_at(self.session_time_var?)?;
        read_value(self.sample.as_bytes(), descriptor, 0).map(|v| v.as_f64())
    }
}
