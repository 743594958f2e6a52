//! Primary telemetry header.
//!
//! Layout (little-endian, 4-byte fields):
//!
//! ```text
//! offset  field
//!      0  ver                 SDK version, must be 2
//!      4  status              bit 0 set while the simulator publishes
//!      8  tickRate            ticks per second
//!     12  sessionInfoUpdate   bumped whenever the session text changes
//!     16  sessionInfoLen
//!     20  sessionInfoOffset
//!     24  numVars
//!     28  varHeaderOffset
//!     32  numBuf              rotating sample slots in use (<= 4)
//!     36  bufLen              bytes per sample
//!     40  pad[2]
//!     48  varBuf[4]           { tickCount, bufOffset, pad[2] } each
//! ```
//!
//! The significant part is 112 bytes. Disk recordings pad it to 144 bytes before the
//! disk sub-header.

use tracing::{debug, trace};

use super::{non_negative, read_i32_le};
use crate::{Result, TelemetryError};

/// Supported SDK version
pub const SDK_VERSION: i32 = 2;

/// Status bit set while the simulator is actively publishing
pub const STATUS_CONNECTED: i32 = 0x1;

/// Number of rotating sample slots described by the header
pub const MAX_BUFS: usize = 4;

const VAR_BUF_OFFSET: usize = 48;
const VAR_BUF_SIZE: usize = 16;

/// Upper bounds that indicate corruption rather than a real session
const MAX_REASONABLE_VARS: i32 = 10_000;
const MAX_REASONABLE_BUF_LEN: i32 = 100_000_000;

/// Descriptor of one rotating sample slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VarBuf {
    /// Tick of the sample last written to this slot
    pub tick_count: i32,
    /// Byte offset of the slot from the start of the header
    pub buf_offset: i32,
}

impl VarBuf {
    /// Byte offset of this slot's tick counter within the header.
    pub const fn tick_field_offset(slot: usize) -> usize {
        VAR_BUF_OFFSET + slot * VAR_BUF_SIZE
    }
}

/// Decoded primary header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHeader {
    pub version: i32,
    pub status: i32,
    pub tick_rate: i32,
    pub session_info_update: i32,
    pub session_info_len: i32,
    pub session_info_offset: i32,
    pub num_vars: i32,
    pub var_header_offset: i32,
    pub num_buf: i32,
    pub buf_len: i32,
    pub var_buf: [VarBuf; MAX_BUFS],
}

impl TelemetryHeader {
    /// Bytes needed to decode the header.
    pub const LEN: usize = VAR_BUF_OFFSET + MAX_BUFS * VAR_BUF_SIZE;

    /// Bytes the header occupies at the start of a disk recording.
    pub const DISK_LEN: usize = 144;

    /// Decode and validate a header from the first bytes of a mapping or file.
    pub fn parse(data: &[u8]) -> Result<Self> {
        trace!(available = data.len(), "Parsing telemetry header");
        if data.len() < Self::LEN {
            return Err(TelemetryError::truncated("telemetry header", Self::LEN, data.len()));
        }

        let context = "telemetry header";
        let mut var_buf = [VarBuf::default(); MAX_BUFS];
        for (slot, buf) in var_buf.iter_mut().enumerate() {
            let base = VarBuf::tick_field_offset(slot);
            buf.tick_count = read_i32_le(data, base, context)?;
            buf.buf_offset = read_i32_le(data, base + 4, context)?;
        }

        let header = Self {
            version: read_i32_le(data, 0, context)?,
            status: read_i32_le(data, 4, context)?,
            tick_rate: read_i32_le(data, 8, context)?,
            session_info_update: read_i32_le(data, 12, context)?,
            session_info_len: read_i32_le(data, 16, context)?,
            session_info_offset: read_i32_le(data, 20, context)?,
            num_vars: read_i32_le(data, 24, context)?,
            var_header_offset: read_i32_le(data, 28, context)?,
            num_buf: read_i32_le(data, 32, context)?,
            buf_len: read_i32_le(data, 36, context)?,
            var_buf,
        };

        debug!(
            version = header.version,
            tick_rate = header.tick_rate,
            num_vars = header.num_vars,
            num_buf = header.num_buf,
            buf_len = header.buf_len,
            "Parsed telemetry header"
        );

        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.version != SDK_VERSION {
            return Err(TelemetryError::Version { expected: SDK_VERSION, found: self.version });
        }

        let context = "telemetry header";
        non_negative(self.session_info_len, context, "session info length")?;
        non_negative(self.session_info_offset, context, "session info offset")?;
        non_negative(self.var_header_offset, context, "variable table offset")?;
        let num_vars = non_negative(self.num_vars, context, "variable count")?;
        let buf_len = non_negative(self.buf_len, context, "sample length")?;

        if !(0..=MAX_BUFS as i32).contains(&self.num_buf) {
            return Err(TelemetryError::malformed(
                context,
                format!("buffer count {} outside 0..={}", self.num_buf, MAX_BUFS),
            ));
        }
        if num_vars > MAX_REASONABLE_VARS as usize {
            return Err(TelemetryError::malformed(context, format!("{num_vars} variables")));
        }
        if buf_len > MAX_REASONABLE_BUF_LEN as usize {
            return Err(TelemetryError::malformed(context, format!("{buf_len} byte samples")));
        }
        Ok(())
    }

    /// Whether the simulator reports it is publishing.
    pub fn is_connected(&self) -> bool {
        self.status & STATUS_CONNECTED != 0
    }

    /// Slots in use, clamped to the descriptor array.
    pub fn active_bufs(&self) -> &[VarBuf] {
        let n = usize::try_from(self.num_buf).unwrap_or(0).min(MAX_BUFS);
        &self.var_buf[..n]
    }

    /// Index of the slot holding the highest tick. Ties keep the lowest slot.
    pub fn latest_buf(&self) -> Option<usize> {
        let bufs = self.active_bufs();
        let mut latest = None::<usize>;
        for (slot, buf) in bufs.iter().enumerate() {
            match latest {
                Some(best) if bufs[best].tick_count >= buf.tick_count => {}
                _ => latest = Some(slot),
            }
        }
        latest
    }

    pub fn sample_len(&self) -> usize {
        self.buf_len.max(0) as usize
    }

    pub fn var_count(&self) -> usize {
        self.num_vars.max(0) as usize
    }

    pub fn var_table_range(&self) -> std::ops::Range<usize> {
        let start = self.var_header_offset.max(0) as usize;
        start..start + self.var_count() * super::VAR_HEADER_SIZE
    }

    pub fn session_info_range(&self) -> std::ops::Range<usize> {
        let start = self.session_info_offset.max(0) as usize;
        start..start + self.session_info_len.max(0) as usize
    }
}
