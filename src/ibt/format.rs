//! IBT file layout.
//!
//! ## IBT File Structure
//!
//! 1. **Main Header** (144 bytes) - the shared [`TelemetryHeader`] padded for disk
//! 2. **Disk Sub-Header** (32 bytes) - start date, start/end time, lap and record counts
//! 3. **Variable Headers** - `numVars` records of 144 bytes
//! 4. **Session Info** - YAML text, `sessionInfoLen` bytes
//! 5. **Sample Records** - fixed-stride samples until end of file
//!
//! The order of sections 3 and 4 is given by their header offsets, not assumed.

use tracing::{debug, warn};

use crate::schema::{TelemetryHeader, read_f64_le, read_i32_le, read_i64_le};
use crate::{Result, TelemetryError};

/// Values the platform allocator writes into uninitialized or freed heap memory.
///
/// The first records of a recording can carry these in `SessionTick` before the
/// simulator has filled them.
pub const FILL_PATTERNS: [u32; 7] = [
    0xCDCD_CDCD,
    0xCCCC_CCCC,
    0xDDDD_DDDD,
    0xFEEE_FEEE,
    0xBAAD_F00D,
    0xABAB_ABAB,
    0xFDFD_FDFD,
];

/// Whether `tick` is a usable session tick: non-negative and not a fill pattern.
pub fn is_valid_tick(tick: i32) -> bool {
    tick >= 0 && !FILL_PATTERNS.contains(&(tick as u32))
}

/// IBT disk sub-header.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DiskSubHeader {
    /// Session start as a unix timestamp
    pub start_date: i64,
    /// Session time of the first record, seconds
    pub start_time: f64,
    /// Session time of the last record, seconds
    pub end_time: f64,
    /// Laps completed during the recording
    pub lap_count: i32,
    /// Records the simulator believes it wrote
    pub record_count: i32,
}

impl DiskSubHeader {
    pub const LEN: usize = 32;

    /// Decode the sub-header that follows the padded primary header.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let base = TelemetryHeader::DISK_LEN;
        let needed = base + Self::LEN;
        if data.len() < needed {
            return Err(TelemetryError::truncated("disk sub-header", needed, data.len()));
        }
        let context = "disk sub-header";
        Ok(Self {
            start_date: read_i64_le(data, base, context)?,
            start_time: read_f64_le(data, base + 8, context)?,
            end_time: read_f64_le(data, base + 16, context)?,
            lap_count: read_i32_le(data, base + 24, context)?,
            record_count: read_i32_le(data, base + 28, context)?,
        })
    }
}

/// Where the sample records of a recording live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    /// Byte offset of record 0
    pub first_offset: usize,
    /// Bytes per record
    pub stride: usize,
    /// Complete records between `first_offset` and the end of the file
    pub count: usize,
}

impl SampleLayout {
    /// Derive the record layout from the headers and the file length.
    ///
    /// The first record starts at `varBuf[0].bufOffset` when the simulator filled it
    /// in, otherwise right after whichever of the variable table and the session
    /// text ends last. A trailing partial record is ignored.
    pub fn resolve(header: &TelemetryHeader, sub_header: &DiskSubHeader, file_len: usize) -> Result<Self> {
        let var_table_end = header.var_table_range().end;
        let session_end = header.session_info_range().end;
        let declared = header.var_buf[0].buf_offset;

        let first_offset = if declared > 0 {
            declared as usize
        } else {
            var_table_end.max(session_end)
        };

        if first_offset > file_len {
            return Err(TelemetryError::truncated("sample records", first_offset, file_len));
        }

        let stride = header.sample_len();
        let count = (file_len - first_offset).checked_div(stride).unwrap_or(0);

        if sub_header.record_count > 0 && sub_header.record_count as usize != count {
            warn!(
                declared = sub_header.record_count,
                derived = count,
                "Record count mismatch between disk sub-header and file size"
            );
        }

        debug!(first_offset, stride, count, "Resolved sample layout");
        Ok(Self { first_offset, stride, count })
    }

    /// Byte range of record `index`, or `None` past the last record.
    pub fn record_range(&self, index: usize) -> Option<std::ops::Range<usize>> {
        if index >= self.count {
            return None;
        }
        let start = self.first_offset.checked_add(index.checked_mul(self.stride)?)?;
        Some(start..start.checked_add(self.stride)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VariableType;
    use crate::test_utils::IbtFixtureBuilder;

    #[test]
    fn fill_patterns_are_not_valid_ticks() {
        for pattern in FILL_PATTERNS {
            assert!(!is_valid_tick(pattern as i32));
        }
        assert!(is_valid_tick(0));
        assert!(is_valid_tick(42));
        assert!(!is_valid_tick(-1));
    }

    #[test]
    fn sub_header_fields_decode() {
        let bytes = IbtFixtureBuilder::new()
            .variable("Speed", VariableType::Float32, 1)
            .lap_count(3)
            .samples(120, |_, _| {})
            .build();
        let sub = DiskSubHeader::parse(&bytes).unwrap();
        assert_eq!(sub.lap_count, 3);
        assert_eq!(sub.record_count, 120);
        assert_eq!(sub.end_time, 2.0);
    }

    #[test]
    fn layout_ignores_trailing_partial_record() {
        let builder = IbtFixtureBuilder::new()
            .variable("Speed", VariableType::Float32, 1)
            .variable("Gear", VariableType::Int32, 1)
            .samples(10, |_, _| {});
        let mut bytes = builder.build();
        bytes.extend_from_slice(&[0u8; 5]);

        let header = TelemetryHeader::parse(&bytes).unwrap();
        let sub = DiskSubHeader::parse(&bytes).unwrap();
        let layout = SampleLayout::resolve(&header, &sub, bytes.len()).unwrap();
        assert_eq!(layout.count, 10);
        assert_eq!(layout.stride, 8);
        assert_eq!(layout.first_offset, builder.first_sample_offset());
        assert!(layout.record_range(10).is_none());
        assert_eq!(layout.record_range(1), Some(layout.first_offset + 8..layout.first_offset + 16));
    }

    #[test]
    fn layout_falls_back_to_end_of_metadata() {
        let builder = IbtFixtureBuilder::new()
            .variable("Speed", VariableType::Float32, 1)
            .session_info("WeekendInfo:\n TrackID: 1\n")
            .samples(4, |_, _| {});
        let bytes = builder.build();
        let mut header = TelemetryHeader::parse(&bytes).unwrap();
        header.var_buf[0].buf_offset = 0;
        let sub = DiskSubHeader::parse(&bytes).unwrap();
        let layout = SampleLayout::resolve(&header, &sub, bytes.len()).unwrap();
        assert_eq!(layout.first_offset, builder.first_sample_offset());
        assert_eq!(layout.count, 4);
    }

    #[test]
    fn zero_stride_has_no_records() {
        let bytes = IbtFixtureBuilder::new().session_info("x: 1\n").build();
        let header = TelemetryHeader::parse(&bytes).unwrap();
        let sub = DiskSubHeader::parse(&bytes).unwrap();
        let layout = SampleLayout::resolve(&header, &sub, bytes.len()).unwrap();
        assert_eq!(layout.count, 0);
        assert!(layout.record_range(0).is_none());
    }

    #[test]
    fn short_file_is_truncated() {
        let bytes = IbtFixtureBuilder::new().variable("Speed", VariableType::Float32, 1).build();
        assert!(matches!(
            DiskSubHeader::parse(&bytes[..150]),
            Err(TelemetryError::Truncated { needed: 176, available: 150, .. })
        ));
    }
}
