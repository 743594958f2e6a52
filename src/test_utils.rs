//! Synthetic telemetry fixtures for tests and benchmarks.
//!
//! [`IbtFixtureBuilder`] lays out a complete disk recording in memory: primary
//! header, disk sub-header, variable table, session text and sample records. Tests
//! use it instead of shipping large recordings, and benchmarks use it to build
//! realistically sized files.
//!
//! ```rust,ignore
//! let bytes = IbtFixtureBuilder::new()
//!     .variable("SessionTime", VariableType::Float64, 1)
//!     .variable("Lap", VariableType::Int32, 1)
//!     .samples(100, |i, s| {
//!         s.set_f64("SessionTime", i as f64 / 60.0);
//!         s.set_i32("Lap", 1);
//!     })
//!     .build();
//! ```

#![cfg(any(test, feature = "benchmark"))]

use std::path::Path;

use crate::schema::{TelemetryHeader, VAR_HEADER_SIZE, VarBuf};
use crate::{VariableDescriptor, VariableType};

/// Size of the disk sub-header that follows the padded primary header.
const DISK_SUB_HEADER_SIZE: usize = 32;

/// Encode a primary header into its padded 144-byte disk form.
pub fn encode_header(header: &TelemetryHeader) -> Vec<u8> {
    let mut out = vec![0u8; TelemetryHeader::DISK_LEN];
    let fields = [
        header.version,
        header.status,
        header.tick_rate,
        header.session_info_update,
        header.session_info_len,
        header.session_info_offset,
        header.num_vars,
        header.var_header_offset,
        header.num_buf,
        header.buf_len,
    ];
    for (i, value) in fields.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    for (slot, buf) in header.var_buf.iter().enumerate() {
        let base = VarBuf::tick_field_offset(slot);
        out[base..base + 4].copy_from_slice(&buf.tick_count.to_le_bytes());
        out[base + 4..base + 8].copy_from_slice(&buf.buf_offset.to_le_bytes());
    }
    out
}

/// Encode one variable record.
pub fn encode_var_header(descriptor: &VariableDescriptor) -> [u8; VAR_HEADER_SIZE] {
    let mut out = [0u8; VAR_HEADER_SIZE];
    out[0..4].copy_from_slice(&descriptor.var_type.code().to_le_bytes());
    out[4..8].copy_from_slice(&(descriptor.byte_offset as i32).to_le_bytes());
    out[8..12].copy_from_slice(&(descriptor.element_count as i32).to_le_bytes());
    out[12] = u8::from(descriptor.count_as_time);
    copy_c_string(&mut out[16..48], &descriptor.name);
    copy_c_string(&mut out[48..112], &descriptor.description);
    copy_c_string(&mut out[112..144], &descriptor.unit);
    out
}

fn copy_c_string(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len());
    field[..len].copy_from_slice(&bytes[..len]);
}

/// Writes typed values into one sample record by variable name.
///
/// Unknown names and out-of-range entries are ignored so fixtures can describe
/// partially populated samples.
pub struct SampleWriter<'a> {
    variables: &'a [VariableDescriptor],
    bytes: &'a mut [u8],
}

impl SampleWriter<'_> {
    fn slot(&mut self, name: &str, entry: usize) -> Option<&mut [u8]> {
        let descriptor = self.variables.iter().find(|d| d.name == name)?;
        let range = descriptor.element_range(entry)?;
        self.bytes.get_mut(range)
    }

    pub fn set_f64(&mut self, name: &str, value: f64) -> &mut Self {
        if let Some(slot) = self.slot(name, 0) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn set_f32(&mut self, name: &str, value: f32) -> &mut Self {
        self.set_f32_at(name, 0, value)
    }

    pub fn set_f32_at(&mut self, name: &str, entry: usize, value: f32) -> &mut Self {
        if let Some(slot) = self.slot(name, entry) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn set_i32(&mut self, name: &str, value: i32) -> &mut Self {
        self.set_i32_at(name, 0, value)
    }

    pub fn set_i32_at(&mut self, name: &str, entry: usize, value: i32) -> &mut Self {
        if let Some(slot) = self.slot(name, entry) {
            slot.copy_from_slice(&value.to_le_bytes());
        }
        self
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> &mut Self {
        if let Some(slot) = self.slot(name, 0) {
            slot[0] = u8::from(value);
        }
        self
    }
}

/// Builder for in-memory `.ibt` recordings.
#[derive(Debug, Clone)]
pub struct IbtFixtureBuilder {
    variables: Vec<VariableDescriptor>,
    buffer_len: usize,
    samples: Vec<Vec<u8>>,
    session_info: String,
    tick_rate: i32,
    lap_count: i32,
    record_count: Option<i32>,
}

impl Default for IbtFixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IbtFixtureBuilder {
    pub fn new() -> Self {
        Self {
            variables: Vec::new(),
            buffer_len: 0,
            samples: Vec::new(),
            session_info: String::new(),
            tick_rate: 60,
            lap_count: 0,
            record_count: None,
        }
    }

    /// Append a variable laid out after the previous one.
    pub fn variable(mut self, name: &str, var_type: VariableType, count: usize) -> Self {
        self.variables.push(VariableDescriptor {
            name: name.to_string(),
            var_type,
            element_count: count,
            byte_offset: self.buffer_len,
            count_as_time: false,
            unit: String::new(),
            description: format!("{name} (fixture)"),
        });
        self.buffer_len += var_type.size() * count;
        self
    }

    pub fn session_info(mut self, text: &str) -> Self {
        self.session_info = text.to_string();
        self
    }

    pub fn tick_rate(mut self, tick_rate: i32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    pub fn lap_count(mut self, laps: i32) -> Self {
        self.lap_count = laps;
        self
    }

    /// Override the sub-header record count (defaults to the real sample count).
    pub fn record_count(mut self, count: i32) -> Self {
        self.record_count = Some(count);
        self
    }

    /// Append `count` samples, filling each with `fill(index, writer)`.
    pub fn samples(mut self, count: usize, mut fill: impl FnMut(usize, &mut SampleWriter<'_>)) -> Self {
        for _ in 0..count {
            let index = self.samples.len();
            let mut bytes = vec![0u8; self.buffer_len];
            let mut writer = SampleWriter { variables: &self.variables, bytes: &mut bytes };
            fill(index, &mut writer);
            self.samples.push(bytes);
        }
        self
    }

    pub fn descriptors(&self) -> &[VariableDescriptor] {
        &self.variables
    }

    pub fn sample_len(&self) -> usize {
        self.buffer_len
    }

    /// Offset of the first sample record in the built file.
    pub fn first_sample_offset(&self) -> usize {
        self.var_table_offset() + self.variables.len() * VAR_HEADER_SIZE + self.session_info.len()
    }

    fn var_table_offset(&self) -> usize {
        TelemetryHeader::DISK_LEN + DISK_SUB_HEADER_SIZE
    }

    /// Serialize the recording.
    pub fn build(&self) -> Vec<u8> {
        let var_table_offset = self.var_table_offset();
        let session_offset = var_table_offset + self.variables.len() * VAR_HEADER_SIZE;
        let sample_offset = self.first_sample_offset();

        let mut var_buf = [VarBuf::default(); crate::schema::MAX_BUFS];
        var_buf[0] = VarBuf { tick_count: 0, buf_offset: sample_offset as i32 };
        let header = TelemetryHeader {
            version: crate::schema::SDK_VERSION,
            status: crate::schema::STATUS_CONNECTED,
            tick_rate: self.tick_rate,
            session_info_update: 0,
            session_info_len: self.session_info.len() as i32,
            session_info_offset: session_offset as i32,
            num_vars: self.variables.len() as i32,
            var_header_offset: var_table_offset as i32,
            num_buf: 1,
            buf_len: self.buffer_len as i32,
            var_buf,
        };

        let mut out = encode_header(&header);

        let record_count = self.record_count.unwrap_or(self.samples.len() as i32);
        let duration = self.samples.len() as f64 / f64::from(self.tick_rate.max(1));
        out.extend_from_slice(&1_726_000_000i64.to_le_bytes());
        out.extend_from_slice(&0.0f64.to_le_bytes());
        out.extend_from_slice(&duration.to_le_bytes());
        out.extend_from_slice(&self.lap_count.to_le_bytes());
        out.extend_from_slice(&record_count.to_le_bytes());

        for descriptor in &self.variables {
            out.extend_from_slice(&encode_var_header(descriptor));
        }
        out.extend_from_slice(self.session_info.as_bytes());
        for sample in &self.samples {
            out.extend_from_slice(sample);
        }
        out
    }

    /// Serialize the recording to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.build())
    }
}

/// A small lap-by-lap recording used across tests and benchmarks.
///
/// Sixty samples per lap at 60 Hz, `laps` laps, a valid `SessionTick` starting at
/// `first_tick`, and a two-driver session text.
pub fn lap_recording(laps: usize, first_tick: i32) -> IbtFixtureBuilder {
    const PER_LAP: usize = 60;
    IbtFixtureBuilder::new()
        .variable("SessionTime", VariableType::Float64, 1)
        .variable("SessionTick", VariableType::Int32, 1)
        .variable("SessionNum", VariableType::Int32, 1)
        .variable("SessionTimeRemain", VariableType::Float64, 1)
        .variable("Lap", VariableType::Int32, 1)
        .variable("LapCurrentLapTime", VariableType::Float32, 1)
        .variable("PlayerCarMyIncidentCount", VariableType::Int32, 1)
        .variable("Lat", VariableType::Float64, 1)
        .variable("Lon", VariableType::Float64, 1)
        .variable("Speed", VariableType::Float32, 1)
        .variable("OnPitRoad", VariableType::Bool, 1)
        .variable("CarIdxLap", VariableType::Int32, 4)
        .session_info(SESSION_YAML)
        .lap_count(laps as i32)
        .samples(laps * PER_LAP, |i, s| {
            let lap = (i / PER_LAP) as i32 + 1;
            let in_lap = (i % PER_LAP) as f32 / 60.0;
            s.set_f64("SessionTime", 100.0 + i as f64 / 60.0)
                .set_i32("SessionTick", first_tick + i as i32)
                .set_i32("SessionNum", if i < PER_LAP { 0 } else { 1 })
                .set_f64("SessionTimeRemain", 600.0 - i as f64 / 60.0)
                .set_i32("Lap", lap)
                .set_f32("LapCurrentLapTime", in_lap)
                .set_i32("PlayerCarMyIncidentCount", if i >= PER_LAP + 30 { 2 } else { 0 })
                .set_f64("Lat", 33.0 + i as f64 * 1e-4)
                .set_f64("Lon", -84.0 - i as f64 * 1e-4)
                .set_f32("Speed", 40.0 + (i % 10) as f32)
                .set_bool("OnPitRoad", i % PER_LAP < 3);
            for car in 0..4 {
                s.set_i32_at("CarIdxLap", car, lap - car as i32 % 2);
            }
        })
}

/// Session text shared by the fixtures.
pub const SESSION_YAML: &str = "---
WeekendInfo:
 TrackName: roadatlanta full
 TrackID: 127
 TrackLength: 4.08 km
 TrackDisplayName: Michelin Raceway Road Atlanta
SessionInfo:
 Sessions:
 - SessionNum: 0
   SessionType: Practice
   SessionName: PRACTICE
 - SessionNum: 1
   SessionType: Race
   SessionName: RACE
DriverInfo:
 DriverCarIdx: 1
 Drivers:
 - CarIdx: 0
   UserName: Pace Car
   CarNumber: \"0\"
   CarScreenName: safety pcfordmustang2015
 - CarIdx: 1
   UserName: Jordan O'Neil
   CarNumber: \"7\"
   CarScreenName: Ford Mustang GT4
...
";

/// In-memory stand-in for the simulator's shared memory.
///
/// Holds a header, variable table, session text and three rotating slots. Tests
/// drive it by publishing ticks, queueing writes that land when the reader waits,
/// and tearing upcoming slot copies.
pub mod live {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex, MutexGuard};
    use std::time::Duration;

    use super::{encode_header, encode_var_header};
    use crate::live::{RegionOpener, SharedRegion, WaitResult};
    use crate::schema::{MAX_BUFS, SDK_VERSION, STATUS_CONNECTED, TelemetryHeader, VarBuf};
    use crate::{Result, TelemetryError, VariableDescriptor, VariableType};

    pub const SLOTS: usize = 3;

    type PendingWrite = Box<dyn FnOnce(&mut ScriptedMemory) + Send>;

    /// Raw memory image plus the script applied to it.
    pub struct ScriptedMemory {
        bytes: Vec<u8>,
        buf_offsets: [usize; SLOTS],
        buf_len: usize,
        tear_copies: usize,
        pending: VecDeque<PendingWrite>,
        pub waits: usize,
    }

    impl ScriptedMemory {
        fn write_i32(&mut self, offset: usize, value: i32) {
            self.bytes[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }

        fn read_i32(&self, offset: usize) -> i32 {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&self.bytes[offset..offset + 4]);
            i32::from_le_bytes(raw)
        }

        /// Write a sample for `tick` into `slot`: `Speed = tick`, `Gear = slot`.
        pub fn publish(&mut self, slot: usize, tick: i32) {
            let mut payload = [0u8; 8];
            payload[..4].copy_from_slice(&(tick as f32).to_le_bytes());
            payload[4..].copy_from_slice(&(slot as i32).to_le_bytes());
            self.write_slot(slot, tick, &payload);
        }

        /// Copy `payload` to the start of `slot` and mark it with `tick`.
        pub fn write_slot(&mut self, slot: usize, tick: i32, payload: &[u8]) {
            let base = self.buf_offsets[slot];
            let len = payload.len().min(self.buf_len);
            self.bytes[base..base + len].copy_from_slice(&payload[..len]);
            self.write_i32(VarBuf::tick_field_offset(slot), tick);
        }

        pub fn set_status(&mut self, status: i32) {
            self.write_i32(4, status);
        }

        /// Overwrite the variable table in place, as a new session reusing the
        /// mapping would. The variable count must not change.
        pub fn rewrite_variables(&mut self, variables: &[VariableDescriptor]) {
            let var_offset = self.read_i32(28) as usize;
            assert_eq!(self.read_i32(24) as usize, variables.len(), "variable count is fixed");
            for (i, descriptor) in variables.iter().enumerate() {
                let start = var_offset + i * crate::schema::VAR_HEADER_SIZE;
                self.bytes[start..start + crate::schema::VAR_HEADER_SIZE]
                    .copy_from_slice(&encode_var_header(descriptor));
            }
        }

        pub fn set_session_update(&mut self, update: i32) {
            self.write_i32(12, update);
        }

        pub fn tick(&self, slot: usize) -> i32 {
            self.read_i32(VarBuf::tick_field_offset(slot))
        }
    }

    /// Shared handle to a [`ScriptedMemory`]; clones see the same memory.
    #[derive(Clone)]
    pub struct ScriptedRegion {
        memory: Arc<Mutex<ScriptedMemory>>,
    }

    impl ScriptedRegion {
        /// Memory publishing `Speed` (f32) and `Gear` (i32) with the given session text.
        pub fn new(session_info: &str) -> Self {
            let variables = [
                VariableDescriptor {
                    name: "Speed".to_string(),
                    var_type: VariableType::Float32,
                    element_count: 1,
                    byte_offset: 0,
                    count_as_time: false,
                    unit: "m/s".to_string(),
                    description: "GPS vehicle speed".to_string(),
                },
                VariableDescriptor {
                    name: "Gear".to_string(),
                    var_type: VariableType::Int32,
                    element_count: 1,
                    byte_offset: 4,
                    count_as_time: false,
                    unit: String::new(),
                    description: "Current gear".to_string(),
                },
            ];
            Self::with_variables(&variables, 8, session_info)
        }

        pub fn with_variables(variables: &[VariableDescriptor], buf_len: usize, session_info: &str) -> Self {
            let var_offset = TelemetryHeader::DISK_LEN;
            let session_offset = var_offset + variables.len() * crate::schema::VAR_HEADER_SIZE;
            let first_buf = session_offset + session_info.len() + 1;
            let buf_offsets: [usize; SLOTS] = std::array::from_fn(|slot| first_buf + slot * buf_len);

            let mut var_buf = [VarBuf::default(); MAX_BUFS];
            for (slot, offset) in buf_offsets.iter().enumerate() {
                var_buf[slot] = VarBuf { tick_count: 0, buf_offset: *offset as i32 };
            }
            let header = TelemetryHeader {
                version: SDK_VERSION,
                status: STATUS_CONNECTED,
                tick_rate: 60,
                session_info_update: 1,
                session_info_len: session_info.len() as i32 + 1,
                session_info_offset: session_offset as i32,
                num_vars: variables.len() as i32,
                var_header_offset: var_offset as i32,
                num_buf: SLOTS as i32,
                buf_len: buf_len as i32,
                var_buf,
            };

            let mut bytes = encode_header(&header);
            for descriptor in variables {
                bytes.extend_from_slice(&encode_var_header(descriptor));
            }
            bytes.extend_from_slice(session_info.as_bytes());
            bytes.push(0);
            bytes.resize(first_buf + SLOTS * buf_len, 0);

            let memory = ScriptedMemory {
                bytes,
                buf_offsets,
                buf_len,
                tear_copies: 0,
                pending: VecDeque::new(),
                waits: 0,
            };
            Self { memory: Arc::new(Mutex::new(memory)) }
        }

        pub fn memory(&self) -> MutexGuard<'_, ScriptedMemory> {
            self.memory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
        }

        /// Make the next `count` slot copies race with the writer.
        pub fn tear_next_copies(&self, count: usize) {
            self.memory().tear_copies = count;
        }

        /// Apply `write` the next time the reader waits for data.
        pub fn on_wait(&self, write: impl FnOnce(&mut ScriptedMemory) + Send + 'static) {
            self.memory().pending.push_back(Box::new(write));
        }
    }

    impl SharedRegion for ScriptedRegion {
        fn len(&self) -> usize {
            self.memory().bytes.len()
        }

        fn read_i32(&self, offset: usize) -> Result<i32> {
            let memory = self.memory();
            if offset + 4 > memory.bytes.len() {
                return Err(TelemetryError::truncated("scripted region", offset + 4, memory.bytes.len()));
            }
            Ok(memory.read_i32(offset))
        }

        fn copy_to(&self, offset: usize, target: &mut [u8]) -> Result<()> {
            let mut memory = self.memory();
            let end = offset + target.len();
            if end > memory.bytes.len() {
                return Err(TelemetryError::truncated("scripted region", end, memory.bytes.len()));
            }
            target.copy_from_slice(&memory.bytes[offset..end]);

            let slot = memory.buf_offsets.iter().position(|o| *o == offset);
            if let Some(slot) = slot.filter(|_| target.len() == memory.buf_len && memory.tear_copies > 0) {
                memory.tear_copies -= 1;
                let torn = memory.tick(slot) + 1;
                memory.publish(slot, torn);
            }
            Ok(())
        }

        fn wait(&self, _timeout: Duration) -> Result<WaitResult> {
            let mut memory = self.memory();
            memory.waits += 1;
            match memory.pending.pop_front() {
                Some(write) => {
                    write(&mut *memory);
                    Ok(WaitResult::Signaled)
                }
                None => Ok(WaitResult::Timeout),
            }
        }
    }

    /// Opener that fails with `Unavailable` until a region is installed.
    #[derive(Clone, Default)]
    pub struct ScriptedOpener {
        region: Arc<Mutex<Option<ScriptedRegion>>>,
        opens: Arc<Mutex<usize>>,
    }

    impl ScriptedOpener {
        pub fn running(region: ScriptedRegion) -> Self {
            let opener = Self::default();
            opener.install(Some(region));
            opener
        }

        /// Start (`Some`) or stop (`None`) the simulated simulator.
        pub fn install(&self, region: Option<ScriptedRegion>) {
            *self.region.lock().unwrap_or_else(|p| p.into_inner()) = region;
        }

        pub fn opens(&self) -> usize {
            *self.opens.lock().unwrap_or_else(|p| p.into_inner())
        }
    }

    impl RegionOpener for ScriptedOpener {
        type Region = ScriptedRegion;

        fn open(&mut self) -> Result<ScriptedRegion> {
            *self.opens.lock().unwrap_or_else(|p| p.into_inner()) += 1;
            self.region
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .clone()
                .ok_or_else(|| TelemetryError::unavailable("shared memory mapping not found"))
        }
    }
}
