//! Per-lap statistics from a recording.
//!
//! [`LapAggregator`] observes frames from a [`FrameProcessor`] run and splits them
//! into laps wherever the `Lap` counter changes. Each lap keeps its start time,
//! final lap time, the incidents picked up during it and the GPS trace.

use tracing::debug;

use crate::Result;
use crate::accessor::{TelemetrySource, VariableHandle};
use crate::processor::{FrameContext, FrameProcessor, SequentialSource};

/// Frames in the shortest lap worth keeping: 30 seconds at 60 Hz.
pub const MIN_LAP_SAMPLES: usize = 60 * 30;

/// One completed lap.
#[derive(Debug, Clone, PartialEq)]
pub struct LapRecord {
    pub lap: i32,
    /// `SessionTime` of the lap's first frame
    pub start_session_time: f64,
    /// Last `LapCurrentLapTime` seen in the lap
    pub lap_time: f64,
    /// Incidents added during this lap
    pub incidents: i32,
    /// Frames observed in the lap
    pub samples: usize,
    /// `(lat, lon)` of every frame with a GPS fix
    pub coordinates: Vec<(f64, f64)>,
}

impl LapRecord {
    fn start(lap: i32, session_time: f64) -> Self {
        Self {
            lap,
            start_session_time: session_time,
            lap_time: 0.0,
            incidents: 0,
            samples: 0,
            coordinates: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.incidents == 0
    }
}

/// Splits a frame sequence into [`LapRecord`]s.
#[derive(Debug)]
pub struct LapAggregator {
    lap: VariableHandle,
    lap_time: VariableHandle,
    incidents: VariableHandle,
    lat: VariableHandle,
    lon: VariableHandle,
    current: Option<LapRecord>,
    incidents_at_lap_start: i32,
    incidents_seen: i32,
    laps: Vec<LapRecord>,
}

impl Default for LapAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl LapAggregator {
    pub fn new() -> Self {
        Self {
            lap: VariableHandle::new("Lap"),
            lap_time: VariableHandle::new("LapCurrentLapTime"),
            incidents: VariableHandle::new("PlayerCarMyIncidentCount"),
            lat: VariableHandle::new("Lat"),
            lon: VariableHandle::new("Lon"),
            current: None,
            incidents_at_lap_start: 0,
            incidents_seen: 0,
            laps: Vec::new(),
        }
    }

    /// Process every remaining frame of `source` and return its laps.
    pub fn collect<S>(source: &mut S) -> Result<Vec<LapRecord>>
    where
        S: SequentialSource + TelemetrySource,
    {
        let mut aggregator = Self::new();
        FrameProcessor::new(source).run(&mut aggregator, |ctx, aggregator, source| {
            aggregator.observe(ctx, source);
            true
        })?;
        Ok(aggregator.finish())
    }

    /// Fold one frame into the current lap.
    pub fn observe<S: TelemetrySource + ?Sized>(&mut self, ctx: &FrameContext, source: &S) {
        let lap = self.lap.get_i32(source, 0);
        if self.current.as_ref().is_some_and(|current| current.lap != lap) {
            self.close_lap();
        }

        let incidents = self.incidents.get_i32(source, 0);
        let lap_time = self.lap_time.get_f64(source, 0);
        let lat = self.lat.get_f64(source, 0);
        let lon = self.lon.get_f64(source, 0);

        let record = self.current.get_or_insert_with(|| LapRecord::start(lap, ctx.session_time_seconds));
        record.samples += 1;
        record.lap_time = lap_time;
        if lat != 0.0 && lon != 0.0 {
            record.coordinates.push((lat, lon));
        }
        self.incidents_seen = incidents;
    }

    fn close_lap(&mut self) {
        if let Some(mut record) = self.current.take() {
            record.incidents = self.incidents_seen - self.incidents_at_lap_start;
            self.incidents_at_lap_start = self.incidents_seen;
            debug!(
                lap = record.lap,
                lap_time = record.lap_time,
                incidents = record.incidents,
                samples = record.samples,
                "Lap complete"
            );
            self.laps.push(record);
        }
    }

    /// Close the open lap and return all laps in order.
    pub fn finish(mut self) -> Vec<LapRecord> {
        self.close_lap();
        self.laps
    }
}

/// Laps fit for comparison: clean, at least `min_samples` frames long, and neither
/// the first nor the last lap of the recording (out-lap and in-lap).
pub fn complete_laps(laps: &[LapRecord], min_samples: usize) -> Vec<LapRecord> {
    let (Some(first), Some(last)) = (laps.first(), laps.last()) else {
        return Vec::new();
    };
    laps.iter()
        .filter(|l| l.is_clean() && l.samples >= min_samples && l.lap != first.lap && l.lap != last.lap)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiskChannel;
    use crate::VariableType;
    use crate::test_utils::{IbtFixtureBuilder, lap_recording};
    use anyhow::Result;

    #[test]
    fn splits_recording_into_laps() -> Result<()> {
        let mut disk = DiskChannel::from_bytes(lap_recording(3, 0).build())?;
        let laps = LapAggregator::collect(&mut disk)?;

        assert_eq!(laps.iter().map(|l| l.lap).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(laps.iter().all(|l| l.samples == 60));
        assert!(laps.iter().all(|l| l.coordinates.len() == 60));

        assert_eq!(laps[0].start_session_time, 100.0);
        assert_eq!(laps[1].start_session_time, 101.0);
        assert!((laps[2].lap_time - 59.0 / 60.0).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn incidents_are_attributed_to_their_lap() -> Result<()> {
        let mut disk = DiskChannel::from_bytes(lap_recording(3, 0).build())?;
        let laps = LapAggregator::collect(&mut disk)?;

        assert_eq!(laps.iter().map(|l| l.incidents).collect::<Vec<_>>(), vec![0, 2, 0]);
        assert!(!laps[1].is_clean());
        Ok(())
    }

    #[test]
    fn complete_laps_drops_out_and_in_laps() -> Result<()> {
        let mut disk = DiskChannel::from_bytes(lap_recording(5, 0).build())?;
        let laps = LapAggregator::collect(&mut disk)?;

        let complete = complete_laps(&laps, 60);
        assert_eq!(complete.iter().map(|l| l.lap).collect::<Vec<_>>(), vec![3, 4]);

        assert!(complete_laps(&laps, MIN_LAP_SAMPLES).is_empty());
        assert!(complete_laps(&[], 0).is_empty());
        Ok(())
    }

    #[test]
    fn missing_gps_is_not_recorded() -> Result<()> {
        let mut disk = DiskChannel::from_bytes(
            IbtFixtureBuilder::new()
                .variable("SessionTime", VariableType::Float64, 1)
                .variable("Lap", VariableType::Int32, 1)
                .samples(60, |i, s| {
                    s.set_f64("SessionTime", i as f64).set_i32("Lap", 1);
                })
                .build(),
        )?;
        let laps = LapAggregator::collect(&mut disk)?;
        assert_eq!(laps.len(), 1);
        assert!(laps[0].coordinates.is_empty());
        Ok(())
    }
}
