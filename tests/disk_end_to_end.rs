//! Recordings written to disk and read back through the public API only.

use anyhow::{Result, ensure};
use futures::StreamExt;
use irtelemetry::{
    ClientRegistry, DiskChannel, LIVE_CLIENT_ID, PlaybackOptions, RegistryError, Telemetry, TelemetrySource,
    VariableHandle,
};

const SAMPLES: usize = 100;
const SAMPLE_LEN: usize = 16;

const SESSION: &str = "---\nWeekendInfo:\n TrackName: lime rock\n TrackID: 47\nDriverInfo:\n DriverCarIdx: 0\n Drivers:\n - CarIdx: 0\n   UserName: Sam Reyes\n   CarNumber: \"12\"\n...\n";

fn var_header(out: &mut Vec<u8>, type_code: i32, offset: i32, name: &str) {
    let mut record = [0u8; 144];
    record[0..4].copy_from_slice(&type_code.to_le_bytes());
    record[4..8].copy_from_slice(&offset.to_le_bytes());
    record[8..12].copy_from_slice(&1i32.to_le_bytes());
    record[16..16 + name.len()].copy_from_slice(name.as_bytes());
    out.extend_from_slice(&record);
}

/// Three variables (`SessionTime`, `Lap`, `Speed`) and one sample per tick at 60 Hz.
fn recording() -> Vec<u8> {
    let var_offset = 144 + 32;
    let session_offset = var_offset + 3 * 144;
    let sample_offset = session_offset + SESSION.len();

    let mut out = vec![0u8; 144];
    let fields = [2, 1, 60, 0, SESSION.len() as i32, session_offset as i32, 3, var_offset as i32, 1, SAMPLE_LEN as i32];
    for (i, value) in fields.iter().enumerate() {
        out[i * 4..i * 4 + 4].copy_from_slice(&value.to_le_bytes());
    }
    out[52..56].copy_from_slice(&(sample_offset as i32).to_le_bytes());

    out.extend_from_slice(&1_726_000_000i64.to_le_bytes());
    out.extend_from_slice(&0.0f64.to_le_bytes());
    out.extend_from_slice(&(SAMPLES as f64 / 60.0).to_le_bytes());
    out.extend_from_slice(&2i32.to_le_bytes());
    out.extend_from_slice(&(SAMPLES as i32).to_le_bytes());

    var_header(&mut out, 5, 0, "SessionTime");
    var_header(&mut out, 2, 8, "Lap");
    var_header(&mut out, 4, 12, "Speed");
    out.extend_from_slice(SESSION.as_bytes());

    for i in 0..SAMPLES {
        out.extend_from_slice(&(i as f64 / 60.0).to_le_bytes());
        out.extend_from_slice(&(i as i32 / 50 + 1).to_le_bytes());
        out.extend_from_slice(&(30.0f32 + i as f32).to_le_bytes());
    }
    out
}

fn write_recording() -> Result<tempfile::NamedTempFile> {
    let file = tempfile::Builder::new().suffix(".ibt").tempfile()?;
    std::fs::write(file.path(), recording())?;
    Ok(file)
}

#[test]
fn every_record_is_read_once() -> Result<()> {
    let file = write_recording()?;
    let mut disk = Telemetry::open(file.path())?;

    ensure!(disk.catalog().len() == 3);
    ensure!(disk.sample_count() == SAMPLES);
    ensure!(disk.has_next());

    let mut speed = VariableHandle::new("Speed");
    let mut lap = VariableHandle::new("Lap");
    let mut laps = Vec::new();
    for i in 0..SAMPLES {
        ensure!(disk.next()?, "record {i} missing");
        ensure!(speed.get_f32(&disk, 0) == 30.0 + i as f32);
        laps.push(lap.get_i32(&disk, 0));
    }
    ensure!(!disk.next()?);
    ensure!(!disk.has_next());
    ensure!(laps.first() == Some(&1) && laps.last() == Some(&2));
    ensure!(speed.resolve_count() == 1);
    Ok(())
}

#[test]
fn session_text_is_queryable_and_typed() -> Result<()> {
    let disk = DiskChannel::from_bytes(recording())?;
    let text = disk.session_info_text();

    ensure!(irtelemetry::session::query_str(text, "WeekendInfo:TrackName:") == Some("lime rock"));
    ensure!(irtelemetry::session::query_str(text, "DriverInfo:Drivers:CarIdx:{0}CarNumber:") == Some("\"12\""));

    let document = irtelemetry::SessionDocument::parse(text)?;
    ensure!(document.weekend_info.track_id == Some(47));
    ensure!(document.player().map(|d| d.user_name.as_str()) == Some("Sam Reyes"));
    Ok(())
}

#[test]
fn missing_file_is_a_file_error() {
    let result = Telemetry::open("/definitely/not/here.ibt");
    assert!(matches!(result, Err(irtelemetry::TelemetryError::File { .. })));
}

#[tokio::test]
async fn replay_streams_frames_in_order() -> Result<()> {
    let file = write_recording()?;
    let driver = Telemetry::replay(file.path(), PlaybackOptions::unpaced())?;

    let mut sessions = driver.sessions.clone();
    let snapshot = sessions.wait_for(Option::is_some).await?.clone();
    let document = snapshot.and_then(|s| s.document.clone());
    ensure!(document.is_some_and(|d| d.weekend_info.track_name == "lime rock"));

    let frames: Vec<_> = irtelemetry::stream::frames(driver.frames.clone()).collect().await;
    ensure!(!frames.is_empty());
    ensure!(frames.windows(2).all(|pair| pair[0].index < pair[1].index));
    ensure!(frames.iter().all(|f| f.index < SAMPLES));

    driver.join().await;
    Ok(())
}

#[test]
fn registry_keeps_live_reserved() -> Result<()> {
    let registry: ClientRegistry<DiskChannel> = ClientRegistry::new();

    let reserved = registry.add("live", DiskChannel::from_bytes(recording())?);
    ensure!(matches!(reserved, Err(RegistryError::Reserved(_))));
    registry.add("s1", DiskChannel::from_bytes(recording())?)?;
    let duplicate = registry.add("s1", DiskChannel::from_bytes(recording())?);
    ensure!(matches!(duplicate, Err(RegistryError::AlreadyRegistered(id)) if id.as_str() == "s1"));

    registry.set_active("s1")?;
    ensure!(registry.active_id().as_str() == "s1");
    registry.remove("s1")?;
    ensure!(registry.active_id().as_str() == LIVE_CLIENT_ID);
    ensure!(registry.is_empty());
    Ok(())
}
