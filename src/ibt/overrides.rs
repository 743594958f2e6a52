//! Session-info overrides for race recordings.
//!
//! A race recording directory holds one `.ibt` file plus a `session-info*`
//! directory of YAML snapshots taken while the session ran. Each snapshot's file
//! name starts with the `SessionTick` it was taken at (`4821.yaml`,
//! `4821-practice.yaml`). During playback the snapshot in effect is the latest one
//! taken at or before the current tick.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::format::is_valid_tick;
use crate::{Result, TelemetryError};

/// One session-info snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOverride {
    pub tick: i32,
    pub path: PathBuf,
    pub text: String,
}

/// Snapshots ordered by tick.
#[derive(Debug, Clone, Default)]
pub struct SessionOverrides {
    entries: Vec<SessionOverride>,
}

impl SessionOverrides {
    pub fn new(mut entries: Vec<SessionOverride>) -> Self {
        entries.sort_by_key(|entry| entry.tick);
        Self { entries }
    }

    /// Load every `*.yaml` snapshot in `dir`.
    ///
    /// Files whose names do not start with a tick, or whose tick is negative or an
    /// allocator fill pattern, are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let listing = std::fs::read_dir(dir).map_err(|e| TelemetryError::file_error(dir, e))?;

        let mut entries = Vec::new();
        for entry in listing {
            let path = entry.map_err(|e| TelemetryError::file_error(dir, e))?.path();
            if path.extension().is_none_or(|ext| ext != "yaml") {
                continue;
            }
            let Some(tick) = path.file_name().and_then(|n| n.to_str()).and_then(parse_tick_prefix)
            else {
                warn!(path = %path.display(), "Unable to parse SessionTick from session info file name");
                continue;
            };
            if !is_valid_tick(tick) {
                warn!(path = %path.display(), tick, "Ignoring session info file with invalid tick");
                continue;
            }
            let text =
                std::fs::read_to_string(&path).map_err(|e| TelemetryError::file_error(&path, e))?;
            debug!(path = %path.display(), tick, "Added session info override");
            entries.push(SessionOverride { tick, path, text });
        }

        info!(dir = %dir.display(), count = entries.len(), "Loaded session info overrides");
        Ok(Self::new(entries))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionOverride> {
        self.entries.iter()
    }

    /// Position of the snapshot in effect at `tick`: the greatest tick `<= tick`,
    /// else the first.
    pub fn index_for_tick(&self, tick: i32) -> Option<usize> {
        if self.entries.is_empty() {
            return None;
        }
        Some(self.entries.partition_point(|entry| entry.tick <= tick).saturating_sub(1))
    }

    /// Snapshot in effect at `tick`.
    pub fn for_tick(&self, tick: i32) -> Option<&SessionOverride> {
        self.get(self.index_for_tick(tick)?)
    }

    pub fn get(&self, index: usize) -> Option<&SessionOverride> {
        self.entries.get(index)
    }
}

/// Leading (optionally signed) tick of a snapshot file name.
pub fn parse_tick_prefix(name: &str) -> Option<i32> {
    let sign = usize::from(name.starts_with('-'));
    let end = name[sign..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(name.len(), |pos| pos + sign);
    name[..end].parse().ok()
}

/// Files that make up a race recording directory.
#[derive(Debug, Clone)]
pub struct RecordingFiles {
    pub ibt: PathBuf,
    pub session_info_dir: Option<PathBuf>,
}

impl RecordingFiles {
    /// Locate the `.ibt` file and optional `session-info*` directory under `dir`.
    pub fn discover(dir: &Path) -> Result<Self> {
        let listing = std::fs::read_dir(dir).map_err(|e| TelemetryError::file_error(dir, e))?;
        let mut paths = listing
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|e| TelemetryError::file_error(dir, e))?;
        paths.sort();

        let ibt = paths
            .iter()
            .find(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "ibt"))
            .cloned()
            .ok_or_else(|| {
                TelemetryError::file_error(
                    dir,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "no .ibt file in recording"),
                )
            })?;

        let session_info_dir = paths
            .iter()
            .find(|p| {
                p.is_dir()
                    && p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("session-info"))
            })
            .cloned();

        info!(ibt = %ibt.display(), overrides = ?session_info_dir, "Discovered race recording");
        Ok(Self { ibt, session_info_dir })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(tick: i32, text: &str) -> SessionOverride {
        SessionOverride { tick, path: PathBuf::from(format!("{tick}.yaml")), text: text.to_string() }
    }

    #[test]
    fn tick_prefix_parsing() {
        assert_eq!(parse_tick_prefix("4821.yaml"), Some(4821));
        assert_eq!(parse_tick_prefix("-77-practice.yaml"), Some(-77));
        assert_eq!(parse_tick_prefix("-.yaml"), None);
        assert_eq!(parse_tick_prefix("0012.yaml"), Some(12));
        assert_eq!(parse_tick_prefix("latest.yaml"), None);
        assert_eq!(parse_tick_prefix("99999999999.yaml"), None);
    }

    #[test]
    fn override_selection_uses_greatest_tick_not_after() {
        let overrides = SessionOverrides::new(vec![entry(500, "c"), entry(100, "a"), entry(300, "b")]);
        assert_eq!(overrides.for_tick(50).map(|o| o.text.as_str()), Some("a"));
        assert_eq!(overrides.for_tick(100).map(|o| o.text.as_str()), Some("a"));
        assert_eq!(overrides.for_tick(299).map(|o| o.text.as_str()), Some("a"));
        assert_eq!(overrides.for_tick(300).map(|o| o.text.as_str()), Some("b"));
        assert_eq!(overrides.for_tick(10_000).map(|o| o.text.as_str()), Some("c"));
        assert!(SessionOverrides::default().for_tick(1).is_none());
    }

    #[test]
    fn load_dir_skips_unparsable_and_fill_pattern_names() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        std::fs::write(dir.path().join("120.yaml"), "WeekendInfo:\n TrackID: 1\n")?;
        std::fs::write(dir.path().join("notes.yaml"), "x")?;
        std::fs::write(dir.path().join(format!("{}.yaml", 0xCDCD_CDCDu32 as i32)), "x")?;
        std::fs::write(dir.path().join("30.txt"), "x")?;

        let overrides = SessionOverrides::load_dir(dir.path())?;
        anyhow::ensure!(overrides.len() == 1, "expected one override, got {}", overrides.len());
        anyhow::ensure!(overrides.for_tick(0).map(|o| o.tick) == Some(120));
        Ok(())
    }

    #[test]
    fn discover_requires_an_ibt_file() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        std::fs::create_dir(dir.path().join("session-info-1"))?;
        assert!(matches!(RecordingFiles::discover(dir.path()), Err(TelemetryError::File { .. })));

        std::fs::write(dir.path().join("race.ibt"), b"")?;
        let files = RecordingFiles::discover(dir.path())?;
        anyhow::ensure!(files.ibt.ends_with("race.ibt"));
        anyhow::ensure!(files.session_info_dir.is_some_and(|d| d.ends_with("session-info-1")));
        Ok(())
    }
}
