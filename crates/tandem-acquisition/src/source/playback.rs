//! Replay of recorded waveform files.
//!
//! A recording is a sequence of groups, one line per channel:
//!
//! ```text
//! 0;v;v;v...
//! 1;v;v;v...
//! 2;v;v;v...
//! 3;v;v;v...
//! ```
//!
//! A line whose index field is `0` opens a new group. Groups that do not hold
//! exactly four channels of equal length are skipped.

use super::{BufferSource, SourceKind};
use crate::{Error, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tandem_core::{Sample, SampleBuffer, SyncSettings, CHANNEL_COUNT};
use tracing::{debug, warn};

/// Parse every complete group from a recording.
pub fn parse_groups(reader: impl Read) -> Result<Vec<SampleBuffer>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut groups = Vec::new();
    let mut current: Vec<Vec<Sample>> = Vec::with_capacity(CHANNEL_COUNT);
    let mut skipped = 0usize;
    let mut record = StringRecord::new();

    while reader.read_record(&mut record)? {
        if record.iter().all(str::is_empty) {
            continue;
        }
        if record.get(0) == Some("0") && !current.is_empty() {
            finish_group(&mut current, &mut groups, &mut skipped);
        }

        let samples = record
            .iter()
            .skip(1)
            .map(str::parse::<Sample>)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                let line = record.position().map_or(0, |position| position.line());
                Error::Core(tandem_core::Error::CorruptedBuffer(format!(
                    "line {}: {}",
                    line, e
                )))
            })?;
        current.push(samples);
    }
    finish_group(&mut current, &mut groups, &mut skipped);

    if skipped > 0 {
        warn!("Skipped {} incomplete playback groups", skipped);
    }
    Ok(groups)
}

fn finish_group(
    current: &mut Vec<Vec<Sample>>,
    groups: &mut Vec<SampleBuffer>,
    skipped: &mut usize,
) {
    if current.is_empty() {
        return;
    }
    let channels = std::mem::replace(current, Vec::with_capacity(CHANNEL_COUNT));
    match SampleBuffer::from_channels(channels) {
        Ok(buffer) if !buffer.is_empty() => groups.push(buffer),
        _ => *skipped += 1,
    }
}

/// Loops over a recording forever. The file is read once per path; running
/// dry restarts from the first group in memory.
#[derive(Debug, Default)]
pub struct PlaybackFile {
    path: Option<PathBuf>,
    groups: Vec<SampleBuffer>,
    next: usize,
    loads: u64,
    loops: u64,
}

impl PlaybackFile {
    /// A source that follows `playback_file` from the settings it is polled with.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `path` eagerly.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let mut playback = Self::new();
        playback.load(path.into())?;
        Ok(playback)
    }

    fn load(&mut self, path: PathBuf) -> Result<()> {
        let groups = read_recording(&path)?;
        debug!("Loaded {} groups from {}", groups.len(), path.display());
        self.groups = groups;
        self.next = 0;
        self.path = Some(path);
        self.loads += 1;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Groups left before the recording restarts.
    pub fn remaining(&self) -> usize {
        self.groups.len().saturating_sub(self.next)
    }

    /// Number of file reads, one per distinct path.
    pub fn loads(&self) -> u64 {
        self.loads
    }
}

fn read_recording(path: &Path) -> Result<Vec<SampleBuffer>> {
    let exhausted = |reason: String| Error::PlaybackExhausted {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| exhausted(e.to_string()))?;
    let groups = parse_groups(file).map_err(|e| exhausted(e.to_string()))?;
    if groups.is_empty() {
        return Err(exhausted("no complete groups".to_string()));
    }
    Ok(groups)
}

impl BufferSource for PlaybackFile {
    fn poll(&mut self, settings: &SyncSettings) -> Result<Option<SampleBuffer>> {
        let requested = settings
            .playback_file
            .clone()
            .or_else(|| self.path.clone())
            .ok_or(Error::NoPlaybackFile)?;

        if self.path.as_ref() != Some(&requested) {
            self.load(requested)?;
        } else if self.next >= self.groups.len() {
            self.next = 0;
            self.loops += 1;
            debug!("Playback restarted ({} loops)", self.loops);
        }

        let buffer = self.groups.get(self.next).cloned();
        self.next += 1;
        Ok(buffer)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Playback
    }

    fn reloads(&self) -> u64 {
        self.loops
    }
}
