//! Test helpers and fixtures for tandem integration tests
//!
//! Buffers are built by hand so edge positions and pulse heights are exact.
//! [`ScriptedSource`] replays them through the real acquisition thread and
//! records what settings each poll saw.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `RATE_EPSILON` (1e-12): single divisions
//! - `RELATIVE_EPSILON` (1e-9): products of rates

#![allow(dead_code)]

pub mod tolerances;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tandem::acquisition::{SourceKind, WaveformRecorder};
use tandem::core::{Sample, SleepInterval};
use tandem::prelude::*;
use tandem::{BufferSource, SampleBuffer};

pub use tolerances::*;

/// Samples per channel in hand-built buffers.
pub const TEST_BUFFER_LEN: usize = 1000;

/// Square pulse level, above the default SCA threshold.
pub const SQUARE_HIGH: Sample = 16000;

/// A raw pulse height inside the default full-spectrum limits.
pub const VALID_HEIGHT: Sample = 5000;

/// Square channel with trailing edges at `edges`.
pub fn square_channel(len: usize, edges: &[usize]) -> Vec<Sample> {
    let mut samples = vec![0; len];
    for &edge in edges {
        samples[edge.saturating_sub(5)..=edge].fill(SQUARE_HIGH);
    }
    samples
}

/// Raw channel whose maximum is `height`.
pub fn raw_channel(len: usize, height: Sample) -> Vec<Sample> {
    let mut samples = vec![0; len];
    samples[len / 2] = height;
    samples
}

pub fn pulse_buffer(
    edges_a: &[usize],
    edges_b: &[usize],
    height_a: Sample,
    height_b: Sample,
) -> SampleBuffer {
    SampleBuffer::new([
        square_channel(TEST_BUFFER_LEN, edges_a),
        square_channel(TEST_BUFFER_LEN, edges_b),
        raw_channel(TEST_BUFFER_LEN, height_a),
        raw_channel(TEST_BUFFER_LEN, height_b),
    ])
    .expect("equal channel lengths")
}

/// One coincidence with `a - b == -50`.
pub fn coincident_buffer() -> SampleBuffer {
    pulse_buffer(&[100], &[150], VALID_HEIGHT, VALID_HEIGHT)
}

/// Fast-cycling configuration for loop tests.
pub fn test_config() -> TandemConfig {
    TandemConfig {
        sleep: SleepInterval::fixed(1.0e-4),
        rate_tick_seconds: 0.05,
        ..TandemConfig::default()
    }
}

/// Poll `condition` until it holds or the settle timeout expires.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(SETTLE_TIMEOUT_MS);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

pub fn write_recording(path: &Path, buffers: &[SampleBuffer]) {
    let mut recorder = WaveformRecorder::append(path).expect("open recording");
    for buffer in buffers {
        recorder.write(buffer).expect("write buffer");
    }
    recorder.flush().expect("flush recording");
}

/// What a [`ScriptedSource`] observed, shared with the test.
#[derive(Clone, Default)]
pub struct PollTracker {
    polls: Arc<AtomicUsize>,
    last_settings: Arc<Mutex<Option<SyncSettings>>>,
}

impl PollTracker {
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn last_settings(&self) -> Option<SyncSettings> {
        self.last_settings.lock().unwrap().clone()
    }
}

/// Replays `buffers` in order, then repeats the last one (or yields nothing
/// when `repeat` is off).
pub struct ScriptedSource {
    buffers: Vec<SampleBuffer>,
    position: usize,
    repeat: bool,
    tracker: PollTracker,
}

impl ScriptedSource {
    pub fn repeating(buffer: SampleBuffer) -> Self {
        Self::new(vec![buffer], true)
    }

    pub fn new(buffers: Vec<SampleBuffer>, repeat: bool) -> Self {
        Self {
            buffers,
            position: 0,
            repeat,
            tracker: PollTracker::default(),
        }
    }

    pub fn tracker(&self) -> PollTracker {
        self.tracker.clone()
    }
}

impl BufferSource for ScriptedSource {
    fn poll(
        &mut self,
        settings: &SyncSettings,
    ) -> tandem::acquisition::Result<Option<SampleBuffer>> {
        self.tracker.polls.fetch_add(1, Ordering::SeqCst);
        *self.tracker.last_settings.lock().unwrap() = Some(settings.clone());

        let buffer = match self.buffers.get(self.position) {
            Some(buffer) => Some(buffer.clone()),
            None if self.repeat => self.buffers.last().cloned(),
            None => None,
        };
        self.position += 1;
        Ok(buffer)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Simulator
    }
}

/// Receive events until one matches `predicate`, or the settle timeout expires.
pub fn wait_for_event(
    system: &tandem::AcquisitionSystem,
    mut predicate: impl FnMut(&LoopEvent) -> bool,
) -> Option<LoopEvent> {
    let events = system.events();
    let deadline = Instant::now() + Duration::from_millis(SETTLE_TIMEOUT_MS);
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return None;
        }
        match events.recv_timeout(remaining) {
            Ok(event) if predicate(&event) => return Some(event),
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Acquisition system over `source` with the fast test configuration.
pub fn scripted_system(source: ScriptedSource, paused: bool) -> tandem::AcquisitionSystem {
    tandem::AcquisitionSystem::builder()
        .config(test_config())
        .source(source)
        .rate_tick(Duration::from_millis(20))
        .paused(paused)
        .build()
        .expect("acquisition system")
}
