//! Engine lifecycle integration tests
//!
//! Builder source selection, the event-consuming run loop, statistics output
//! and shutdown.

use std::fs;
use tandem::acquisition::SourceKind;
use tandem::core::{DeviceSettings, Sample, TimebaseSettings, TriggerSettings};
use tandem::prelude::*;
use tandem::measurement::{RESULTS_HEADER, STATISTICS_HEADER};
use tandem::{SampleBuffer, ScopeDriver};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// Digitizer stand-in that always captures the same buffer.
struct FixedScope {
    channels: Vec<Vec<Sample>>,
}

impl FixedScope {
    fn new(buffer: SampleBuffer) -> Self {
        Self {
            channels: buffer.into_channels().into_iter().collect(),
        }
    }
}

impl ScopeDriver for FixedScope {
    fn configure(&mut self, _settings: &DeviceSettings) -> bool {
        true
    }

    fn run_block(&mut self, _timebase: &TimebaseSettings) -> bool {
        true
    }

    fn is_ready(&mut self) -> bool {
        true
    }

    fn read_buffers(&mut self) -> Option<Vec<Vec<Sample>>> {
        Some(self.channels.clone())
    }

    fn set_trigger(&mut self, _trigger: &TriggerSettings) -> bool {
        true
    }
}

#[test]
fn test_engine_defaults_to_simulator() {
    let engine = TandemEngine::builder()
        .config(test_config())
        .seed(7)
        .build()
        .unwrap();

    assert_eq!(engine.system().source_kind(), SourceKind::Simulator);
    assert_eq!(engine.step(), MeasurementStep::FindSpectrum);

    let summary = engine.shutdown().unwrap();
    assert_eq!(summary.state, LoopState::Stopped);
    assert!(summary.halted.is_none());
}

/// Every simulated cycle is a coincidence and lands in the statistics file.
#[test]
fn test_simulated_run_writes_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("statistics.csv");

    let mut engine = TandemEngine::builder()
        .config(test_config())
        .seed(11)
        .rate_tick(Duration::from_millis(20))
        .statistics_file(&path)
        .build()
        .unwrap();

    let mut coincidences = 0;
    let mut rates = 0;
    engine
        .run_for(Duration::from_millis(300), |event| match event {
            LoopEvent::Cycle(record) => {
                assert!(record.coincidence);
                assert_eq!(record.time_differences.len(), 1);
                coincidences += 1;
            }
            LoopEvent::Rates(_) => rates += 1,
            _ => {}
        })
        .unwrap();
    assert!(coincidences > 0);
    assert!(rates > 0);

    let summary = engine.shutdown().unwrap();
    assert!(summary.cycles >= coincidences);
    assert_eq!(summary.rows, summary.cycles);
    assert_eq!(summary.state, LoopState::Stopped);

    let contents = fs::read_to_string(&path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some(STATISTICS_HEADER.join(";").as_str()));
    assert_eq!(lines.count() as u64, summary.rows);
}

#[test]
fn test_run_for_returns_on_halt() {
    let empty = SampleBuffer::new([Vec::new(), Vec::new(), Vec::new(), Vec::new()]).unwrap();
    let mut engine = TandemEngine::builder()
        .config(test_config())
        .source(ScriptedSource::new(vec![coincident_buffer(), empty], false))
        .build()
        .unwrap();

    // No deadline: only the halt ends the run.
    let summary = engine.run_for(Duration::MAX, |_| {}).unwrap();
    assert_eq!(summary.state, LoopState::Halted);
    assert_eq!(summary.cycles, 1);
    assert!(summary.halted.is_some());

    assert!(engine.start_measurement(MeasurementStep::FindSpectrum, None).is_err());
    let summary = engine.shutdown().unwrap();
    assert!(summary.halted.is_some());
}

#[test]
fn test_engine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("experiment.json");
    let config = TandemConfig {
        experiment_name: "bench".to_string(),
        ..test_config()
    };
    config.save(&path).unwrap();

    let engine = TandemEngine::builder()
        .config_file(&path)
        .unwrap()
        .paused(true)
        .build()
        .unwrap();
    assert_eq!(engine.config().experiment_name, "bench");
    assert!(engine.settings().pause);

    engine.shutdown().unwrap();
}

#[test]
fn test_missing_config_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(TandemEngine::builder()
        .config_file(dir.path().join("missing.json"))
        .is_err());
}

#[test]
fn test_engine_with_scope_driver() {
    let mut engine = TandemEngine::builder()
        .config(test_config())
        .driver(FixedScope::new(coincident_buffer()))
        .unwrap()
        .build()
        .unwrap();
    assert_eq!(engine.system().source_kind(), SourceKind::Live);

    let mut differences = None;
    while differences.is_none() {
        match engine.next_event(Duration::from_millis(SETTLE_TIMEOUT_MS)).unwrap() {
            Some(LoopEvent::Cycle(record)) => differences = Some(record.time_differences.clone()),
            Some(_) => {}
            None => panic!("no cycle from the scope driver"),
        }
    }
    assert_eq!(differences, Some(vec![-50]));

    engine.shutdown().unwrap();
}

/// Each rate tick appends one results row for the active step.
#[test]
fn test_rate_ticks_write_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("results.csv");

    let mut engine = TandemEngine::builder()
        .config(test_config())
        .seed(5)
        .rate_tick(Duration::from_millis(20))
        .results_file(&path)
        .build()
        .unwrap();

    let mut ticks = 0;
    engine
        .run_for(Duration::from_millis(300), |event| {
            if matches!(event, LoopEvent::Rates(_)) {
                ticks += 1;
            }
        })
        .unwrap();
    assert!(ticks > 0);

    let summary = engine.shutdown().unwrap();
    assert!(summary.results >= ticks);

    let contents = fs::read_to_string(&path).unwrap();
    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some(RESULTS_HEADER.join(";").as_str()));
    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len() as u64, summary.results);
    assert!(rows
        .iter()
        .all(|row| row.split(';').count() == RESULTS_HEADER.len()));
}
