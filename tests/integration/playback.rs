//! Playback integration tests
//!
//! Recorded waveform files as the buffer source: waiting on a missing file,
//! recovering after a settings push, looping, and recording during acquisition.

use std::fs::File;
use std::io::BufReader;
use tandem::acquisition::{parse_groups, SourceKind};
use tandem::prelude::*;
use tandem::{AcquisitionSystem, SampleBuffer};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

fn playback_system(config: TandemConfig) -> AcquisitionSystem {
    AcquisitionSystem::builder()
        .config(config)
        .rate_tick(Duration::from_millis(20))
        .build()
        .expect("acquisition system")
}

/// A missing recording parks the loop until new settings arrive.
#[test]
fn test_missing_recording_waits_then_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.txt");
    let config = TandemConfig {
        playback_file: Some(path.clone()),
        ..test_config()
    };
    let mut system = playback_system(config);
    assert_eq!(system.source_kind(), SourceKind::Playback);

    let waiting = wait_for_event(&system, |event| {
        matches!(event, LoopEvent::WaitingForPlayback { .. })
    });
    match waiting {
        Some(LoopEvent::WaitingForPlayback { path: waiting_on, .. }) => {
            assert_eq!(waiting_on.as_deref(), Some(path.as_path()));
        }
        other => panic!("expected WaitingForPlayback, got {:?}", other),
    }
    assert!(wait_until(|| system.state() == LoopState::WaitingForPlayback));
    assert_eq!(system.metrics().cycles, 0);

    write_recording(&path, &[coincident_buffer()]);
    system
        .update_settings(|settings| settings.with_playback_file(path.clone()))
        .unwrap();

    assert!(wait_until(|| system.metrics().cycles > 0));
    assert_ne!(system.state(), LoopState::WaitingForPlayback);
    assert!(!system.state().is_terminal());

    system.shutdown();
}

/// The recording is replayed from the start once exhausted.
#[test]
fn test_recording_loops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.txt");
    let second = pulse_buffer(&[300], &[200], VALID_HEIGHT, VALID_HEIGHT);
    write_recording(&path, &[coincident_buffer(), second]);

    let config = TandemConfig {
        playback_file: Some(path),
        ..test_config()
    };
    let mut system = playback_system(config);
    let events = system.events();

    let mut differences = Vec::new();
    while differences.len() < 5 {
        match events.recv_timeout(Duration::from_millis(SETTLE_TIMEOUT_MS)) {
            Ok(LoopEvent::Cycle(record)) => differences.push(record.time_differences.clone()),
            Ok(_) => {}
            Err(e) => panic!("no cycle record: {e}"),
        }
    }
    assert_eq!(
        differences,
        vec![vec![-50], vec![100], vec![-50], vec![100], vec![-50]]
    );
    assert!(wait_until(|| system.metrics().playback_reloads >= 2));

    system.shutdown();
}

/// Buffers are recorded in acquisition order and read back by playback.
#[test]
fn test_record_file_captures_cycles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("captured.txt");
    let config = TandemConfig {
        record_file: Some(path.clone()),
        ..test_config()
    };

    let source = ScriptedSource::new(vec![coincident_buffer(); 3], false);
    let mut system = AcquisitionSystem::builder()
        .config(config)
        .source(source)
        .build()
        .unwrap();
    assert!(wait_until(|| system.metrics().cycles == 3));
    system.shutdown();

    let groups = parse_groups(BufReader::new(File::open(&path).unwrap())).unwrap();
    assert_eq!(groups.len(), 3);
    assert!(groups.iter().all(|group| group.channels() == coincident_buffer().channels()));
}

/// Removing the recording after it was loaded does not interrupt looping.
#[test]
fn test_recording_loops_after_file_removed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("recording.txt");
    write_recording(&path, &[coincident_buffer()]);

    let config = TandemConfig {
        playback_file: Some(path.clone()),
        ..test_config()
    };
    let mut system = playback_system(config);
    assert!(wait_until(|| system.metrics().cycles > 0));

    std::fs::remove_file(&path).unwrap();
    let at_removal = system.metrics().cycles;
    assert!(wait_until(|| system.metrics().cycles > at_removal + 5));
    assert!(system.metrics().playback_reloads >= 5);
    assert_ne!(system.state(), LoopState::WaitingForPlayback);

    let events: Vec<LoopEvent> = system.events().try_iter().collect();
    assert!(!events
        .iter()
        .any(|event| matches!(event, LoopEvent::WaitingForPlayback { .. })));

    system.shutdown();
}

/// The recording holds every evaluated buffer by the time the halt is published.
#[test]
fn test_record_file_flushed_on_halt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("captured.txt");
    let config = TandemConfig {
        record_file: Some(path.clone()),
        ..test_config()
    };

    let empty = SampleBuffer::new([Vec::new(), Vec::new(), Vec::new(), Vec::new()]).unwrap();
    let source = ScriptedSource::new(vec![coincident_buffer(), coincident_buffer(), empty], false);
    let mut system = AcquisitionSystem::builder()
        .config(config)
        .source(source)
        .build()
        .unwrap();

    let halted = wait_for_event(&system, |event| matches!(event, LoopEvent::Halted { .. }));
    assert!(halted.is_some(), "loop did not halt");

    let groups = parse_groups(File::open(&path).unwrap()).unwrap();
    assert_eq!(groups.len(), 2);

    system.shutdown();
}
