//! Acquisition loop integration tests
//!
//! Pause/resume at cycle boundaries, latest-wins settings handoff, fatal
//! evaluation errors and clean shutdown.

use std::time::Duration;
use tandem::prelude::*;
use tandem::SampleBuffer;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// A paused loop never polls its source.
#[test]
fn test_paused_loop_does_not_poll() {
    let source = ScriptedSource::repeating(coincident_buffer());
    let tracker = source.tracker();
    let mut system = scripted_system(source, true);

    assert!(wait_until(|| system.state() == LoopState::Paused));
    std::thread::sleep(Duration::from_millis(QUIET_PERIOD_MS));

    assert_eq!(tracker.polls(), 0);
    assert_eq!(system.metrics().cycles, 0);
    assert_eq!(system.report_for(system.step()).cycles, 0);

    system.shutdown();
}

/// Settings pushed while paused: only the last one is seen after resume.
#[test]
fn test_latest_settings_win_after_resume() {
    let source = ScriptedSource::repeating(coincident_buffer());
    let tracker = source.tracker();
    let mut system = scripted_system(source, true);
    assert!(wait_until(|| system.state() == LoopState::Paused));

    let first = ChannelLimits::new([4096, 4096, 100, 100], [32767, 32767, 9000, 9000]).unwrap();
    let second = ChannelLimits::new([4096, 4096, 200, 200], [32767, 32767, 8000, 8000]).unwrap();
    system
        .update_settings(|settings| settings.with_limits(first))
        .unwrap();
    system
        .update_settings(|settings| settings.with_limits(second))
        .unwrap();
    assert_eq!(tracker.polls(), 0);

    system.resume();
    assert!(wait_until(|| tracker.polls() > 0));

    let seen = tracker.last_settings().expect("polled settings");
    assert_eq!(seen.limits, second);
    assert!(!seen.pause);

    system.shutdown();
}

#[test]
fn test_invalid_settings_are_rejected() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), true);

    let mut settings = SyncSettings::clone(&system.settings());
    settings.limits.low[2] = 9000;
    settings.limits.high[2] = 100;

    assert!(system.push_settings(settings).is_err());
    assert_eq!(system.settings().limits, ChannelLimits::default());

    system.shutdown();
}

#[test]
fn test_pause_resume_cycles() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);
    assert!(wait_until(|| system.metrics().cycles > 0));

    system.pause();
    assert!(wait_until(|| system.state() == LoopState::Paused));
    let paused_at = system.metrics().cycles;
    std::thread::sleep(Duration::from_millis(QUIET_PERIOD_MS));
    assert_eq!(system.metrics().cycles, paused_at);

    system.resume();
    assert!(wait_until(|| system.metrics().cycles > paused_at));

    system.shutdown();
}

/// Cycles keep acquisition order and every one is published.
#[test]
fn test_cycle_records_in_order() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);
    let events = system.events();

    let mut cycles = Vec::new();
    while cycles.len() < 5 {
        match events.recv_timeout(Duration::from_millis(SETTLE_TIMEOUT_MS)) {
            Ok(LoopEvent::Cycle(record)) => {
                assert_eq!(record.time_differences, vec![-50]);
                assert_eq!(record.counts, (1, 1));
                assert!(record.coincidence);
                cycles.push(record.cycle);
            }
            Ok(_) => {}
            Err(e) => panic!("no cycle record: {e}"),
        }
    }
    assert!(cycles.windows(2).all(|pair| pair[1] == pair[0] + 1));

    system.shutdown();
    let metrics = system.metrics();
    assert_eq!(metrics.cycles, metrics.published);
}

#[test]
fn test_empty_polls_are_not_cycles() {
    let source = ScriptedSource::new(vec![coincident_buffer()], false);
    let tracker = source.tracker();
    let mut system = scripted_system(source, false);

    assert!(wait_until(|| tracker.polls() > 5));
    let metrics = system.metrics();
    assert_eq!(metrics.cycles, 1);
    assert!(metrics.empty_polls >= 4);
    assert_eq!(system.state(), LoopState::Running);

    system.shutdown();
}

/// A buffer that cannot be evaluated halts the loop; earlier aggregates stay readable.
#[test]
fn test_corrupted_buffer_halts_loop() {
    let empty = SampleBuffer::new([Vec::new(), Vec::new(), Vec::new(), Vec::new()]).unwrap();
    let source = ScriptedSource::new(vec![coincident_buffer(), coincident_buffer(), empty], false);
    let mut system = scripted_system(source, false);

    let halted = wait_for_event(&system, |event| matches!(event, LoopEvent::Halted { .. }));
    assert!(halted.is_some(), "loop did not halt");
    assert!(wait_until(|| system.state() == LoopState::Halted));
    assert!(wait_until(|| !system.is_running()));

    let remaining: Vec<LoopEvent> = system.events().try_iter().collect();
    assert!(!remaining
        .iter()
        .any(|event| matches!(event, LoopEvent::Halted { .. })));

    let step = system.step();
    assert_eq!(system.report_for(step).cycles, 2);
    assert_eq!(system.metrics().cycles, 2);
    assert!(system.start_measurement(step, None).is_err());

    system.shutdown();
    assert_eq!(system.state(), LoopState::Halted);
}

#[test]
fn test_shutdown_stops_loop() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);
    assert!(wait_until(|| system.metrics().cycles > 0));

    system.shutdown();

    assert_eq!(system.state(), LoopState::Stopped);
    assert!(!system.is_running());
    let events: Vec<LoopEvent> = system.events().try_iter().collect();
    assert!(matches!(events.last(), Some(LoopEvent::Stopped)));
    assert!(system.end_measurement().is_err());
}
