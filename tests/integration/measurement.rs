//! Measurement step integration tests
//!
//! Step transitions through the running loop, per-step aggregates and the
//! periodic rate snapshots.

use tandem::prelude::*;
use tandem::MeasurementStep::{BackgroundFullNear, FindSpectrum, Full, Gamma};

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::*;

/// Moving from the spectrum step to a background step switches to the
/// coincidence timebase.
#[test]
fn test_step_transition_applies_timebase() {
    let config = test_config();
    let source = ScriptedSource::repeating(coincident_buffer());
    let mut system = scripted_system(source, false);
    assert_eq!(system.step(), FindSpectrum);

    system.start_measurement(BackgroundFullNear, None).unwrap();
    let started = wait_for_event(&system, |event| matches!(event, LoopEvent::StepStarted(_)));
    assert!(matches!(started, Some(LoopEvent::StepStarted(BackgroundFullNear))));

    assert_eq!(system.step(), BackgroundFullNear);
    assert!(wait_until(|| system.settings().timebase == config.coincidence_timebase));
    assert!(wait_until(|| system.report_for(BackgroundFullNear).cycles > 0));

    system.shutdown();
}

#[test]
fn test_skipping_a_phase_is_rejected() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);

    assert!(system.start_measurement(Full, None).is_err());
    assert_eq!(system.step(), FindSpectrum);

    system.shutdown();
}

/// Limits supplied with a step start replace that window's calibration.
#[test]
fn test_step_start_with_limits() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), true);
    let limits = ChannelLimits::new([4096, 4096, 1000, 1000], [32767, 32767, 6000, 6000]).unwrap();

    system
        .start_measurement(BackgroundFullNear, Some(limits))
        .unwrap();
    assert!(wait_until(|| system.settings().limits == limits));
    // Starting a step resumes acquisition.
    assert!(wait_until(|| system.state() == LoopState::Running));

    let inverted = ChannelLimits {
        low: [4096, 4096, 6000, 6000],
        high: [32767, 32767, 1000, 1000],
    };
    assert!(system
        .start_measurement(BackgroundFullNear, Some(inverted))
        .is_err());

    system.shutdown();
}

#[test]
fn test_rates_published_on_tick() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);

    let rates = wait_for_event(&system, |event| {
        matches!(event, LoopEvent::Rates(snapshot) if snapshot.cycles > 0)
    });
    let Some(LoopEvent::Rates(snapshot)) = rates else {
        panic!("no rate snapshot published");
    };
    assert_eq!(snapshot.step, FindSpectrum);
    assert!(snapshot.rate_a > 0.0);
    assert!(snapshot.rate_b > 0.0);
    // Spectrum step exposes singles only.
    assert!(snapshot.background_rate.is_none());
    assert!(snapshot.unquantum_effect_ratio.is_none());

    assert!(wait_until(|| system.latest_rates().cycles > 0));
    system.shutdown();
}

/// End pauses acquisition and publishes the final rates of the step.
#[test]
fn test_end_measurement_pauses() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);
    assert!(wait_until(|| system.metrics().cycles > 0));

    system.end_measurement().unwrap();
    assert!(wait_until(|| system.state() == LoopState::Paused));
    let cycles = system.report_for(FindSpectrum).cycles;
    assert!(cycles > 0);
    assert_eq!(system.latest_rates().step, FindSpectrum);

    std::thread::sleep(Duration::from_millis(QUIET_PERIOD_MS));
    assert_eq!(system.report_for(FindSpectrum).cycles, cycles);

    system.shutdown();
}

#[test]
fn test_reset_step_clears_aggregates() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);
    assert!(wait_until(|| system.metrics().cycles > 0));

    system.end_measurement().unwrap();
    assert!(wait_until(|| system.state() == LoopState::Paused));
    assert!(system.report_for(FindSpectrum).cycles > 0);

    system.reset_step(FindSpectrum).unwrap();
    assert!(wait_until(|| system.report_for(FindSpectrum).cycles == 0));
    assert_eq!(system.step(), FindSpectrum);

    system.shutdown();
}

/// Each step aggregates independently; earlier steps keep their totals.
#[test]
fn test_steps_aggregate_separately() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);
    assert!(wait_until(|| system.report_for(FindSpectrum).cycles > 0));

    system.start_measurement(BackgroundFullNear, None).unwrap();
    assert!(wait_until(|| system.step() == BackgroundFullNear));
    system.end_measurement().unwrap();
    assert!(wait_until(|| system.state() == LoopState::Paused));
    let spectrum_cycles = system.report_for(FindSpectrum).cycles;

    system.start_measurement(Gamma, None).unwrap();
    assert!(wait_until(|| system.report_for(Gamma).cycles > 0));

    assert_eq!(system.report_for(FindSpectrum).cycles, spectrum_cycles);
    let background = system.report_for(BackgroundFullNear);
    assert!(background.background_rate.is_some());

    system.shutdown();
}

/// The controller stages a step's settings before the command reaches the loop.
#[test]
fn test_step_settings_staged_by_controller() {
    let config = test_config();
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), true);
    let sync = system.sync();
    assert!(wait_until(|| system.state() == LoopState::Paused));

    system.start_measurement(BackgroundFullNear, None).unwrap();
    let staged = system.settings();
    assert_eq!(staged.timebase, config.coincidence_timebase);
    assert!(!staged.pause);
    // Staging alone does not signal; the loop adopts it with the command.
    assert!(!sync.has_pending());

    assert!(wait_until(|| system.state() == LoopState::Running));
    assert_eq!(*system.settings(), *staged);

    system.shutdown();
}

/// A stop issued while steps are being started is never overwritten.
#[test]
fn test_stop_survives_step_starts() {
    let mut system = scripted_system(ScriptedSource::repeating(coincident_buffer()), false);
    let sync = system.sync();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(5));
        sync.stop();
    });

    for _ in 0..200 {
        let _ = system.start_measurement(FindSpectrum, None);
    }
    stopper.join().unwrap();

    assert!(!system.settings().main_loop);
    assert!(wait_until(|| system.state() == LoopState::Stopped));
    system.shutdown();
}
