//! Acquisition thread: poll, evaluate, aggregate, publish.

use super::metrics::LoopMetrics;
use super::request::{AcquisitionCommand, LoopEvent, LoopState};
use crate::recorder::WaveformRecorder;
use crate::source::BufferSource;
use crate::{Error, Result};
use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tandem_analysis::evaluate;
use tandem_core::{SampleBuffer, SleepInterval, SyncChannel, SyncSettings};
use tandem_measurement::{CycleRecord, MeasurementStateMachine, RateSnapshot};
use thread_priority::ThreadPriority;
use tracing::{debug, error, info, warn};

/// Lower bound for the idle sleep while paused or waiting for playback.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy)]
pub struct LoopOptions {
    pub command_capacity: usize,
    /// Interval between published rate snapshots.
    pub rate_tick: Duration,
    /// Seed for the sleep jitter.
    pub seed: u64,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            command_capacity: 64,
            rate_tick: Duration::from_secs(1),
            seed: 0,
        }
    }
}

/// Owns the acquisition thread and the state it shares with the controller.
pub struct AcquisitionThread {
    command_tx: Sender<AcquisitionCommand>,
    command_rx: Option<Receiver<AcquisitionCommand>>,
    event_tx: Sender<LoopEvent>,
    event_rx: Receiver<LoopEvent>,
    sync: Arc<SyncChannel>,
    measurement: Arc<Mutex<MeasurementStateMachine>>,
    latest_rates: Arc<ArcSwap<RateSnapshot>>,
    metrics: Arc<LoopMetrics>,
    thread_handle: Option<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    options: LoopOptions,
}

impl AcquisitionThread {
    pub fn new(
        sync: Arc<SyncChannel>,
        measurement: MeasurementStateMachine,
        options: LoopOptions,
    ) -> Self {
        let (command_tx, command_rx) = bounded(options.command_capacity.max(1));
        let (event_tx, event_rx) = unbounded();
        let latest_rates = Arc::new(ArcSwap::from_pointee(RateSnapshot::empty(measurement.step())));

        Self {
            command_tx,
            command_rx: Some(command_rx),
            event_tx,
            event_rx,
            sync,
            measurement: Arc::new(Mutex::new(measurement)),
            latest_rates,
            metrics: Arc::new(LoopMetrics::new()),
            thread_handle: None,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: Arc::new(AtomicU8::new(LoopState::Running as u8)),
            options,
        }
    }

    pub fn start(
        &mut self,
        mut source: Box<dyn BufferSource>,
        recorder: Option<WaveformRecorder>,
    ) -> Result<()> {
        let Some(commands) = self.command_rx.take() else {
            return Err(Error::AcquisitionFailed(
                "acquisition thread already started".to_string(),
            ));
        };

        source.set_cancel(Arc::clone(&self.shutdown));
        let worker = LoopWorker {
            commands,
            events: self.event_tx.clone(),
            sync: Arc::clone(&self.sync),
            measurement: Arc::clone(&self.measurement),
            latest_rates: Arc::clone(&self.latest_rates),
            metrics: Arc::clone(&self.metrics),
            shutdown: Arc::clone(&self.shutdown),
            state: Arc::clone(&self.state),
            source,
            recorder,
            rng: StdRng::seed_from_u64(self.options.seed),
            rate_tick: self.options.rate_tick,
            seen_reloads: 0,
            settings: self.sync.snapshot(),
            waiting: false,
        };

        let handle = thread::Builder::new()
            .name("tandem-acquisition".into())
            .spawn(move || {
                let _ = thread_priority::set_current_thread_priority(ThreadPriority::Max);
                worker.run();
            })
            .expect("Failed to spawn acquisition thread");

        self.thread_handle = Some(handle);
        Ok(())
    }

    pub fn command_sender(&self) -> Sender<AcquisitionCommand> {
        self.command_tx.clone()
    }

    pub fn send(&self, command: AcquisitionCommand) -> Result<()> {
        self.command_tx.send(command).map_err(|_| Error::NotRunning)
    }

    /// Receiver for cycle records and loop events. Clones share one queue.
    pub fn events(&self) -> Receiver<LoopEvent> {
        self.event_rx.clone()
    }

    pub fn measurement(&self) -> Arc<Mutex<MeasurementStateMachine>> {
        Arc::clone(&self.measurement)
    }

    pub fn latest_rates(&self) -> RateSnapshot {
        **self.latest_rates.load()
    }

    pub fn metrics(&self) -> Arc<LoopMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Wait for the loop to exit on its own (stop flag or halt).
    pub fn join(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        let _ = self.command_tx.try_send(AcquisitionCommand::Shutdown);
        self.join();
    }
}

impl Drop for AcquisitionThread {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LoopWorker {
    commands: Receiver<AcquisitionCommand>,
    events: Sender<LoopEvent>,
    sync: Arc<SyncChannel>,
    measurement: Arc<Mutex<MeasurementStateMachine>>,
    latest_rates: Arc<ArcSwap<RateSnapshot>>,
    metrics: Arc<LoopMetrics>,
    shutdown: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    source: Box<dyn BufferSource>,
    recorder: Option<WaveformRecorder>,
    rng: StdRng,
    rate_tick: Duration,
    seen_reloads: u64,
    /// Snapshot in effect. Only ever read from `sync`, never written back.
    settings: Arc<SyncSettings>,
    waiting: bool,
}

impl LoopWorker {
    fn run(mut self) {
        info!("Acquisition loop started ({:?} source)", self.source.kind());

        self.measurement.lock().configure(&self.settings);

        let mut last_cycle = Instant::now();
        let mut last_tick = Instant::now();

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            self.process_commands();
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            if let Some(update) = self.sync.take_update() {
                self.apply_settings(update);
            }

            let settings = Arc::clone(&self.settings);
            if !settings.main_loop {
                break;
            }

            if self.waiting || settings.pause {
                self.set_state(if self.waiting {
                    LoopState::WaitingForPlayback
                } else {
                    LoopState::Paused
                });
                self.idle(&settings.sleep);
                last_cycle = Instant::now();
                continue;
            }
            self.set_state(LoopState::Running);

            match self.source.poll(&settings) {
                Ok(Some(buffer)) => {
                    if let Err(reason) = self.process(buffer, &settings) {
                        self.halt(reason);
                        return;
                    }
                }
                Ok(None) => self.metrics.record_empty_poll(),
                Err(e @ (Error::PlaybackExhausted { .. } | Error::NoPlaybackFile)) => {
                    warn!("Playback unavailable, waiting for new settings: {}", e);
                    self.waiting = true;
                    let _ = self.events.send(LoopEvent::WaitingForPlayback {
                        path: settings.playback_file.clone(),
                        reason: e.to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    self.halt(e.to_string());
                    return;
                }
            }
            self.track_reloads();

            let now = Instant::now();
            self.measurement
                .lock()
                .advance(now.duration_since(last_cycle).as_secs_f64());
            last_cycle = now;

            if now.duration_since(last_tick) >= self.rate_tick {
                self.publish_rates();
                last_tick = now;
            }

            self.sleep(&settings.sleep);
        }

        self.finish();
    }

    fn process_commands(&mut self) {
        loop {
            match self.commands.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(crossbeam_channel::TryRecvError::Empty) => break,
                Err(crossbeam_channel::TryRecvError::Disconnected) => {
                    self.shutdown.store(true, Ordering::SeqCst);
                    return;
                }
            }
        }
    }

    /// Adopt a controller snapshot at the cycle boundary.
    fn apply_settings(&mut self, settings: Arc<SyncSettings>) {
        self.metrics.record_settings_update();
        self.measurement.lock().configure(&settings);
        debug!("Settings applied (paused: {})", settings.pause);
        if self.waiting {
            debug!("Retrying playback after settings update");
            self.waiting = false;
        }
        self.settings = settings;
    }

    fn handle_command(&mut self, command: AcquisitionCommand) {
        debug!("Acquisition command: {:?}", command);
        match command {
            AcquisitionCommand::StartMeasurement { step, limits } => {
                let result = self.measurement.lock().transition(step, limits);
                match result {
                    Ok(_) => {
                        self.apply_settings(self.sync.snapshot());
                        self.latest_rates.store(Arc::new(RateSnapshot::empty(step)));
                        let _ = self.events.send(LoopEvent::StepStarted(step));
                    }
                    Err(e) => warn!("Ignoring measurement start: {}", e),
                }
            }
            AcquisitionCommand::EndMeasurement => {
                self.publish_rates();
            }
            AcquisitionCommand::ResetStep(step) => {
                self.measurement.lock().reset_step(step);
            }
            AcquisitionCommand::Shutdown => {
                self.shutdown.store(true, Ordering::SeqCst);
            }
        }
    }

    /// Evaluate and aggregate one buffer. Errors and panics are fatal.
    fn process(
        &mut self,
        buffer: SampleBuffer,
        settings: &SyncSettings,
    ) -> std::result::Result<(), String> {
        let measurement = &self.measurement;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<CycleRecord> {
            let evaluation = evaluate(&buffer, &settings.limits, &settings.detection)?;
            Ok(measurement.lock().record(&evaluation, buffer.trigger_channel()))
        }));

        let record = match outcome {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(payload) => return Err(panic_message(payload.as_ref())),
        };
        self.metrics.record_cycle();

        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.write(&buffer) {
                warn!("Waveform recording disabled: {}", e);
                self.recorder = None;
            }
        }

        if self.events.send(LoopEvent::Cycle(Box::new(record))).is_ok() {
            self.metrics.record_published();
        }
        Ok(())
    }

    fn track_reloads(&mut self) {
        let reloads = self.source.reloads();
        while self.seen_reloads < reloads {
            self.metrics.record_playback_reload();
            self.seen_reloads += 1;
        }
    }

    fn publish_rates(&self) {
        let snapshot = self.measurement.lock().report();
        self.latest_rates.store(Arc::new(snapshot));
        let _ = self.events.send(LoopEvent::Rates(snapshot));
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn sleep_duration(&mut self, interval: &SleepInterval) -> Duration {
        let seconds = if interval.max_seconds > interval.min_seconds {
            self.rng.gen_range(interval.min_seconds..=interval.max_seconds)
        } else {
            interval.min_seconds
        };
        Duration::from_secs_f64(seconds.max(0.0))
    }

    fn sleep(&mut self, interval: &SleepInterval) {
        let duration = self.sleep_duration(interval);
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }

    fn idle(&mut self, interval: &SleepInterval) {
        thread::sleep(self.sleep_duration(interval).max(IDLE_SLEEP));
    }

    fn halt(&mut self, reason: String) {
        error!("Acquisition loop halted: {}", reason);
        self.flush_recorder();
        self.set_state(LoopState::Halted);
        self.source.close();
        let _ = self.events.send(LoopEvent::Halted { reason });
    }

    fn flush_recorder(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            if let Err(e) = recorder.flush() {
                warn!("Failed to flush waveform recording: {}", e);
            }
        }
    }

    fn finish(&mut self) {
        self.publish_rates();
        self.flush_recorder();
        self.source.close();
        self.set_state(LoopState::Stopped);
        let _ = self.events.send(LoopEvent::Stopped);
        info!(
            "Acquisition loop stopped after {} cycles",
            self.metrics.snapshot().cycles
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic during evaluation".to_string()
    }
}
