//! Acquisition system: the controller-side API around the acquisition thread.

use crate::acquisition::{
    AcquisitionCommand, AcquisitionThread, LoopEvent, LoopMetricsSnapshot, LoopOptions, LoopState,
};
use crate::recorder::WaveformRecorder;
use crate::source::{
    BufferSource, CaptureMode, LiveDevice, PlaybackFile, ScopeDriver, Simulator, SourceKind,
};
use crate::{Error, Result};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tandem_core::{ChannelLimits, SyncChannel, SyncSettings, TandemConfig};
use tandem_measurement::{
    ExperimentResult, MeasurementConfig, MeasurementStateMachine, MeasurementStep, RateSnapshot,
};
use tracing::info;

/// Running acquisition with its settings channel.
pub struct AcquisitionSystem {
    sync: Arc<SyncChannel>,
    thread: AcquisitionThread,
    kind: SourceKind,
}

impl AcquisitionSystem {
    pub fn builder() -> AcquisitionSystemBuilder {
        AcquisitionSystemBuilder::default()
    }

    pub fn source_kind(&self) -> SourceKind {
        self.kind
    }

    // Settings

    pub fn sync(&self) -> Arc<SyncChannel> {
        Arc::clone(&self.sync)
    }

    pub fn settings(&self) -> Arc<SyncSettings> {
        self.sync.snapshot()
    }

    /// Replace the settings snapshot. Invalid settings are rejected here.
    pub fn push_settings(&self, settings: SyncSettings) -> Result<()> {
        settings.validate()?;
        self.sync.push(settings);
        Ok(())
    }

    /// Derive the next snapshot from the current one. `f` may run more than
    /// once when another controller call races it.
    pub fn update_settings(&self, mut f: impl FnMut(SyncSettings) -> SyncSettings) -> Result<()> {
        self.sync.try_update(|current| {
            let next = f(current);
            next.validate()?;
            Ok::<_, Error>(next)
        })?;
        Ok(())
    }

    pub fn pause(&self) {
        self.sync.pause();
    }

    pub fn resume(&self) {
        self.sync.resume();
    }

    // Measurement

    /// (Re)start `step` at the next cycle boundary.
    ///
    /// The step's timebase and limits are staged into the settings here, with
    /// acquisition resumed; the loop picks them up with the command.
    pub fn start_measurement(
        &self,
        step: MeasurementStep,
        limits: Option<ChannelLimits>,
    ) -> Result<()> {
        self.ensure_running()?;
        let change = self.thread.measurement().lock().plan(step, limits)?;
        self.sync.stage(|current| {
            let next = change.apply(current).paused(false);
            next.validate()?;
            Ok::<_, Error>(next)
        })?;
        self.send(AcquisitionCommand::StartMeasurement { step, limits })
    }

    /// Pause acquisition and publish the step's final rates.
    pub fn end_measurement(&self) -> Result<()> {
        self.send(AcquisitionCommand::EndMeasurement)?;
        self.sync.pause();
        Ok(())
    }

    pub fn reset_step(&self, step: MeasurementStep) -> Result<()> {
        self.send(AcquisitionCommand::ResetStep(step))
    }

    fn ensure_running(&self) -> Result<()> {
        if self.state().is_terminal() {
            return Err(Error::NotRunning);
        }
        Ok(())
    }

    fn send(&self, command: AcquisitionCommand) -> Result<()> {
        self.ensure_running()?;
        self.thread.send(command)
    }

    pub fn step(&self) -> MeasurementStep {
        self.thread.measurement().lock().step()
    }

    /// Rates of any step, computed from its current aggregates.
    pub fn report_for(&self, step: MeasurementStep) -> RateSnapshot {
        self.thread.measurement().lock().report_for(step)
    }

    /// Results row of `step` from its current aggregates.
    pub fn result_for(&self, step: MeasurementStep) -> ExperimentResult {
        self.thread.measurement().lock().result_for(step)
    }

    /// Last snapshot published on the rate tick.
    pub fn latest_rates(&self) -> RateSnapshot {
        self.thread.latest_rates()
    }

    // Loop

    pub fn events(&self) -> Receiver<LoopEvent> {
        self.thread.events()
    }

    pub fn state(&self) -> LoopState {
        self.thread.state()
    }

    pub fn metrics(&self) -> LoopMetricsSnapshot {
        self.thread.metrics().snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_running()
    }

    /// Clear `main_loop` and wait for the loop to leave at its cycle boundary.
    pub fn shutdown(&mut self) {
        self.sync.stop();
        self.thread.join();
    }
}

pub struct AcquisitionSystemBuilder {
    config: TandemConfig,
    step: MeasurementStep,
    source: Option<Box<dyn BufferSource>>,
    options: LoopOptions,
    rate_tick: Option<Duration>,
    paused: bool,
}

impl Default for AcquisitionSystemBuilder {
    fn default() -> Self {
        Self {
            config: TandemConfig::default(),
            step: MeasurementStep::default(),
            source: None,
            options: LoopOptions::default(),
            rate_tick: None,
            paused: false,
        }
    }
}

impl AcquisitionSystemBuilder {
    pub fn config(mut self, config: TandemConfig) -> Self {
        self.config = config;
        self
    }

    pub fn step(mut self, step: MeasurementStep) -> Self {
        self.step = step;
        self
    }

    /// Use an explicit source instead of selecting one from the config.
    pub fn source(mut self, source: impl BufferSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Acquire from a digitizer in block mode.
    pub fn driver<D: ScopeDriver + 'static>(self, driver: D) -> Result<Self> {
        let device = LiveDevice::new(driver, CaptureMode::Block)?;
        Ok(self.source(device))
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.options.seed = seed;
        self
    }

    /// Override `rate_tick_seconds` from the config.
    pub fn rate_tick(mut self, tick: Duration) -> Self {
        self.rate_tick = Some(tick);
        self
    }

    pub fn command_capacity(mut self, capacity: usize) -> Self {
        self.options.command_capacity = capacity;
        self
    }

    /// Start with acquisition paused.
    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    /// Validate the configuration and start the acquisition thread.
    pub fn build(self) -> Result<AcquisitionSystem> {
        self.config.validate()?;

        let mut measurement =
            MeasurementStateMachine::new(MeasurementConfig::from(&self.config), self.step);
        let change = *measurement.transition(self.step, None)?.change();
        let settings = change
            .apply(self.config.initial_settings())
            .paused(self.paused);
        settings.validate()?;

        let (source, kind) = match self.source {
            Some(source) => {
                let kind = source.kind();
                (source, kind)
            }
            None => match SourceKind::select(false, &settings) {
                SourceKind::Playback => (
                    Box::new(PlaybackFile::new()) as Box<dyn BufferSource>,
                    SourceKind::Playback,
                ),
                _ => (
                    Box::new(Simulator::new(self.options.seed)) as Box<dyn BufferSource>,
                    SourceKind::Simulator,
                ),
            },
        };

        let recorder = self
            .config
            .record_file
            .as_ref()
            .map(WaveformRecorder::append)
            .transpose()?;

        let mut options = self.options;
        options.rate_tick = self.rate_tick.unwrap_or_else(|| {
            Duration::try_from_secs_f64(self.config.rate_tick_seconds).unwrap_or(Duration::MAX)
        });

        let sync = Arc::new(SyncChannel::new(settings));
        let mut thread = AcquisitionThread::new(Arc::clone(&sync), measurement, options);
        thread.start(source, recorder)?;
        info!(
            "Acquisition system started: {:?} source, step {}",
            kind, self.step
        );

        Ok(AcquisitionSystem { sync, thread, kind })
    }
}
