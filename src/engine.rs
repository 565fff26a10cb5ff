//! TandemEngine that coordinates acquisition, measurement steps and statistics output

use crate::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::fs::File;
use std::time::{Duration, Instant};
use tandem_acquisition::{AcquisitionSystem, LoopEvent, LoopMetricsSnapshot, LoopState};
use tandem_core::{ChannelLimits, SyncSettings, TandemConfig};
use tandem_measurement::{
    CycleRecord, ExperimentResult, MeasurementStep, RateSnapshot, ResultsWriter, StatisticsWriter,
};
use tracing::{info, warn};

const IDLE_WAIT: Duration = Duration::from_millis(100);

/// Outcome of [`TandemEngine::run_for`] or [`TandemEngine::shutdown`].
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Cycle records received by the engine
    pub cycles: u64,
    /// Statistics rows written
    pub rows: u64,
    /// Results rows written, one per rate tick
    pub results: u64,
    pub rates: RateSnapshot,
    pub state: LoopState,
    /// Reason reported with `LoopEvent::Halted`
    pub halted: Option<String>,
}

/// Main engine: a running acquisition system plus the consumer side of its
/// event stream.
///
/// # Example
///
/// ```ignore
/// use tandem::prelude::*;
///
/// let mut engine = TandemEngine::builder()
///     .config_file("experiment.json")?
///     .step(MeasurementStep::BackgroundFullNear)
///     .build()?;
///
/// engine.run_for(Duration::from_secs(60), |event| {
///     if let LoopEvent::Rates(rates) = event {
///         println!("{:?}", rates.background_rate);
///     }
/// })?;
/// let summary = engine.shutdown()?;
/// ```
pub struct TandemEngine {
    config: TandemConfig,
    system: AcquisitionSystem,
    events: Receiver<LoopEvent>,
    statistics: Option<StatisticsWriter<File>>,
    results: Option<ResultsWriter<File>>,
    cycles: u64,
    halted: Option<String>,
}

impl TandemEngine {
    pub fn builder() -> crate::TandemEngineBuilder {
        crate::TandemEngineBuilder::default()
    }

    pub(crate) fn new(
        config: TandemConfig,
        system: AcquisitionSystem,
        statistics: Option<StatisticsWriter<File>>,
        results: Option<ResultsWriter<File>>,
    ) -> Self {
        let events = system.events();
        Self {
            config,
            system,
            events,
            statistics,
            results,
            cycles: 0,
            halted: None,
        }
    }

    pub fn config(&self) -> &TandemConfig {
        &self.config
    }

    /// Direct access to the acquisition system.
    pub fn system(&self) -> &AcquisitionSystem {
        &self.system
    }

    // Settings

    pub fn settings(&self) -> std::sync::Arc<SyncSettings> {
        self.system.settings()
    }

    pub fn push_settings(&self, settings: SyncSettings) -> Result<()> {
        Ok(self.system.push_settings(settings)?)
    }

    pub fn pause(&self) {
        self.system.pause();
    }

    pub fn resume(&self) {
        self.system.resume();
    }

    // Measurement

    pub fn step(&self) -> MeasurementStep {
        self.system.step()
    }

    pub fn start_measurement(
        &self,
        step: MeasurementStep,
        limits: Option<ChannelLimits>,
    ) -> Result<()> {
        Ok(self.system.start_measurement(step, limits)?)
    }

    pub fn end_measurement(&self) -> Result<()> {
        Ok(self.system.end_measurement()?)
    }

    pub fn reset_step(&self, step: MeasurementStep) -> Result<()> {
        Ok(self.system.reset_step(step)?)
    }

    pub fn latest_rates(&self) -> RateSnapshot {
        self.system.latest_rates()
    }

    pub fn report_for(&self, step: MeasurementStep) -> RateSnapshot {
        self.system.report_for(step)
    }

    pub fn result_for(&self, step: MeasurementStep) -> ExperimentResult {
        self.system.result_for(step)
    }

    pub fn state(&self) -> LoopState {
        self.system.state()
    }

    pub fn metrics(&self) -> LoopMetricsSnapshot {
        self.system.metrics()
    }

    // Events

    /// Wait up to `timeout` for the next loop event. Cycle records are written
    /// to the statistics file and rate ticks to the results file before being
    /// returned.
    pub fn next_event(&mut self, timeout: Duration) -> Result<Option<LoopEvent>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => {
                self.handle(&event)?;
                Ok(Some(event))
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => Ok(None),
        }
    }

    /// Consume events for `duration`, or until the loop stops or halts.
    pub fn run_for(
        &mut self,
        duration: Duration,
        mut on_event: impl FnMut(&LoopEvent),
    ) -> Result<RunSummary> {
        // `None` runs until the loop stops.
        let deadline = Instant::now().checked_add(duration);
        loop {
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => IDLE_WAIT,
            };
            if remaining.is_zero() {
                break;
            }
            let Some(event) = self.next_event(remaining.min(IDLE_WAIT))? else {
                if self.state().is_terminal() {
                    break;
                }
                continue;
            };
            on_event(&event);
            if matches!(event, LoopEvent::Halted { .. } | LoopEvent::Stopped) {
                break;
            }
        }
        self.flush()?;
        Ok(self.summary())
    }

    /// Stop the loop, drain the remaining events and flush statistics.
    pub fn shutdown(mut self) -> Result<RunSummary> {
        self.system.shutdown();
        let pending: Vec<LoopEvent> = self.events.try_iter().collect();
        for event in &pending {
            self.handle(event)?;
        }
        self.flush()?;

        let summary = self.summary();
        info!(
            "Engine stopped: {} cycles, {} statistics rows",
            summary.cycles, summary.rows
        );
        Ok(summary)
    }

    fn handle(&mut self, event: &LoopEvent) -> Result<()> {
        match event {
            LoopEvent::Cycle(record) => self.record(record)?,
            LoopEvent::Rates(rates) => {
                if let Some(results) = self.results.as_mut() {
                    results.write(&self.system.result_for(rates.step))?;
                }
            }
            LoopEvent::Halted { reason } => {
                warn!("Acquisition halted: {}", reason);
                self.halted = Some(reason.clone());
            }
            _ => {}
        }
        Ok(())
    }

    fn record(&mut self, record: &CycleRecord) -> Result<()> {
        self.cycles += 1;
        if let Some(statistics) = self.statistics.as_mut() {
            statistics.write_record(record)?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(statistics) = self.statistics.as_mut() {
            statistics.flush()?;
        }
        if let Some(results) = self.results.as_mut() {
            results.flush()?;
        }
        Ok(())
    }

    fn summary(&self) -> RunSummary {
        RunSummary {
            cycles: self.cycles,
            rows: self.statistics.as_ref().map_or(0, StatisticsWriter::rows),
            results: self.results.as_ref().map_or(0, ResultsWriter::rows),
            rates: self.system.latest_rates(),
            state: self.system.state(),
            halted: self.halted.clone(),
        }
    }
}
