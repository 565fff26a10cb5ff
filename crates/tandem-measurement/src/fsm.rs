//! Measurement step state machine.
//!
//! Each [`MeasurementStep`] owns its own [`RateAggregator`]. Starting a step
//! resets that step's totals only, so background history stays available for
//! correcting the later source and tandem steps.

use crate::aggregator::RateAggregator;
use crate::record::{CycleRecord, RateSnapshot};
use crate::results::ExperimentResult;
use crate::step::{MeasurementStep, STEP_COUNT};
use crate::{Error, Result};
use chrono::Utc;
use tandem_analysis::Evaluation;
use tandem_core::{
    Channel, ChannelLimits, SyncSettings, TandemConfig, TimebaseSettings, VoltageRange,
    CHANNEL_COUNT,
};
use tracing::info;

/// Calibration and geometry the state machine hands out per step.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementConfig {
    pub full_limits: ChannelLimits,
    pub gamma_limits: Option<ChannelLimits>,
    pub spectrum_timebase: TimebaseSettings,
    pub coincidence_timebase: TimebaseSettings,
    pub window_seconds: f64,
    /// Fallback background rate when the matching background step has no data.
    pub background_rate: f64,
    pub voltage_ranges: [VoltageRange; CHANNEL_COUNT],
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self::from(&TandemConfig::default())
    }
}

impl From<&TandemConfig> for MeasurementConfig {
    fn from(config: &TandemConfig) -> Self {
        Self {
            full_limits: config.limits,
            gamma_limits: config.gamma_limits,
            spectrum_timebase: config.spectrum_timebase,
            coincidence_timebase: config.coincidence_timebase,
            window_seconds: config.coincidence_window_ns * 1.0e-9,
            background_rate: config.background_rate,
            voltage_ranges: config.voltage_ranges,
        }
    }
}

impl MeasurementConfig {
    pub fn timebase_for(&self, step: MeasurementStep) -> TimebaseSettings {
        match step {
            MeasurementStep::FindSpectrum => self.spectrum_timebase,
            _ => self.coincidence_timebase,
        }
    }
}

/// Settings a step transition pushes into the acquisition loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepChange {
    pub step: MeasurementStep,
    pub limits: Option<ChannelLimits>,
    pub timebase: TimebaseSettings,
}

impl StepChange {
    pub fn apply(&self, settings: SyncSettings) -> SyncSettings {
        let settings = settings.with_timebase(self.timebase);
        match self.limits {
            Some(limits) => settings.with_limits(limits),
            None => settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionResult {
    Started(StepChange),
    Restarted(StepChange),
}

impl TransitionResult {
    pub fn change(&self) -> &StepChange {
        match self {
            TransitionResult::Started(change) | TransitionResult::Restarted(change) => change,
        }
    }
}

pub struct MeasurementStateMachine {
    step: MeasurementStep,
    aggregates: [RateAggregator; STEP_COUNT],
    config: MeasurementConfig,
    cycles: u64,
}

impl MeasurementStateMachine {
    pub fn new(config: MeasurementConfig, initial: MeasurementStep) -> Self {
        let aggregates = MeasurementStep::ALL
            .map(|step| RateAggregator::new(&config.timebase_for(step), config.window_seconds));

        Self {
            step: initial,
            aggregates,
            config,
            cycles: 0,
        }
    }

    #[inline]
    pub fn step(&self) -> MeasurementStep {
        self.step
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// Forward moves advance at most one phase; any earlier or equal phase is allowed.
    pub fn can_transition(&self, to: MeasurementStep) -> bool {
        to.phase() <= self.step.phase() + 1
    }

    /// Settings a transition to `to` would hand out, without taking it.
    pub fn plan(&self, to: MeasurementStep, limits: Option<ChannelLimits>) -> Result<StepChange> {
        if !self.can_transition(to) {
            return Err(Error::InvalidTransition {
                from: self.step,
                to,
            });
        }
        if let Some(limits) = &limits {
            limits.validate()?;
        }

        let limits = match limits {
            Some(limits) => Some(limits),
            None if to.uses_gamma_limits() => self.config.gamma_limits,
            None => Some(self.config.full_limits),
        };
        Ok(StepChange {
            step: to,
            limits,
            timebase: self.config.timebase_for(to),
        })
    }

    /// (Re)start a step. Supplied limits replace the stored calibration for
    /// that step's window (full or gamma).
    pub fn transition(
        &mut self,
        to: MeasurementStep,
        limits: Option<ChannelLimits>,
    ) -> Result<TransitionResult> {
        let change = self.plan(to, limits)?;
        if let Some(limits) = limits {
            if to.uses_gamma_limits() {
                self.config.gamma_limits = Some(limits);
            } else {
                self.config.full_limits = limits;
            }
        }

        self.aggregates[to.index()] =
            RateAggregator::new(&change.timebase, self.config.window_seconds);

        let restarted = to == self.step;
        self.step = to;
        info!("Measurement step {} {}", to, if restarted { "restarted" } else { "started" });

        Ok(if restarted {
            TransitionResult::Restarted(change)
        } else {
            TransitionResult::Started(change)
        })
    }

    /// Clear one step's totals without switching to it.
    pub fn reset_step(&mut self, step: MeasurementStep) {
        self.aggregates[step.index()].reset();
    }

    /// Follow a settings update: timebase and window feed the active step's rates.
    pub fn configure(&mut self, settings: &SyncSettings) {
        self.config.window_seconds = settings.coincidence_window_seconds();
        self.config.voltage_ranges = settings.voltage_ranges;
        self.aggregates[self.step.index()]
            .configure(&settings.timebase, settings.coincidence_window_seconds());
    }

    pub fn advance(&mut self, seconds: f64) {
        self.aggregates[self.step.index()].advance(seconds);
    }

    /// Aggregate one evaluation into the active step.
    pub fn record(&mut self, evaluation: &Evaluation, trigger_channel: Channel) -> CycleRecord {
        let step = self.step;
        let pulse_heights_mv = self.pulse_heights_mv(evaluation.pulse_heights);
        let aggregate = &mut self.aggregates[step.index()];
        aggregate.record(evaluation);
        self.cycles += 1;

        CycleRecord {
            cycle: self.cycles,
            step,
            timestamp: Utc::now(),
            elapsed_seconds: aggregate.elapsed_seconds(),
            counts: (evaluation.count_a, evaluation.count_b),
            totals: (
                aggregate.channel(Channel::A).total_count,
                aggregate.channel(Channel::B).total_count,
            ),
            rates: (aggregate.rate(Channel::A), aggregate.rate(Channel::B)),
            pulse_heights: evaluation.pulse_heights,
            pulse_heights_mv,
            time_differences: evaluation.time_differences.clone(),
            coincidence: evaluation.is_coincident(),
            coincidence_count: aggregate.coincidence_count(),
            background_elapsed_rate: aggregate.background_rate(),
            background_sample_rate: aggregate.background_sample_rate(),
            buffer_duration_seconds: aggregate.seconds_per_cycle(),
            trigger_channel,
        }
    }

    /// Pulse heights on the raw channels, in millivolts.
    fn pulse_heights_mv(&self, heights: (i32, i32)) -> (f64, f64) {
        let ranges = &self.config.voltage_ranges;
        (
            ranges[Channel::A.raw_index()].to_millivolts(heights.0),
            ranges[Channel::B.raw_index()].to_millivolts(heights.1),
        )
    }

    #[inline]
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn aggregate(&self, step: MeasurementStep) -> &RateAggregator {
        &self.aggregates[step.index()]
    }

    pub fn active(&self) -> &RateAggregator {
        self.aggregate(self.step)
    }

    /// Background rate used to correct `step`.
    pub fn background_for(&self, step: MeasurementStep) -> f64 {
        step.background_reference()
            .map(|reference| self.aggregate(reference))
            .filter(|aggregate| aggregate.has_data() && aggregate.elapsed_seconds() > 0.0)
            .map(RateAggregator::background_rate)
            .unwrap_or(self.config.background_rate)
    }

    pub fn report_for(&self, step: MeasurementStep) -> RateSnapshot {
        let aggregate = self.aggregate(step);
        let background = step
            .background_reference()
            .map(|_| self.background_for(step));
        let rates = aggregate.derive(background);
        RateSnapshot::new(step, aggregate.rate_count(), aggregate.elapsed_seconds(), &rates)
    }

    pub fn report(&self) -> RateSnapshot {
        self.report_for(self.step)
    }

    /// Results row for `step`: its rate snapshot plus raw totals.
    pub fn result_for(&self, step: MeasurementStep) -> ExperimentResult {
        ExperimentResult::new(&self.report_for(step), self.aggregate(step))
    }

    pub fn result(&self) -> ExperimentResult {
        self.result_for(self.step)
    }
}

impl Default for MeasurementStateMachine {
    fn default() -> Self {
        Self::new(MeasurementConfig::default(), MeasurementStep::FindSpectrum)
    }
}
