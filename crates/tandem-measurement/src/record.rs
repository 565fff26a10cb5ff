//! Records published to the consumer.

use crate::aggregator::DerivedRates;
use crate::step::{MeasurementStep, MetricSelection};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tandem_core::Channel;

/// One acquisition cycle, published in acquisition order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Monotonic across measurement steps.
    pub cycle: u64,
    pub step: MeasurementStep,
    pub timestamp: DateTime<Utc>,
    /// Running time of the step when the cycle was recorded.
    pub elapsed_seconds: f64,
    pub counts: (usize, usize),
    pub totals: (u64, u64),
    /// Per-second channel rates after this cycle.
    pub rates: (f64, f64),
    pub pulse_heights: (i32, i32),
    /// Raw-channel pulse heights scaled by the configured voltage ranges.
    pub pulse_heights_mv: (f64, f64),
    pub time_differences: Vec<i64>,
    pub coincidence: bool,
    pub coincidence_count: u64,
    pub background_elapsed_rate: f64,
    pub background_sample_rate: f64,
    pub buffer_duration_seconds: f64,
    pub trigger_channel: Channel,
}

/// Aggregated rates for the active step.
///
/// Fields a step does not expose are `None`: spectrum discovery reports
/// singles only and background steps add the background rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub step: MeasurementStep,
    pub cycles: u64,
    pub elapsed_seconds: f64,
    pub rate_a: f64,
    pub rate_b: f64,
    pub background_rate: Option<f64>,
    pub chance_rate: Option<f64>,
    pub experiment_rate: Option<f64>,
    pub corrected_rate: Option<f64>,
    pub unquantum_effect_ratio: Option<f64>,
}

impl RateSnapshot {
    pub fn new(
        step: MeasurementStep,
        cycles: u64,
        elapsed_seconds: f64,
        rates: &DerivedRates,
    ) -> Self {
        let mut snapshot = Self {
            step,
            cycles,
            elapsed_seconds,
            rate_a: rates.rate_a,
            rate_b: rates.rate_b,
            background_rate: None,
            chance_rate: None,
            experiment_rate: None,
            corrected_rate: None,
            unquantum_effect_ratio: None,
        };

        match step.metrics() {
            MetricSelection::Singles => {}
            MetricSelection::Background => {
                snapshot.background_rate = Some(rates.background_rate);
            }
            MetricSelection::Coincidence => {
                snapshot.background_rate = Some(rates.background_rate);
                snapshot.chance_rate = Some(rates.chance_rate);
                snapshot.experiment_rate = Some(rates.experiment_rate);
                snapshot.corrected_rate = Some(rates.corrected_rate);
                snapshot.unquantum_effect_ratio = Some(rates.unquantum_effect_ratio);
            }
        }
        snapshot
    }

    pub fn empty(step: MeasurementStep) -> Self {
        Self::new(step, 0, 0.0, &DerivedRates::default())
    }
}
