//! Running counts and derived rates.
//!
//! Only totals are stored. Every derived rate is recomputed from them on
//! demand so rounding never compounds across cycles.

use serde::{Deserialize, Serialize};
use tandem_analysis::Evaluation;
use tandem_core::{Channel, TimebaseSettings};

/// Per-channel pulse counts across cycles.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunningRate {
    pub total_count: u64,
    /// Cycles seen.
    pub rate_count: u64,
    /// `total_count / rate_count`, pulses per cycle.
    pub running_average: f64,
    /// Smallest per-cycle count, valid once `rate_count > 0`.
    pub min: u64,
    pub max: u64,
}

impl RunningRate {
    pub fn record(&mut self, count: u64) {
        self.min = if self.rate_count == 0 {
            count
        } else {
            self.min.min(count)
        };
        self.max = self.max.max(count);
        self.rate_count += 1;
        self.total_count += count;
        self.running_average = self.total_count as f64 / self.rate_count as f64;
    }

    /// Pulses per second given the real time covered by one cycle.
    pub fn per_second(&self, seconds_per_cycle: f64) -> f64 {
        if seconds_per_cycle > 0.0 {
            self.running_average / seconds_per_cycle
        } else {
            0.0
        }
    }
}

/// `count / elapsed`, zero before any time has elapsed.
#[inline]
pub fn per_second(count: u64, elapsed_seconds: f64) -> f64 {
    if elapsed_seconds > 0.0 {
        count as f64 / elapsed_seconds
    } else {
        0.0
    }
}

/// Expected accidental coincidence rate of two independent channels.
#[inline]
pub fn chance_rate(rate_a: f64, rate_b: f64, window_seconds: f64) -> f64 {
    rate_a * rate_b * window_seconds
}

/// `corrected / chance`, defined as zero when the chance rate is zero.
#[inline]
pub fn unquantum_effect_ratio(corrected_rate: f64, chance_rate: f64) -> f64 {
    if chance_rate == 0.0 {
        0.0
    } else {
        corrected_rate / chance_rate
    }
}

/// Rates derived from one aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DerivedRates {
    pub rate_a: f64,
    pub rate_b: f64,
    /// Pairings per elapsed second.
    pub background_rate: f64,
    /// Pairings per second of sampled buffer time.
    pub background_sample_rate: f64,
    pub chance_rate: f64,
    /// In-window coincidences per elapsed second.
    pub experiment_rate: f64,
    pub corrected_rate: f64,
    pub unquantum_effect_ratio: f64,
}

/// Totals for one measurement step.
#[derive(Debug, Clone, PartialEq)]
pub struct RateAggregator {
    channel_a: RunningRate,
    channel_b: RunningRate,
    coincidence_count: u64,
    window_coincidences: u64,
    elapsed_seconds: f64,
    seconds_per_cycle: f64,
    sample_interval_seconds: f64,
    window_seconds: f64,
}

impl RateAggregator {
    pub fn new(timebase: &TimebaseSettings, window_seconds: f64) -> Self {
        Self {
            channel_a: RunningRate::default(),
            channel_b: RunningRate::default(),
            coincidence_count: 0,
            window_coincidences: 0,
            elapsed_seconds: 0.0,
            seconds_per_cycle: timebase.buffer_duration_seconds(),
            sample_interval_seconds: timebase.sample_interval_seconds(),
            window_seconds,
        }
    }

    /// Update the conversion factors; totals are kept.
    pub fn configure(&mut self, timebase: &TimebaseSettings, window_seconds: f64) {
        self.seconds_per_cycle = timebase.buffer_duration_seconds();
        self.sample_interval_seconds = timebase.sample_interval_seconds();
        self.window_seconds = window_seconds;
    }

    pub fn reset(&mut self) {
        self.channel_a = RunningRate::default();
        self.channel_b = RunningRate::default();
        self.coincidence_count = 0;
        self.window_coincidences = 0;
        self.elapsed_seconds = 0.0;
    }

    pub fn record(&mut self, evaluation: &Evaluation) {
        let count_a = evaluation.count_a as u64;
        let count_b = evaluation.count_b as u64;

        self.channel_a.record(count_a);
        self.channel_b.record(count_b);
        self.coincidence_count += count_a * count_b;

        let window = self.window_seconds;
        let interval = self.sample_interval_seconds;
        self.window_coincidences += evaluation
            .time_differences
            .iter()
            .filter(|&&td| td.unsigned_abs() as f64 * interval <= window)
            .count() as u64;
    }

    /// Add measured running time.
    pub fn advance(&mut self, seconds: f64) {
        if seconds > 0.0 {
            self.elapsed_seconds += seconds;
        }
    }

    #[inline]
    pub fn channel(&self, channel: Channel) -> &RunningRate {
        match channel {
            Channel::A => &self.channel_a,
            Channel::B => &self.channel_b,
        }
    }

    #[inline]
    pub fn rate_count(&self) -> u64 {
        self.channel_a.rate_count
    }

    #[inline]
    pub fn has_data(&self) -> bool {
        self.rate_count() > 0
    }

    #[inline]
    pub fn coincidence_count(&self) -> u64 {
        self.coincidence_count
    }

    #[inline]
    pub fn window_coincidences(&self) -> u64 {
        self.window_coincidences
    }

    #[inline]
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    #[inline]
    pub fn seconds_per_cycle(&self) -> f64 {
        self.seconds_per_cycle
    }

    #[inline]
    pub fn window_seconds(&self) -> f64 {
        self.window_seconds
    }

    pub fn rate(&self, channel: Channel) -> f64 {
        self.channel(channel).per_second(self.seconds_per_cycle)
    }

    pub fn background_rate(&self) -> f64 {
        per_second(self.coincidence_count, self.elapsed_seconds)
    }

    pub fn background_sample_rate(&self) -> f64 {
        per_second(
            self.coincidence_count,
            self.rate_count() as f64 * self.seconds_per_cycle,
        )
    }

    /// Derive all rates. `background` overrides this aggregator's own
    /// background rate in the correction.
    pub fn derive(&self, background: Option<f64>) -> DerivedRates {
        let rate_a = self.rate(Channel::A);
        let rate_b = self.rate(Channel::B);
        let background_rate = background.unwrap_or_else(|| self.background_rate());
        let chance = chance_rate(rate_a, rate_b, self.window_seconds);
        let experiment_rate = per_second(self.window_coincidences, self.elapsed_seconds);
        let corrected_rate = experiment_rate - background_rate;

        DerivedRates {
            rate_a,
            rate_b,
            background_rate,
            background_sample_rate: self.background_sample_rate(),
            chance_rate: chance,
            experiment_rate,
            corrected_rate,
            unquantum_effect_ratio: unquantum_effect_ratio(corrected_rate, chance),
        }
    }
}

impl Default for RateAggregator {
    fn default() -> Self {
        Self::new(&TimebaseSettings::default(), 2.0e-6)
    }
}
