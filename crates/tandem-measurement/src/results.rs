//! Per-experiment results, one row per rate tick.

use crate::aggregator::RateAggregator;
use crate::record::RateSnapshot;
use crate::statistics::{delimited, open_append};
use crate::step::MeasurementStep;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tandem_core::Channel;
use tracing::debug;

pub const RESULTS_HEADER: [&str; 12] = [
    "time_window",
    "background_rate",
    "total_coincident_clicks_detectors",
    "total_single_clicks_detector_a",
    "total_single_clicks_detector_b",
    "total_singles_rate_detector_a",
    "total_singles_rate_detector_b",
    "total_experiment_time",
    "change_rate",
    "experiment_rate",
    "corrected_experiment_rate",
    "unquantum_effect",
];

/// Totals and derived rates of one step. Rates the step does not expose are 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub step: MeasurementStep,
    /// Coincidence window in nanoseconds.
    pub window_ns: f64,
    pub background_rate: f64,
    /// Pairings inside the window.
    pub coincidences: u64,
    pub singles: (u64, u64),
    pub singles_rates: (f64, f64),
    pub elapsed_seconds: f64,
    pub chance_rate: f64,
    pub experiment_rate: f64,
    pub corrected_rate: f64,
    pub unquantum_effect_ratio: f64,
}

impl ExperimentResult {
    pub fn new(snapshot: &RateSnapshot, aggregate: &RateAggregator) -> Self {
        Self {
            step: snapshot.step,
            window_ns: aggregate.window_seconds() * 1.0e9,
            background_rate: snapshot.background_rate.unwrap_or_default(),
            coincidences: aggregate.window_coincidences(),
            singles: (
                aggregate.channel(Channel::A).total_count,
                aggregate.channel(Channel::B).total_count,
            ),
            singles_rates: (snapshot.rate_a, snapshot.rate_b),
            elapsed_seconds: snapshot.elapsed_seconds,
            chance_rate: snapshot.chance_rate.unwrap_or_default(),
            experiment_rate: snapshot.experiment_rate.unwrap_or_default(),
            corrected_rate: snapshot.corrected_rate.unwrap_or_default(),
            unquantum_effect_ratio: snapshot.unquantum_effect_ratio.unwrap_or_default(),
        }
    }

    fn fields(&self) -> [String; 12] {
        [
            self.window_ns.to_string(),
            self.background_rate.to_string(),
            self.coincidences.to_string(),
            self.singles.0.to_string(),
            self.singles.1.to_string(),
            self.singles_rates.0.to_string(),
            self.singles_rates.1.to_string(),
            self.elapsed_seconds.to_string(),
            self.chance_rate.to_string(),
            self.experiment_rate.to_string(),
            self.corrected_rate.to_string(),
            self.unquantum_effect_ratio.to_string(),
        ]
    }
}

pub struct ResultsWriter<W: Write = File> {
    writer: csv::Writer<W>,
    rows: u64,
}

impl ResultsWriter<File> {
    /// Append to `path`, writing the header when the file is new or empty.
    pub fn append(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (file, is_empty) = open_append(path)?;

        let mut writer = Self::new(file);
        if is_empty {
            writer.write_header()?;
        }
        debug!("Results file opened: {}", path.display());
        Ok(writer)
    }
}

impl<W: Write> ResultsWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: delimited(writer),
            rows: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer.write_record(RESULTS_HEADER)?;
        Ok(())
    }

    pub fn write(&mut self, result: &ExperimentResult) -> Result<()> {
        self.writer.write_record(result.fields())?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| e.into_error().into())
    }
}
