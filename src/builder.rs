//! Builder for configuring and constructing a `TandemEngine`.

use crate::{Result, TandemEngine};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tandem_acquisition::{AcquisitionSystem, BufferSource, ScopeDriver};
use tandem_core::TandemConfig;
use tandem_measurement::{MeasurementStep, ResultsWriter, StatisticsWriter};

/// The source is picked from what is supplied: an explicit source or driver
/// wins, then the configured playback file, then the simulator.
///
/// # Example
///
/// ```ignore
/// use tandem::prelude::*;
///
/// let engine = TandemEngine::builder()
///     .config(TandemConfig::default())
///     .step(MeasurementStep::FindSpectrum)
///     .seed(7)
///     .build()?;
/// ```
#[derive(Default)]
pub struct TandemEngineBuilder {
    config: TandemConfig,
    step: MeasurementStep,
    source: Option<Box<dyn BufferSource>>,
    seed: u64,
    rate_tick: Option<Duration>,
    statistics_file: Option<PathBuf>,
    results_file: Option<PathBuf>,
    paused: bool,
}

impl TandemEngineBuilder {
    pub fn config(mut self, config: TandemConfig) -> Self {
        self.config = config;
        self
    }

    /// Load the JSON configuration at `path`.
    pub fn config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let config = TandemConfig::load(path)?;
        Ok(self.config(config))
    }

    pub fn step(mut self, step: MeasurementStep) -> Self {
        self.step = step;
        self
    }

    pub fn source(mut self, source: impl BufferSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn driver<D: ScopeDriver + 'static>(self, driver: D) -> Result<Self> {
        let device = tandem_acquisition::LiveDevice::new(driver, Default::default())?;
        Ok(self.source(device))
    }

    /// Seed for the simulator and sleep jitter.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn rate_tick(mut self, tick: Duration) -> Self {
        self.rate_tick = Some(tick);
        self
    }

    /// Append statistics rows here instead of the configured file.
    pub fn statistics_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.statistics_file = Some(path.into());
        self
    }

    /// Append per-tick results here instead of the configured file.
    pub fn results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.paused = paused;
        self
    }

    pub fn build(self) -> Result<TandemEngine> {
        let statistics = self
            .statistics_file
            .or_else(|| self.config.statistics_file.clone())
            .map(StatisticsWriter::append)
            .transpose()?;
        let results = self
            .results_file
            .or_else(|| self.config.results_file.clone())
            .map(ResultsWriter::append)
            .transpose()?;

        let mut builder = AcquisitionSystem::builder()
            .config(self.config.clone())
            .step(self.step)
            .seed(self.seed)
            .paused(self.paused);
        if let Some(tick) = self.rate_tick {
            builder = builder.rate_tick(tick);
        }
        if let Some(source) = self.source {
            builder = builder.source(source);
        }
        let system = builder.build()?;

        Ok(TandemEngine::new(self.config, system, statistics, results))
    }
}
