//! Experiment configuration.

use crate::buffer::CHANNEL_COUNT;
use crate::settings::{
    AdvancedTriggerSettings, ChannelLimits, DetectionSettings, SleepInterval, SyncSettings,
    TimebaseSettings, TriggerSettings, VoltageRange, DEFAULT_VOLTAGE_RANGES,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Top-level configuration, stored as JSON.
///
/// Missing fields fall back to the defaults, so a partial file is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TandemConfig {
    pub experiment_name: String,
    pub voltage_ranges: [VoltageRange; CHANNEL_COUNT],
    /// Full-spectrum limits.
    pub limits: ChannelLimits,
    /// Photo-peak limits selected during spectrum discovery.
    pub gamma_limits: Option<ChannelLimits>,
    pub trigger: TriggerSettings,
    /// Armed only while `trigger.enabled` is false.
    pub advanced_trigger: AdvancedTriggerSettings,
    /// Capture geometry while discovering the spectrum.
    pub spectrum_timebase: TimebaseSettings,
    /// Capture geometry for background and coincidence steps.
    pub coincidence_timebase: TimebaseSettings,
    pub detection: DetectionSettings,
    pub sleep: SleepInterval,
    pub coincidence_window_ns: f64,
    /// Background coincidence rate (1/s) used when no background step has data.
    pub background_rate: f64,
    /// Interval between published rate snapshots.
    pub rate_tick_seconds: f64,
    pub playback_file: Option<PathBuf>,
    pub record_file: Option<PathBuf>,
    pub statistics_file: Option<PathBuf>,
    /// Per-tick experiment results.
    pub results_file: Option<PathBuf>,
    /// Stop the headless runner after this many seconds.
    pub execution_time_seconds: Option<f64>,
}

impl Default for TandemConfig {
    fn default() -> Self {
        Self {
            experiment_name: "Tandem Piercer Experiment".to_string(),
            voltage_ranges: DEFAULT_VOLTAGE_RANGES,
            limits: ChannelLimits::default(),
            gamma_limits: None,
            trigger: TriggerSettings::default(),
            advanced_trigger: AdvancedTriggerSettings::default(),
            spectrum_timebase: TimebaseSettings::new(2, 250, 250),
            coincidence_timebase: TimebaseSettings::new(2, 125, 125),
            detection: DetectionSettings::default(),
            sleep: SleepInterval::default(),
            coincidence_window_ns: 2000.0,
            background_rate: 0.0,
            rate_tick_seconds: 1.0,
            playback_file: None,
            record_file: None,
            statistics_file: None,
            results_file: None,
            execution_time_seconds: None,
        }
    }
}

impl TandemConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        if let Some(gamma) = &self.gamma_limits {
            gamma.validate()?;
        }
        self.spectrum_timebase.validate()?;
        self.coincidence_timebase.validate()?;
        self.sleep.validate()?;
        self.advanced_trigger.validate()?;

        if !(self.coincidence_window_ns > 0.0 && self.coincidence_window_ns.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "coincidence_window_ns must be positive, got {}",
                self.coincidence_window_ns
            )));
        }
        if !(self.background_rate >= 0.0 && self.background_rate.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "background_rate must be non-negative, got {}",
                self.background_rate
            )));
        }
        if !(self.rate_tick_seconds > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "rate_tick_seconds must be positive, got {}",
                self.rate_tick_seconds
            )));
        }
        if let Some(seconds) = self.execution_time_seconds {
            if !(seconds > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "execution_time_seconds must be positive, got {}",
                    seconds
                )));
            }
        }
        Ok(())
    }

    /// Initial settings snapshot handed to the sync channel.
    pub fn initial_settings(&self) -> SyncSettings {
        SyncSettings {
            main_loop: true,
            pause: false,
            playback_file: self.playback_file.clone(),
            limits: self.limits,
            trigger: self.trigger,
            advanced_trigger: self.advanced_trigger,
            timebase: self.coincidence_timebase,
            voltage_ranges: self.voltage_ranges,
            detection: self.detection,
            sleep: self.sleep,
            coincidence_window_ns: self.coincidence_window_ns,
        }
    }
}
