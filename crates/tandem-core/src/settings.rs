//! Acquisition settings snapshot.
//!
//! [`SyncSettings`] is never mutated in place once shared. A controller builds a
//! new value (usually by cloning the current snapshot) and pushes it through the
//! [`SyncChannel`](crate::SyncChannel).

use crate::buffer::{Channel, CHANNEL_COUNT};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Square-wave detection threshold in ADC units.
pub const DEFAULT_SQUARE_THRESHOLD: i32 = 8192;

/// Full-scale ADC count of a 2000A channel.
pub const MAX_ADC: i32 = 32767;

/// Per-channel input range of the scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoltageRange {
    #[serde(rename = "10mV")]
    Mv10,
    #[serde(rename = "20mV")]
    Mv20,
    #[serde(rename = "50mV")]
    Mv50,
    #[serde(rename = "100mV")]
    Mv100,
    #[serde(rename = "200mV")]
    Mv200,
    #[serde(rename = "500mV")]
    Mv500,
    #[serde(rename = "1V")]
    V1,
    #[serde(rename = "2V")]
    V2,
    #[serde(rename = "5V")]
    V5,
    #[serde(rename = "10V")]
    V10,
    #[serde(rename = "20V")]
    V20,
}

impl VoltageRange {
    pub fn millivolts(self) -> u32 {
        match self {
            VoltageRange::Mv10 => 10,
            VoltageRange::Mv20 => 20,
            VoltageRange::Mv50 => 50,
            VoltageRange::Mv100 => 100,
            VoltageRange::Mv200 => 200,
            VoltageRange::Mv500 => 500,
            VoltageRange::V1 => 1_000,
            VoltageRange::V2 => 2_000,
            VoltageRange::V5 => 5_000,
            VoltageRange::V10 => 10_000,
            VoltageRange::V20 => 20_000,
        }
    }

    /// Scale an ADC count to millivolts across this range.
    #[inline]
    pub fn to_millivolts(self, adc: i32) -> f64 {
        f64::from(adc) * f64::from(self.millivolts()) / f64::from(MAX_ADC)
    }
}

/// SCA channels use 10 V, raw channels 20 V.
pub const DEFAULT_VOLTAGE_RANGES: [VoltageRange; CHANNEL_COUNT] = [
    VoltageRange::V10,
    VoltageRange::V10,
    VoltageRange::V20,
    VoltageRange::V20,
];

/// Spectrum window per channel in ADC units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLimits {
    pub low: [i32; CHANNEL_COUNT],
    pub high: [i32; CHANNEL_COUNT],
}

impl ChannelLimits {
    pub fn new(low: [i32; CHANNEL_COUNT], high: [i32; CHANNEL_COUNT]) -> Result<Self> {
        let limits = Self { low, high };
        limits.validate()?;
        Ok(limits)
    }

    pub fn validate(&self) -> Result<()> {
        for channel in 0..CHANNEL_COUNT {
            if self.low[channel] > self.high[channel] {
                return Err(Error::InvalidLimits {
                    channel,
                    low: self.low[channel],
                    high: self.high[channel],
                });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn contains(&self, channel: usize, value: i32) -> bool {
        value >= self.low[channel] && value <= self.high[channel]
    }
}

impl Default for ChannelLimits {
    /// Full-range limits: 20 V raw channels clip at 12 V (19660).
    fn default() -> Self {
        Self {
            low: [4096, 4096, 500, 500],
            high: [32767, 32767, 19660, 19660],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TriggerDirection {
    Above,
    Below,
    #[default]
    Rising,
    Falling,
    RisingOrFalling,
}

/// Simple level trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSettings {
    pub enabled: bool,
    /// Swap the trigger between A and B after every capture.
    pub alternate_channel: bool,
    pub channel: Channel,
    /// ADC level.
    pub threshold: i16,
    pub direction: TriggerDirection,
    /// Samples between trigger and capture start.
    pub delay: u32,
    /// Device releases the capture after this long without a trigger. 0 waits forever.
    pub auto_trigger_ms: u32,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            alternate_channel: true,
            channel: Channel::A,
            threshold: 16384,
            direction: TriggerDirection::Rising,
            delay: 0,
            auto_trigger_ms: 1000,
        }
    }
}

/// Two-channel trigger used when the simple trigger is disabled.
///
/// Fires when either SCA channel rises past `upper_threshold` and re-arms once
/// the level falls by `upper_hysteresis` percent of the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdvancedTriggerSettings {
    pub enabled: bool,
    /// Percent of the 16-bit ADC span.
    pub upper_threshold: f64,
    /// Percent of the threshold.
    pub upper_hysteresis: f64,
    pub auto_trigger_ms: u32,
}

impl AdvancedTriggerSettings {
    /// Threshold in ADC counts.
    pub fn threshold_counts(&self) -> i16 {
        (65536.0 * self.upper_threshold / 100.0).clamp(0.0, f64::from(i16::MAX)) as i16
    }

    /// Hysteresis in ADC counts.
    pub fn hysteresis_counts(&self) -> u16 {
        (self.upper_hysteresis / 100.0 * f64::from(self.threshold_counts())) as u16
    }

    pub fn validate(&self) -> Result<()> {
        let in_percent = |value: f64| (0.0..=100.0).contains(&value);
        if !in_percent(self.upper_threshold) || !in_percent(self.upper_hysteresis) {
            return Err(Error::InvalidConfig(format!(
                "advanced trigger threshold {} and hysteresis {} must be percentages",
                self.upper_threshold, self.upper_hysteresis
            )));
        }
        Ok(())
    }
}

impl Default for AdvancedTriggerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            upper_threshold: 20.0,
            upper_hysteresis: 2.5,
            auto_trigger_ms: 1000,
        }
    }
}

/// Which trigger the device arms. The simple trigger wins when both are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMode {
    Simple,
    Advanced,
    None,
}

/// Sample interval for a PicoScope 2000A timebase index.
///
/// `n < 3` gives `2^n` ns, larger values `(n - 2) / 125 MHz`.
pub fn sample_interval_seconds(timebase: u32) -> f64 {
    if timebase < 3 {
        f64::from(1u32 << timebase) / 1.0e9
    } else {
        f64::from(timebase - 2) / 125.0e6
    }
}

/// Capture geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimebaseSettings {
    pub timebase: u32,
    pub pre_trigger_samples: usize,
    pub post_trigger_samples: usize,
}

impl TimebaseSettings {
    pub fn new(timebase: u32, pre_trigger_samples: usize, post_trigger_samples: usize) -> Self {
        Self {
            timebase,
            pre_trigger_samples,
            post_trigger_samples,
        }
    }

    #[inline]
    pub fn total_samples(&self) -> usize {
        self.pre_trigger_samples + self.post_trigger_samples
    }

    #[inline]
    pub fn sample_interval_seconds(&self) -> f64 {
        sample_interval_seconds(self.timebase)
    }

    /// Real time covered by one buffer; converts per-cycle averages into rates.
    #[inline]
    pub fn buffer_duration_seconds(&self) -> f64 {
        self.sample_interval_seconds() * self.total_samples() as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.timebase > 1 << 30 {
            return Err(Error::InvalidTimebase(self.timebase));
        }
        if self.total_samples() < 2 {
            return Err(Error::InvalidConfig(format!(
                "buffer of {} samples is too short",
                self.total_samples()
            )));
        }
        Ok(())
    }
}

impl Default for TimebaseSettings {
    fn default() -> Self {
        Self::new(2, 125, 125)
    }
}

/// Which edge detector runs on the channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PulseDetectionMode {
    /// Threshold crossing on the SCA channels.
    #[default]
    Square = 0,
    /// Peak finding on the baseline-corrected raw channels.
    RawWaveform = 1,
}

impl TryFrom<u8> for PulseDetectionMode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(PulseDetectionMode::Square),
            1 => Ok(PulseDetectionMode::RawWaveform),
            other => Err(Error::InvalidDetectionMode(other)),
        }
    }
}

impl From<PulseDetectionMode> for u8 {
    fn from(mode: PulseDetectionMode) -> Self {
        mode as u8
    }
}

/// Peak finder constraints for raw-waveform mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakSettings {
    pub min_height: f64,
    pub min_prominence: f64,
    /// Width at half prominence, in samples.
    pub min_width: f64,
    /// Minimum separation between kept peaks, in samples.
    pub min_distance: usize,
}

impl Default for PeakSettings {
    fn default() -> Self {
        Self {
            min_height: 500.0,
            min_prominence: 250.0,
            min_width: 2.0,
            min_distance: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    pub mode: PulseDetectionMode,
    pub square_threshold: i32,
    pub peaks: PeakSettings,
}

impl Default for DetectionSettings {
    fn default() -> Self {
        Self {
            mode: PulseDetectionMode::Square,
            square_threshold: DEFAULT_SQUARE_THRESHOLD,
            peaks: PeakSettings::default(),
        }
    }
}

/// Idle sleep range in seconds. The loop draws uniformly from `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SleepInterval {
    pub min_seconds: f64,
    pub max_seconds: f64,
}

impl SleepInterval {
    pub fn fixed(seconds: f64) -> Self {
        Self {
            min_seconds: seconds,
            max_seconds: seconds,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_seconds >= 0.0 && self.min_seconds <= self.max_seconds) {
            return Err(Error::InvalidConfig(format!(
                "sleep interval [{}, {}] is not a valid range",
                self.min_seconds, self.max_seconds
            )));
        }
        Ok(())
    }

    pub fn min_duration(&self) -> Duration {
        Duration::from_secs_f64(self.min_seconds)
    }
}

impl Default for SleepInterval {
    fn default() -> Self {
        Self::fixed(1.0e-5)
    }
}

/// Device-facing part of the settings; a change here forces reconfiguration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceSettings {
    pub voltage_ranges: [VoltageRange; CHANNEL_COUNT],
    pub trigger: TriggerSettings,
    pub advanced_trigger: AdvancedTriggerSettings,
    pub timebase: TimebaseSettings,
}

impl DeviceSettings {
    pub fn trigger_mode(&self) -> TriggerMode {
        if self.trigger.enabled {
            TriggerMode::Simple
        } else if self.advanced_trigger.enabled {
            TriggerMode::Advanced
        } else {
            TriggerMode::None
        }
    }
}

/// The shared configuration record read by the acquisition loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Cleared to terminate the loop at the next cycle boundary.
    pub main_loop: bool,
    pub pause: bool,
    pub playback_file: Option<PathBuf>,
    pub limits: ChannelLimits,
    pub trigger: TriggerSettings,
    #[serde(default)]
    pub advanced_trigger: AdvancedTriggerSettings,
    pub timebase: TimebaseSettings,
    pub voltage_ranges: [VoltageRange; CHANNEL_COUNT],
    pub detection: DetectionSettings,
    pub sleep: SleepInterval,
    /// Width of the coincidence window in nanoseconds.
    pub coincidence_window_ns: f64,
}

impl SyncSettings {
    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            voltage_ranges: self.voltage_ranges,
            trigger: self.trigger,
            advanced_trigger: self.advanced_trigger,
            timebase: self.timebase,
        }
    }

    #[inline]
    pub fn coincidence_window_seconds(&self) -> f64 {
        self.coincidence_window_ns * 1.0e-9
    }

    pub fn paused(mut self, pause: bool) -> Self {
        self.pause = pause;
        self
    }

    pub fn stopped(mut self) -> Self {
        self.main_loop = false;
        self
    }

    pub fn with_limits(mut self, limits: ChannelLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_playback_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.playback_file = Some(path.into());
        self
    }

    pub fn with_timebase(mut self, timebase: TimebaseSettings) -> Self {
        self.timebase = timebase;
        self
    }

    pub fn with_detection_mode(mut self, mode: PulseDetectionMode) -> Self {
        self.detection.mode = mode;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.limits.validate()?;
        self.timebase.validate()?;
        self.sleep.validate()?;
        self.advanced_trigger.validate()?;
        if !(self.coincidence_window_ns > 0.0 && self.coincidence_window_ns.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "coincidence window must be positive, got {} ns",
                self.coincidence_window_ns
            )));
        }
        Ok(())
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            main_loop: true,
            pause: false,
            playback_file: None,
            limits: ChannelLimits::default(),
            trigger: TriggerSettings::default(),
            advanced_trigger: AdvancedTriggerSettings::default(),
            timebase: TimebaseSettings::default(),
            voltage_ranges: DEFAULT_VOLTAGE_RANGES,
            detection: DetectionSettings::default(),
            sleep: SleepInterval::default(),
            coincidence_window_ns: 2000.0,
        }
    }
}
