//! Core types for tandem coincidence acquisition.
//!
//! - **Sample buffers**: four equal-length channels per trigger (two SCA, two raw)
//! - **Settings snapshots**: limits, trigger, timebase, detection mode
//! - **Sync channel**: wholesale settings replacement with a one-shot update flag
//! - **Configuration**: JSON experiment configuration with validation
//!
//! # Example
//!
//! ```ignore
//! use tandem_core::{SyncChannel, TandemConfig};
//!
//! let config = TandemConfig::load("config.json")?;
//! let sync = SyncChannel::new(config.initial_settings());
//!
//! sync.pause();
//! if let Some(settings) = sync.take_update() {
//!     assert!(settings.pause);
//! }
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod lockfree;
pub mod settings;
pub mod sync;

pub use buffer::{Channel, Sample, SampleBuffer, CHANNEL_COUNT};
pub use config::TandemConfig;
pub use error::{Error, Result};
pub use lockfree::AtomicFlag;
pub use settings::{
    sample_interval_seconds, AdvancedTriggerSettings, ChannelLimits, DetectionSettings,
    DeviceSettings, PeakSettings, PulseDetectionMode, SleepInterval, SyncSettings,
    TimebaseSettings, TriggerDirection, TriggerMode, TriggerSettings, VoltageRange,
    DEFAULT_SQUARE_THRESHOLD, DEFAULT_VOLTAGE_RANGES, MAX_ADC,
};
pub use sync::SyncChannel;
