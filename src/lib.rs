//! # Tandem - Coincidence Acquisition Pipeline
//!
//! Acquisition-to-coincidence pipeline for the tandem piercer experiment,
//! built from modular subsystems.
//!
//! ## Architecture
//!
//! Tandem is an umbrella crate that coordinates:
//! - **tandem-core** - Sample buffers, settings snapshots, sync channel, configuration
//! - **tandem-analysis** - Edge detection, peak finding, coincidence evaluation
//! - **tandem-measurement** - Rate aggregation, measurement steps, statistics rows
//! - **tandem-acquisition** - Buffer sources and the acquisition thread
//!
//! ## Quick Start
//!
//! ```ignore
//! use tandem::prelude::*;
//!
//! let mut engine = TandemEngine::builder()
//!     .config(TandemConfig::default())
//!     .build()?;
//!
//! engine.start_measurement(MeasurementStep::BackgroundFullNear, None)?;
//! engine.run_for(Duration::from_secs(10), |event| {
//!     if let LoopEvent::Rates(rates) = event {
//!         println!("A: {:.1}/s  B: {:.1}/s", rates.rate_a, rates.rate_b);
//!     }
//! })?;
//! engine.shutdown()?;
//! ```

/// Re-export of tandem-core for direct access
pub use tandem_core as core;

pub use tandem_acquisition as acquisition;
pub use tandem_analysis as analysis;
pub use tandem_measurement as measurement;

// Core types
pub use tandem_core::{
    AdvancedTriggerSettings, Channel, ChannelLimits, DetectionSettings, PulseDetectionMode,
    Sample, SampleBuffer, SyncChannel, SyncSettings, TandemConfig, TimebaseSettings,
    TriggerSettings, VoltageRange,
};

// Analysis
pub use tandem_analysis::{evaluate, Classification, Edge, EdgeDetector, Evaluation};

// Measurement
pub use tandem_measurement::{
    CycleRecord, ExperimentResult, MeasurementStateMachine, MeasurementStep, RateAggregator,
    RateSnapshot, ResultsWriter, StatisticsWriter,
};

// Acquisition
pub use tandem_acquisition::{
    AcquisitionSystem, BufferSource, LiveDevice, LoopEvent, LoopState, PlaybackFile, ScopeDriver,
    Simulator, WaveformRecorder,
};

mod builder;
mod engine;
mod error;

pub use builder::TandemEngineBuilder;
pub use engine::{RunSummary, TandemEngine};
pub use error::{Error, Result};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{RunSummary, TandemEngine, TandemEngineBuilder};

    // Settings
    pub use crate::core::{ChannelLimits, SyncSettings, TandemConfig};

    // Measurement
    pub use crate::measurement::{MeasurementStep, RateSnapshot};

    // Loop events
    pub use crate::acquisition::{LoopEvent, LoopState};

    pub use std::time::Duration;
}
