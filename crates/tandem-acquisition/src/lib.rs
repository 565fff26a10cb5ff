//! # Tandem Acquisition
//!
//! Buffer sources and the acquisition loop.
//!
//! - **Sources**: live digitizer, recorded playback, simulator, all behind
//!   [`BufferSource`]
//! - **Acquisition thread**: applies settings pushed through the
//!   [`SyncChannel`](tandem_core::SyncChannel), evaluates each buffer and
//!   publishes cycle records in acquisition order
//! - **System**: builder and controller API (pause, resume, measurement steps,
//!   rate snapshots, shutdown)
//!
//! ## Example
//!
//! ```ignore
//! use tandem_acquisition::{AcquisitionSystem, LoopEvent};
//! use tandem_measurement::MeasurementStep;
//!
//! let mut system = AcquisitionSystem::builder()
//!     .config(config)
//!     .step(MeasurementStep::BackgroundFullNear)
//!     .build()?;
//!
//! for event in system.events().iter().take(100) {
//!     if let LoopEvent::Cycle(record) = event {
//!         println!("{:?}", record.time_differences);
//!     }
//! }
//! system.shutdown();
//! ```

pub mod acquisition;
pub mod error;
pub mod recorder;
pub mod source;
pub mod system;

pub use acquisition::{
    AcquisitionCommand, AcquisitionThread, LoopEvent, LoopMetrics, LoopMetricsSnapshot,
    LoopOptions, LoopState,
};
pub use error::{Error, Result};
pub use recorder::WaveformRecorder;
pub use source::{
    parse_groups, BufferSource, CaptureMode, LiveDevice, PlaybackFile, ScopeDriver, Simulator,
    SourceKind,
};
pub use system::{AcquisitionSystem, AcquisitionSystemBuilder};
