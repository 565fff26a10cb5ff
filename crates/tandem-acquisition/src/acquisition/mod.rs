//! The acquisition thread and its message types.
//!
//! The thread owns the buffer source. Per cycle it applies pending settings,
//! polls one buffer, evaluates it, aggregates the result into the active
//! measurement step and publishes a [`LoopEvent::Cycle`]. Commands arrive over
//! a bounded channel and are drained at cycle boundaries.

mod metrics;
mod request;
mod thread;

pub use metrics::{LoopMetrics, LoopMetricsSnapshot};
pub use request::{AcquisitionCommand, LoopEvent, LoopState};
pub use thread::{AcquisitionThread, LoopOptions};
