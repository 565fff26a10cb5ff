//! Integration test modules for tandem
//!
//! Test categories:
//! - acquisition: loop lifecycle, pause, settings handoff, fatal errors
//! - playback: recorded waveform files as the buffer source
//! - measurement: step transitions and published rates
//! - engine: the umbrella engine and its statistics file

pub mod acquisition;
pub mod engine;
pub mod measurement;
pub mod playback;
