//! # Tandem Analysis
//!
//! Pulse analysis for coincidence measurements.
//!
//! - **Edge detection**: trailing edges of SCA square pulses, or the single
//!   strongest peak of a baseline-corrected raw waveform
//! - **Peak finding**: height, distance, prominence and width constraints
//! - **Coincidence evaluation**: pulse heights, validity gating and the full
//!   cross product of inter-channel time differences
//!
//! All functions operate on borrowed [`SampleBuffer`](tandem_core::SampleBuffer)s
//! and keep no state between calls.
//!
//! ## Example
//!
//! ```ignore
//! use tandem_analysis::evaluate;
//! use tandem_core::{ChannelLimits, DetectionSettings};
//!
//! let result = evaluate(&buffer, &ChannelLimits::default(), &DetectionSettings::default())?;
//! if result.is_coincident() {
//!     println!("time differences: {:?}", result.time_differences);
//! }
//! ```

pub mod coincidence;
pub mod edge;
pub mod error;
pub mod peaks;

pub use coincidence::{evaluate, Classification, Evaluation};
pub use edge::{baseline_correct, raw_edges, square_edges, Edge, EdgeDetector, EdgeList};
pub use error::{Error, Result};
pub use peaks::{Peak, PeakFinder};
