//! Rate aggregation and measurement sequencing.
//!
//! - **Aggregator**: running per-channel counts, pairing and in-window
//!   coincidence counts, derived rates computed on demand
//! - **State machine**: named measurement steps, each with its own aggregate
//!   set, and the settings changes a step transition implies
//! - **Records**: per-cycle records and rate snapshots for the consumer
//! - **Statistics**: semicolon-delimited rows for external analysis
//! - **Results**: per-tick experiment summary rows
//!
//! # Example
//!
//! ```ignore
//! use tandem_measurement::{MeasurementConfig, MeasurementStateMachine, MeasurementStep};
//!
//! let mut fsm =
//!     MeasurementStateMachine::new(MeasurementConfig::default(), MeasurementStep::FindSpectrum);
//! fsm.transition(MeasurementStep::BackgroundFullNear, None)?;
//!
//! let record = fsm.record(&evaluation, buffer.trigger_channel());
//! let snapshot = fsm.report();
//! ```

pub mod aggregator;
pub mod error;
pub mod fsm;
pub mod record;
pub mod results;
pub mod statistics;
pub mod step;

pub use aggregator::{
    chance_rate, per_second, unquantum_effect_ratio, DerivedRates, RateAggregator, RunningRate,
};
pub use error::{Error, Result};
pub use fsm::{MeasurementConfig, MeasurementStateMachine, StepChange, TransitionResult};
pub use record::{CycleRecord, RateSnapshot};
pub use results::{ExperimentResult, ResultsWriter, RESULTS_HEADER};
pub use statistics::{StatisticsWriter, STATISTICS_HEADER};
pub use step::{MeasurementStep, MetricSelection, STEP_COUNT};
