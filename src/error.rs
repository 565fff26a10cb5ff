//! Centralized error type for the tandem umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] tandem_core::Error),

    #[error("Analysis: {0}")]
    Analysis(#[from] tandem_analysis::Error),

    #[error("Measurement: {0}")]
    Measurement(#[from] tandem_measurement::Error),

    #[error("Acquisition: {0}")]
    Acquisition(#[from] tandem_acquisition::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
