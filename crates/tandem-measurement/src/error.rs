//! Error types for tandem-measurement.

use crate::step::MeasurementStep;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid measurement transition: {from} -> {to}")]
    InvalidTransition {
        from: MeasurementStep,
        to: MeasurementStep,
    },

    #[error("Unknown measurement step: {0}")]
    UnknownStep(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Core(#[from] tandem_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
