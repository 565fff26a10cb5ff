//! Error types for tandem-analysis.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Corrupted buffer: {0}")]
    CorruptedBuffer(String),

    #[error(transparent)]
    Core(#[from] tandem_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
