//! Error types for tandem-acquisition.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Playback file {} unusable: {reason}", path.display())]
    PlaybackExhausted { path: PathBuf, reason: String },

    #[error("No playback file configured")]
    NoPlaybackFile,

    #[error("Acquisition loop halted: {0}")]
    LoopHalted(String),

    #[error("Acquisition loop is not running")]
    NotRunning,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Core(#[from] tandem_core::Error),

    #[error(transparent)]
    Analysis(#[from] tandem_analysis::Error),

    #[error(transparent)]
    Measurement(#[from] tandem_measurement::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
