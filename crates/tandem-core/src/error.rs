//! Error types for tandem-core.

use thiserror::Error;

/// Error type for tandem-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid limits for channel {channel}: low={low}, high={high}")]
    InvalidLimits { channel: usize, low: i32, high: i32 },

    #[error("Invalid timebase: {0}")]
    InvalidTimebase(u32),

    #[error("Invalid pulse detection mode: {0}. Must be 0 (square) or 1 (raw)")]
    InvalidDetectionMode(u8),

    #[error("Corrupted buffer: {0}")]
    CorruptedBuffer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
