//! Tolerance constants for rate and timing checks.

/// Floating point rounding in derived rates.
pub const RATE_EPSILON: f64 = 1e-12;

/// Relative tolerance for rates built from several multiplications.
pub const RELATIVE_EPSILON: f64 = 1e-9;

/// How long a test waits for the acquisition thread to reach a state.
pub const SETTLE_TIMEOUT_MS: u64 = 5_000;

/// Quiet period used to show that nothing happens (e.g. while paused).
pub const QUIET_PERIOD_MS: u64 = 100;
