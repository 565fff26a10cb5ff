//! Messages exchanged with the acquisition thread.

use std::path::PathBuf;
use tandem_core::ChannelLimits;
use tandem_measurement::{CycleRecord, MeasurementStep, RateSnapshot};

/// Loop status, stored as `u8` for lock-free reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LoopState {
    #[default]
    Running = 0,
    Paused = 1,
    /// Playback file unreadable; retried after the next settings push.
    WaitingForPlayback = 2,
    /// Stopped by a fatal error. Aggregates stay readable.
    Halted = 3,
    Stopped = 4,
}

impl LoopState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Running,
            1 => LoopState::Paused,
            2 => LoopState::WaitingForPlayback,
            3 => LoopState::Halted,
            _ => LoopState::Stopped,
        }
    }

    /// No further cycles will run.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoopState::Halted | LoopState::Stopped)
    }
}

/// Command sent to the acquisition thread.
pub enum AcquisitionCommand {
    /// (Re)start a measurement step, optionally replacing its calibration limits.
    /// The controller stages the step's settings before sending this.
    StartMeasurement {
        step: MeasurementStep,
        limits: Option<ChannelLimits>,
    },
    /// Publish the final rates of the current step.
    EndMeasurement,
    /// Clear one step's aggregates.
    ResetStep(MeasurementStep),
    Shutdown,
}

impl std::fmt::Debug for AcquisitionCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StartMeasurement { step, limits } => f
                .debug_struct("StartMeasurement")
                .field("step", step)
                .field("limits", &limits.is_some())
                .finish(),
            Self::EndMeasurement => write!(f, "EndMeasurement"),
            Self::ResetStep(step) => f.debug_tuple("ResetStep").field(step).finish(),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Published by the loop, in acquisition order.
#[derive(Debug, Clone)]
pub enum LoopEvent {
    Cycle(Box<CycleRecord>),
    Rates(RateSnapshot),
    StepStarted(MeasurementStep),
    WaitingForPlayback { path: Option<PathBuf>, reason: String },
    Halted { reason: String },
    Stopped,
}
