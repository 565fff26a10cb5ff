//! Named measurement steps.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of measurement steps.
pub const STEP_COUNT: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MeasurementStep {
    /// Collect the spectrum and pick the photo-peak limits.
    #[default]
    FindSpectrum,
    BackgroundFullApart,
    BackgroundGammaApart,
    BackgroundFullNear,
    BackgroundGammaNear,
    Full,
    Gamma,
    TandemFull,
    TandemGamma,
}

/// Which derived rates a step exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSelection {
    /// Single-channel rates only.
    Singles,
    /// Background coincidence rate.
    Background,
    /// Chance rate, corrected experiment rate and their ratio.
    Coincidence,
}

impl MeasurementStep {
    pub const ALL: [MeasurementStep; STEP_COUNT] = [
        MeasurementStep::FindSpectrum,
        MeasurementStep::BackgroundFullApart,
        MeasurementStep::BackgroundGammaApart,
        MeasurementStep::BackgroundFullNear,
        MeasurementStep::BackgroundGammaNear,
        MeasurementStep::Full,
        MeasurementStep::Gamma,
        MeasurementStep::TandemFull,
        MeasurementStep::TandemGamma,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Ordering group: spectrum, background, source, tandem.
    pub fn phase(self) -> u8 {
        match self {
            MeasurementStep::FindSpectrum => 0,
            MeasurementStep::BackgroundFullApart
            | MeasurementStep::BackgroundGammaApart
            | MeasurementStep::BackgroundFullNear
            | MeasurementStep::BackgroundGammaNear => 1,
            MeasurementStep::Full | MeasurementStep::Gamma => 2,
            MeasurementStep::TandemFull | MeasurementStep::TandemGamma => 3,
        }
    }

    pub fn metrics(self) -> MetricSelection {
        match self.phase() {
            0 => MetricSelection::Singles,
            1 => MetricSelection::Background,
            _ => MetricSelection::Coincidence,
        }
    }

    /// Steps restricted to the photo-peak window.
    pub fn uses_gamma_limits(self) -> bool {
        matches!(
            self,
            MeasurementStep::BackgroundGammaApart
                | MeasurementStep::BackgroundGammaNear
                | MeasurementStep::Gamma
                | MeasurementStep::TandemGamma
        )
    }

    /// Background step whose rate corrects this step's experiment rate.
    pub fn background_reference(self) -> Option<MeasurementStep> {
        match self {
            MeasurementStep::Full | MeasurementStep::TandemFull => {
                Some(MeasurementStep::BackgroundFullNear)
            }
            MeasurementStep::Gamma | MeasurementStep::TandemGamma => {
                Some(MeasurementStep::BackgroundGammaNear)
            }
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MeasurementStep::FindSpectrum => "find-spectrum",
            MeasurementStep::BackgroundFullApart => "background-full-apart",
            MeasurementStep::BackgroundGammaApart => "background-gamma-apart",
            MeasurementStep::BackgroundFullNear => "background-full-near",
            MeasurementStep::BackgroundGammaNear => "background-gamma-near",
            MeasurementStep::Full => "full",
            MeasurementStep::Gamma => "gamma",
            MeasurementStep::TandemFull => "tandem-full",
            MeasurementStep::TandemGamma => "tandem-gamma",
        }
    }
}

impl fmt::Display for MeasurementStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MeasurementStep {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        MeasurementStep::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| Error::UnknownStep(s.to_string()))
    }
}
