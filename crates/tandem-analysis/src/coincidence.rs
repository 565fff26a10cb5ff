//! Coincidence evaluation for one sample buffer.
//!
//! Edges are found on the detector channels (SCA channels in square mode, raw
//! channels in raw-waveform mode). Pulse heights always come from the raw
//! channels. A channel whose height is zero, or falls outside its raw spectrum
//! limits, counts as having no pulse even when edges were found. Time
//! differences are the full cross product `a - b` of the remaining edges.

use crate::edge::{EdgeDetector, EdgeList};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tandem_core::{Channel, ChannelLimits, DetectionSettings, PulseDetectionMode, SampleBuffer};

/// What a buffer contained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    NoPulse,
    Single(Channel),
    Coincident,
}

/// Result of evaluating one buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub count_a: usize,
    pub count_b: usize,
    /// Raw channel maxima, clamped at zero.
    pub max_a: i32,
    pub max_b: i32,
    /// Pulse heights, zero for a channel without a valid pulse.
    pub pulse_heights: (i32, i32),
    /// `index_a - index_b` for every pair of valid edges, in sample units.
    pub time_differences: Vec<i64>,
    pub edges_a: EdgeList,
    pub edges_b: EdgeList,
    pub classification: Classification,
}

impl Evaluation {
    #[inline]
    pub fn is_coincident(&self) -> bool {
        self.classification == Classification::Coincident
    }

    #[inline]
    pub fn has_pulse(&self) -> bool {
        self.classification != Classification::NoPulse
    }

    #[inline]
    pub fn count(&self, channel: Channel) -> usize {
        match channel {
            Channel::A => self.count_a,
            Channel::B => self.count_b,
        }
    }
}

fn pulse_height(samples: &[tandem_core::Sample]) -> i32 {
    samples
        .iter()
        .copied()
        .max()
        .map(i32::from)
        .unwrap_or(0)
        .max(0)
}

/// Edges and height for one side; `count` is zero when the height is not a valid pulse.
fn evaluate_channel(
    buffer: &SampleBuffer,
    channel: Channel,
    limits: &ChannelLimits,
    detector: &EdgeDetector,
) -> (usize, i32, EdgeList) {
    let raw_index = channel.raw_index();
    let low_limit = limits.low[raw_index];

    let edges = match detector.mode() {
        PulseDetectionMode::Square => detector.detect(buffer.square(channel), low_limit),
        PulseDetectionMode::RawWaveform => detector.detect(buffer.raw(channel), low_limit),
    };

    let height = pulse_height(buffer.raw(channel));
    let valid = height > 0 && limits.contains(raw_index, height);
    let count = if valid { edges.len() } else { 0 };

    (count, height, edges)
}

/// Evaluate one buffer.
///
/// Deterministic: identical inputs give identical results.
pub fn evaluate(
    buffer: &SampleBuffer,
    limits: &ChannelLimits,
    detection: &DetectionSettings,
) -> Result<Evaluation> {
    if buffer.is_empty() {
        return Err(Error::CorruptedBuffer("buffer has no samples".to_string()));
    }
    limits.validate()?;

    let detector = EdgeDetector::new(detection);
    let (count_a, max_a, edges_a) = evaluate_channel(buffer, Channel::A, limits, &detector);
    let (count_b, max_b, edges_b) = evaluate_channel(buffer, Channel::B, limits, &detector);

    let time_differences = if count_a > 0 && count_b > 0 {
        edges_a
            .iter()
            .flat_map(|a| edges_b.iter().map(move |b| a.index as i64 - b.index as i64))
            .collect()
    } else {
        Vec::new()
    };

    let classification = match (count_a > 0, count_b > 0) {
        (true, true) => Classification::Coincident,
        (true, false) => Classification::Single(Channel::A),
        (false, true) => Classification::Single(Channel::B),
        (false, false) => Classification::NoPulse,
    };

    Ok(Evaluation {
        count_a,
        count_b,
        max_a,
        max_b,
        pulse_heights: (
            if count_a > 0 { max_a } else { 0 },
            if count_b > 0 { max_b } else { 0 },
        ),
        time_differences,
        edges_a,
        edges_b,
        classification,
    })
}
