//! Pulse edge detection.
//!
//! Two interchangeable detectors:
//!
//! - **Square**: reports the trailing edge of each SCA square pulse, the
//!   index `i` where `s[i] > threshold` and `s[i + 1] <= threshold`.
//! - **Raw waveform**: baseline-corrects the raw channel, drops samples below
//!   the channel's low limit and runs the [`PeakFinder`]. At most one peak is
//!   kept per channel: the strongest peak on each side of the trigger point,
//!   then whichever of the two lies farther from it.

use crate::peaks::{Peak, PeakFinder};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tandem_core::{DetectionSettings, PulseDetectionMode, Sample};

/// A detected pulse edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// Sample index within the buffer.
    pub index: usize,
    /// Sample value at the edge (corrected magnitude in raw mode).
    pub value: i32,
}

/// Edges of one channel, ordered by index. Usually zero to two entries.
pub type EdgeList = SmallVec<[Edge; 4]>;

/// Trailing edges of square pulses.
pub fn square_edges(samples: &[Sample], threshold: i32) -> EdgeList {
    samples
        .windows(2)
        .enumerate()
        .filter(|(_, pair)| i32::from(pair[0]) > threshold && i32::from(pair[1]) <= threshold)
        .map(|(index, pair)| Edge {
            index,
            value: i32::from(pair[0]),
        })
        .collect()
}

/// Subtract the mean and take the magnitude; samples below `low_limit` become zero.
pub fn baseline_correct(samples: &[Sample], low_limit: i32) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }

    let mean = samples.iter().map(|&s| f64::from(s)).sum::<f64>() / samples.len() as f64;
    let low_limit = f64::from(low_limit);

    samples
        .iter()
        .map(|&s| {
            let magnitude = (f64::from(s) - mean).abs();
            if magnitude < low_limit {
                0.0
            } else {
                magnitude
            }
        })
        .collect()
}

/// Single strongest raw pulse, chosen away from the trigger point.
pub fn raw_edges(samples: &[Sample], low_limit: i32, finder: &PeakFinder) -> EdgeList {
    let corrected = baseline_correct(samples, low_limit);
    let center = samples.len() / 2;
    let peaks = finder.find(&corrected);

    let before = strongest(peaks.iter().filter(|p| p.index < center));
    let after = strongest(peaks.iter().filter(|p| p.index >= center));

    let chosen = match (before, after) {
        (Some(b), Some(a)) => {
            if a.index - center > center - b.index {
                Some(a)
            } else {
                Some(b)
            }
        }
        (Some(b), None) => Some(b),
        (None, Some(a)) => Some(a),
        (None, None) => None,
    };

    chosen
        .map(|peak| Edge {
            index: peak.index,
            value: peak.height.round() as i32,
        })
        .into_iter()
        .collect()
}

/// Highest peak; the earlier one wins a tie.
fn strongest<'a>(peaks: impl Iterator<Item = &'a Peak>) -> Option<&'a Peak> {
    peaks.fold(None, |best, peak| match best {
        Some(b) if b.height >= peak.height => Some(b),
        _ => Some(peak),
    })
}

/// Detector configured for one pulse detection mode.
#[derive(Debug, Clone)]
pub struct EdgeDetector {
    mode: PulseDetectionMode,
    square_threshold: i32,
    finder: PeakFinder,
}

impl EdgeDetector {
    pub fn new(settings: &DetectionSettings) -> Self {
        Self {
            mode: settings.mode,
            square_threshold: settings.square_threshold,
            finder: PeakFinder::new(settings.peaks),
        }
    }

    pub fn mode(&self) -> PulseDetectionMode {
        self.mode
    }

    /// `low_limit` only applies in raw-waveform mode.
    pub fn detect(&self, samples: &[Sample], low_limit: i32) -> EdgeList {
        match self.mode {
            PulseDetectionMode::Square => square_edges(samples, self.square_threshold),
            PulseDetectionMode::RawWaveform => raw_edges(samples, low_limit, &self.finder),
        }
    }
}

impl Default for EdgeDetector {
    fn default() -> Self {
        Self::new(&DetectionSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tandem_core::PeakSettings;

    fn square_pulse(len: usize, start: usize, end: usize, high: Sample) -> Vec<Sample> {
        (0..len)
            .map(|i| if (start..end).contains(&i) { high } else { 0 })
            .collect()
    }

    fn gaussian_pulse(len: usize, center: usize, amplitude: f64) -> Vec<Sample> {
        (0..len)
            .map(|i| {
                let x = (i as f64 - center as f64) / 3.0;
                (amplitude * (-x * x).exp()) as Sample
            })
            .collect()
    }

    #[test]
    fn test_square_reports_trailing_edge() {
        let samples = square_pulse(100, 20, 30, 16000);
        let edges = square_edges(&samples, 8192);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].index, 29);
        assert_eq!(edges[0].value, 16000);
    }

    #[test]
    fn test_square_threshold_is_exclusive() {
        let mut samples = vec![0; 10];
        samples[3] = 8192;
        assert!(square_edges(&samples, 8192).is_empty());

        samples[3] = 8193;
        assert_eq!(square_edges(&samples, 8192)[0].index, 3);
    }

    #[test]
    fn test_square_pulse_at_end_has_no_edge() {
        let samples = square_pulse(50, 40, 50, 16000);
        assert!(square_edges(&samples, 8192).is_empty());
    }

    #[test]
    fn test_square_multiple_pulses() {
        let mut samples = square_pulse(200, 10, 20, 16000);
        samples[100..110].fill(16000);
        let indices: Vec<usize> = square_edges(&samples, 8192).iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![19, 109]);
    }

    #[test]
    fn test_baseline_correct_limits_noise() {
        let samples: Vec<Sample> = vec![100, 100, 100, 1100];
        let corrected = baseline_correct(&samples, 500);
        // Mean 350: |100 - 350| = 250 is noise, |1100 - 350| = 750 survives.
        assert_eq!(&corrected[..3], &[0.0, 0.0, 0.0]);
        assert_relative_eq!(corrected[3], 750.0);
    }

    #[test]
    fn test_raw_single_peak() {
        let samples = gaussian_pulse(200, 150, 8000.0);
        let edges = raw_edges(&samples, 500, &PeakFinder::default());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].index, 150);
    }

    #[test]
    fn test_raw_prefers_peak_farther_from_center() {
        let mut samples = gaussian_pulse(400, 180, 6000.0);
        let late = gaussian_pulse(400, 350, 4000.0);
        for (s, l) in samples.iter_mut().zip(late) {
            *s += l;
        }

        let edges = raw_edges(&samples, 500, &PeakFinder::default());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].index, 350);
    }

    #[test]
    fn test_raw_equal_distance_keeps_before() {
        let mut samples = gaussian_pulse(400, 100, 5000.0);
        let late = gaussian_pulse(400, 300, 5000.0);
        for (s, l) in samples.iter_mut().zip(late) {
            *s += l;
        }

        let edges = raw_edges(&samples, 500, &PeakFinder::default());
        assert_eq!(edges[0].index, 100);
    }

    #[test]
    fn test_raw_flat_signal_has_no_edges() {
        let samples = vec![1234; 256];
        assert!(raw_edges(&samples, 500, &PeakFinder::default()).is_empty());
    }

    #[test]
    fn test_detector_dispatch() {
        let samples = square_pulse(100, 60, 70, 16000);

        let square = EdgeDetector::default();
        assert_eq!(square.detect(&samples, 500)[0].index, 69);

        let raw = EdgeDetector::new(&DetectionSettings {
            mode: PulseDetectionMode::RawWaveform,
            square_threshold: 8192,
            peaks: PeakSettings {
                min_height: 500.0,
                min_prominence: 250.0,
                min_width: 1.0,
                min_distance: 10,
            },
        });
        let edges = raw.detect(&samples, 500);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].index, 64);
    }
}
