//! Peak finding on baseline-corrected waveforms.
//!
//! Local maxima are filtered in order by minimum height, minimum distance
//! (higher peaks win), prominence and width at half prominence. Flat tops
//! report their middle sample.

use serde::{Deserialize, Serialize};
use tandem_core::PeakSettings;

/// A local maximum that passed every constraint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub index: usize,
    pub height: f64,
    pub prominence: f64,
    /// Width at half prominence, in samples (linearly interpolated).
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakFinder {
    settings: PeakSettings,
}

impl PeakFinder {
    pub fn new(settings: PeakSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PeakSettings {
        &self.settings
    }

    /// Peaks of `signal` sorted by index.
    pub fn find(&self, signal: &[f64]) -> Vec<Peak> {
        let candidates: Vec<usize> = local_maxima(signal)
            .into_iter()
            .filter(|&i| signal[i] >= self.settings.min_height)
            .collect();

        let candidates = select_by_distance(signal, &candidates, self.settings.min_distance);

        candidates
            .into_iter()
            .filter_map(|index| {
                let (prominence, left_base, right_base) = prominence(signal, index);
                if prominence < self.settings.min_prominence {
                    return None;
                }
                let width =
                    width_at_half_prominence(signal, index, prominence, left_base, right_base);
                if width < self.settings.min_width {
                    return None;
                }
                Some(Peak {
                    index,
                    height: signal[index],
                    prominence,
                    width,
                })
            })
            .collect()
    }
}

impl Default for PeakFinder {
    fn default() -> Self {
        Self::new(PeakSettings::default())
    }
}

fn local_maxima(signal: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if signal.len() < 3 {
        return maxima;
    }

    let last = signal.len() - 1;
    let mut i = 1;
    while i < last {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < last && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                maxima.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    maxima
}

/// Drop peaks closer than `distance` to a higher one.
fn select_by_distance(signal: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    if distance <= 1 || peaks.len() < 2 {
        return peaks.to_vec();
    }

    let mut order: Vec<usize> = (0..peaks.len()).collect();
    // Stable sort keeps the earlier peak first among equal heights.
    order.sort_by(|&a, &b| signal[peaks[b]].total_cmp(&signal[peaks[a]]));

    let mut keep = vec![true; peaks.len()];
    for &current in &order {
        if !keep[current] {
            continue;
        }
        let position = peaks[current];

        let mut left = current;
        while left > 0 && position - peaks[left - 1] < distance {
            keep[left - 1] = false;
            left -= 1;
        }
        let mut right = current + 1;
        while right < peaks.len() && peaks[right] - position < distance {
            keep[right] = false;
            right += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&peak, kept)| kept.then_some(peak))
        .collect()
}

/// Prominence with the bases found by walking out until a higher sample.
fn prominence(signal: &[f64], peak: usize) -> (f64, usize, usize) {
    let height = signal[peak];

    let mut left_base = peak;
    let mut left_min = height;
    let mut i = peak;
    while i > 0 {
        i -= 1;
        if signal[i] > height {
            break;
        }
        if signal[i] < left_min {
            left_min = signal[i];
            left_base = i;
        }
    }

    let mut right_base = peak;
    let mut right_min = height;
    let mut i = peak + 1;
    while i < signal.len() {
        if signal[i] > height {
            break;
        }
        if signal[i] < right_min {
            right_min = signal[i];
            right_base = i;
        }
        i += 1;
    }

    (height - left_min.max(right_min), left_base, right_base)
}

fn width_at_half_prominence(
    signal: &[f64],
    peak: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
) -> f64 {
    let reference = signal[peak] - prominence / 2.0;

    let mut i = peak;
    while i > left_base && signal[i] > reference {
        i -= 1;
    }
    let mut left = i as f64;
    if signal[i] < reference {
        left += (reference - signal[i]) / (signal[i + 1] - signal[i]);
    }

    let mut i = peak;
    while i < right_base && signal[i] > reference {
        i += 1;
    }
    let mut right = i as f64;
    if signal[i] < reference {
        right -= (reference - signal[i]) / (signal[i - 1] - signal[i]);
    }

    right - left
}
