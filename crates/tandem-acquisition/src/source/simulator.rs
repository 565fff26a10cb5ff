//! Synthetic coincident pulses.

use super::{BufferSource, SourceKind};
use crate::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tandem_core::{Channel, Sample, SampleBuffer, SyncSettings};

const PULSE_LEVEL: Sample = 16000;
const PULSE_WIDTH: usize = 20;
const NOISE_CEILING: Sample = 1000;
const HEIGHT_RANGE: (Sample, Sample) = (2000, 15000);

/// Emits one coincident pulse pair per poll.
///
/// B's trailing edge sits at the buffer center, A's is offset by a normally
/// distributed number of samples, so time differences cluster around zero.
pub struct Simulator {
    rng: StdRng,
    sigma: f64,
    trigger_channel: Channel,
    generated: u64,
}

impl Simulator {
    pub fn new(seed: u64) -> Self {
        Self::with_offset_sigma(seed, 25.0)
    }

    /// `sigma` is the spread of the A/B offset in samples.
    pub fn with_offset_sigma(seed: u64, sigma: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sigma: sigma.abs(),
            trigger_channel: Channel::A,
            generated: 0,
        }
    }

    pub fn generated(&self) -> u64 {
        self.generated
    }

    fn square(len: usize, edge: usize) -> Vec<Sample> {
        let mut samples = vec![0; len];
        samples[edge.saturating_sub(PULSE_WIDTH - 1)..=edge].fill(PULSE_LEVEL);
        samples
    }

    fn raw(&mut self, len: usize, center: usize) -> Vec<Sample> {
        let height = f64::from(self.rng.gen_range(HEIGHT_RANGE.0..=HEIGHT_RANGE.1));
        let spread = PULSE_WIDTH as f64 / 2.0;
        (0..len)
            .map(|i| {
                let x = (i as f64 - center as f64) / spread;
                let pulse = height * (-x * x).exp();
                let noise = f64::from(self.rng.gen_range(0..NOISE_CEILING));
                (pulse + noise).min(f64::from(Sample::MAX)) as Sample
            })
            .collect()
    }
}

impl BufferSource for Simulator {
    fn poll(&mut self, settings: &SyncSettings) -> Result<Option<SampleBuffer>> {
        let len = settings.timebase.total_samples();
        if len < 2 * PULSE_WIDTH {
            return Ok(None);
        }

        let center = len / 2;
        let z: f64 = self.rng.sample(StandardNormal);
        let offset = (z * self.sigma).round() as i64;
        let edge_a = (center as i64 + offset).clamp(PULSE_WIDTH as i64, len as i64 - 2) as usize;
        let edge_b = center;

        let raw_a = self.raw(len, edge_a);
        let raw_b = self.raw(len, edge_b);
        let buffer = SampleBuffer::new([
            Self::square(len, edge_a),
            Self::square(len, edge_b),
            raw_a,
            raw_b,
        ])?
        .with_trigger_channel(self.trigger_channel);

        if settings.trigger.alternate_channel {
            self.trigger_channel = self.trigger_channel.other();
        }
        self.generated += 1;
        Ok(Some(buffer))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Simulator
    }
}
