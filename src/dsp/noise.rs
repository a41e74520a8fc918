//! Colored noise generators and seamless noise loops.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

/// Noise color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    /// Flat spectrum.
    White,
    /// Roughly 1/f, via a leaky integrator.
    Pink,
    /// Roughly 1/f², a damped random walk.
    Brown,
}

/// Length of the crossfade applied at a loop seam, in seconds.
const SEAM_SECONDS: f64 = 0.01;

/// Stateful colored-noise generator.
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    pub color: NoiseColor,
    state: f64,
    rng: Pcg32,
}

impl NoiseGenerator {
    pub fn new(color: NoiseColor, seed: u64) -> Self {
        NoiseGenerator {
            color,
            state: 0.0,
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Generate the next sample in [-1, 1].
    pub fn next_sample(&mut self) -> f64 {
        let w: f64 = self.rng.gen_range(-1.0..=1.0);
        let out = match self.color {
            NoiseColor::White => w,
            NoiseColor::Pink => {
                self.state = 0.997 * self.state + 0.05 * w;
                self.state
            }
            NoiseColor::Brown => {
                self.state = (self.state + 0.02 * w) / 1.02;
                self.state * 3.5
            }
        };
        out.clamp(-1.0, 1.0)
    }

    /// Fill `out` with consecutive samples.
    pub fn fill(&mut self, out: &mut [f64]) {
        for s in out.iter_mut() {
            *s = self.next_sample();
        }
    }
}

/// Generate a noise buffer of `len` samples whose end flows into its start.
///
/// `len + fade` samples are generated and the overshoot is crossfaded into
/// the head, so the sample after the last one continues the same walk the
/// first one was blended from.
pub fn loop_buffer(color: NoiseColor, len: usize, fade: usize, seed: u64) -> Vec<f64> {
    let fade = fade.min(len / 2);
    let mut generator = NoiseGenerator::new(color, seed);
    let mut raw = vec![0.0; len + fade];
    generator.fill(&mut raw);

    let tail = raw.split_off(len);
    for (i, t) in tail.iter().enumerate() {
        let w = i as f64 / fade as f64;
        raw[i] = raw[i] * w + t * (1.0 - w);
    }
    raw
}

/// A pre-generated noise buffer played back in a loop.
#[derive(Debug, Clone)]
pub struct NoiseLoop {
    pub color: NoiseColor,
    buffer: Vec<f64>,
    position: usize,
}

impl NoiseLoop {
    /// Build a loop `seconds` long at `sample_rate`.
    pub fn new(color: NoiseColor, seconds: f64, sample_rate: f64, seed: u64) -> Self {
        let len = ((seconds * sample_rate) as usize).max(1);
        let fade = (SEAM_SECONDS * sample_rate) as usize;
        NoiseLoop {
            color,
            buffer: loop_buffer(color, len, fade, seed),
            position: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn next_sample(&mut self) -> f64 {
        let s = self.buffer[self.position];
        self.position += 1;
        if self.position >= self.buffer.len() {
            self.position = 0;
        }
        s
    }
}

/// Lag-1 autocorrelation of a signal (used to check spectral coloring).
pub fn lag1_autocorrelation(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mean = samples.iter().sum::<f64>() / samples.len() as f64;
    let var: f64 = samples.iter().map(|s| (s - mean) * (s - mean)).sum();
    if var == 0.0 {
        return 0.0;
    }
    let cov: f64 = samples
        .windows(2)
        .map(|w| (w[0] - mean) * (w[1] - mean))
        .sum();
    cov / var
}
