//! Anti-aliased oscillators using PolyBLEP.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Supported waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Sawtooth,
    Triangle,
}

/// A band-limited oscillator with anti-aliasing (PolyBLEP) on the sawtooth.
#[derive(Debug, Clone)]
pub struct Oscillator {
    pub waveform: Waveform,
    pub frequency: f64,
    phase: f64,
    sample_rate: f64,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f64, sample_rate: f64) -> Self {
        Oscillator {
            waveform,
            frequency,
            phase: 0.0,
            sample_rate,
        }
    }

    /// Phase increment per sample.
    fn phase_inc(&self) -> f64 {
        self.frequency / self.sample_rate
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        let inc = self.phase_inc();
        let sample = match self.waveform {
            Waveform::Sine => (2.0 * PI * self.phase).sin(),
            Waveform::Sawtooth => 2.0 * self.phase - 1.0 - poly_blep(self.phase, inc),
            // Piecewise linear: -1→+1 over [0, 0.5), +1→-1 over [0.5, 1)
            Waveform::Triangle => {
                if self.phase < 0.5 {
                    4.0 * self.phase - 1.0
                } else {
                    3.0 - 4.0 * self.phase
                }
            }
        };

        self.phase += inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        sample
    }
}

/// PolyBLEP (Polynomial Band-Limited Step) anti-aliasing correction.
///
/// `t` is the phase [0, 1), `dt` is the phase increment per sample.
fn poly_blep(t: f64, dt: f64) -> f64 {
    if t < dt {
        let t = t / dt;
        2.0 * t - t * t - 1.0
    } else if t > 1.0 - dt {
        let t = (t - 1.0) / dt;
        t * t + 2.0 * t + 1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_zero_at_start() {
        let mut osc = Oscillator::new(Waveform::Sine, 220.0, 44100.0);
        let sample = osc.next_sample();
        assert!(sample.abs() < 1e-10, "Sine should start near 0, got {sample}");
    }

    #[test]
    fn waveforms_in_range() {
        for (waveform, limit) in [
            (Waveform::Sine, 1.0),
            (Waveform::Triangle, 1.0),
            (Waveform::Sawtooth, 1.5),
        ] {
            let mut osc = Oscillator::new(waveform, 221.2, 44100.0);
            for _ in 0..44100 {
                let s = osc.next_sample();
                assert!(s.abs() <= limit, "{waveform:?} out of range: {s}");
            }
        }
    }

    #[test]
    fn sine_completes_cycles() {
        // 100 Hz at 1 kHz: one cycle per 10 samples
        let mut osc = Oscillator::new(Waveform::Sine, 100.0, 1000.0);
        let first: Vec<f64> = (0..10).map(|_| osc.next_sample()).collect();
        let second: Vec<f64> = (0..10).map(|_| osc.next_sample()).collect();
        for (a, b) in first.iter().zip(&second) {
            assert!((a - b).abs() < 1e-9, "cycle mismatch: {a} vs {b}");
        }
    }
}
