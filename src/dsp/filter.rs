//! Biquad filters and ordered filter chains (WebAudio BiquadFilterNode coefficients).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Default quality factor (Butterworth).
pub const DEFAULT_Q: f64 = 0.707;

/// Filter type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
}

/// Stateless description of one filter stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterSpec {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    /// Cutoff (low/high-pass) or center (band-pass) frequency in Hz.
    pub frequency: f64,
    #[serde(default = "default_q")]
    pub q: f64,
}

fn default_q() -> f64 {
    DEFAULT_Q
}

impl FilterSpec {
    pub fn lowpass(frequency: f64) -> Self {
        FilterSpec {
            filter_type: FilterType::Lowpass,
            frequency,
            q: DEFAULT_Q,
        }
    }

    pub fn highpass(frequency: f64) -> Self {
        FilterSpec {
            filter_type: FilterType::Highpass,
            frequency,
            q: DEFAULT_Q,
        }
    }

    pub fn bandpass(frequency: f64, q: f64) -> Self {
        FilterSpec {
            filter_type: FilterType::Bandpass,
            frequency,
            q,
        }
    }
}

/// A biquad IIR filter (2nd order).
///
/// Implements the standard Direct Form II Transposed structure.
/// Coefficient formulas from the Audio EQ Cookbook (Robert Bristow-Johnson).
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    pub filter_type: FilterType,
    pub frequency: f64,
    pub q: f64,

    // Coefficients
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    // State (Direct Form II Transposed)
    z1: f64,
    z2: f64,

    sample_rate: f64,
    dirty: bool,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, sample_rate: f64) -> Self {
        let mut f = BiquadFilter {
            filter_type,
            frequency: 1000.0,
            q: DEFAULT_Q,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
            sample_rate,
            dirty: true,
        };
        f.update_coefficients();
        f
    }

    /// Build a filter from its stateless description.
    pub fn from_spec(spec: &FilterSpec, sample_rate: f64) -> Self {
        let mut f = BiquadFilter::new(spec.filter_type, sample_rate);
        f.frequency = spec.frequency;
        f.q = spec.q;
        f.update_coefficients();
        f
    }

    /// Recompute filter coefficients from current parameters.
    ///
    /// The frequency is kept below Nyquist so low output rates stay stable.
    pub fn update_coefficients(&mut self) {
        let nyquist = self.sample_rate / 2.0;
        let freq = self.frequency.min(nyquist * 0.99).max(1.0);
        let q = self.q.max(1e-4);

        let w0 = 2.0 * PI * freq / self.sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha;
        let a1 = -2.0 * cos_w0;
        let a2 = 1.0 - alpha;
        let (b0, b1, b2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Highpass => {
                let b0 = (1.0 + cos_w0) / 2.0;
                (b0, -(1.0 + cos_w0), b0)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };

        // Normalize by a0
        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = a1 / a0;
        self.a2 = a2 / a0;
        self.dirty = false;
    }

    /// Process a single sample through the filter.
    pub fn process(&mut self, input: f64) -> f64 {
        if self.dirty {
            self.update_coefficients();
        }

        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    /// Set frequency and mark coefficients dirty.
    pub fn set_frequency(&mut self, freq: f64) {
        self.frequency = freq;
        self.dirty = true;
    }
}

/// Filters applied in a fixed order.
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    stages: Vec<BiquadFilter>,
    /// Base frequencies, kept so modulation is relative to the recipe value.
    base_frequencies: Vec<f64>,
}

impl FilterChain {
    pub fn from_specs(specs: &[FilterSpec], sample_rate: f64) -> Self {
        FilterChain {
            stages: specs
                .iter()
                .map(|s| BiquadFilter::from_spec(s, sample_rate))
                .collect(),
            base_frequencies: specs.iter().map(|s| s.frequency).collect(),
        }
    }

    pub fn process(&mut self, input: f64) -> f64 {
        self.stages.iter_mut().fold(input, |x, f| f.process(x))
    }

    /// Scale every stage's frequency relative to its base value.
    pub fn scale_frequencies(&mut self, factor: f64) {
        for (stage, base) in self.stages.iter_mut().zip(&self.base_frequencies) {
            stage.set_frequency(base * factor);
        }
    }

    /// The current stage configuration, in processing order.
    pub fn specs(&self) -> Vec<FilterSpec> {
        self.stages
            .iter()
            .map(|f| FilterSpec {
                filter_type: f.filter_type,
                frequency: f.frequency,
                q: f.q,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}
