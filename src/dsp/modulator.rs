//! Slow control-rate modulators: LFOs and fade-ins.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Parameter an LFO modulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModTarget {
    /// The bed gain: `base + depth * sin(2π·rate·t)`.
    Gain,
    /// Every filter frequency, scaled by `1 + depth * sin(2π·rate·t)`.
    Cutoff,
}

/// Recipe-level description of a modulator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModulatorSpec {
    Lfo {
        rate_hz: f64,
        depth: f64,
        target: ModTarget,
    },
    /// Linear ramp of the bed gain from 0 to its base value.
    FadeIn { seconds: f64 },
}

/// What a modulator contributes at a point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Modulation {
    /// Bed gain to use.
    pub gain: f64,
    /// Factor applied to filter frequencies.
    pub cutoff_scale: f64,
}

impl ModulatorSpec {
    /// Evaluate the modulator `t` seconds after the graph started, given the
    /// recipe's base bed gain.
    pub fn at(&self, t: f64, base_gain: f64) -> Modulation {
        match *self {
            ModulatorSpec::Lfo {
                rate_hz,
                depth,
                target,
            } => {
                let wave = (2.0 * PI * rate_hz * t).sin();
                match target {
                    ModTarget::Gain => Modulation {
                        gain: (base_gain + depth * wave).max(0.0),
                        cutoff_scale: 1.0,
                    },
                    ModTarget::Cutoff => Modulation {
                        gain: base_gain,
                        cutoff_scale: (1.0 + depth * wave).max(0.01),
                    },
                }
            }
            ModulatorSpec::FadeIn { seconds } => {
                let ramp = if seconds <= 0.0 {
                    1.0
                } else {
                    (t / seconds).clamp(0.0, 1.0)
                };
                Modulation {
                    gain: base_gain * ramp,
                    cutoff_scale: 1.0,
                }
            }
        }
    }
}
