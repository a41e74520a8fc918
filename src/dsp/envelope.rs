//! One-shot attack/decay envelope for transient events.

use serde::{Deserialize, Serialize};

/// Level treated as silence at the end of an exponential decay.
pub const SILENCE_FLOOR: f64 = 1e-4;

/// Shape of the decay segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecayCurve {
    Linear,
    /// Exponential ramp from the peak down to [`SILENCE_FLOOR`].
    #[default]
    Exponential,
}

/// Envelope parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeSpec {
    /// Linear attack time in seconds.
    pub attack: f64,
    /// Decay time in seconds.
    pub decay: f64,
    /// Peak level reached at the end of the attack.
    pub peak: f64,
    #[serde(default)]
    pub curve: DecayCurve,
}

impl EnvelopeSpec {
    /// Total duration in seconds.
    pub fn duration(&self) -> f64 {
        self.attack + self.decay
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Attack,
    Decay,
    Done,
}

/// A triggered envelope that runs attack then decay once and finishes.
#[derive(Debug, Clone)]
pub struct Envelope {
    spec: EnvelopeSpec,
    stage: Stage,
    level: f64,
    stage_samples: usize,
    stage_counter: usize,
    sample_rate: f64,
}

impl Envelope {
    /// Create an envelope already in its attack stage.
    pub fn triggered(spec: EnvelopeSpec, sample_rate: f64) -> Self {
        Envelope {
            spec,
            stage: Stage::Attack,
            level: 0.0,
            stage_samples: (spec.attack * sample_rate) as usize,
            stage_counter: 0,
            sample_rate,
        }
    }

    /// Generate the next envelope sample in [0, peak].
    pub fn next_sample(&mut self) -> f64 {
        let peak = self.spec.peak;
        match self.stage {
            Stage::Done => {
                self.level = 0.0;
            }
            Stage::Attack => {
                if self.stage_counter >= self.stage_samples {
                    self.level = peak;
                    self.enter_decay();
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = peak * t;
                    self.stage_counter += 1;
                }
            }
            Stage::Decay => {
                if self.stage_counter >= self.stage_samples {
                    self.level = 0.0;
                    self.stage = Stage::Done;
                } else {
                    let t = self.stage_counter as f64 / self.stage_samples as f64;
                    self.level = match self.spec.curve {
                        DecayCurve::Linear => peak * (1.0 - t),
                        DecayCurve::Exponential if peak > SILENCE_FLOOR => {
                            peak * (SILENCE_FLOOR / peak).powf(t)
                        }
                        DecayCurve::Exponential => peak * (1.0 - t),
                    };
                    self.stage_counter += 1;
                }
            }
        }
        self.level
    }

    /// True once the decay has completed.
    pub fn is_finished(&self) -> bool {
        self.stage == Stage::Done
    }

    fn enter_decay(&mut self) {
        self.stage = Stage::Decay;
        self.stage_samples = (self.spec.decay * self.sample_rate) as usize;
        self.stage_counter = 0;
    }
}
