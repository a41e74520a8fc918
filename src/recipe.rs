//! Sound modes and the recipe table describing how each one is synthesized.
//!
//! The table is the single place that says what a mode sounds like. The
//! synthesis graph only interprets [`ModeRecipe`] values, so retuning or
//! adding a texture is a data change. Hosts can override entries from JSON.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};

use crate::dsp::envelope::{DecayCurve, EnvelopeSpec};
use crate::dsp::filter::FilterSpec;
use crate::dsp::modulator::{ModTarget, ModulatorSpec};
use crate::dsp::noise::NoiseColor;
use crate::dsp::oscillator::Waveform;
use crate::dsp::voice::{Pitch, TransientVoice};
use crate::error::{RecipeError, SoundscapeError};

// ── Sound Mode ──────────────────────────────────────────────

/// A selectable ambient texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundMode {
    Rain,
    Ocean,
    Forest,
    LoFi,
    /// Soft sine pad; also the fallback recipe.
    #[serde(alias = "piano")]
    Drone,
}

impl SoundMode {
    pub const ALL: [SoundMode; 5] = [
        SoundMode::Rain,
        SoundMode::Ocean,
        SoundMode::Forest,
        SoundMode::LoFi,
        SoundMode::Drone,
    ];

    /// Stable key used for persistence and the JS API.
    pub fn key(self) -> &'static str {
        match self {
            SoundMode::Rain => "rain",
            SoundMode::Ocean => "ocean",
            SoundMode::Forest => "forest",
            SoundMode::LoFi => "lofi",
            SoundMode::Drone => "drone",
        }
    }

    /// Human-readable name shown in the sound picker.
    pub fn display_name(self) -> &'static str {
        match self {
            SoundMode::Rain => "Rain on Window",
            SoundMode::Ocean => "Ocean Waves",
            SoundMode::Forest => "Forest Birds",
            SoundMode::LoFi => "Lo-fi Focus",
            SoundMode::Drone => "Soft Pad",
        }
    }

    /// File name of the recorded asset for this mode.
    pub fn asset_file(self) -> &'static str {
        match self {
            SoundMode::Rain => "rain.mp3",
            SoundMode::Ocean => "ocean.mp3",
            SoundMode::Forest => "forest.mp3",
            SoundMode::LoFi => "lofi.mp3",
            SoundMode::Drone => "piano.mp3",
        }
    }
}

impl fmt::Display for SoundMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for SoundMode {
    type Err = SoundscapeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rain" => Ok(SoundMode::Rain),
            "ocean" => Ok(SoundMode::Ocean),
            "forest" => Ok(SoundMode::Forest),
            "lofi" => Ok(SoundMode::LoFi),
            "drone" | "piano" => Ok(SoundMode::Drone),
            _ => Err(SoundscapeError::UnknownMode(s.to_string())),
        }
    }
}

// ── Recipe Types ────────────────────────────────────────────

/// A continuous generator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Noise { color: NoiseColor },
    Oscillator { waveform: Waveform, frequency: f64 },
}

/// An extra continuous layer mixed straight into the master, unfiltered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub source: SourceSpec,
    pub gain: f64,
}

/// Recurring short events layered over the bed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransientSpec {
    /// Mean seconds between events.
    pub interval: f64,
    /// Each gap is `interval ± jitter`, uniformly.
    #[serde(default)]
    pub jitter: f64,
    pub envelope: EnvelopeSpec,
    pub voice: TransientVoice,
}

/// Declarative description of one ambient texture.
///
/// Signal flow: `sources` are summed, run through `filters` in order, scaled
/// by `gain` (optionally modulated), then mixed with `layers` and transient
/// events into the master gain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeRecipe {
    pub sources: Vec<SourceSpec>,
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
    #[serde(default = "unity")]
    pub gain: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulator: Option<ModulatorSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transient: Option<TransientSpec>,
}

fn unity() -> f64 {
    1.0
}

impl ModeRecipe {
    /// The built-in recipe for `mode`.
    pub fn builtin(mode: SoundMode) -> ModeRecipe {
        match mode {
            SoundMode::Rain => ModeRecipe {
                sources: vec![SourceSpec::Noise {
                    color: NoiseColor::Pink,
                }],
                filters: vec![FilterSpec::lowpass(4500.0), FilterSpec::highpass(400.0)],
                gain: 1.0,
                modulator: None,
                layers: vec![],
                transient: Some(TransientSpec {
                    interval: 1.2,
                    jitter: 0.2,
                    envelope: EnvelopeSpec {
                        attack: 0.02,
                        decay: 0.23,
                        peak: 0.2,
                        curve: DecayCurve::Exponential,
                    },
                    voice: TransientVoice::Tone {
                        waveform: Waveform::Triangle,
                        pitch: Pitch::Fixed(800.0),
                    },
                }),
            },
            SoundMode::Ocean => ModeRecipe {
                sources: vec![SourceSpec::Noise {
                    color: NoiseColor::Brown,
                }],
                filters: vec![FilterSpec::lowpass(700.0)],
                gain: 0.6,
                modulator: Some(ModulatorSpec::Lfo {
                    rate_hz: 0.08,
                    depth: 0.5,
                    target: ModTarget::Gain,
                }),
                layers: vec![],
                transient: None,
            },
            SoundMode::Forest => ModeRecipe {
                sources: vec![SourceSpec::Noise {
                    color: NoiseColor::Pink,
                }],
                filters: vec![FilterSpec::bandpass(3000.0, 1.2)],
                gain: 1.0,
                modulator: None,
                layers: vec![],
                transient: Some(TransientSpec {
                    interval: 1.6,
                    jitter: 0.3,
                    envelope: EnvelopeSpec {
                        attack: 0.03,
                        decay: 0.22,
                        peak: 0.15,
                        curve: DecayCurve::Exponential,
                    },
                    voice: TransientVoice::Tone {
                        waveform: Waveform::Sine,
                        pitch: Pitch::Range {
                            low: 1200.0,
                            high: 2000.0,
                        },
                    },
                }),
            },
            SoundMode::LoFi => ModeRecipe {
                sources: vec![
                    SourceSpec::Oscillator {
                        waveform: Waveform::Sawtooth,
                        frequency: 220.0,
                    },
                    SourceSpec::Oscillator {
                        waveform: Waveform::Sawtooth,
                        frequency: 221.2,
                    },
                ],
                filters: vec![FilterSpec::lowpass(900.0)],
                gain: 0.25,
                modulator: None,
                layers: vec![LayerSpec {
                    source: SourceSpec::Noise {
                        color: NoiseColor::White,
                    },
                    gain: 0.02,
                }],
                transient: None,
            },
            SoundMode::Drone => ModeRecipe {
                sources: vec![SourceSpec::Oscillator {
                    waveform: Waveform::Sine,
                    frequency: 220.0,
                }],
                filters: vec![FilterSpec::lowpass(1200.0)],
                gain: 0.3,
                modulator: Some(ModulatorSpec::FadeIn { seconds: 1.5 }),
                layers: vec![],
                transient: None,
            },
        }
    }

    /// Check that every parameter is usable by the synthesis graph.
    pub fn validate(&self, mode: SoundMode) -> Result<(), RecipeError> {
        let invalid = |reason: String| RecipeError::Invalid { mode, reason };
        let positive = |v: f64| v.is_finite() && v > 0.0;
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;

        if self.sources.is_empty() {
            return Err(invalid("at least one source is required".into()));
        }
        for source in self.sources.iter().chain(self.layers.iter().map(|l| &l.source)) {
            if let SourceSpec::Oscillator { frequency, .. } = source {
                if !positive(*frequency) {
                    return Err(invalid(format!("oscillator frequency {frequency} must be > 0")));
                }
            }
        }
        for (i, f) in self.filters.iter().enumerate() {
            if !positive(f.frequency) || !positive(f.q) {
                return Err(invalid(format!(
                    "filter {i} needs positive frequency and q, got {} / {}",
                    f.frequency, f.q
                )));
            }
        }
        if !non_negative(self.gain) || self.layers.iter().any(|l| !non_negative(l.gain)) {
            return Err(invalid("gains must be finite and >= 0".into()));
        }
        match self.modulator {
            Some(ModulatorSpec::Lfo { rate_hz, depth, .. }) => {
                if !positive(rate_hz) || !non_negative(depth) {
                    return Err(invalid(format!("lfo rate {rate_hz} / depth {depth} out of range")));
                }
            }
            Some(ModulatorSpec::FadeIn { seconds }) if !non_negative(seconds) => {
                return Err(invalid(format!("fade-in of {seconds}s is invalid")));
            }
            _ => {}
        }
        if let Some(t) = &self.transient {
            if !positive(t.interval) || !non_negative(t.jitter) || t.jitter >= t.interval {
                return Err(invalid(format!(
                    "transient interval {} / jitter {} out of range",
                    t.interval, t.jitter
                )));
            }
            let env = &t.envelope;
            if !non_negative(env.attack)
                || !non_negative(env.decay)
                || !(0.0..=1.0).contains(&env.peak)
            {
                return Err(invalid("transient envelope out of range".into()));
            }
            // A transient must finish before the next one can fire.
            if env.duration() >= t.interval - t.jitter {
                return Err(invalid(format!(
                    "transient lasts {}s but events may be {}s apart",
                    env.duration(),
                    t.interval - t.jitter
                )));
            }
        }
        Ok(())
    }
}

// ── Recipe Book ─────────────────────────────────────────────

/// The mode → recipe table.
#[derive(Debug, Clone)]
pub struct RecipeBook {
    recipes: HashMap<SoundMode, ModeRecipe>,
    fallback: ModeRecipe,
}

impl Default for RecipeBook {
    fn default() -> Self {
        RecipeBook {
            recipes: SoundMode::ALL
                .iter()
                .map(|&m| (m, ModeRecipe::builtin(m)))
                .collect(),
            fallback: ModeRecipe::builtin(SoundMode::Drone),
        }
    }
}

impl RecipeBook {
    /// Built-in table with the entries from `src` layered on top.
    pub fn from_json(src: &str) -> Result<Self, RecipeError> {
        let mut book = RecipeBook::default();
        book.apply_json(src)?;
        Ok(book)
    }

    /// Replace entries with those in a JSON object keyed by mode.
    ///
    /// All entries are validated before any is applied.
    pub fn apply_json(&mut self, src: &str) -> Result<(), RecipeError> {
        let overrides: HashMap<SoundMode, ModeRecipe> =
            serde_json::from_str(src).map_err(|e| parse_error(&e, src))?;
        for (mode, recipe) in &overrides {
            recipe.validate(*mode)?;
        }
        for (mode, recipe) in overrides {
            log::debug!("recipe override for {mode}");
            self.recipes.insert(mode, recipe);
        }
        Ok(())
    }

    /// Replace one entry.
    pub fn set(&mut self, mode: SoundMode, recipe: ModeRecipe) -> Result<(), RecipeError> {
        recipe.validate(mode)?;
        self.recipes.insert(mode, recipe);
        Ok(())
    }

    /// The recipe for `mode`, or the drone recipe if the table has none.
    pub fn get(&self, mode: SoundMode) -> &ModeRecipe {
        self.recipes.get(&mode).unwrap_or(&self.fallback)
    }
}

fn parse_error(e: &serde_json::Error, src: &str) -> RecipeError {
    let (line, column) = (e.line(), e.column());
    let line_start: usize = src
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    RecipeError::Parse {
        message: e.to_string(),
        line,
        column,
        offset: (line_start + column.saturating_sub(1)).min(src.len()),
    }
}

/// Render a source-annotated report for a recipe error.
pub fn render_report(err: &RecipeError, name: &str, src: &str) -> String {
    let (span, label) = match err {
        RecipeError::Parse {
            offset, message, ..
        } => (*offset..(*offset + 1).min(src.len()), message.clone()),
        RecipeError::Invalid { mode, reason } => {
            let key = format!("\"{}\"", mode.key());
            let span = src
                .find(&key)
                .map(|start| start..start + key.len())
                .unwrap_or(0..0);
            (span, reason.clone())
        }
    };

    let mut out = Vec::new();
    let written = Report::build(ReportKind::Error, (name, span.clone()))
        .with_config(
            Config::default()
                .with_color(false)
                .with_index_type(IndexType::Byte),
        )
        .with_message(err.to_string())
        .with_label(Label::new((name, span)).with_message(label))
        .finish()
        .write((name, Source::from(src)), &mut out);
    match written {
        Ok(()) => String::from_utf8_lossy(&out).into_owned(),
        Err(_) => err.to_string(),
    }
}
