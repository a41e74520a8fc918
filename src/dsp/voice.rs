//! Transient events: a short source shaped by a one-shot envelope.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::resource::ResourceGuard;

use super::envelope::{Envelope, EnvelopeSpec};
use super::noise::{NoiseColor, NoiseGenerator};
use super::oscillator::{Oscillator, Waveform};

/// Extra lifetime allowed past the envelope, in seconds.
const TAIL_SECONDS: f64 = 0.01;

/// Pitch of a tone burst.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Pitch {
    Fixed(f64),
    /// Uniformly drawn from `[low, high)` per event.
    Range { low: f64, high: f64 },
}

impl Pitch {
    pub fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        match *self {
            Pitch::Fixed(f) => f,
            Pitch::Range { low, high } if high > low => rng.gen_range(low..high),
            Pitch::Range { low, .. } => low,
        }
    }
}

/// What a transient event sounds like.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "synth", rename_all = "snake_case")]
pub enum TransientVoice {
    Tone { waveform: Waveform, pitch: Pitch },
    NoiseBurst { color: NoiseColor },
}

#[derive(Debug, Clone)]
enum EventSource {
    Tone(Oscillator),
    Noise(NoiseGenerator),
}

/// One fired transient: owns its source and envelope and stops itself once
/// the envelope completes.
#[derive(Debug)]
pub struct TransientEvent {
    source: EventSource,
    envelope: Envelope,
    /// Hard bound on the event's lifetime, in samples.
    remaining: usize,
    /// Frequency of a tone burst.
    pub frequency: Option<f64>,
    _guard: ResourceGuard,
}

impl TransientEvent {
    pub fn new<R: Rng>(
        voice: &TransientVoice,
        envelope: EnvelopeSpec,
        sample_rate: f64,
        rng: &mut R,
        guard: ResourceGuard,
    ) -> Self {
        let (source, frequency) = match voice {
            TransientVoice::Tone { waveform, pitch } => {
                let f = pitch.draw(rng);
                (EventSource::Tone(Oscillator::new(*waveform, f, sample_rate)), Some(f))
            }
            TransientVoice::NoiseBurst { color } => {
                (EventSource::Noise(NoiseGenerator::new(*color, rng.r#gen())), None)
            }
        };
        TransientEvent {
            source,
            envelope: Envelope::triggered(envelope, sample_rate),
            remaining: ((envelope.duration() + TAIL_SECONDS) * sample_rate) as usize,
            frequency,
            _guard: guard,
        }
    }

    /// Generate the next sample.
    pub fn next_sample(&mut self) -> f64 {
        if self.is_finished() {
            return 0.0;
        }
        self.remaining -= 1;
        let s = match &mut self.source {
            EventSource::Tone(osc) => osc.next_sample(),
            EventSource::Noise(n) => n.next_sample(),
        };
        s * self.envelope.next_sample()
    }

    pub fn is_finished(&self) -> bool {
        self.remaining == 0 || self.envelope.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    use super::*;
    use crate::dsp::envelope::DecayCurve;
    use crate::resource::{ResourceKind, ResourceProbe};

    fn chirp() -> (TransientVoice, EnvelopeSpec) {
        (
            TransientVoice::Tone {
                waveform: Waveform::Sine,
                pitch: Pitch::Range {
                    low: 1200.0,
                    high: 2000.0,
                },
            },
            EnvelopeSpec {
                attack: 0.03,
                decay: 0.22,
                peak: 0.15,
                curve: DecayCurve::Exponential,
            },
        )
    }

    #[test]
    fn event_self_terminates_and_releases() {
        let probe = ResourceProbe::new();
        let mut rng = Pcg32::seed_from_u64(1);
        let (voice, env) = chirp();
        let mut ev = TransientEvent::new(
            &voice,
            env,
            44100.0,
            &mut rng,
            probe.acquire(ResourceKind::Generator),
        );
        let f = ev.frequency.unwrap_or_default();
        assert!((1200.0..2000.0).contains(&f), "chirp pitch out of range: {f}");

        let mut n = 0;
        while !ev.is_finished() {
            let s = ev.next_sample();
            assert!(s.abs() <= 0.15 + 1e-9, "event sample exceeds peak: {s}");
            n += 1;
        }
        assert!(n <= ((0.25 + TAIL_SECONDS) * 44100.0) as usize);
        assert_eq!(ev.next_sample(), 0.0);

        assert_eq!(probe.live(ResourceKind::Generator), 1);
        drop(ev);
        assert_eq!(probe.total(), 0);
    }

    #[test]
    fn noise_burst_is_audible() {
        let probe = ResourceProbe::new();
        let mut rng = Pcg32::seed_from_u64(2);
        let (_, env) = chirp();
        let mut ev = TransientEvent::new(
            &TransientVoice::NoiseBurst {
                color: NoiseColor::White,
            },
            env,
            44100.0,
            &mut rng,
            probe.acquire(ResourceKind::Generator),
        );
        assert_eq!(ev.frequency, None);
        let energy: f64 = (0..4410).map(|_| ev.next_sample().abs()).sum();
        assert!(energy > 1.0, "noise burst should be audible, energy {energy}");
    }

    #[test]
    fn fixed_pitch_is_exact() {
        let mut rng = Pcg32::seed_from_u64(3);
        assert_eq!(Pitch::Fixed(800.0).draw(&mut rng), 800.0);
        assert_eq!(Pitch::Range { low: 5.0, high: 5.0 }.draw(&mut rng), 5.0);
    }
}
