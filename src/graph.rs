//! Synthesis Graph: the live signal chain for one synthesized session.
//!
//! A graph is built from a [`ModeRecipe`] and owns every generator, filter,
//! modulator and scheduler it creates. [`SynthesisGraph::stop`] is the single
//! teardown: it cancels the scheduler, stops each source, and drops the lot.
//! Each owned resource carries a [`ResourceGuard`], so the probe reads zero
//! once teardown is done.
//!
//! States: `Idle → Building → Running → Stopping → Idle`. There is no
//! paused state; resuming builds a fresh graph.

use crate::dsp::BLOCK_SIZE;
use crate::dsp::filter::{FilterChain, FilterSpec};
use crate::dsp::mixer::{GainControl, Mixer};
use crate::dsp::modulator::{ModTarget, Modulation, ModulatorSpec};
use crate::dsp::noise::NoiseLoop;
use crate::dsp::oscillator::Oscillator;
use crate::recipe::{ModeRecipe, SoundMode, SourceSpec};
use crate::resource::{ResourceGuard, ResourceKind, ResourceProbe};
use crate::scheduler::{Clock, SampleClock, TransientScheduler};
use crate::error::RecipeError;

/// Lifecycle state of a [`SynthesisGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    Idle,
    Building,
    Running,
    Stopping,
}

#[derive(Debug)]
enum Generator {
    Noise(NoiseLoop),
    Tone(Oscillator),
}

/// A started generator and the guard that accounts for it.
#[derive(Debug)]
struct OwnedSource {
    spec: SourceSpec,
    generator: Option<Generator>,
    _guard: ResourceGuard,
}

impl OwnedSource {
    fn start(
        spec: SourceSpec,
        sample_rate: f64,
        loop_seconds: f64,
        seed: u64,
        probe: &ResourceProbe,
    ) -> Self {
        let generator = match spec {
            SourceSpec::Noise { color } => {
                Generator::Noise(NoiseLoop::new(color, loop_seconds, sample_rate, seed))
            }
            SourceSpec::Oscillator {
                waveform,
                frequency,
            } => Generator::Tone(Oscillator::new(waveform, frequency, sample_rate)),
        };
        OwnedSource {
            spec,
            generator: Some(generator),
            _guard: probe.acquire(ResourceKind::Generator),
        }
    }

    fn next_sample(&mut self) -> f64 {
        match &mut self.generator {
            Some(Generator::Noise(n)) => n.next_sample(),
            Some(Generator::Tone(o)) => o.next_sample(),
            None => 0.0,
        }
    }

    fn stop(&mut self) {
        self.generator = None;
    }
}

#[derive(Debug)]
struct Layer {
    source: OwnedSource,
    gain: f64,
}

/// Everything a running graph owns.
#[derive(Debug)]
struct LiveGraph {
    mode: SoundMode,
    sources: Vec<OwnedSource>,
    chain: FilterChain,
    gain: f64,
    modulator: Option<ModulatorSpec>,
    layers: Vec<Layer>,
    scheduler: Option<TransientScheduler>,
    clock: SampleClock,
}

impl LiveGraph {
    fn modulation_at(&self, t: f64) -> Modulation {
        match &self.modulator {
            Some(m) => m.at(t, self.gain),
            None => Modulation {
                gain: self.gain,
                cutoff_scale: 1.0,
            },
        }
    }

    fn modulates_cutoff(&self) -> bool {
        matches!(
            self.modulator,
            Some(ModulatorSpec::Lfo {
                target: ModTarget::Cutoff,
                ..
            })
        )
    }

    fn stop_all(&mut self) {
        if let Some(s) = self.scheduler.as_mut() {
            s.cancel();
        }
        for s in self.sources.iter_mut() {
            s.stop();
        }
        for l in self.layers.iter_mut() {
            l.source.stop();
        }
    }
}

/// Mixes a 64-bit seed with a salt (SplitMix64 finalizer).
pub(crate) fn derive_seed(seed: u64, salt: u64) -> u64 {
    let mut z = seed.wrapping_add(salt.wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// The live synthesis instance for one playback session.
#[derive(Debug)]
pub struct SynthesisGraph {
    state: GraphState,
    live: Option<LiveGraph>,
    mixer: Mixer,
    sample_rate: f64,
    loop_seconds: f64,
    probe: ResourceProbe,
}

impl SynthesisGraph {
    /// An idle graph that renders through `gain`.
    pub fn new(sample_rate: f64, loop_seconds: f64, gain: GainControl, probe: ResourceProbe) -> Self {
        SynthesisGraph {
            state: GraphState::Idle,
            live: None,
            mixer: Mixer::new(gain),
            sample_rate,
            loop_seconds,
            probe,
        }
    }

    /// Build and start the chain for `mode`.
    ///
    /// A running graph is torn down first. On an invalid recipe the graph is
    /// left idle.
    pub fn start(&mut self, mode: SoundMode, recipe: &ModeRecipe, seed: u64) -> Result<(), RecipeError> {
        self.stop();
        recipe.validate(mode)?;

        self.transition(GraphState::Building, mode);
        let mut salt = 0;
        let mut next_seed = || {
            salt += 1;
            derive_seed(seed, salt)
        };

        let sources = recipe
            .sources
            .iter()
            .map(|&spec| {
                OwnedSource::start(spec, self.sample_rate, self.loop_seconds, next_seed(), &self.probe)
            })
            .collect();
        let layers = recipe
            .layers
            .iter()
            .map(|l| Layer {
                source: OwnedSource::start(
                    l.source,
                    self.sample_rate,
                    self.loop_seconds,
                    next_seed(),
                    &self.probe,
                ),
                gain: l.gain,
            })
            .collect();
        let scheduler = recipe.transient.map(|spec| {
            TransientScheduler::start(spec, self.sample_rate, 0.0, next_seed(), self.probe.clone())
        });

        self.live = Some(LiveGraph {
            mode,
            sources,
            chain: FilterChain::from_specs(&recipe.filters, self.sample_rate),
            gain: recipe.gain,
            modulator: recipe.modulator,
            layers,
            scheduler,
            clock: SampleClock::new(self.sample_rate),
        });
        self.transition(GraphState::Running, mode);
        Ok(())
    }

    /// Tear down everything the graph owns. Idempotent.
    pub fn stop(&mut self) {
        let Some(mut live) = self.live.take() else {
            return;
        };
        let mode = live.mode;
        self.transition(GraphState::Stopping, mode);
        live.stop_all();
        drop(live);
        self.transition(GraphState::Idle, mode);
    }

    /// Render the next `out.len()` samples. An idle graph writes silence.
    pub fn render(&mut self, out: &mut [f32]) {
        let Some(live) = self.live.as_mut() else {
            out.fill(0.0);
            return;
        };

        for block in out.chunks_mut(BLOCK_SIZE) {
            let n = block.len();
            let t0 = live.clock.now();
            if let Some(s) = live.scheduler.as_mut() {
                s.tick(&live.clock);
            }
            if live.modulates_cutoff() {
                let scale = live.modulation_at(t0).cutoff_scale;
                live.chain.scale_frequencies(scale);
            }

            self.mixer.clear(n);
            for i in 0..n {
                let t = t0 + i as f64 / self.sample_rate;
                let gain = live.modulation_at(t).gain;
                let bed: f64 = live.sources.iter_mut().map(|s| s.next_sample()).sum();
                let mut y = live.chain.process(bed) * gain;
                for layer in live.layers.iter_mut() {
                    y += layer.source.next_sample() * layer.gain;
                }
                if let Some(s) = live.scheduler.as_mut() {
                    y += s.next_sample();
                }
                self.mixer.add(i, y);
            }
            self.mixer.write_to(block);
            live.clock.advance(n);
        }
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == GraphState::Running
    }

    pub fn mode(&self) -> Option<SoundMode> {
        self.live.as_ref().map(|l| l.mode)
    }

    /// The bed sources followed by any extra layers.
    pub fn sources(&self) -> Vec<SourceSpec> {
        self.live
            .as_ref()
            .map(|l| {
                l.sources
                    .iter()
                    .map(|s| s.spec)
                    .chain(l.layers.iter().map(|x| x.source.spec))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The connected filter chain, in processing order.
    pub fn filters(&self) -> Vec<FilterSpec> {
        self.live.as_ref().map(|l| l.chain.specs()).unwrap_or_default()
    }

    pub fn scheduler(&self) -> Option<&TransientScheduler> {
        self.live.as_ref().and_then(|l| l.scheduler.as_ref())
    }

    /// Seconds rendered since the graph started.
    pub fn elapsed(&self) -> f64 {
        self.live.as_ref().map(|l| l.clock.now()).unwrap_or(0.0)
    }

    /// Live generators and timers accounted to this graph's probe.
    pub fn live_resources(&self) -> usize {
        self.probe.total()
    }

    fn transition(&mut self, next: GraphState, mode: SoundMode) {
        let legal = matches!(
            (self.state, next),
            (GraphState::Idle, GraphState::Building)
                | (GraphState::Building, GraphState::Running)
                | (GraphState::Running, GraphState::Stopping)
                | (GraphState::Stopping, GraphState::Idle)
        );
        debug_assert!(legal, "illegal graph transition {:?} -> {next:?}", self.state);
        log::debug!("synthesis graph [{mode}] {:?} -> {next:?}", self.state);
        self.state = next;
    }
}

impl Drop for SynthesisGraph {
    fn drop(&mut self) {
        self.stop();
    }
}
