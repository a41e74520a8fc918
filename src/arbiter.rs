//! Playback Arbiter: one start/stop/volume/mute contract over two
//! playback strategies.
//!
//! `start` tries the mode's recorded asset first and falls back to a
//! [`SynthesisGraph`] when the asset is unavailable. At most one path is
//! live at any time: every start tears the previous path down before the
//! next one is built, and both paths render through the same
//! [`GainControl`].

use crate::asset::{self, AssetSource};
use crate::dsp::BLOCK_SIZE;
use crate::dsp::mixer::{GainControl, Mixer};
use crate::dsp::sampler::LoopPlayer;
use crate::error::{AssetError, Result, SoundscapeError};
use crate::graph::{SynthesisGraph, derive_seed};
use crate::recipe::{RecipeBook, SoundMode};
use crate::resource::{ResourceGuard, ResourceKind, ResourceProbe};

/// The host's audio output. Without one nothing can play.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioBackend {
    pub sample_rate: f64,
}

impl AudioBackend {
    pub fn new(sample_rate: f64) -> Self {
        AudioBackend { sample_rate }
    }

    /// The output rate must lie in 8 kHz..=192 kHz, like
    /// [`EngineConfig::sample_rate`](crate::config::EngineConfig::sample_rate).
    pub fn validate(&self) -> Result<()> {
        if (8_000.0..=192_000.0).contains(&self.sample_rate) {
            Ok(())
        } else {
            Err(SoundscapeError::InvalidConfig(format!(
                "backend sample_rate {} outside 8000..=192000",
                self.sample_rate
            )))
        }
    }
}

/// Which strategy is producing sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Streamed,
    Synthesized,
}

/// Result of a successful [`PlaybackArbiter::start`].
#[derive(Debug, Clone, PartialEq)]
pub struct Started {
    pub kind: PathKind,
    /// Why the recorded asset was skipped, when synthesis took over.
    pub fallback: Option<AssetError>,
}

enum ActivePath {
    Idle,
    Streamed {
        mode: SoundMode,
        player: LoopPlayer,
        _guard: ResourceGuard,
    },
    Synthesized(SynthesisGraph),
}

/// Owns the single active playback path.
pub struct PlaybackArbiter {
    backend: Option<AudioBackend>,
    assets: Box<dyn AssetSource>,
    recipes: RecipeBook,
    gain: GainControl,
    probe: ResourceProbe,
    /// Mixes the streamed path; the synthesized path has its own.
    stream_mixer: Mixer,
    active: ActivePath,
    prefer_synthesis: bool,
    loop_seconds: f64,
    seed: u64,
    sessions: u64,
}

impl PlaybackArbiter {
    pub fn new(
        backend: Option<AudioBackend>,
        assets: Box<dyn AssetSource>,
        recipes: RecipeBook,
        gain: GainControl,
    ) -> Self {
        PlaybackArbiter {
            backend,
            assets,
            recipes,
            stream_mixer: Mixer::new(gain.clone()),
            gain,
            probe: ResourceProbe::new(),
            active: ActivePath::Idle,
            prefer_synthesis: false,
            loop_seconds: 2.0,
            seed: 0,
            sessions: 0,
        }
    }

    /// Always synthesize, never trying the recorded asset.
    pub fn with_prefer_synthesis(mut self, prefer: bool) -> Self {
        self.prefer_synthesis = prefer;
        self
    }

    pub fn with_noise_loop_seconds(mut self, seconds: f64) -> Self {
        self.loop_seconds = seconds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Start playing `mode`.
    ///
    /// Starting the mode that is already playing does nothing. Any other
    /// live path is torn down first.
    pub fn start(&mut self, mode: SoundMode) -> Result<Started> {
        if self.active_mode() == Some(mode) {
            if let Some(kind) = self.active_kind() {
                return Ok(Started {
                    kind,
                    fallback: None,
                });
            }
        }
        self.stop();

        let backend = self.backend.ok_or(SoundscapeError::SynthesisUnavailable)?;
        backend.validate()?;
        self.sessions += 1;

        let fallback = if self.prefer_synthesis {
            None
        } else {
            match asset::load(self.assets.as_ref(), mode) {
                Ok(buffer) => {
                    log::info!(
                        "streaming {mode} ({:.1}s at {} Hz)",
                        buffer.duration(),
                        buffer.sample_rate
                    );
                    self.active = ActivePath::Streamed {
                        mode,
                        player: LoopPlayer::new(buffer, backend.sample_rate),
                        _guard: self.probe.acquire(ResourceKind::Generator),
                    };
                    return Ok(Started {
                        kind: PathKind::Streamed,
                        fallback: None,
                    });
                }
                Err(e) => {
                    log::info!("{mode} asset unavailable ({e}); synthesizing");
                    Some(e)
                }
            }
        };

        let mut graph = SynthesisGraph::new(
            backend.sample_rate,
            self.loop_seconds,
            self.gain.clone(),
            self.probe.clone(),
        );
        graph.start(mode, self.recipes.get(mode), derive_seed(self.seed, self.sessions))?;
        self.active = ActivePath::Synthesized(graph);
        Ok(Started {
            kind: PathKind::Synthesized,
            fallback,
        })
    }

    /// Move to `mode` through the same attempt/fallback sequence as
    /// [`start`](Self::start).
    pub fn switch_mode(&mut self, mode: SoundMode) -> Result<Started> {
        if let Some(from) = self.active_mode() {
            if from != mode {
                log::debug!("switching {from} -> {mode}");
            }
        }
        self.start(mode)
    }

    /// Set the master volume of whichever path is live.
    pub fn set_gain(&mut self, volume: f64) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(SoundscapeError::InvalidVolume(volume));
        }
        self.gain.set_volume(volume);
        Ok(())
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.gain.set_muted(muted);
    }

    /// Tear down the live path. Idempotent.
    pub fn stop(&mut self) {
        match std::mem::replace(&mut self.active, ActivePath::Idle) {
            ActivePath::Idle => {}
            ActivePath::Streamed { mode, .. } => log::debug!("stopped streaming {mode}"),
            ActivePath::Synthesized(mut graph) => graph.stop(),
        }
    }

    /// Render the live path into `out`; silence when idle.
    pub fn render(&mut self, out: &mut [f32]) {
        match &mut self.active {
            ActivePath::Idle => out.fill(0.0),
            ActivePath::Synthesized(graph) => graph.render(out),
            ActivePath::Streamed { player, .. } => {
                for block in out.chunks_mut(BLOCK_SIZE) {
                    self.stream_mixer.clear(block.len());
                    for i in 0..block.len() {
                        self.stream_mixer.add(i, player.next_sample());
                    }
                    self.stream_mixer.write_to(block);
                }
            }
        }
    }

    pub fn active_kind(&self) -> Option<PathKind> {
        match self.active {
            ActivePath::Idle => None,
            ActivePath::Streamed { .. } => Some(PathKind::Streamed),
            ActivePath::Synthesized(_) => Some(PathKind::Synthesized),
        }
    }

    pub fn active_mode(&self) -> Option<SoundMode> {
        match &self.active {
            ActivePath::Idle => None,
            ActivePath::Streamed { mode, .. } => Some(*mode),
            ActivePath::Synthesized(graph) => graph.mode(),
        }
    }

    /// The live synthesis graph, when synthesis is the active path.
    pub fn graph(&self) -> Option<&SynthesisGraph> {
        match &self.active {
            ActivePath::Synthesized(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn gain(&self) -> &GainControl {
        &self.gain
    }

    /// Replace the recipe table; takes effect on the next start.
    pub fn set_recipes(&mut self, recipes: RecipeBook) {
        self.recipes = recipes;
    }

    /// Generators and timers currently alive across both paths.
    pub fn live_resources(&self) -> usize {
        self.probe.total()
    }
}

impl Drop for PlaybackArbiter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MemoryAssets;
    use crate::asset::NoAssets;
    use crate::dsp::filter::FilterSpec;

    fn arbiter(assets: Box<dyn AssetSource>) -> PlaybackArbiter {
        PlaybackArbiter::new(
            Some(AudioBackend::new(8000.0)),
            assets,
            RecipeBook::default(),
            GainControl::new(0.5),
        )
    }

    #[test]
    fn missing_asset_falls_back_to_synthesis() {
        let mut a = arbiter(Box::new(NoAssets));
        let started = a.start(SoundMode::Rain).unwrap();
        assert_eq!(started.kind, PathKind::Synthesized);
        assert_eq!(started.fallback, Some(AssetError::Missing(SoundMode::Rain)));
        let graph = a.graph().unwrap();
        assert_eq!(
            graph.filters(),
            vec![FilterSpec::lowpass(4500.0), FilterSpec::highpass(400.0)]
        );
    }

    #[test]
    fn available_asset_streams() {
        let assets = MemoryAssets::new();
        assets.insert(SoundMode::Ocean, crate::asset::tests::wav_bytes(2, 16000, 4000));
        let mut a = arbiter(Box::new(assets));
        let started = a.start(SoundMode::Ocean).unwrap();
        assert_eq!(started.kind, PathKind::Streamed);
        assert!(a.graph().is_none());
        assert_eq!(a.live_resources(), 1);

        let mut out = vec![0.0_f32; 512];
        a.render(&mut out);
        assert!(out.iter().any(|&s| s != 0.0));

        a.stop();
        assert_eq!(a.live_resources(), 0);
    }

    #[test]
    fn rejected_playback_falls_back() {
        let assets = MemoryAssets::new();
        assets.insert(SoundMode::Forest, crate::asset::tests::wav_bytes(1, 8000, 100));
        assets.mark_unavailable(SoundMode::Forest, AssetError::Rejected);
        let mut a = arbiter(Box::new(assets));
        let started = a.start(SoundMode::Forest).unwrap();
        assert_eq!(started.kind, PathKind::Synthesized);
        assert_eq!(started.fallback, Some(AssetError::Rejected));
    }

    #[test]
    fn prefer_synthesis_skips_assets() {
        let assets = MemoryAssets::new();
        assets.insert(SoundMode::Rain, crate::asset::tests::wav_bytes(1, 8000, 100));
        let mut a = arbiter(Box::new(assets)).with_prefer_synthesis(true);
        let started = a.start(SoundMode::Rain).unwrap();
        assert_eq!(started.kind, PathKind::Synthesized);
        assert_eq!(started.fallback, None);
    }

    #[test]
    fn no_backend_is_unavailable() {
        let mut a = PlaybackArbiter::new(
            None,
            Box::new(NoAssets),
            RecipeBook::default(),
            GainControl::new(0.5),
        );
        assert!(matches!(
            a.start(SoundMode::Rain),
            Err(SoundscapeError::SynthesisUnavailable)
        ));
        assert_eq!(a.active_kind(), None);
        assert_eq!(a.live_resources(), 0);
    }

    #[test]
    fn out_of_range_backend_rate_is_rejected() {
        for rate in [0.0, 1.5, -44100.0, f64::NAN, f64::INFINITY, 400_000.0] {
            let mut a = PlaybackArbiter::new(
                Some(AudioBackend::new(rate)),
                Box::new(NoAssets),
                RecipeBook::default(),
                GainControl::new(0.5),
            );
            assert!(
                matches!(a.start(SoundMode::Rain), Err(SoundscapeError::InvalidConfig(_))),
                "rate {rate} should be rejected"
            );
            assert_eq!(a.active_kind(), None);
            assert_eq!(a.live_resources(), 0);
        }
        assert!(AudioBackend::new(48_000.0).validate().is_ok());
    }

    #[test]
    fn switching_never_overlaps_paths() {
        let mut a = arbiter(Box::new(NoAssets));
        a.start(SoundMode::LoFi).unwrap();
        let lofi = a.live_resources();
        a.switch_mode(SoundMode::Drone).unwrap();
        assert_eq!(a.active_mode(), Some(SoundMode::Drone));
        // the drone graph alone: one oscillator
        assert_eq!(a.live_resources(), 1);
        assert!(lofi > 1);
    }

    #[test]
    fn repeated_start_is_idempotent() {
        let mut a = arbiter(Box::new(NoAssets));
        a.start(SoundMode::Forest).unwrap();
        let before = a.live_resources();
        let again = a.start(SoundMode::Forest).unwrap();
        assert_eq!(again.kind, PathKind::Synthesized);
        assert_eq!(a.live_resources(), before);
    }

    #[test]
    fn invalid_gain_leaves_volume() {
        let mut a = arbiter(Box::new(NoAssets));
        assert!(a.set_gain(1.01).is_err());
        assert!(a.set_gain(f64::NAN).is_err());
        assert_eq!(a.gain().volume(), 0.5);
        a.set_gain(0.9).unwrap();
        assert_eq!(a.gain().volume(), 0.9);
    }
}
