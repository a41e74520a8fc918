//! Engine Controller: the lifecycle object the UI drives.
//!
//! Holds the [`EngineState`] (current mode, play flag, volume, mute),
//! persists the selected mode, and delegates every playback mechanic to the
//! [`PlaybackArbiter`]. It owns no audio resources itself.

use serde::Serialize;

use crate::arbiter::{AudioBackend, PathKind, PlaybackArbiter, Started};
use crate::asset::AssetSource;
use crate::config::EngineConfig;
use crate::dsp::mixer::GainControl;
use crate::error::{Result, SoundscapeError};
use crate::notify::{NoticeLevel, Notifier};
use crate::recipe::{RecipeBook, SoundMode};
use crate::store::KeyValueStore;

/// Snapshot of the engine as the UI sees it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineState {
    pub current_mode: SoundMode,
    pub is_playing: bool,
    pub master_volume: f64,
    pub is_muted: bool,
}

pub struct EngineController {
    config: EngineConfig,
    arbiter: PlaybackArbiter,
    store: Box<dyn KeyValueStore>,
    notifier: Box<dyn Notifier>,
    current_mode: SoundMode,
    is_playing: bool,
}

impl EngineController {
    /// Build a controller and restore the last persisted mode.
    pub fn new(
        config: EngineConfig,
        assets: Box<dyn AssetSource>,
        backend: Option<AudioBackend>,
        store: Box<dyn KeyValueStore>,
        notifier: Box<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        if let Some(backend) = &backend {
            backend.validate()?;
        }
        let current_mode = restore_mode(store.as_ref(), &config);
        let arbiter = PlaybackArbiter::new(
            backend,
            assets,
            RecipeBook::default(),
            GainControl::new(config.default_volume),
        )
        .with_prefer_synthesis(config.prefer_synthesis)
        .with_noise_loop_seconds(config.noise_loop_seconds)
        .with_seed(config.seed);

        Ok(EngineController {
            config,
            arbiter,
            store,
            notifier,
            current_mode,
            is_playing: false,
        })
    }

    /// Use `recipes` for every later start.
    pub fn with_recipes(mut self, recipes: RecipeBook) -> Self {
        self.set_recipes(recipes);
        self
    }

    /// Replace the recipe table. A running graph keeps its recipe until the
    /// next start.
    pub fn set_recipes(&mut self, recipes: RecipeBook) {
        self.arbiter.set_recipes(recipes);
    }

    pub fn toggle_play(&mut self) -> EngineState {
        if self.is_playing {
            self.stop()
        } else {
            self.start(self.current_mode)
        }
    }

    /// Select `mode` and start playing it.
    ///
    /// If nothing can play, the state reports not playing and the user gets
    /// a warning notice.
    pub fn start(&mut self, mode: SoundMode) -> EngineState {
        self.current_mode = mode;
        self.persist_mode();
        match self.arbiter.start(mode) {
            Ok(started) => self.on_started(mode, started),
            Err(e) => self.on_unplayable(mode, e),
        }
        self.state()
    }

    /// Change the selected mode, switching playback if it is running.
    pub fn select_mode(&mut self, mode: SoundMode) -> EngineState {
        if self.is_playing {
            if self.arbiter.active_mode() != Some(mode) {
                self.current_mode = mode;
                self.persist_mode();
                match self.arbiter.switch_mode(mode) {
                    Ok(started) => self.on_started(mode, started),
                    Err(e) => self.on_unplayable(mode, e),
                }
            }
        } else if self.current_mode != mode {
            self.current_mode = mode;
            self.persist_mode();
        }
        self.state()
    }

    /// [`select_mode`](Self::select_mode) by key; an unknown key changes
    /// nothing.
    pub fn select_mode_key(&mut self, key: &str) -> Result<EngineState> {
        let mode: SoundMode = key.parse()?;
        Ok(self.select_mode(mode))
    }

    pub fn switch_mode(&mut self, mode: SoundMode) -> EngineState {
        self.select_mode(mode)
    }

    /// Set the master volume. Out-of-range values are rejected and nothing
    /// changes.
    pub fn set_volume(&mut self, volume: f64) -> Result<EngineState> {
        self.arbiter.set_gain(volume)?;
        Ok(self.state())
    }

    pub fn toggle_mute(&mut self) -> EngineState {
        let muted = !self.arbiter.gain().is_muted();
        self.set_muted(muted)
    }

    pub fn set_muted(&mut self, muted: bool) -> EngineState {
        self.arbiter.set_muted(muted);
        self.state()
    }

    /// Stop playback. Idempotent.
    pub fn stop(&mut self) -> EngineState {
        self.arbiter.stop();
        self.is_playing = false;
        self.state()
    }

    pub fn state(&self) -> EngineState {
        let gain = self.arbiter.gain();
        EngineState {
            current_mode: self.current_mode,
            is_playing: self.is_playing,
            master_volume: gain.volume(),
            is_muted: gain.is_muted(),
        }
    }

    /// Pull the next block of output.
    pub fn render(&mut self, out: &mut [f32]) {
        self.arbiter.render(out);
    }

    pub fn active_path(&self) -> Option<PathKind> {
        self.arbiter.active_kind()
    }

    pub fn arbiter(&self) -> &PlaybackArbiter {
        &self.arbiter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The mode currently persisted, if any.
    pub fn persisted_mode(&self) -> Option<String> {
        self.store.get(&self.config.storage_key)
    }

    pub fn live_resources(&self) -> usize {
        self.arbiter.live_resources()
    }

    /// Tear everything down when the page or section closes.
    pub fn shutdown(&mut self) {
        self.stop();
        log::debug!("engine shut down");
    }

    fn on_started(&mut self, mode: SoundMode, started: Started) {
        self.is_playing = true;
        if let Some(reason) = started.fallback {
            log::debug!("{mode} fell back to synthesis: {reason}");
            self.notifier.notify(
                &format!(
                    "Recorded \"{}\" is unavailable, playing a synthesized version.",
                    mode.display_name()
                ),
                NoticeLevel::Info,
            );
        }
    }

    fn on_unplayable(&mut self, mode: SoundMode, err: SoundscapeError) {
        self.is_playing = false;
        log::warn!("cannot play {mode}: {err}");
        let message = match err {
            SoundscapeError::SynthesisUnavailable => {
                "Audio is not available in this browser.".to_string()
            }
            other => format!("Could not play \"{}\": {other}", mode.display_name()),
        };
        self.notifier.notify(&message, NoticeLevel::Warning);
    }

    fn persist_mode(&mut self) {
        let key = &self.config.storage_key;
        if let Err(e) = self.store.set(key, self.current_mode.key()) {
            log::warn!("could not persist sound selection: {e}");
        }
    }
}

impl Drop for EngineController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn restore_mode(store: &dyn KeyValueStore, config: &EngineConfig) -> SoundMode {
    match store.get(&config.storage_key) {
        Some(saved) => saved.parse().unwrap_or_else(|_| {
            log::debug!("ignoring unrecognised persisted mode '{saved}'");
            config.default_mode
        }),
        None => config.default_mode,
    }
}
