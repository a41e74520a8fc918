pub mod arbiter;
pub mod asset;
pub mod config;
pub mod controller;
pub mod dsp;
pub mod error;
pub mod graph;
pub mod notify;
pub mod recipe;
pub mod resource;
pub mod scheduler;
pub mod store;

use serde::Serialize;
use wasm_bindgen::prelude::*;

use crate::arbiter::AudioBackend;
use crate::asset::MemoryAssets;
use crate::config::EngineConfig;
use crate::controller::EngineController;
use crate::dsp::mixer::GainControl;
use crate::error::{AssetError, Result, SoundscapeError};
use crate::graph::SynthesisGraph;
use crate::notify::NoticeQueue;
use crate::recipe::{ModeRecipe, RecipeBook, SoundMode};
use crate::resource::ResourceProbe;
use crate::store::{KeyValueStore, MemoryStore};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Longest offline preview [`render_mode`] will produce.
pub const MAX_PREVIEW_SECONDS: f64 = 600.0;

/// WASM-exposed: return the soundscape-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// Synthesize `seconds` of `mode` offline at unity gain.
pub fn render_mode(mode: SoundMode, sample_rate: u32, seconds: f64, seed: u64) -> Result<Vec<f32>> {
    let config = EngineConfig {
        sample_rate,
        seed,
        ..EngineConfig::default()
    };
    config.validate()?;
    if !(0.0..=MAX_PREVIEW_SECONDS).contains(&seconds) {
        return Err(SoundscapeError::InvalidConfig(format!(
            "preview length {seconds}s outside 0..={MAX_PREVIEW_SECONDS}"
        )));
    }

    let rate = f64::from(sample_rate);
    let mut graph = SynthesisGraph::new(
        rate,
        config.noise_loop_seconds,
        GainControl::new(1.0),
        ResourceProbe::new(),
    );
    graph.start(mode, &ModeRecipe::builtin(mode), seed)?;
    let mut out = vec![0.0_f32; (seconds * rate) as usize];
    graph.render(&mut out);
    Ok(out)
}

/// WASM-exposed: the built-in recipe for a mode, as a JS object.
#[wasm_bindgen]
pub fn mode_recipe(mode: &str) -> std::result::Result<JsValue, JsValue> {
    let mode: SoundMode = mode.parse().map_err(js_err)?;
    to_js(&ModeRecipe::builtin(mode))
}

/// WASM-exposed: render a synthesized preview of a mode to mono f32 samples.
#[wasm_bindgen]
pub fn render_mode_samples(
    mode: &str,
    sample_rate: u32,
    seconds: f64,
    seed: u64,
) -> std::result::Result<Vec<f32>, JsValue> {
    let mode: SoundMode = mode.parse().map_err(js_err)?;
    render_mode(mode, sample_rate, seconds, seed).map_err(js_err)
}

fn js_err(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> std::result::Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(js_err)
}

/// WASM-exposed engine for the page's sound picker.
///
/// The host owns the AudioWorklet and `localStorage`: it passes the stored
/// mode in, pulls blocks with [`render`](Self::render), hands fetched asset
/// bytes over with [`provide_asset`](Self::provide_asset), and writes
/// [`persisted_mode`](Self::persisted_mode) back after each change.
#[wasm_bindgen]
pub struct SoundscapeEngine {
    controller: EngineController,
    assets: MemoryAssets,
    store: MemoryStore,
    notices: NoticeQueue,
}

#[wasm_bindgen]
impl SoundscapeEngine {
    /// `sample_rate` is the AudioContext rate; 0 means the page has no
    /// audio backend. `config_json` may be empty.
    #[wasm_bindgen(constructor)]
    pub fn new(
        sample_rate: f64,
        config_json: Option<String>,
        persisted_mode: Option<String>,
    ) -> std::result::Result<SoundscapeEngine, JsValue> {
        let mut config = match config_json.as_deref().map(str::trim) {
            Some(src) if !src.is_empty() => EngineConfig::from_json(src).map_err(js_err)?,
            _ => EngineConfig::default(),
        };
        let backend = (sample_rate > 0.0).then(|| AudioBackend::new(sample_rate));
        if backend.is_some() {
            config.sample_rate = sample_rate as u32;
        }

        let assets = MemoryAssets::new();
        let store = match persisted_mode {
            Some(mode) => MemoryStore::with(&config.storage_key, &mode),
            None => MemoryStore::new(),
        };
        let notices = NoticeQueue::new();
        let controller = EngineController::new(
            config,
            Box::new(assets.clone()),
            backend,
            Box::new(store.clone()),
            Box::new(notices.clone()),
        )
        .map_err(js_err)?;

        Ok(SoundscapeEngine {
            controller,
            assets,
            store,
            notices,
        })
    }

    pub fn toggle_play(&mut self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.controller.toggle_play())
    }

    pub fn start(&mut self, mode: &str) -> std::result::Result<JsValue, JsValue> {
        let mode: SoundMode = mode.parse().map_err(js_err)?;
        to_js(&self.controller.start(mode))
    }

    pub fn select_mode(&mut self, mode: &str) -> std::result::Result<JsValue, JsValue> {
        let state = self.controller.select_mode_key(mode).map_err(js_err)?;
        to_js(&state)
    }

    pub fn set_volume(&mut self, volume: f64) -> std::result::Result<JsValue, JsValue> {
        let state = self.controller.set_volume(volume).map_err(js_err)?;
        to_js(&state)
    }

    pub fn toggle_mute(&mut self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.controller.toggle_mute())
    }

    pub fn set_muted(&mut self, muted: bool) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.controller.set_muted(muted))
    }

    pub fn stop(&mut self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.controller.stop())
    }

    pub fn state(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.controller.state())
    }

    /// Fill one AudioWorklet block.
    pub fn render(&mut self, out: &mut [f32]) {
        self.controller.render(out);
    }

    /// Hand over the encoded bytes of a mode's recorded asset.
    pub fn provide_asset(&mut self, mode: &str, bytes: Vec<u8>) -> std::result::Result<(), JsValue> {
        let mode: SoundMode = mode.parse().map_err(js_err)?;
        self.assets.insert(mode, bytes);
        Ok(())
    }

    /// Hand over a mode's asset as mono PCM, e.g. channel data from
    /// `AudioContext.decodeAudioData`. Use this for MP3 assets.
    pub fn provide_pcm(
        &mut self,
        mode: &str,
        samples: Vec<f32>,
        sample_rate: u32,
    ) -> std::result::Result<(), JsValue> {
        let mode: SoundMode = mode.parse().map_err(js_err)?;
        self.assets
            .insert_pcm(mode, &samples, sample_rate)
            .map_err(js_err)
    }

    /// Record that the page could not fetch or was not allowed to play a
    /// mode's asset.
    pub fn reject_asset(&mut self, mode: &str) -> std::result::Result<(), JsValue> {
        let mode: SoundMode = mode.parse().map_err(js_err)?;
        self.assets.mark_unavailable(mode, AssetError::Rejected);
        Ok(())
    }

    /// Replace recipes from a JSON document; errors come back as a
    /// source-annotated report.
    pub fn set_recipes_json(&mut self, src: &str) -> std::result::Result<(), JsValue> {
        let book = RecipeBook::from_json(src)
            .map_err(|e| JsValue::from_str(&recipe::render_report(&e, "recipes.json", src)))?;
        self.controller.set_recipes(book);
        Ok(())
    }

    /// Notices queued since the last call, as `[{ message, level }]`.
    pub fn take_notices(&self) -> std::result::Result<JsValue, JsValue> {
        to_js(&self.notices.take())
    }

    pub fn persisted_mode(&self) -> Option<String> {
        self.store.get(&self.controller.config().storage_key)
    }

    pub fn live_resources(&self) -> usize {
        self.controller.live_resources()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(core_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn offline_render_is_deterministic() {
        let a = render_mode(SoundMode::Rain, 8000, 1.5, 9).unwrap();
        let b = render_mode(SoundMode::Rain, 8000, 1.5, 9).unwrap();
        assert_eq!(a.len(), 12000);
        assert_eq!(a, b);
        assert!(a.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn offline_render_validates_input() {
        assert!(render_mode(SoundMode::Ocean, 100, 1.0, 0).is_err());
        assert!(render_mode(SoundMode::Ocean, 8000, -1.0, 0).is_err());
        assert!(render_mode(SoundMode::Ocean, 8000, f64::NAN, 0).is_err());
    }

    #[test]
    fn engine_persists_through_memory_store() {
        let mut engine = SoundscapeEngine::new(8000.0, None, Some("ocean".into())).unwrap();
        assert_eq!(engine.persisted_mode().as_deref(), Some("ocean"));
        engine.controller.select_mode(SoundMode::Forest);
        assert_eq!(engine.persisted_mode().as_deref(), Some("forest"));
        assert_eq!(engine.live_resources(), 0);
    }

    #[test]
    fn provided_asset_is_streamed() {
        let mut engine = SoundscapeEngine::new(8000.0, None, None).unwrap();
        engine
            .assets
            .insert(SoundMode::Rain, crate::asset::tests::wav_bytes(1, 8000, 800));
        engine.controller.start(SoundMode::Rain);
        assert_eq!(
            engine.controller.active_path(),
            Some(crate::arbiter::PathKind::Streamed)
        );
        let mut block = [0.0_f32; 128];
        engine.render(&mut block);
        assert!(block.iter().any(|&s| s != 0.0));
        assert!(engine.notices.is_empty());
    }

    #[test]
    fn decoded_pcm_streams_where_mp3_falls_back() {
        let mut engine = SoundscapeEngine::new(8000.0, None, None).unwrap();
        engine.assets.insert(SoundMode::Rain, vec![0xFF, 0xFB, 0x90, 0x00]);
        engine.controller.start(SoundMode::Rain);
        assert_eq!(
            engine.controller.active_path(),
            Some(crate::arbiter::PathKind::Synthesized)
        );
        engine.controller.stop();

        let pcm: Vec<f32> = (0..4000).map(|i| (i as f32 * 0.03).sin() * 0.5).collect();
        engine.provide_pcm("rain", pcm, 22050).unwrap();
        engine.controller.start(SoundMode::Rain);
        assert_eq!(
            engine.controller.active_path(),
            Some(crate::arbiter::PathKind::Streamed)
        );
        let mut block = [0.0_f32; 128];
        engine.render(&mut block);
        assert!(block.iter().any(|&s| s != 0.0));
    }
}
