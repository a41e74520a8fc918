//! End-to-end lifecycle checks against the public controller API.

use std::io::Cursor;

use pretty_assertions::assert_eq;
use soundscape_core::arbiter::{AudioBackend, PathKind};
use soundscape_core::asset::{MemoryAssets, NoAssets};
use soundscape_core::config::EngineConfig;
use soundscape_core::controller::{EngineController, EngineState};
use soundscape_core::dsp::filter::FilterSpec;
use soundscape_core::dsp::noise::{NoiseColor, NoiseGenerator, lag1_autocorrelation};
use soundscape_core::error::{AssetError, SoundscapeError};
use soundscape_core::notify::{NoticeLevel, NoticeQueue};
use soundscape_core::recipe::{SoundMode, SourceSpec};
use soundscape_core::store::{KeyValueStore, MemoryStore};

const RATE: f64 = 8000.0;

fn engine_with(assets: MemoryAssets, notices: NoticeQueue) -> EngineController {
    EngineController::new(
        EngineConfig::default(),
        Box::new(assets),
        Some(AudioBackend::new(RATE)),
        Box::new(MemoryStore::new()),
        Box::new(notices),
    )
    .unwrap()
}

fn engine() -> EngineController {
    engine_with(MemoryAssets::new(), NoticeQueue::new())
}

fn wav(frames: usize) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut w = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            w.write_sample(((i as f64 * 0.1).sin() * 8000.0) as i16).unwrap();
        }
        w.finalize().unwrap();
    }
    cursor.into_inner()
}

fn render_seconds(c: &mut EngineController, seconds: f64) {
    let mut block = [0.0_f32; 128];
    for _ in 0..(seconds * RATE / 128.0) as usize {
        c.render(&mut block);
    }
}

#[test]
fn start_then_stop_leaves_nothing_alive() {
    for mode in SoundMode::ALL {
        let mut c = engine();
        c.start(mode);
        assert!(c.live_resources() > 0, "{mode} started nothing");
        render_seconds(&mut c, 2.0);
        c.stop();
        assert_eq!(c.live_resources(), 0, "{mode} leaked after stop");
    }
}

#[test]
fn double_start_is_one_start() {
    let mut c = engine();
    let first = c.start(SoundMode::Rain);
    let live = c.live_resources();
    let second = c.start(SoundMode::Rain);
    assert_eq!(first, second);
    assert_eq!(c.live_resources(), live);
}

#[test]
fn switching_modes_never_overlaps() {
    let assets = MemoryAssets::new();
    assets.insert(SoundMode::Ocean, wav(4000));
    let mut c = engine_with(assets, NoticeQueue::new());

    c.start(SoundMode::LoFi);
    assert_eq!(c.active_path(), Some(PathKind::Synthesized));
    c.select_mode(SoundMode::Ocean);
    // only the streamed player is alive
    assert_eq!(c.active_path(), Some(PathKind::Streamed));
    assert_eq!(c.live_resources(), 1);

    c.select_mode(SoundMode::Forest);
    assert_eq!(c.active_path(), Some(PathKind::Synthesized));
    assert_eq!(c.arbiter().active_mode(), Some(SoundMode::Forest));
}

#[test]
fn volume_round_trips_and_rejects_out_of_range() {
    let mut c = engine();
    for v in [0.0, 0.25, 0.5, 0.999, 1.0] {
        assert_eq!(c.set_volume(v).unwrap().master_volume, v);
    }
    let before = c.state();
    for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
        assert!(matches!(c.set_volume(bad), Err(SoundscapeError::InvalidVolume(_))));
        assert_eq!(c.state(), before);
    }
}

#[test]
fn unmute_restores_exact_level() {
    let mut c = engine();
    c.set_volume(0.3).unwrap();
    c.start(SoundMode::Drone);
    let muted = c.set_muted(true);
    assert!(muted.is_muted);
    assert_eq!(muted.master_volume, 0.3);
    assert_eq!(c.arbiter().gain().effective(), 0.0);

    let mut block = [1.0_f32; 128];
    c.render(&mut block);
    assert!(block.iter().all(|&s| s == 0.0));

    c.set_muted(false);
    assert_eq!(c.arbiter().gain().effective(), 0.3);
}

#[test]
fn pink_noise_is_more_correlated_than_white() {
    let mut pink = NoiseGenerator::new(NoiseColor::Pink, 42);
    let mut white = NoiseGenerator::new(NoiseColor::White, 42);
    let mut p = vec![0.0; 20_000];
    let mut w = vec![0.0; 20_000];
    pink.fill(&mut p);
    white.fill(&mut w);
    assert!(lag1_autocorrelation(&p) > lag1_autocorrelation(&w));
}

#[test]
fn rain_falls_back_to_synthesis_with_drops() {
    let assets = MemoryAssets::new();
    assets.mark_unavailable(SoundMode::Rain, AssetError::Fetch("network down".into()));
    let notices = NoticeQueue::new();
    let mut c = engine_with(assets, notices.clone());

    let state = c.start(SoundMode::Rain);
    assert!(state.is_playing);
    assert_eq!(c.active_path(), Some(PathKind::Synthesized));

    let graph = c.arbiter().graph().unwrap();
    assert_eq!(
        graph.sources(),
        vec![SourceSpec::Noise {
            color: NoiseColor::Pink
        }]
    );
    assert_eq!(
        graph.filters(),
        vec![FilterSpec::lowpass(4500.0), FilterSpec::highpass(400.0)]
    );

    render_seconds(&mut c, 120.0);
    let sched = c.arbiter().graph().and_then(|g| g.scheduler()).unwrap();
    let mean = sched.mean_interval().unwrap();
    assert!((mean - 1.2).abs() < 0.06, "mean drop interval {mean}");

    let taken = notices.take();
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].level, NoticeLevel::Info);
}

#[test]
fn stop_when_idle_is_a_no_op() {
    let notices = NoticeQueue::new();
    let mut c = engine_with(MemoryAssets::new(), notices.clone());
    let before = c.state();
    let after = c.stop();
    assert_eq!(before, after);
    assert_eq!(c.stop(), before);
    assert!(notices.is_empty());
}

#[test]
fn missing_backend_never_claims_to_play() {
    let notices = NoticeQueue::new();
    let mut c = EngineController::new(
        EngineConfig::default(),
        Box::new(NoAssets),
        None,
        Box::new(MemoryStore::new()),
        Box::new(notices.clone()),
    )
    .unwrap();
    let state = c.toggle_play();
    assert_eq!(
        state,
        EngineState {
            current_mode: SoundMode::Rain,
            is_playing: false,
            master_volume: 0.5,
            is_muted: false,
        }
    );
    assert_eq!(c.live_resources(), 0);
    assert_eq!(notices.take()[0].level, NoticeLevel::Warning);
}

#[test]
fn selection_survives_restart() {
    let store = MemoryStore::new();
    {
        let mut c = EngineController::new(
            EngineConfig::default(),
            Box::new(NoAssets),
            Some(AudioBackend::new(RATE)),
            Box::new(store.clone()),
            Box::new(NoticeQueue::new()),
        )
        .unwrap();
        c.select_mode(SoundMode::Forest);
    }
    assert_eq!(store.get("bloom_calm_sound").as_deref(), Some("forest"));

    let c = EngineController::new(
        EngineConfig::default(),
        Box::new(NoAssets),
        Some(AudioBackend::new(RATE)),
        Box::new(store),
        Box::new(NoticeQueue::new()),
    )
    .unwrap();
    assert_eq!(c.state().current_mode, SoundMode::Forest);
}
