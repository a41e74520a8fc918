//! Engine configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SoundscapeError};
use crate::recipe::SoundMode;

/// Tunables for one [`EngineController`](crate::controller::EngineController).
///
/// Every field has a default, so a host can pass `{}` or only the keys it
/// cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Length of the looped noise buffers.
    pub noise_loop_seconds: f64,
    /// Master volume before the user touches the slider.
    pub default_volume: f64,
    /// Mode used when nothing (or something unrecognised) was persisted.
    pub default_mode: SoundMode,
    /// Skip the recorded asset and always synthesize.
    pub prefer_synthesis: bool,
    /// Key the last selected mode is persisted under.
    pub storage_key: String,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            sample_rate: 44100,
            noise_loop_seconds: 2.0,
            default_volume: 0.5,
            default_mode: SoundMode::Rain,
            prefer_synthesis: false,
            storage_key: "bloom_calm_sound".to_string(),
            seed: 0x5EED,
        }
    }
}

impl EngineConfig {
    pub fn from_json(src: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(src)
            .map_err(|e| SoundscapeError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(SoundscapeError::InvalidConfig(msg));
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return fail(format!("sample_rate {} outside 8000..=192000", self.sample_rate));
        }
        if !(self.noise_loop_seconds.is_finite()
            && (0.1..=60.0).contains(&self.noise_loop_seconds))
        {
            return fail(format!(
                "noise_loop_seconds {} outside 0.1..=60",
                self.noise_loop_seconds
            ));
        }
        if !(0.0..=1.0).contains(&self.default_volume) {
            return fail(format!("default_volume {} outside 0..=1", self.default_volume));
        }
        if self.storage_key.trim().is_empty() {
            return fail("storage_key must not be empty".to_string());
        }
        Ok(())
    }
}
