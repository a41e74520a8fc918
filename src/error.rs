use thiserror::Error;

use crate::recipe::SoundMode;

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, SoundscapeError>;

/// Errors surfaced by the engine's public operations.
///
/// None of these are fatal to the hosting page: asset failures are handled
/// inside the arbiter, and everything else is a rejected request that leaves
/// the prior state untouched.
#[derive(Debug, Error)]
pub enum SoundscapeError {
    #[error("volume must be within [0, 1], got {0}")]
    InvalidVolume(f64),

    #[error("unknown sound mode '{0}'")]
    UnknownMode(String),

    #[error("no audio backend is available")]
    SynthesisUnavailable,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error(transparent)]
    Recipe(#[from] RecipeError),
}

/// Why a recorded asset could not be played.
///
/// The arbiter treats every variant the same way ("unavailable", fall back to
/// synthesis); the variants exist for logging.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssetError {
    #[error("no recorded asset for {0}")]
    Missing(SoundMode),

    #[error("failed to fetch asset: {0}")]
    Fetch(String),

    #[error("failed to decode asset: {0}")]
    Decode(String),

    #[error("unsupported audio codec")]
    UnsupportedCodec,

    #[error("playback was rejected by the host")]
    Rejected,
}

/// Errors from loading or validating a recipe table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecipeError {
    #[error("recipe JSON parse error at line {line}, column {column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
        /// Byte offset into the source, derived from line/column.
        offset: usize,
    },

    #[error("invalid recipe for {mode}: {reason}")]
    Invalid { mode: SoundMode, reason: String },
}

impl From<hound::Error> for AssetError {
    fn from(e: hound::Error) -> Self {
        AssetError::Decode(e.to_string())
    }
}

/// Failure to read or write the persisted key-value store.
///
/// Persistence is best-effort: the controller logs these and carries on.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("settings store is unavailable")]
    Unavailable,
}
