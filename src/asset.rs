//! Recorded assets: where the bytes for a mode come from, and decoding them
//! into a [`SampleBuffer`].
//!
//! Any failure along the way (missing, fetch, decode, codec, host rejection)
//! is an [`AssetError`]; the arbiter treats them all as "unavailable".

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, RwLock};

use crate::dsp::sampler::SampleBuffer;
use crate::error::AssetError;
use crate::recipe::SoundMode;

#[cfg(feature = "native")]
mod remote;
#[cfg(feature = "native")]
pub use remote::{DirectoryAssets, RemoteAssets, cache_file_name};

/// Supplies the encoded bytes of a mode's recorded asset.
pub trait AssetSource {
    fn fetch(&self, mode: SoundMode) -> Result<Arc<[u8]>, AssetError>;
}

/// A source with nothing in it; every mode synthesizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAssets;

impl AssetSource for NoAssets {
    fn fetch(&self, mode: SoundMode) -> Result<Arc<[u8]>, AssetError> {
        Err(AssetError::Missing(mode))
    }
}

type Entry = Result<Arc<[u8]>, AssetError>;

/// In-memory assets, shared between clones.
///
/// Hosts that fetch audio themselves hand the bytes over with
/// [`insert`](Self::insert), or record a failure with
/// [`mark_unavailable`](Self::mark_unavailable).
#[derive(Debug, Clone, Default)]
pub struct MemoryAssets {
    entries: Arc<RwLock<HashMap<SoundMode, Entry>>>,
}

impl MemoryAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, mode: SoundMode, bytes: impl Into<Arc<[u8]>>) {
        self.put(mode, Ok(bytes.into()));
    }

    /// Store mono PCM the host already decoded, such as the output of the
    /// browser's `decodeAudioData` for an MP3 this build cannot decode.
    pub fn insert_pcm(
        &self,
        mode: SoundMode,
        samples: &[f32],
        sample_rate: u32,
    ) -> Result<(), AssetError> {
        let bytes = encode_pcm(samples, sample_rate)?;
        self.insert(mode, bytes);
        Ok(())
    }

    /// Remember that `mode` cannot be played, e.g. after the host's
    /// playback policy refused it.
    pub fn mark_unavailable(&self, mode: SoundMode, err: AssetError) {
        self.put(mode, Err(err));
    }

    pub fn remove(&self, mode: SoundMode) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&mode);
        }
    }

    pub fn contains(&self, mode: SoundMode) -> bool {
        self.entries
            .read()
            .map(|e| matches!(e.get(&mode), Some(Ok(_))))
            .unwrap_or(false)
    }

    fn put(&self, mode: SoundMode, entry: Entry) {
        match self.entries.write() {
            Ok(mut entries) => {
                entries.insert(mode, entry);
            }
            Err(_) => log::warn!("asset cache lock poisoned; dropping {mode}"),
        }
    }
}

impl AssetSource for MemoryAssets {
    fn fetch(&self, mode: SoundMode) -> Result<Arc<[u8]>, AssetError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| AssetError::Fetch("asset cache lock poisoned".into()))?;
        match entries.get(&mode) {
            Some(entry) => entry.clone(),
            None => Err(AssetError::Missing(mode)),
        }
    }
}

impl<T: AssetSource + ?Sized> AssetSource for Box<T> {
    fn fetch(&self, mode: SoundMode) -> Result<Arc<[u8]>, AssetError> {
        (**self).fetch(mode)
    }
}

// ── Decoding ────────────────────────────────────────────────

/// Fetch and decode the asset for `mode`.
pub fn load(source: &dyn AssetSource, mode: SoundMode) -> Result<SampleBuffer, AssetError> {
    let bytes = source.fetch(mode)?;
    decode(&bytes)
}

/// Decode WAV (always) or MP3 (`native` builds) into a mono buffer.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer, AssetError> {
    let buffer = if bytes.starts_with(b"RIFF") {
        decode_wav(bytes)?
    } else if looks_like_mp3(bytes) {
        decode_mp3(bytes)?
    } else {
        return Err(AssetError::UnsupportedCodec);
    };
    if buffer.is_empty() || buffer.sample_rate == 0 {
        return Err(AssetError::Decode("asset contains no audio".into()));
    }
    Ok(buffer)
}

fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, AssetError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();
    let samples: Vec<f64> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let full_scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f64 / full_scale))
                .collect::<Result<_, _>>()?
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()?,
    };
    Ok(SampleBuffer::from_interleaved(
        &samples,
        spec.channels as usize,
        spec.sample_rate,
    ))
}

/// Wrap mono float PCM as a WAV so it loads like any fetched asset.
pub fn encode_pcm(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, AssetError> {
    if samples.is_empty() || sample_rate == 0 {
        return Err(AssetError::Decode("asset contains no audio".into()));
    }
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(s)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// ID3 tag or an MPEG frame sync.
fn looks_like_mp3(bytes: &[u8]) -> bool {
    bytes.starts_with(b"ID3") || (bytes.len() > 1 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0)
}

#[cfg(feature = "native")]
fn decode_mp3(bytes: &[u8]) -> Result<SampleBuffer, AssetError> {
    let mut decoder = minimp3::Decoder::new(bytes);
    let mut samples = Vec::new();
    let mut sample_rate = 0;
    let mut channels = 1;
    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = frame.sample_rate as u32;
                channels = frame.channels.max(1);
                samples.extend(frame.data.iter().map(|&s| s as f64 / 32768.0));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(AssetError::Decode(format!("{e:?}"))),
        }
    }
    Ok(SampleBuffer::from_interleaved(&samples, channels, sample_rate))
}

#[cfg(not(feature = "native"))]
fn decode_mp3(_bytes: &[u8]) -> Result<SampleBuffer, AssetError> {
    Err(AssetError::UnsupportedCodec)
}
