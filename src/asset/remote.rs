//! Native asset loading: remote URLs with a disk cache, and local folders.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};

use super::{AssetSource, MemoryAssets};
use crate::error::AssetError;
use crate::recipe::SoundMode;

/// Name of the disk-cache file for `url`.
pub fn cache_file_name(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Assets fetched from URLs ahead of playback.
///
/// [`prefetch`](Self::prefetch) runs on the host's async runtime; the
/// arbiter only ever reads what is already in memory, so starting playback
/// never waits on the network. Modes that have not been prefetched are
/// `Missing` and synthesize.
#[derive(Debug, Clone)]
pub struct RemoteAssets {
    client: reqwest::Client,
    urls: HashMap<SoundMode, String>,
    cache: MemoryAssets,
    cache_dir: Option<PathBuf>,
}

impl RemoteAssets {
    /// Every mode's asset file under `base_url`.
    pub fn new(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        let urls = SoundMode::ALL
            .iter()
            .map(|&m| (m, format!("{base}/{}", m.asset_file())))
            .collect();
        Self::with_urls(urls)
    }

    pub fn with_urls(urls: HashMap<SoundMode, String>) -> Self {
        RemoteAssets {
            client: reqwest::Client::new(),
            urls,
            cache: MemoryAssets::new(),
            cache_dir: None,
        }
    }

    /// Persist downloads under `dir`, named by [`cache_file_name`].
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    /// The platform cache directory for this crate, if there is one.
    pub fn default_cache_dir() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "soundscape")
            .map(|dirs| dirs.cache_dir().join("assets"))
    }

    pub fn url(&self, mode: SoundMode) -> Option<&str> {
        self.urls.get(&mode).map(String::as_str)
    }

    /// The in-memory cache the arbiter reads from.
    pub fn cache(&self) -> &MemoryAssets {
        &self.cache
    }

    /// Load `mode`'s asset into memory. A failure is remembered so the
    /// arbiter falls back without retrying.
    pub async fn prefetch(&self, mode: SoundMode) -> Result<(), AssetError> {
        let url = self.url(mode).ok_or(AssetError::Missing(mode))?;
        match self.load(url).await {
            Ok(bytes) => {
                log::debug!("prefetched {mode} ({} bytes)", bytes.len());
                self.cache.insert(mode, bytes);
                Ok(())
            }
            Err(e) => {
                log::warn!("could not prefetch {mode} from {url}: {e}");
                self.cache.mark_unavailable(mode, e.clone());
                Err(e)
            }
        }
    }

    /// Prefetch every mode with a URL; returns the failures.
    pub async fn prefetch_all(&self) -> Vec<(SoundMode, AssetError)> {
        let mut failed = Vec::new();
        for mode in SoundMode::ALL {
            if self.urls.contains_key(&mode) {
                if let Err(e) = self.prefetch(mode).await {
                    failed.push((mode, e));
                }
            }
        }
        failed
    }

    async fn load(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        if let Some(rest) = url.strip_prefix("data:") {
            return decode_data_url(rest);
        }

        let cached = self.cache_dir.as_ref().map(|d| d.join(cache_file_name(url)));
        if let Some(path) = &cached {
            if let Ok(bytes) = tokio::fs::read(path).await {
                log::debug!("asset cache hit {}", path.display());
                return Ok(bytes);
            }
        }

        let bytes = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| AssetError::Fetch(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| AssetError::Fetch(e.to_string()))?
            .to_vec();

        if let Some(path) = &cached {
            if let Err(e) = write_cache(path, &bytes).await {
                log::warn!("could not write asset cache {}: {e}", path.display());
            }
        }
        Ok(bytes)
    }
}

impl AssetSource for RemoteAssets {
    fn fetch(&self, mode: SoundMode) -> Result<Arc<[u8]>, AssetError> {
        self.cache.fetch(mode)
    }
}

async fn write_cache(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, bytes).await
}

/// Payload of a `data:` URL (everything after the scheme).
fn decode_data_url(rest: &str) -> Result<Vec<u8>, AssetError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| AssetError::Fetch("malformed data URL".into()))?;
    if meta.ends_with(";base64") {
        STANDARD
            .decode(payload.trim())
            .map_err(|e| AssetError::Fetch(format!("bad base64 in data URL: {e}")))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

/// Assets read from files in a local folder, named by
/// [`SoundMode::asset_file`]. A `.wav` next to the expected file is used
/// when the `.mp3` is absent.
#[derive(Debug, Clone)]
pub struct DirectoryAssets {
    root: PathBuf,
}

impl DirectoryAssets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryAssets { root: root.into() }
    }

    fn candidates(&self, mode: SoundMode) -> [PathBuf; 2] {
        let file = self.root.join(mode.asset_file());
        let wav = file.with_extension("wav");
        [file, wav]
    }
}

impl AssetSource for DirectoryAssets {
    fn fetch(&self, mode: SoundMode) -> Result<Arc<[u8]>, AssetError> {
        for path in self.candidates(mode) {
            match std::fs::read(&path) {
                Ok(bytes) => return Ok(bytes.into()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(AssetError::Fetch(format!("{}: {e}", path.display()))),
            }
        }
        Err(AssetError::Missing(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_urls_decode() {
        assert_eq!(decode_data_url("text/plain,abc").unwrap(), b"abc");
        let encoded = STANDARD.encode([1u8, 2, 3]);
        assert_eq!(
            decode_data_url(&format!("audio/wav;base64,{encoded}")).unwrap(),
            vec![1, 2, 3]
        );
        assert!(decode_data_url("no-comma").is_err());
        assert!(decode_data_url("audio/wav;base64,@@@").is_err());
    }

    #[test]
    fn cache_names_are_stable_hex() {
        let a = cache_file_name("https://example.com/rain.mp3");
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, cache_file_name("https://example.com/rain.mp3"));
        assert_ne!(a, cache_file_name("https://example.com/ocean.mp3"));
    }

    #[test]
    fn base_url_maps_every_mode() {
        let assets = RemoteAssets::new("https://cdn.example.com/sounds/");
        assert_eq!(
            assets.url(SoundMode::Drone),
            Some("https://cdn.example.com/sounds/piano.mp3")
        );
        assert_eq!(assets.fetch(SoundMode::Rain).unwrap_err(), AssetError::Missing(SoundMode::Rain));
    }

    #[test]
    fn directory_assets_fall_back_to_wav() {
        let dir = std::env::temp_dir().join(format!("soundscape-assets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("ocean.wav"), b"RIFF").unwrap();

        let assets = DirectoryAssets::new(&dir);
        assert_eq!(&*assets.fetch(SoundMode::Ocean).unwrap(), b"RIFF");
        assert_eq!(assets.fetch(SoundMode::Rain).unwrap_err(), AssetError::Missing(SoundMode::Rain));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
