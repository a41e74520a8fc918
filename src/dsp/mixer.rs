//! Mixer: sums sources into a block with the shared master gain.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Master volume and mute, shared between the controller and whichever
/// playback path is live.
///
/// Volume and mute are independent scalars; each is last-writer-wins.
/// Muting never touches the stored volume.
#[derive(Debug, Clone)]
pub struct GainControl {
    inner: Arc<GainState>,
}

#[derive(Debug)]
struct GainState {
    volume_bits: AtomicU64,
    muted: AtomicBool,
}

impl GainControl {
    pub fn new(volume: f64) -> Self {
        GainControl {
            inner: Arc::new(GainState {
                volume_bits: AtomicU64::new(volume.to_bits()),
                muted: AtomicBool::new(false),
            }),
        }
    }

    pub fn volume(&self) -> f64 {
        f64::from_bits(self.inner.volume_bits.load(Ordering::Acquire))
    }

    pub fn set_volume(&self, volume: f64) {
        self.inner
            .volume_bits
            .store(volume.to_bits(), Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.inner.muted.load(Ordering::Acquire)
    }

    pub fn set_muted(&self, muted: bool) {
        self.inner.muted.store(muted, Ordering::Release);
    }

    /// The level actually applied to output.
    pub fn effective(&self) -> f64 {
        if self.is_muted() { 0.0 } else { self.volume() }
    }
}

/// A simple summing mixer that accumulates audio from multiple sources.
#[derive(Debug, Clone)]
pub struct Mixer {
    pub master: GainControl,
    buffer: Vec<f64>,
}

impl Mixer {
    pub fn new(master: GainControl) -> Self {
        Mixer {
            master,
            buffer: Vec::new(),
        }
    }

    /// Prepare a buffer of `num_samples` filled with zeros.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
    }

    /// Add a sample at the given index.
    pub fn add(&mut self, index: usize, sample: f64) {
        if index < self.buffer.len() {
            self.buffer[index] += sample;
        }
    }

    /// Write the mixed block into `out` with master gain and soft clipping.
    ///
    /// The gain is read once per block, so volume and mute changes land on
    /// the next block boundary.
    pub fn write_to(&self, out: &mut [f32]) {
        let gain = self.master.effective();
        for (o, &s) in out.iter_mut().zip(&self.buffer) {
            *o = soft_clip(s * gain) as f32;
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Soft clipper using tanh to prevent harsh digital clipping.
fn soft_clip(x: f64) -> f64 {
    x.tanh()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer() {
        let mut m = Mixer::new(GainControl::new(1.0));
        m.clear(128);
        let mut out = vec![1.0_f32; 128];
        m.write_to(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn accumulates_samples() {
        let mut m = Mixer::new(GainControl::new(1.0));
        m.clear(4);
        m.add(0, 0.5);
        m.add(0, 0.3);
        m.add(1, 1.0);
        m.add(9, 1.0);
        let mut out = vec![0.0_f32; 4];
        m.write_to(&mut out);
        assert!((out[0] - soft_clip(0.8) as f32).abs() < 1e-6);
        assert!((out[1] - soft_clip(1.0) as f32).abs() < 1e-6);
        assert_eq!(out[2], 0.0);
    }

    #[test]
    fn mute_silences_without_touching_volume() {
        let gain = GainControl::new(0.37);
        let mut m = Mixer::new(gain.clone());
        m.clear(1);
        m.add(0, 0.5);

        gain.set_muted(true);
        let mut out = [1.0_f32];
        m.write_to(&mut out);
        assert_eq!(out[0], 0.0);
        assert_eq!(gain.volume(), 0.37);

        gain.set_muted(false);
        assert_eq!(gain.effective(), 0.37);
    }

    #[test]
    fn soft_clip_prevents_overflow() {
        let mut m = Mixer::new(GainControl::new(1.0));
        m.clear(1);
        m.add(0, 100.0);
        let mut out = [0.0_f32];
        m.write_to(&mut out);
        assert!(out[0].abs() <= 1.0, "Soft clip should keep output <= 1.0, got {}", out[0]);
    }
}
