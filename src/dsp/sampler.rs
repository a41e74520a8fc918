//! Looped playback of a decoded recording.
//!
//! Plays a mono buffer at the output rate via linear interpolation
//! resampling, wrapping at the end so the bed is continuous.

/// A decoded mono recording held in memory.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    /// Mono f64 samples.
    pub data: Vec<f64>,
    /// Native sample rate of the audio.
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f64>, sample_rate: u32) -> Self {
        SampleBuffer { data, sample_rate }
    }

    /// Down-mix interleaved frames of `channels` channels to mono.
    pub fn from_interleaved(samples: &[f64], channels: usize, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let data = samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
            .collect();
        SampleBuffer { data, sample_rate }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in seconds at the native rate.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }

    /// Read with linear interpolation, treating the buffer as a loop.
    pub fn read_looped(&self, position: f64) -> f64 {
        let len = self.data.len();
        if len == 0 {
            return 0.0;
        }
        let idx = position as usize % len;
        let next = (idx + 1) % len;
        let frac = position.fract();
        self.data[idx] * (1.0 - frac) + self.data[next] * frac
    }
}

/// A playing, looping cursor over a [`SampleBuffer`].
#[derive(Debug, Clone)]
pub struct LoopPlayer {
    buffer: SampleBuffer,
    position: f64,
    /// Native rate / output rate.
    step: f64,
}

impl LoopPlayer {
    pub fn new(buffer: SampleBuffer, output_rate: f64) -> Self {
        let step = if output_rate > 0.0 {
            buffer.sample_rate as f64 / output_rate
        } else {
            1.0
        };
        LoopPlayer {
            buffer,
            position: 0.0,
            step,
        }
    }

    pub fn next_sample(&mut self) -> f64 {
        let s = self.buffer.read_looped(self.position);
        self.position += self.step;
        let len = self.buffer.len() as f64;
        if len > 0.0 && self.position >= len {
            self.position %= len;
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let buf = SampleBuffer::from_interleaved(&[1.0, 0.0, 0.5, 0.5], 2, 8000);
        assert_eq!(buf.data, vec![0.5, 0.5]);
        assert_eq!(buf.duration(), 2.0 / 8000.0);
    }

    #[test]
    fn loops_at_native_rate() {
        let buf = SampleBuffer::new(vec![0.0, 0.25, 0.5, 0.75], 4);
        let mut p = LoopPlayer::new(buf, 4.0);
        let out: Vec<f64> = (0..8).map(|_| p.next_sample()).collect();
        assert_eq!(out, vec![0.0, 0.25, 0.5, 0.75, 0.0, 0.25, 0.5, 0.75]);
    }

    #[test]
    fn upsamples_with_interpolation() {
        let buf = SampleBuffer::new(vec![0.0, 1.0], 1);
        let mut p = LoopPlayer::new(buf, 2.0);
        let out: Vec<f64> = (0..4).map(|_| p.next_sample()).collect();
        // wraps from the last sample back toward the first
        assert_eq!(out, vec![0.0, 0.5, 1.0, 0.5]);
    }

    #[test]
    fn downsampling_tiny_buffer_stays_in_range() {
        let buf = SampleBuffer::new(vec![0.0, 0.5, 1.0], 192_000);
        let mut p = LoopPlayer::new(buf, 8000.0);
        for _ in 0..10_000 {
            let s = p.next_sample();
            assert!((0.0..=1.0).contains(&s), "sample {s}");
            assert!(p.position < 3.0, "position {} escaped the loop", p.position);
        }
    }

    #[test]
    fn empty_buffer_is_silent() {
        let mut p = LoopPlayer::new(SampleBuffer::new(vec![], 44100), 44100.0);
        assert_eq!(p.next_sample(), 0.0);
    }
}
