//! Audio subsystem - spatialization and buffer-based mixing
//!
//! Audible nodes own an [`pipe::AudioPipe`]: the render thread pumps decoded
//! PCM into it and updates per-channel gains, while the mixer pulls from the
//! other end on the audio thread. The [`mixer::AudioMixer`] resamples, maps
//! channels and accumulates all registered pipes into one interleaved output
//! stream; [`renderer::AudioRenderer`] wraps the mixer with master volume/pan
//! and an audio clock. [`spatial::Spatializer`] computes the per-source
//! distance gain and stereo pan fed into the pipes.

pub mod mixer;
pub mod pipe;
pub mod renderer;
pub mod spatial;

use serde::{Deserialize, Serialize};

/// Most output channels the mixer will ever produce
pub const MAX_CHANNELS: usize = 24;

/// PCM sample encodings understood by the mixer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleFormat {
    /// Unsigned 8-bit
    U8,
    /// Signed 16-bit little-endian
    S16,
    /// Signed 24-bit little-endian, packed
    S24,
    /// Signed 32-bit little-endian
    S32,
}

impl SampleFormat {
    /// Size of one sample in bytes
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S24 => 3,
            SampleFormat::S32 => 4,
        }
    }
}

/// Fixed PCM stream format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second
    pub sample_rate: u32,
    /// Interleaved channel count
    pub channels: u8,
    /// Sample encoding
    pub format: SampleFormat,
}

impl AudioFormat {
    /// Create a new format descriptor
    pub fn new(sample_rate: u32, channels: u8, format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            format,
        }
    }

    /// Bytes in one interleaved frame (one sample per channel)
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.channels) * self.format.bytes_per_sample()
    }

    /// Whole frames contained in a byte count
    pub fn bytes_to_frames(&self, bytes: usize) -> usize {
        let fb = self.frame_bytes();
        if fb == 0 {
            0
        } else {
            bytes / fb
        }
    }

    /// Byte count of a frame count
    pub fn frames_to_bytes(&self, frames: usize) -> usize {
        frames * self.frame_bytes()
    }

    /// Duration in seconds of a byte count
    pub fn bytes_to_seconds(&self, bytes: usize) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.bytes_to_frames(bytes) as f64 / f64::from(self.sample_rate)
        }
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(44_100, 2, SampleFormat::S16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bytes() {
        let fmt = AudioFormat::new(48_000, 2, SampleFormat::S16);
        assert_eq!(fmt.frame_bytes(), 4);
        assert_eq!(fmt.bytes_to_frames(17), 4);
        assert_eq!(fmt.frames_to_bytes(3), 12);
    }

    #[test]
    fn test_format_depth_ordering() {
        assert!(SampleFormat::U8 < SampleFormat::S16);
        assert!(SampleFormat::S16 < SampleFormat::S24);
        assert!(SampleFormat::S24 < SampleFormat::S32);
    }

    #[test]
    fn test_bytes_to_seconds() {
        let fmt = AudioFormat::new(44_100, 1, SampleFormat::S16);
        let secs = fmt.bytes_to_seconds(44_100 * 2);
        assert!((secs - 1.0).abs() < 1e-9);
    }
}
