//! Shared PCM pipe between a scene node and the mixer
//!
//! One pipe per audible node. The render thread is the producer: it pushes
//! decoded samples, sets gains/speed/mute and finally end-of-stream. The audio
//! thread consumes through the fetch/release pair during a mix. The two sides
//! share nothing else, so a plain mutex around the state is enough; neither
//! side ever holds it across a blocking call.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::audio::{AudioFormat, MAX_CHANNELS};

/// Per-output-channel gain vector with an identity shortcut
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelGains {
    /// Linear gain per output channel
    pub gains: [f32; MAX_CHANNELS],
    /// True when every gain is exactly 1.0, letting the mixer skip the
    /// per-sample multiply on its pass-through path
    pub identity: bool,
}

impl Default for ChannelGains {
    fn default() -> Self {
        Self {
            gains: [1.0; MAX_CHANNELS],
            identity: true,
        }
    }
}

impl ChannelGains {
    /// Build from a slice, flat 1.0 beyond its length
    pub fn from_slice(gains: &[f32]) -> Self {
        let mut out = Self::default();
        for (dst, src) in out.gains.iter_mut().zip(gains) {
            *dst = *src;
        }
        out.identity = out.gains.iter().all(|g| (*g - 1.0).abs() < 1e-6);
        out
    }

    /// Uniform gain on every channel
    pub fn splat(gain: f32) -> Self {
        let mut out = Self {
            gains: [gain; MAX_CHANNELS],
            identity: false,
        };
        out.identity = (gain - 1.0).abs() < 1e-6;
        out
    }
}

#[derive(Debug)]
struct PipeState {
    format: AudioFormat,
    buf: VecDeque<u8>,
    eos: bool,
    gains: ChannelGains,
    muted: bool,
    speed: f64,
    total_pushed: u64,
}

/// Producer/consumer handle over one node's PCM stream
///
/// Clones share the same state; the node keeps one end, the mixer the other.
#[derive(Debug, Clone)]
pub struct AudioPipe {
    state: Arc<Mutex<PipeState>>,
}

impl AudioPipe {
    /// Create an empty pipe with the given stream format
    pub fn new(format: AudioFormat) -> Self {
        Self {
            state: Arc::new(Mutex::new(PipeState {
                format,
                buf: VecDeque::new(),
                eos: false,
                gains: ChannelGains::default(),
                muted: false,
                speed: 1.0,
                total_pushed: 0,
            })),
        }
    }

    /// Current stream format
    pub fn format(&self) -> AudioFormat {
        self.state.lock().unwrap().format
    }

    /// Change the stream format; drops buffered data from the old format
    pub fn set_format(&self, format: AudioFormat) {
        let mut st = self.state.lock().unwrap();
        if st.format != format {
            st.format = format;
            st.buf.clear();
        }
    }

    /// Append samples; returns the byte count accepted (always all of it)
    pub fn push(&self, data: &[u8]) -> usize {
        let mut st = self.state.lock().unwrap();
        st.buf.extend(data);
        st.total_pushed += data.len() as u64;
        data.len()
    }

    /// Bytes currently buffered
    pub fn buffered_bytes(&self) -> usize {
        self.state.lock().unwrap().buf.len()
    }

    /// Seconds of audio currently buffered
    pub fn buffered_seconds(&self) -> f64 {
        let st = self.state.lock().unwrap();
        st.format.bytes_to_seconds(st.buf.len())
    }

    /// Total bytes ever pushed (producer progress)
    pub fn total_pushed(&self) -> u64 {
        self.state.lock().unwrap().total_pushed
    }

    /// Mark that no more data will be pushed
    pub fn set_eos(&self, eos: bool) {
        self.state.lock().unwrap().eos = eos;
    }

    /// True when the producer declared end-of-stream
    pub fn is_eos(&self) -> bool {
        self.state.lock().unwrap().eos
    }

    /// Drop all buffered samples (explicit flush on stop)
    pub fn clear(&self) {
        self.state.lock().unwrap().buf.clear();
    }

    /// Update the per-channel gains
    pub fn set_gains(&self, gains: ChannelGains) {
        self.state.lock().unwrap().gains = gains;
    }

    /// Current per-channel gains
    pub fn gains(&self) -> ChannelGains {
        self.state.lock().unwrap().gains
    }

    /// Mute or unmute (muted sources keep consuming to stay in sync)
    pub fn set_muted(&self, muted: bool) {
        self.state.lock().unwrap().muted = muted;
    }

    /// True when muted
    pub fn is_muted(&self) -> bool {
        self.state.lock().unwrap().muted
    }

    /// Set playback speed (resampling ratio multiplier)
    pub fn set_speed(&self, speed: f64) {
        self.state.lock().unwrap().speed = speed;
    }

    /// Current playback speed
    pub fn speed(&self) -> f64 {
        self.state.lock().unwrap().speed
    }

    /// Peek up to `dst.len()` bytes from the front without consuming.
    /// Returns the byte count copied.
    pub fn fetch(&self, dst: &mut [u8]) -> usize {
        let st = self.state.lock().unwrap();
        let n = dst.len().min(st.buf.len());
        for (i, b) in st.buf.iter().take(n).enumerate() {
            dst[i] = *b;
        }
        n
    }

    /// Consume bytes previously observed via [`AudioPipe::fetch`]
    pub fn release(&self, bytes: usize) {
        let mut st = self.state.lock().unwrap();
        let n = bytes.min(st.buf.len());
        st.buf.drain(..n);
    }

    /// True once end-of-stream is set and every buffered byte was consumed
    pub fn is_done(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.eos && st.buf.is_empty()
    }
}
