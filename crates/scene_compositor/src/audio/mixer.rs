//! Multi-source PCM mixer
//!
//! Pulls every registered pipe through a linear-interpolation resampler
//! (8.8 fixed-point position with a one-frame carry across mix windows), maps
//! channels, applies per-channel source gains plus master gains, accumulates
//! in 32-bit at 16-bit scale and clamps into the output format. A single
//! source matching the output format exactly bypasses all of that with a
//! straight copy.
//!
//! Sources stay registered while their node is merely inactive so buffering
//! can run ahead; a source only disappears when explicitly removed. The output
//! format follows the widest input (max rate/channels/depth) unless pinned.

use slotmap::{new_key_type, SlotMap};

use crate::audio::pipe::AudioPipe;
use crate::audio::{AudioFormat, SampleFormat, MAX_CHANNELS};

new_key_type! {
    /// Key identifying one registered mixer source
    pub struct SourceKey;
}

/// Fixed-point resolution of the resampler position
const FRAC_ONE: u32 = 256;

/// Ceiling on input frames fetched per source per mix window
const MAX_FETCH_FRAMES: usize = 1 << 20;

#[derive(Debug)]
struct MixerSource {
    pipe: AudioPipe,
    /// Format observed at the last mix, to detect mid-stream changes
    fmt: AudioFormat,
    /// Carry: the input frame preceding the current read position
    last: [i32; MAX_CHANNELS],
    has_last: bool,
    /// 8.8 fixed fractional position past `last`
    frac: u32,
}

impl MixerSource {
    fn new(pipe: AudioPipe) -> Self {
        let fmt = pipe.format();
        Self {
            pipe,
            fmt,
            last: [0; MAX_CHANNELS],
            has_last: false,
            frac: 0,
        }
    }

    fn reset_resampler(&mut self) {
        self.has_last = false;
        self.frac = 0;
    }
}

/// Accumulating mixer over zero or more registered pipes
#[derive(Debug)]
pub struct AudioMixer {
    out: AudioFormat,
    forced: bool,
    sources: SlotMap<SourceKey, MixerSource>,
    must_reconfig: bool,
    master: [f32; MAX_CHANNELS],
    acc: Vec<i32>,
    scratch: Vec<u8>,
}

impl AudioMixer {
    /// Create a mixer with the given initial output format
    pub fn new(out: AudioFormat, forced: bool) -> Self {
        Self {
            out,
            forced,
            sources: SlotMap::with_key(),
            must_reconfig: false,
            master: [1.0; MAX_CHANNELS],
            acc: Vec::new(),
            scratch: Vec::new(),
        }
    }

    /// Current output format
    pub fn out_format(&self) -> AudioFormat {
        self.out
    }

    /// Pin or re-seed the output format
    pub fn set_output(&mut self, out: AudioFormat, forced: bool) {
        self.out = out;
        self.forced = forced;
        for src in self.sources.values_mut() {
            src.reset_resampler();
        }
    }

    /// Replace the master per-channel gains (volume/pan already combined)
    pub fn set_master_gains(&mut self, gains: [f32; MAX_CHANNELS]) {
        self.master = gains;
    }

    /// Register a source pipe; the output format re-evaluates before the
    /// next mix
    pub fn add_source(&mut self, pipe: AudioPipe) -> SourceKey {
        self.must_reconfig = true;
        self.sources.insert(MixerSource::new(pipe))
    }

    /// Remove a source; unknown keys are ignored
    pub fn remove_source(&mut self, key: SourceKey) {
        if self.sources.remove(key).is_some() {
            self.must_reconfig = true;
        }
    }

    /// Number of registered sources
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Mix one window into `out`; returns the frame count produced
    /// (the whole buffer, silence-padded on underrun)
    pub fn mix(&mut self, out: &mut [u8]) -> usize {
        self.refresh_formats();
        if self.must_reconfig {
            self.reconfig();
        }

        let out_fmt = self.out;
        let frame_bytes = out_fmt.frame_bytes();
        if frame_bytes == 0 || out.is_empty() {
            return 0;
        }
        let out_frames = out.len() / frame_bytes;
        let out_bytes = out_frames * frame_bytes;

        if self.try_passthrough(&mut out[..out_bytes]) {
            return out_frames;
        }

        let out_ch = usize::from(out_fmt.channels);
        self.acc.clear();
        self.acc.resize(out_frames * out_ch, 0);

        let keys: Vec<SourceKey> = self.sources.keys().collect();
        for key in keys {
            self.mix_source(key, out_frames);
        }

        write_clamped(&self.acc, &mut out[..out_bytes], out_fmt.format);
        out_frames
    }

    /// Detect mid-stream format changes on any pipe
    fn refresh_formats(&mut self) {
        for src in self.sources.values_mut() {
            let fmt = src.pipe.format();
            if fmt != src.fmt {
                src.fmt = fmt;
                src.reset_resampler();
                self.must_reconfig = true;
            }
        }
    }

    /// Re-derive the output format as the widest of all inputs
    fn reconfig(&mut self) {
        self.must_reconfig = false;
        if self.forced || self.sources.is_empty() {
            return;
        }
        let mut rate = 0;
        let mut channels = 0u8;
        let mut format = SampleFormat::U8;
        for src in self.sources.values() {
            rate = rate.max(src.fmt.sample_rate);
            channels = channels.max(src.fmt.channels);
            format = format.max(src.fmt.format);
        }
        let next = AudioFormat::new(rate, channels.min(MAX_CHANNELS as u8), format);
        if next != self.out {
            log::info!(
                "audio mixer reconfigured to {} Hz, {} ch, {:?}",
                next.sample_rate,
                next.channels,
                next.format
            );
            self.out = next;
            for src in self.sources.values_mut() {
                src.reset_resampler();
            }
        }
    }

    /// Single matching source: copy bytes straight through
    fn try_passthrough(&mut self, out: &mut [u8]) -> bool {
        if self.sources.len() != 1 {
            return false;
        }
        if self.master.iter().any(|g| (*g - 1.0).abs() > 1e-6) {
            return false;
        }
        let Some(src) = self.sources.values_mut().next() else {
            return false;
        };
        if src.fmt != self.out
            || src.pipe.is_muted()
            || (src.pipe.speed() - 1.0).abs() > 1e-9
            || !src.pipe.gains().identity
        {
            return false;
        }
        let mut got = src.pipe.fetch(out);
        got -= got % self.out.frame_bytes();
        src.pipe.release(got);
        for b in &mut out[got..] {
            *b = 0;
        }
        true
    }

    /// Resample one source into the accumulator
    fn mix_source(&mut self, key: SourceKey, out_frames: usize) {
        let out_fmt = self.out;
        let out_ch = usize::from(out_fmt.channels);
        let Some(src) = self.sources.get_mut(key) else {
            return;
        };

        let in_fmt = src.fmt;
        let in_ch = usize::from(in_fmt.channels);
        if in_ch == 0 || in_fmt.sample_rate == 0 {
            return;
        }
        let speed = src.pipe.speed();
        if speed <= 0.0 {
            // Paused source: contributes silence, consumes nothing.
            return;
        }
        let step = (f64::from(in_fmt.sample_rate) * f64::from(FRAC_ONE) * speed
            / f64::from(out_fmt.sample_rate)) as u64;
        if step == 0 {
            return;
        }

        let gains = src.pipe.gains();
        let muted = src.pipe.is_muted();
        let mut channel_gain = [0.0f32; MAX_CHANNELS];
        for ch in 0..out_ch {
            channel_gain[ch] = if muted {
                0.0
            } else {
                gains.gains[ch] * self.master[ch]
            };
        }

        // Upper bound of input frames this window can consume.
        let total = u64::from(src.frac) + step * out_frames as u64;
        let mut need = (total >> 8) as usize + 1;
        if !src.has_last {
            need += 1;
        }
        if need > MAX_FETCH_FRAMES {
            log::debug!("audio mixer: clamping oversized fetch ({need} frames)");
            need = MAX_FETCH_FRAMES;
        }
        let in_frame_bytes = in_fmt.frame_bytes();
        self.scratch.resize(need * in_frame_bytes, 0);
        let got_bytes = src.pipe.fetch(&mut self.scratch);
        let got_frames = got_bytes / in_frame_bytes;

        let mut consumed = 0usize;
        if !src.has_last {
            if got_frames == 0 {
                return;
            }
            src.last = read_frame(&self.scratch, 0, in_fmt);
            src.has_last = true;
            consumed = 1;
        }

        let mut next_idx = consumed;
        let mut frac = src.frac;
        for n in 0..out_frames {
            // Normalize the position, shifting the carry frame forward.
            let mut starved = false;
            while frac >= FRAC_ONE {
                if next_idx >= got_frames {
                    starved = true;
                    break;
                }
                src.last = read_frame(&self.scratch, next_idx, in_fmt);
                next_idx += 1;
                consumed += 1;
                frac -= FRAC_ONE;
            }
            if starved {
                break;
            }

            let next = if next_idx < got_frames {
                read_frame(&self.scratch, next_idx, in_fmt)
            } else if frac == 0 {
                src.last
            } else {
                // Interpolation partner not buffered yet.
                break;
            };

            let base = n * out_ch;
            for ch in 0..out_ch {
                let v = map_channel(&src.last, &next, frac, in_ch, out_ch, ch);
                let g = channel_gain[ch];
                let v = if (g - 1.0).abs() < 1e-6 {
                    v
                } else {
                    (v as f32 * g) as i32
                };
                self.acc[base + ch] += v;
            }
            frac += step as u32;
        }

        src.frac = frac;
        src.pipe.release(consumed * in_frame_bytes);
    }
}

/// Linear interpolation between the carry frame and the next one, then
/// input-to-output channel mapping
fn map_channel(
    last: &[i32; MAX_CHANNELS],
    next: &[i32; MAX_CHANNELS],
    frac: u32,
    in_ch: usize,
    out_ch: usize,
    ch: usize,
) -> i32 {
    let lerp = |c: usize| last[c] + (((next[c] - last[c]) * frac as i32) >> 8);
    if in_ch == out_ch {
        lerp(ch)
    } else if in_ch == 1 {
        lerp(0)
    } else if out_ch == 1 {
        let sum: i32 = (0..in_ch).map(lerp).sum();
        sum / in_ch as i32
    } else if ch < in_ch {
        lerp(ch)
    } else {
        0
    }
}

/// Decode one interleaved frame into 16-bit-scaled i32 samples
fn read_frame(data: &[u8], frame_idx: usize, fmt: AudioFormat) -> [i32; MAX_CHANNELS] {
    let mut out = [0i32; MAX_CHANNELS];
    let ch = usize::from(fmt.channels).min(MAX_CHANNELS);
    let bps = fmt.format.bytes_per_sample();
    let base = frame_idx * fmt.frame_bytes();
    for (c, slot) in out.iter_mut().enumerate().take(ch) {
        let at = base + c * bps;
        *slot = match fmt.format {
            SampleFormat::U8 => (i32::from(data[at]) - 128) << 8,
            SampleFormat::S16 => i32::from(i16::from_le_bytes([data[at], data[at + 1]])),
            SampleFormat::S24 => {
                let raw = (i32::from(data[at]) << 8)
                    | (i32::from(data[at + 1]) << 16)
                    | (i32::from(data[at + 2]) << 24);
                raw >> 16
            }
            SampleFormat::S32 => {
                i32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]]) >> 16
            }
        };
    }
    out
}

/// Clamp the 16-bit-scaled accumulator into the output encoding
fn write_clamped(acc: &[i32], out: &mut [u8], fmt: SampleFormat) {
    match fmt {
        SampleFormat::U8 => {
            for (v, dst) in acc.iter().zip(out.iter_mut()) {
                let c = (*v).clamp(i32::from(i16::MIN), i32::from(i16::MAX));
                *dst = ((c >> 8) + 128) as u8;
            }
        }
        SampleFormat::S16 => {
            for (v, dst) in acc.iter().zip(out.chunks_exact_mut(2)) {
                let c = (*v).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
                dst.copy_from_slice(&c.to_le_bytes());
            }
        }
        SampleFormat::S24 => {
            for (v, dst) in acc.iter().zip(out.chunks_exact_mut(3)) {
                let c = (*v).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) << 8;
                dst.copy_from_slice(&c.to_le_bytes()[0..3]);
            }
        }
        SampleFormat::S32 => {
            for (v, dst) in acc.iter().zip(out.chunks_exact_mut(4)) {
                let c = (*v).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) << 16;
                dst.copy_from_slice(&c.to_le_bytes());
            }
        }
    }
}
