//! Audio renderer shell around the mixer
//!
//! Owns the mixer behind a mutex so an audio output thread can pull frames
//! while the render thread registers sources and adjusts master volume/pan.
//! Also keeps the running total of frames delivered, which doubles as an
//! audio-driven clock for the embedding player.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::audio::mixer::{AudioMixer, SourceKey};
use crate::audio::pipe::AudioPipe;
use crate::audio::{AudioFormat, MAX_CHANNELS};
use crate::config::AudioConfig;

#[derive(Debug)]
struct MasterState {
    volume: u32,
    pan: u32,
}

/// Shared handle over the mixing back end
///
/// Clones share the same mixer; one clone typically lives on the audio
/// output thread, the other inside the compositor.
#[derive(Debug, Clone)]
pub struct AudioRenderer {
    mixer: Arc<Mutex<AudioMixer>>,
    master: Arc<Mutex<MasterState>>,
    frames_played: Arc<AtomicU64>,
}

impl AudioRenderer {
    /// Create a renderer with the configured output format
    pub fn new(config: &AudioConfig) -> Self {
        let out = AudioFormat::new(config.sample_rate, config.channels, config.format);
        Self {
            mixer: Arc::new(Mutex::new(AudioMixer::new(out, config.force_format))),
            master: Arc::new(Mutex::new(MasterState {
                volume: 100,
                pan: 50,
            })),
            frames_played: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Reapply an output configuration, e.g. after the audio device reports
    /// the format it actually opened with
    pub fn reconfigure(&self, config: &AudioConfig) {
        let out = AudioFormat::new(config.sample_rate, config.channels, config.format);
        self.mixer
            .lock()
            .unwrap()
            .set_output(out, config.force_format);
    }

    /// Register a source pipe with the mixer
    pub fn register_source(&self, pipe: AudioPipe) -> SourceKey {
        self.mixer.lock().unwrap().add_source(pipe)
    }

    /// Remove a source from the mixer
    pub fn unregister_source(&self, key: SourceKey) {
        self.mixer.lock().unwrap().remove_source(key);
    }

    /// Number of currently registered sources
    pub fn source_count(&self) -> usize {
        self.mixer.lock().unwrap().source_count()
    }

    /// Current mixer output format
    pub fn out_format(&self) -> AudioFormat {
        self.mixer.lock().unwrap().out_format()
    }

    /// Master volume in percent, clamped to 0..=100
    pub fn set_volume(&self, volume: u32) {
        let mut st = self.master.lock().unwrap();
        st.volume = volume.min(100);
        let gains = master_gains(st.volume, st.pan);
        drop(st);
        self.mixer.lock().unwrap().set_master_gains(gains);
    }

    /// Current master volume in percent
    pub fn volume(&self) -> u32 {
        self.master.lock().unwrap().volume
    }

    /// Master balance in percent (0 left, 50 center, 100 right), clamped
    pub fn set_pan(&self, pan: u32) {
        let mut st = self.master.lock().unwrap();
        st.pan = pan.min(100);
        let gains = master_gains(st.volume, st.pan);
        drop(st);
        self.mixer.lock().unwrap().set_master_gains(gains);
    }

    /// Current master balance in percent
    pub fn pan(&self) -> u32 {
        self.master.lock().unwrap().pan
    }

    /// Mix one output window; returns frames produced. Called by the audio
    /// output thread (or synchronously by headless players).
    pub fn render_frame(&self, out: &mut [u8]) -> usize {
        let frames = self.mixer.lock().unwrap().mix(out);
        self.frames_played
            .fetch_add(frames as u64, Ordering::Relaxed);
        frames
    }

    /// Total frames ever delivered
    pub fn frames_played(&self) -> u64 {
        self.frames_played.load(Ordering::Relaxed)
    }

    /// Seconds of audio delivered so far, usable as a scene time source
    pub fn audio_time(&self) -> f64 {
        let rate = self.out_format().sample_rate;
        if rate == 0 {
            0.0
        } else {
            self.frames_played() as f64 / f64::from(rate)
        }
    }
}

/// Combine master volume and balance into per-channel gains
fn master_gains(volume: u32, pan: u32) -> [f32; MAX_CHANNELS] {
    let vol = volume.min(100) as f32 / 100.0;
    let pan = pan.min(100) as f32;
    let left = ((100.0 - pan) / 50.0).min(1.0);
    let right = (pan / 50.0).min(1.0);
    let mut gains = [vol; MAX_CHANNELS];
    gains[0] = vol * left;
    gains[1] = vol * right;
    gains
}
