//! Media object collaborator contract
//!
//! The demux/decode pipeline lives outside the compositor; it registers one
//! [`MediaObject`] per stream. The compositor only ever asks for control
//! (open/play/stop/restart/speed), readiness, completion, decoded video
//! frames, and raw audio samples through a fetch/release pair. Every call
//! must be safe before the object is fully opened and degrade to a no-op or
//! a "not ready" answer.
//!
//! [`StubMedia`] and [`PcmMedia`] are in-process implementations used by the
//! demo binaries and the test suite.

use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};
use thiserror::Error;

use crate::audio::{AudioFormat, SampleFormat};

new_key_type! {
    /// Key identifying a registered media object
    pub struct MediaKey;
}

/// Media pipeline failures surfaced to the timing engine
#[derive(Error, Debug)]
pub enum MediaError {
    /// The underlying resource could not be opened
    #[error("failed to open media resource: {0}")]
    OpenFailed(String),

    /// Operation requires an open resource
    #[error("media resource is not open")]
    NotOpen,
}

/// Pixel layout of a decoded video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 8-bit RGB, 3 bytes per pixel
    Rgb24,
    /// 8-bit RGBA, 4 bytes per pixel
    Rgba32,
    /// Planar YUV 4:2:0
    Yuv420,
}

impl PixelFormat {
    /// Bytes per pixel in the first plane
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::Rgb24 => 3,
            Self::Rgba32 => 4,
            Self::Yuv420 => 1,
        }
    }
}

/// One decoded video frame handed to the raster backend
///
/// The compositor treats the pixel data as opaque; `stamp` changes whenever
/// the content does, letting backends skip redundant uploads.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoFrame {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row of the first plane
    pub stride: u32,
    /// Pixel layout
    pub format: PixelFormat,
    /// Monotonic content stamp
    pub stamp: u64,
    /// Pixel data, shared with the decoder
    pub data: Arc<[u8]>,
}

/// Control and data surface of one external media stream
pub trait MediaObject: Send {
    /// Open the underlying resource; repeated opens are no-ops
    fn open(&mut self) -> Result<(), MediaError>;

    /// Close and release the resource
    fn close(&mut self);

    /// True once open succeeded
    fn is_open(&self) -> bool;

    /// True when data can be served right now
    fn is_ready(&self) -> bool;

    /// Start or resume delivery over `[start, end)` scene seconds
    fn play(&mut self, start: f64, end: Option<f64>, looping: bool);

    /// Halt delivery; buffered data may still drain downstream
    fn stop(&mut self);

    /// Rewind to the beginning of the active range
    fn restart(&mut self);

    /// Playback speed multiplier
    fn set_speed(&mut self, speed: f64);

    /// True once the stream has delivered its last sample
    fn is_done(&self) -> bool;

    /// Whether reaching the end should deactivate the owning node
    fn should_auto_deactivate(&self) -> bool {
        true
    }

    /// Stream duration in seconds when known
    fn duration(&self) -> Option<f64> {
        None
    }

    /// Latest decoded video frame, if this is a visual stream
    fn video_frame(&mut self) -> Option<VideoFrame> {
        None
    }

    /// PCM format, if this is an audio stream
    fn audio_format(&self) -> Option<AudioFormat> {
        None
    }

    /// Borrow pending decoded samples without consuming them
    fn fetch_samples(&mut self) -> &[u8] {
        &[]
    }

    /// Consume bytes previously observed via [`MediaObject::fetch_samples`]
    fn release_samples(&mut self, _bytes: usize) {}
}

/// Arena of registered media objects, keyed by [`MediaKey`]
#[derive(Default)]
pub struct MediaRegistry {
    objects: SlotMap<MediaKey, Box<dyn MediaObject>>,
}

impl MediaRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a media object and return its key
    pub fn add(&mut self, media: Box<dyn MediaObject>) -> MediaKey {
        self.objects.insert(media)
    }

    /// Remove a media object, closing it first
    pub fn remove(&mut self, key: MediaKey) {
        if let Some(mut media) = self.objects.remove(key) {
            media.close();
        }
    }

    /// Borrow a media object
    pub fn get(&self, key: MediaKey) -> Option<&dyn MediaObject> {
        self.objects.get(key).map(AsRef::as_ref)
    }

    /// Mutably borrow a media object
    pub fn get_mut(&mut self, key: MediaKey) -> Option<&mut Box<dyn MediaObject>> {
        self.objects.get_mut(key)
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True when no objects are registered
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

/// Scriptable media double recording every control call
///
/// Tests drive the timing engine against it and inspect the counters; the
/// `done`/`ready` knobs simulate decoder progress.
#[derive(Debug, Clone)]
pub struct StubMedia {
    /// True after a successful open
    pub opened: bool,
    /// True while playing
    pub playing: bool,
    /// Simulated end-of-stream flag
    pub done: bool,
    /// Whether open calls fail
    pub fail_open: bool,
    /// Answer for should_auto_deactivate
    pub auto_deactivate: bool,
    /// Reported duration
    pub duration: Option<f64>,
    /// Last speed passed to set_speed
    pub speed: f64,
    /// Number of open calls that succeeded
    pub open_count: u32,
    /// Number of play calls
    pub play_count: u32,
    /// Number of stop calls
    pub stop_count: u32,
    /// Number of restart calls
    pub restart_count: u32,
    /// Number of close calls
    pub close_count: u32,
    video: Option<(u32, u32, Arc<[u8]>)>,
    video_stamp: u64,
}

impl Default for StubMedia {
    fn default() -> Self {
        Self::new()
    }
}

impl StubMedia {
    /// Create a stub that opens successfully and never ends on its own
    pub fn new() -> Self {
        Self {
            opened: false,
            playing: false,
            done: false,
            fail_open: false,
            auto_deactivate: true,
            duration: None,
            speed: 1.0,
            open_count: 0,
            play_count: 0,
            stop_count: 0,
            restart_count: 0,
            close_count: 0,
            video: None,
            video_stamp: 0,
        }
    }

    /// Make subsequent open calls fail
    pub fn failing() -> Self {
        Self {
            fail_open: true,
            ..Self::new()
        }
    }

    /// Attach a synthetic video stream of the given size
    pub fn with_video(mut self, width: u32, height: u32) -> Self {
        let bytes = width * height * PixelFormat::Rgb24.bytes_per_pixel();
        let data: Arc<[u8]> = Arc::from(vec![0u8; bytes as usize]);
        self.video = Some((width, height, data));
        self
    }

    /// Advance the synthetic video by one frame
    pub fn bump_video(&mut self) {
        self.video_stamp += 1;
    }
}

impl MediaObject for StubMedia {
    fn open(&mut self) -> Result<(), MediaError> {
        if self.fail_open {
            return Err(MediaError::OpenFailed("stub configured to fail".into()));
        }
        if !self.opened {
            self.opened = true;
            self.open_count += 1;
        }
        Ok(())
    }

    fn close(&mut self) {
        if self.opened {
            self.opened = false;
            self.close_count += 1;
        }
        self.playing = false;
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn is_ready(&self) -> bool {
        self.opened
    }

    fn play(&mut self, _start: f64, _end: Option<f64>, _looping: bool) {
        if self.opened {
            self.playing = true;
            self.play_count += 1;
        }
    }

    fn stop(&mut self) {
        if self.playing {
            self.playing = false;
            self.stop_count += 1;
        }
    }

    fn restart(&mut self) {
        if self.opened {
            self.done = false;
            self.restart_count += 1;
        }
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn should_auto_deactivate(&self) -> bool {
        self.auto_deactivate
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn video_frame(&mut self) -> Option<VideoFrame> {
        let (width, height, data) = self.video.as_ref()?;
        Some(VideoFrame {
            width: *width,
            height: *height,
            stride: width * PixelFormat::Rgb24.bytes_per_pixel(),
            format: PixelFormat::Rgb24,
            stamp: self.video_stamp,
            data: Arc::clone(data),
        })
    }
}

/// In-memory PCM clip
///
/// Serves preloaded samples through the fetch/release pair. With looping
/// enabled the read cursor rewinds instead of reporting done, so downstream
/// buffers never starve at the loop seam.
pub struct PcmMedia {
    format: AudioFormat,
    data: Vec<u8>,
    cursor: usize,
    opened: bool,
    playing: bool,
    looping: bool,
    speed: f64,
}

impl PcmMedia {
    /// Wrap 16-bit samples in a media object
    pub fn from_samples(sample_rate: u32, channels: u8, samples: &[i16]) -> Self {
        Self {
            format: AudioFormat::new(sample_rate, channels, SampleFormat::S16),
            data: bytemuck::cast_slice(samples).to_vec(),
            cursor: 0,
            opened: false,
            playing: false,
            looping: false,
            speed: 1.0,
        }
    }

    /// Generate a mono sine tone
    pub fn sine(sample_rate: u32, freq: f32, seconds: f32, amplitude: f32) -> Self {
        let count = (sample_rate as f32 * seconds) as usize;
        let amp = amplitude.clamp(0.0, 1.0) * f32::from(i16::MAX);
        let samples: Vec<i16> = (0..count)
            .map(|n| {
                let t = n as f32 / sample_rate as f32;
                (amp * (crate::foundation::math::constants::TAU * freq * t).sin()) as i16
            })
            .collect();
        Self::from_samples(sample_rate, 1, &samples)
    }

    /// Remaining un-served bytes
    pub fn remaining(&self) -> usize {
        self.data.len() - self.cursor
    }
}

impl MediaObject for PcmMedia {
    fn open(&mut self) -> Result<(), MediaError> {
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        self.opened = false;
        self.playing = false;
        self.cursor = 0;
    }

    fn is_open(&self) -> bool {
        self.opened
    }

    fn is_ready(&self) -> bool {
        self.opened
    }

    fn play(&mut self, start: f64, _end: Option<f64>, looping: bool) {
        if !self.opened {
            return;
        }
        self.playing = true;
        self.looping = looping;
        let frame = self.format.frame_bytes();
        let offset = (start.max(0.0) * f64::from(self.format.sample_rate)) as usize * frame;
        self.cursor = offset.min(self.data.len());
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn restart(&mut self) {
        self.cursor = 0;
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
    }

    fn is_done(&self) -> bool {
        self.opened && !self.looping && self.cursor >= self.data.len()
    }

    fn duration(&self) -> Option<f64> {
        Some(self.format.bytes_to_seconds(self.data.len()))
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        Some(self.format)
    }

    fn fetch_samples(&mut self) -> &[u8] {
        if !self.playing {
            return &[];
        }
        if self.cursor >= self.data.len() && self.looping {
            self.cursor = 0;
        }
        &self.data[self.cursor..]
    }

    fn release_samples(&mut self, bytes: usize) {
        self.cursor = (self.cursor + bytes).min(self.data.len());
    }
}
