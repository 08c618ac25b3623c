//! # Compositor Configuration
//!
//! Configuration for the compositor's output surface, navigation/collision
//! behavior and audio output, with TOML and RON file support.
//!
//! All structs carry sensible defaults, builder-style `with_*` setters and a
//! `validate()` used by [`crate::Compositor::new`] before anything is built.

use serde::{Deserialize, Serialize};

use crate::audio::SampleFormat;

/// Configuration trait: load/save from TOML or RON by file extension
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

        if path.ends_with(".toml") {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else if path.ends_with(".ron") {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            Err(ConfigError::UnsupportedFormat(path.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// How the collision resolver reacts to a detected collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionMode {
    /// Collision detection disabled entirely
    Disabled,
    /// Revert to the last valid position on collision
    Normal,
    /// Slide along the obstacle, keeping the avatar radius from the hit point
    Displacement,
}

/// Navigation paradigm applied to the active camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationMode {
    /// No user navigation, no collision
    None,
    /// Ground-based navigation with gravity
    Walk,
    /// Free flight, collision without gravity
    Fly,
    /// Orbit around the examined object
    Examine,
}

/// # Output Surface Configuration
///
/// Size and coordinate conventions of the root visual.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Whether scene coordinates are centered on the output (origin at the
    /// middle, y up) rather than top-left
    pub centered_coords: bool,
    /// Whether the root visual composites in 3D
    pub three_d: bool,
    /// Clear color used when no background node is bound (RGBA, 0..1)
    pub clear_color: [f32; 4],
}

impl OutputConfig {
    /// Create an output configuration with the given size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            centered_coords: true,
            three_d: true,
            clear_color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    /// Select 2D or 3D compositing for the root visual
    pub fn with_three_d(mut self, three_d: bool) -> Self {
        self.three_d = three_d;
        self
    }

    /// Set the fallback clear color
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

/// # Navigation & Collision Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Navigation mode used until a navigation-info node binds
    pub default_mode: NavigationMode,
    /// Collision response policy
    pub collisions: CollisionMode,
    /// Whether gravity/ground snapping applies in walk mode
    pub gravity: bool,
    /// Duration of animated viewpoint transitions, seconds (0 snaps)
    pub viewpoint_transition: f32,
}

impl NavigationConfig {
    /// Set the collision response policy
    pub fn with_collisions(mut self, mode: CollisionMode) -> Self {
        self.collisions = mode;
        self
    }

    /// Set the viewpoint transition duration in seconds
    pub fn with_viewpoint_transition(mut self, seconds: f32) -> Self {
        self.viewpoint_transition = seconds;
        self
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            default_mode: NavigationMode::Walk,
            collisions: CollisionMode::Displacement,
            gravity: true,
            viewpoint_transition: 1.0,
        }
    }
}

/// # Audio Output Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Output channel count
    pub channels: u8,
    /// Output sample format
    pub format: SampleFormat,
    /// How far ahead of real time sources buffer, in milliseconds
    pub buffer_ahead_ms: u32,
    /// Keep the configured output format even when inputs are wider
    pub force_format: bool,
}

impl AudioConfig {
    /// Set the output format triple
    pub fn with_output(mut self, sample_rate: u32, channels: u8, format: SampleFormat) -> Self {
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.format = format;
        self
    }

    /// Pin the output format regardless of input formats
    pub fn with_force_format(mut self, force: bool) -> Self {
        self.force_format = force;
        self
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            channels: 2,
            format: SampleFormat::S16,
            buffer_ahead_ms: 200,
            force_format: false,
        }
    }
}

/// # Complete Compositor Configuration
///
/// Top-level configuration covering all compositor subsystems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositorConfig {
    /// Output surface configuration
    pub output: OutputConfig,
    /// Navigation and collision configuration
    pub navigation: NavigationConfig,
    /// Audio output configuration
    pub audio: AudioConfig,
}

impl CompositorConfig {
    /// Create a configuration with the given output size
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            output: OutputConfig::new(width, height),
            ..Default::default()
        }
    }

    /// Replace the output configuration
    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    /// Replace the navigation configuration
    pub fn with_navigation(mut self, navigation: NavigationConfig) -> Self {
        self.navigation = navigation;
        self
    }

    /// Replace the audio configuration
    pub fn with_audio(mut self, audio: AudioConfig) -> Self {
        self.audio = audio;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.output.width == 0 || self.output.height == 0 {
            return Err("Output size must be non-zero".to_string());
        }

        if self.navigation.viewpoint_transition < 0.0 {
            return Err("Viewpoint transition duration cannot be negative".to_string());
        }

        if self.audio.sample_rate < 8_000 || self.audio.sample_rate > 192_000 {
            return Err(format!(
                "Audio sample rate {} outside supported range 8000..=192000",
                self.audio.sample_rate
            ));
        }

        if self.audio.channels == 0 || usize::from(self.audio.channels) > crate::audio::MAX_CHANNELS {
            return Err(format!(
                "Audio channel count {} outside supported range 1..={}",
                self.audio.channels,
                crate::audio::MAX_CHANNELS
            ));
        }

        if self.audio.buffer_ahead_ms == 0 {
            return Err("Audio buffer-ahead must be non-zero".to_string());
        }

        Ok(())
    }
}

impl Config for CompositorConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CompositorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_size_rejected() {
        let cfg = CompositorConfig::new(0, 600);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_bad_audio_rejected() {
        let cfg = CompositorConfig::default()
            .with_audio(AudioConfig::default().with_output(44_100, 0, SampleFormat::S16));
        assert!(cfg.validate().is_err());

        let cfg = CompositorConfig::default()
            .with_audio(AudioConfig::default().with_output(1_000, 2, SampleFormat::S16));
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let cfg = CompositorConfig::new(1280, 720)
            .with_navigation(NavigationConfig::default().with_collisions(CollisionMode::Normal));
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: CompositorConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.output.width, 1280);
        assert_eq!(back.navigation.collisions, CollisionMode::Normal);
    }

    #[test]
    fn test_file_round_trip_by_extension() {
        let dir = std::env::temp_dir();
        let cfg = CompositorConfig::new(640, 360);

        let toml_path = dir.join(format!("scene_compositor_{}.toml", std::process::id()));
        let toml_path = toml_path.to_string_lossy().into_owned();
        cfg.save_to_file(&toml_path).unwrap();
        let back = CompositorConfig::load_from_file(&toml_path).unwrap();
        assert_eq!(back.output.width, 640);
        std::fs::remove_file(&toml_path).unwrap();

        let ron_path = dir.join(format!("scene_compositor_{}.ron", std::process::id()));
        let ron_path = ron_path.to_string_lossy().into_owned();
        cfg.save_to_file(&ron_path).unwrap();
        let back = CompositorConfig::load_from_file(&ron_path).unwrap();
        assert_eq!(back.output.height, 360);
        std::fs::remove_file(&ron_path).unwrap();

        assert!(matches!(
            cfg.save_to_file("config.ini"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }
}
