//! Shared services reachable from every traversal
//!
//! One [`Services`] value lives for the life of the compositor. Behaviors
//! reach it through the traversal context; the registries inside own
//! everything nodes share (visuals, meshes, media, bind stacks) so behaviors
//! themselves stay small.

use std::any::Any;

use crate::audio::renderer::AudioRenderer;
use crate::bind::BindStacks;
use crate::camera::NavigationParams;
use crate::config::CompositorConfig;
use crate::events::EventQueue;
use crate::foundation::time::SceneClock;
use crate::media::MediaRegistry;
use crate::render::{
    MeshRegistry, NullBackend, RasterBackend, Visual, VisualKey, VisualRegistry,
};
use crate::timing::TimeRegistry;
use crate::traverse::PickState;

/// Registries, clocks and queues shared by all nodes
pub struct Services {
    /// Bindable stacks of every visual
    pub stacks: BindStacks,
    /// Live composition targets
    pub visuals: VisualRegistry,
    /// Shared mesh arena
    pub meshes: MeshRegistry,
    /// Open media objects
    pub media: MediaRegistry,
    /// Handle over the audio mixing thread state
    pub audio: AudioRenderer,
    /// Scene clock all timing decisions sample
    pub time: SceneClock,
    /// Registered time-dependent nodes
    pub timing: TimeRegistry,
    /// Events for the embedding player
    pub events: EventQueue,
    /// In-flight pick query
    pub pick: PickState,
    /// Rasterization backend, counting-only by default
    pub backend: Box<dyn RasterBackend>,
    /// Frames composed since startup
    pub frame_no: u64,
    /// Navigation parameters used until a navigation-info node binds
    pub nav_defaults: NavigationParams,
    /// Duration of animated viewpoint transitions in seconds, 0 snaps
    pub viewpoint_transition: f32,
    /// Seconds of audio the render thread keeps buffered ahead of the mixer
    pub audio_buffer_ahead: f64,
    draw_next_frame: bool,
}

impl Services {
    /// Build the service set from a validated configuration
    pub fn new(config: &CompositorConfig) -> Self {
        Self {
            stacks: BindStacks::new(),
            visuals: VisualRegistry::new(),
            meshes: MeshRegistry::new(),
            media: MediaRegistry::new(),
            audio: AudioRenderer::new(&config.audio),
            time: SceneClock::new(),
            timing: TimeRegistry::new(),
            events: EventQueue::new(),
            pick: PickState::default(),
            backend: Box::new(NullBackend::new()),
            frame_no: 0,
            nav_defaults: NavigationParams {
                mode: config.navigation.default_mode,
                ..NavigationParams::default()
            },
            viewpoint_transition: config.navigation.viewpoint_transition,
            audio_buffer_ahead: f64::from(config.audio.buffer_ahead_ms) / 1000.0,
            draw_next_frame: true,
        }
    }

    /// Ask for another frame; idempotent within a frame
    pub fn request_redraw(&mut self) {
        self.draw_next_frame = true;
    }

    /// Consume the pending redraw request
    pub fn take_redraw(&mut self) -> bool {
        std::mem::take(&mut self.draw_next_frame)
    }

    /// True while a redraw request is pending
    pub fn redraw_pending(&self) -> bool {
        self.draw_next_frame
    }

    /// Create a visual with freshly allocated bind stacks
    pub fn create_visual(&mut self, three_d: bool, width: f32, height: f32) -> VisualKey {
        let set = self.stacks.alloc_set();
        let mut visual = Visual::new(three_d, width, height, set);
        visual.camera.nav = self.nav_defaults;
        self.visuals.add(visual)
    }

    /// Destroy a visual and release its bind stacks
    pub fn release_visual(&mut self, key: VisualKey) {
        if let Some(visual) = self.visuals.remove(key) {
            self.stacks.free_set(visual.stacks);
        }
    }

    /// Replace the rasterization backend
    pub fn set_backend(&mut self, backend: Box<dyn RasterBackend>) {
        self.backend = backend;
    }

    /// The backend seen as the counting null backend, if it is one
    pub fn null_backend(&self) -> Option<&NullBackend> {
        (self.backend.as_ref() as &dyn Any).downcast_ref::<NullBackend>()
    }
}
