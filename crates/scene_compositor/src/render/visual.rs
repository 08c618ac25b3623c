//! Per-visual render state
//!
//! A visual is one composition target: it owns a camera, the four bindable
//! stacks scoped to it, the draw list filled by the sort pass, and the
//! frame-bound environment (clear color, backdrop, fog, lights) that the
//! bound background, fog and light nodes contribute each frame. The main
//! visual covers the output; each Layer3D node owns a private one.

use slotmap::{new_key_type, SlotMap};

use crate::bind::StackSet;
use crate::camera::Camera;
use crate::foundation::math::Vec3;
use crate::render::draw::{DrawCommand, DrawList};

new_key_type! {
    /// Handle of a registered visual
    pub struct VisualKey;
}

/// Fog falloff curve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FogKind {
    /// Linear ramp from the eye to the visibility limit
    #[default]
    Linear,
    /// Exponential falloff
    Exponential,
}

/// Fog bound for the current frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogParams {
    /// Falloff curve
    pub kind: FogKind,
    /// Fog color, RGB
    pub color: [f32; 3],
    /// Distance at which geometry is fully fogged; 0 disables
    pub visibility: f32,
}

impl Default for FogParams {
    fn default() -> Self {
        Self {
            kind: FogKind::Linear,
            color: [1.0, 1.0, 1.0],
            visibility: 0.0,
        }
    }
}

/// One directional light collected by the lighting pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightParams {
    /// World-space direction the light travels
    pub direction: Vec3,
    /// Light color, RGB
    pub color: [f32; 3],
    /// Brightness scale
    pub intensity: f32,
    /// Ambient contribution scale
    pub ambient_intensity: f32,
}

impl Default for LightParams {
    fn default() -> Self {
        Self {
            direction: -Vec3::z(),
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            ambient_intensity: 0.0,
        }
    }
}

impl LightParams {
    /// White light along the camera view direction
    pub fn headlight(direction: Vec3) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }
}

/// One composition target with its camera, stacks and per-frame state
pub struct Visual {
    /// True when this visual composites with depth
    pub three_d: bool,
    /// Target width in scene units
    pub width: f32,
    /// Target height in scene units
    pub height: f32,
    /// Camera of this visual
    pub camera: Camera,
    /// Bindable stacks scoped to this visual
    pub stacks: StackSet,
    /// Clear color used when no background is bound
    pub default_clear: [f32; 4],
    /// Clear color of the current frame
    pub clear_color: [f32; 4],
    /// Fog bound this frame
    pub fog: Option<FogParams>,
    /// Lights collected this frame
    pub lights: Vec<LightParams>,
    /// Background quad drawn before everything else, never sorted
    pub backdrop: Option<DrawCommand>,
    /// Commands recorded by the sort pass
    pub draw: DrawList,
}

impl Visual {
    /// Create a visual with an updated camera
    pub fn new(three_d: bool, width: f32, height: f32, stacks: StackSet) -> Self {
        let mut camera = Camera::new(three_d);
        camera.update(width, height);
        Self {
            three_d,
            width,
            height,
            camera,
            stacks,
            default_clear: [0.0, 0.0, 0.0, 1.0],
            clear_color: [0.0, 0.0, 0.0, 1.0],
            fog: None,
            lights: Vec::new(),
            backdrop: None,
            draw: DrawList::new(),
        }
    }

    /// Change the target size and refresh the camera
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.camera.update(width, height);
    }

    /// Reset frame-bound state before the eval and sort passes
    ///
    /// Bound background, fog and light nodes re-contribute every frame, so
    /// everything they wrote last frame is dropped here.
    pub fn begin_frame(&mut self) {
        self.clear_color = self.default_clear;
        self.fog = None;
        self.lights.clear();
        self.backdrop = None;
        self.draw.clear();
    }
}

/// Arena of live visuals
#[derive(Default)]
pub struct VisualRegistry {
    visuals: SlotMap<VisualKey, Visual>,
}

impl VisualRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a visual
    pub fn add(&mut self, visual: Visual) -> VisualKey {
        self.visuals.insert(visual)
    }

    /// Remove a visual, returning it so its stacks can be released
    pub fn remove(&mut self, key: VisualKey) -> Option<Visual> {
        self.visuals.remove(key)
    }

    /// Borrow a visual
    pub fn get(&self, key: VisualKey) -> Option<&Visual> {
        self.visuals.get(key)
    }

    /// Mutably borrow a visual
    pub fn get_mut(&mut self, key: VisualKey) -> Option<&mut Visual> {
        self.visuals.get_mut(key)
    }

    /// Number of live visuals
    pub fn len(&self) -> usize {
        self.visuals.len()
    }

    /// True when no visual is registered
    pub fn is_empty(&self) -> bool {
        self.visuals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::BindStacks;
    use crate::config::CompositorConfig;
    use crate::foundation::geometry::Rect;
    use crate::foundation::math::Mat3;
    use crate::graph::{NodeKind, SceneGraph, SceneNode};
    use crate::render::draw::Paint;
    use crate::services::Services;

    #[test]
    fn test_begin_frame_resets_bound_state() {
        let mut srv = Services::new(&CompositorConfig::default());
        let mut stacks = BindStacks::new();
        let mut graph = SceneGraph::new();
        let node = graph.insert(SceneNode::new(NodeKind::Background), &mut srv);
        let mut visual = Visual::new(true, 640.0, 480.0, stacks.alloc_set());
        visual.clear_color = [0.5, 0.0, 0.0, 1.0];
        visual.fog = Some(FogParams::default());
        visual.lights.push(LightParams::default());
        visual.backdrop = Some(DrawCommand::Rect2D {
            node,
            rect: Rect::new(0.0, 0.0, 640.0, 480.0),
            transform: Mat3::identity(),
            clip: Rect::new(0.0, 0.0, 640.0, 480.0),
            paint: Paint::default(),
        });
        visual.begin_frame();
        assert_eq!(visual.clear_color, visual.default_clear);
        assert!(visual.fog.is_none());
        assert!(visual.lights.is_empty());
        assert!(visual.backdrop.is_none());
        assert!(visual.draw.is_empty());
    }

    #[test]
    fn test_resize_updates_camera_viewport() {
        let mut stacks = BindStacks::new();
        let mut visual = Visual::new(false, 100.0, 100.0, stacks.alloc_set());
        visual.resize(320.0, 240.0);
        assert_eq!(visual.camera.viewport(), (320.0, 240.0));
    }

    #[test]
    fn test_registry_remove_returns_stacks() {
        let mut stacks = BindStacks::new();
        let mut registry = VisualRegistry::new();
        let set = stacks.alloc_set();
        let key = registry.add(Visual::new(true, 64.0, 64.0, set));
        let visual = registry.remove(key).unwrap();
        stacks.free_set(visual.stacks);
        assert!(registry.is_empty());
    }
}
