//! Backend abstraction for the flush pass
//!
//! The compositor records what to draw; a [`RasterBackend`] turns the ordered
//! commands into pixels. [`NullBackend`] is the default and only counts what
//! it is asked to do, which is enough for headless runs and for tests that
//! assert draw order and texture upload behavior.

use std::any::Any;
use std::collections::HashMap;

use crate::foundation::geometry::Rect;
use crate::graph::NodeKey;
use crate::render::draw::DrawCommand;
use crate::render::mesh::Mesh;
use crate::render::visual::{FogParams, LightParams};

/// Frame-wide state handed to the backend before any draw
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo<'a> {
    /// Target area in pixels
    pub viewport: Rect,
    /// RGBA clear color
    pub clear_color: [f32; 4],
    /// True when the visual renders with depth
    pub three_d: bool,
    /// Fog bound for this frame, if any
    pub fog: Option<FogParams>,
    /// Lights collected during the lighting pass
    pub lights: &'a [LightParams],
}

/// Rasterization seam between the compositor and a concrete renderer
///
/// The `Any` supertrait lets embedders reach their concrete backend again
/// through the boxed handle the compositor owns.
pub trait RasterBackend: Any {
    /// Start a frame; clears the target
    fn begin_frame(&mut self, info: &FrameInfo<'_>);

    /// Draw one command; `mesh` is resolved for 3D commands
    fn draw(&mut self, command: &DrawCommand, mesh: Option<&Mesh>);

    /// Finish the frame and present
    fn end_frame(&mut self);
}

/// Backend that records activity without producing output
#[derive(Debug, Default)]
pub struct NullBackend {
    /// Frames begun
    pub frames: u64,
    /// Total draw calls
    pub draws: u64,
    /// 2D rectangle draws
    pub rects: u64,
    /// 3D mesh draws
    pub meshes: u64,
    /// Video frames seen with a stamp newer than the last one for that node
    pub uploads: u64,
    /// Nodes drawn this frame, in submission order
    pub order: Vec<NodeKey>,
    /// Clear color of the last begun frame
    pub last_clear: [f32; 4],
    /// Viewport of the last begun frame
    pub last_viewport: Rect,
    /// Light count of the last begun frame
    pub last_light_count: usize,
    /// Whether the last begun frame had fog bound
    pub last_had_fog: bool,
    frame_stamps: HashMap<NodeKey, u64>,
}

impl NullBackend {
    /// Create a backend with zeroed counters
    pub fn new() -> Self {
        Self::default()
    }
}

impl RasterBackend for NullBackend {
    fn begin_frame(&mut self, info: &FrameInfo<'_>) {
        self.frames += 1;
        self.order.clear();
        self.last_clear = info.clear_color;
        self.last_viewport = info.viewport;
        self.last_light_count = info.lights.len();
        self.last_had_fog = info.fog.is_some();
    }

    fn draw(&mut self, command: &DrawCommand, _mesh: Option<&Mesh>) {
        self.draws += 1;
        self.order.push(command.node());
        let paint = match command {
            DrawCommand::Rect2D { paint, .. } => {
                self.rects += 1;
                paint
            }
            DrawCommand::Mesh3D { paint, .. } => {
                self.meshes += 1;
                paint
            }
        };
        if let Some(frame) = &paint.video {
            let seen = self.frame_stamps.insert(command.node(), frame.stamp);
            if seen != Some(frame.stamp) {
                self.uploads += 1;
            }
        }
    }

    fn end_frame(&mut self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::CompositorConfig;
    use crate::foundation::math::{Mat3, Mat4};
    use crate::graph::{NodeKind, SceneGraph, SceneNode};
    use crate::media::{PixelFormat, VideoFrame};
    use crate::render::draw::Paint;
    use crate::render::mesh::MeshKey;
    use crate::services::Services;

    fn new_node(kind: NodeKind) -> NodeKey {
        let mut srv = Services::new(&CompositorConfig::default());
        SceneGraph::new().insert(SceneNode::new(kind), &mut srv)
    }

    fn frame(stamp: u64) -> VideoFrame {
        VideoFrame {
            width: 2,
            height: 2,
            stride: 6,
            format: PixelFormat::Rgb24,
            stamp,
            data: Arc::from(vec![0u8; 12].into_boxed_slice()),
        }
    }

    fn video_cmd(node: NodeKey, stamp: u64) -> DrawCommand {
        DrawCommand::Rect2D {
            node,
            rect: Rect::from_center(0.0, 0.0, 2.0, 2.0),
            transform: Mat3::identity(),
            clip: Rect::from_center(0.0, 0.0, 64.0, 64.0),
            paint: Paint {
                color: [1.0; 4],
                video: Some(frame(stamp)),
            },
        }
    }

    #[test]
    fn test_counts_by_command_kind() {
        let node = new_node(NodeKind::Shape2D);
        let mut backend = NullBackend::new();
        backend.begin_frame(&FrameInfo {
            viewport: Rect::new(0.0, 0.0, 64.0, 64.0),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            three_d: true,
            fog: None,
            lights: &[],
        });
        backend.draw(&video_cmd(node, 1), None);
        backend.draw(
            &DrawCommand::Mesh3D {
                node,
                mesh: MeshKey::default(),
                model: Mat4::identity(),
                clip_planes: Vec::new(),
                paint: Paint::default(),
                depth: 1.0,
            },
            None,
        );
        backend.end_frame();
        assert_eq!(backend.frames, 1);
        assert_eq!(backend.rects, 1);
        assert_eq!(backend.meshes, 1);
        assert_eq!(backend.order, vec![node, node]);
    }

    #[test]
    fn test_upload_counted_once_per_stamp() {
        let node = new_node(NodeKind::MovieTexture);
        let mut backend = NullBackend::new();
        backend.draw(&video_cmd(node, 7), None);
        backend.draw(&video_cmd(node, 7), None);
        assert_eq!(backend.uploads, 1);
        backend.draw(&video_cmd(node, 8), None);
        assert_eq!(backend.uploads, 2);
    }
}
