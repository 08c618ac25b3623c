//! Per-frame draw command collection
//!
//! The sort pass appends commands in traversal order; opaque commands keep
//! that order (2D painter order) while transparent commands are reordered
//! back-to-front by their camera-space depth before the flush pass replays
//! them through the owning nodes.

use crate::foundation::geometry::{Plane, Rect};
use crate::foundation::math::{Mat3, Mat4};
use crate::graph::NodeKey;
use crate::media::VideoFrame;
use crate::render::mesh::MeshKey;

/// Fill style resolved during traversal
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    /// RGBA color, each channel in 0..=1
    pub color: [f32; 4],
    /// Video frame to map over the geometry instead of the flat color
    pub video: Option<VideoFrame>,
}

impl Paint {
    /// Flat color fill
    pub fn solid(color: [f32; 4]) -> Self {
        Self { color, video: None }
    }

    /// True when the fill needs back-to-front blending
    pub fn is_transparent(&self) -> bool {
        self.color[3] < 1.0
    }
}

impl Default for Paint {
    fn default() -> Self {
        Self::solid([1.0, 1.0, 1.0, 1.0])
    }
}

/// One recorded draw, replayed through its node during the flush pass
#[derive(Debug, Clone)]
pub enum DrawCommand {
    /// 2D rectangle in local coordinates with its flattened transform
    Rect2D {
        /// Node that recorded the command
        node: NodeKey,
        /// Local-space rectangle
        rect: Rect,
        /// Local to visual-space transform at record time
        transform: Mat3,
        /// Visual-space clip rectangle active at record time
        clip: Rect,
        /// Fill style
        paint: Paint,
    },
    /// 3D mesh with its model matrix and active user clip planes
    Mesh3D {
        /// Node that recorded the command
        node: NodeKey,
        /// Registered geometry
        mesh: MeshKey,
        /// Local to world transform at record time
        model: Mat4,
        /// World-space user clip planes active at record time
        clip_planes: Vec<Plane>,
        /// Fill style
        paint: Paint,
        /// Farthest camera-space depth of the bounds, for transparency sorting
        depth: f32,
    },
}

impl DrawCommand {
    /// Node that recorded this command
    pub fn node(&self) -> NodeKey {
        match self {
            Self::Rect2D { node, .. } | Self::Mesh3D { node, .. } => *node,
        }
    }

    /// Sort key for transparent ordering; 2D commands keep traversal order
    fn depth(&self) -> f32 {
        match self {
            Self::Rect2D { .. } => 0.0,
            Self::Mesh3D { depth, .. } => *depth,
        }
    }
}

/// Commands collected for one visual during the sort pass
#[derive(Debug, Default)]
pub struct DrawList {
    opaque: Vec<DrawCommand>,
    transparent: Vec<DrawCommand>,
}

impl DrawList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an opaque command, kept in traversal order
    pub fn push_opaque(&mut self, command: DrawCommand) {
        self.opaque.push(command);
    }

    /// Append a transparent command, reordered later by depth
    pub fn push_transparent(&mut self, command: DrawCommand) {
        self.transparent.push(command);
    }

    /// Total number of recorded commands
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    /// True when nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    /// Drop all commands for the next frame
    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }

    /// Drain every command in draw order
    ///
    /// Opaque commands come first in traversal order, then transparent
    /// commands back-to-front. The transparent sort is stable so commands at
    /// equal depth keep their traversal order.
    pub fn take_ordered(&mut self) -> Vec<DrawCommand> {
        self.transparent.sort_by(|a, b| {
            b.depth().partial_cmp(&a.depth()).unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut ordered = std::mem::take(&mut self.opaque);
        ordered.append(&mut self.transparent);
        ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompositorConfig;
    use crate::graph::{NodeKind, SceneGraph, SceneNode};
    use crate::services::Services;

    fn mesh_cmd(node: NodeKey, depth: f32) -> DrawCommand {
        DrawCommand::Mesh3D {
            node,
            mesh: MeshKey::default(),
            model: Mat4::identity(),
            clip_planes: Vec::new(),
            paint: Paint::default(),
            depth,
        }
    }

    fn rect_cmd(node: NodeKey) -> DrawCommand {
        DrawCommand::Rect2D {
            node,
            rect: Rect::from_center(0.0, 0.0, 2.0, 2.0),
            transform: Mat3::identity(),
            clip: Rect::from_center(0.0, 0.0, 100.0, 100.0),
            paint: Paint::default(),
        }
    }

    fn three_nodes() -> (NodeKey, NodeKey, NodeKey) {
        let mut srv = Services::new(&CompositorConfig::default());
        let mut graph = SceneGraph::new();
        let a = graph.insert(SceneNode::new(NodeKind::Shape2D), &mut srv);
        let b = graph.insert(SceneNode::new(NodeKind::Shape2D), &mut srv);
        let c = graph.insert(SceneNode::new(NodeKind::Shape2D), &mut srv);
        (a, b, c)
    }

    #[test]
    fn test_opaque_keeps_traversal_order() {
        let (a, b, c) = three_nodes();
        let mut list = DrawList::new();
        list.push_opaque(mesh_cmd(a, 1.0));
        list.push_opaque(mesh_cmd(b, 9.0));
        list.push_opaque(mesh_cmd(c, 5.0));
        let ordered = list.take_ordered();
        let keys: Vec<_> = ordered.iter().map(DrawCommand::node).collect();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_transparent_sorted_far_to_near_after_opaque() {
        let (a, b, c) = three_nodes();
        let mut list = DrawList::new();
        list.push_transparent(mesh_cmd(b, 2.0));
        list.push_transparent(mesh_cmd(c, 8.0));
        list.push_opaque(mesh_cmd(a, 99.0));
        let ordered = list.take_ordered();
        let keys: Vec<_> = ordered.iter().map(DrawCommand::node).collect();
        assert_eq!(keys, vec![a, c, b]);
    }

    #[test]
    fn test_transparent_rects_keep_order_at_equal_depth() {
        let (a, b, c) = three_nodes();
        let mut list = DrawList::new();
        list.push_transparent(rect_cmd(a));
        list.push_transparent(rect_cmd(b));
        list.push_transparent(rect_cmd(c));
        let ordered = list.take_ordered();
        let keys: Vec<_> = ordered.iter().map(DrawCommand::node).collect();
        assert_eq!(keys, vec![a, b, c]);
    }

    #[test]
    fn test_take_ordered_leaves_list_empty() {
        let (a, _, _) = three_nodes();
        let mut list = DrawList::new();
        list.push_opaque(rect_cmd(a));
        list.push_transparent(mesh_cmd(a, 1.0));
        assert_eq!(list.len(), 2);
        let _ = list.take_ordered();
        assert!(list.is_empty());
    }
}
