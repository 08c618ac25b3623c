//! Scene traversal and the state carried down the tree
//!
//! Every compositor pass is a traversal of the same graph in a different
//! [`TraverseMode`]. Behaviors are taken out of their node for the duration
//! of their `traverse` call, which gives them `&mut` access to the rest of
//! the graph and doubles as the re-entry guard for cyclic references.
//!
//! [`TraverseState`] is saved and restored around every scope that changes
//! it (transforms, clipping, the sensor chain), so a node never sees state
//! leaked by a sibling subtree.

pub mod pick;

pub use pick::{screen_to_ndc, PickResult, PickState};

use crate::audio::pipe::ChannelGains;
use crate::bind::StackSet;
use crate::camera::CullResult;
use crate::foundation::geometry::{Aabb, Plane, Rect};
use crate::foundation::math::{Mat3, Mat4};
use crate::graph::{NodeKey, SceneGraph};
use crate::render::{DrawCommand, Visual, VisualKey};
use crate::services::Services;

/// Most user clip planes active at once; pushes beyond this are ignored
pub const MAX_CLIP_PLANES: usize = 4;

/// What the current traversal computes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseMode {
    /// Recompute dirty bounding volumes bottom-up
    Bounds,
    /// Cull and record draw commands in traversal order
    Sort,
    /// Replay recorded 2D commands through their nodes
    Draw2d,
    /// Replay recorded 3D commands through their nodes
    Draw3d,
    /// Ray query against pickable geometry
    Pick,
    /// Sphere or ground probe against collidable geometry
    Collide,
    /// Collect lights shining on the current visual
    Lighting,
    /// Let bindables register and the bound ones contribute
    BindableEval,
}

/// Mutable state carried down one traversal
#[derive(Debug, Clone)]
pub struct TraverseState {
    /// Current pass
    pub mode: TraverseMode,
    /// Visual this traversal targets
    pub visual: VisualKey,
    /// Bindable stacks of that visual
    pub stacks: StackSet,
    /// True below a layer node
    pub in_layer: bool,
    /// True while compositing with depth
    pub three_d: bool,
    /// Flattened 2D transform, local to visual space
    pub transform: Mat3,
    /// Model matrix, local to world space
    pub model: Mat4,
    /// Cull classification inherited from enclosing groups
    pub cull: CullResult,
    /// 2D clip rectangle in visual space
    pub clip: Rect,
    /// Pixel viewport of the target
    pub viewport: Rect,
    /// Gains handed from sound nodes to their audio sources
    pub gains: Option<ChannelGains>,
    /// The running collide traversal is the downward gravity probe
    pub collide_gravity: bool,
    /// Pointing sensors enclosing the current node, outermost first
    pub sensors: Vec<NodeKey>,
    /// World-space user clip planes
    pub clip_planes: Vec<Plane>,
    /// Command being replayed during a draw pass
    pub draw: Option<DrawCommand>,
    /// Bounds accumulator children write during a bounds pass
    ///
    /// 2D bounds ride the same channel as flat boxes at `z = 0`. This is a
    /// return value, not scoped state, so [`TraverseState::restore`] leaves
    /// it alone.
    pub bbox: Aabb,
}

/// Saved portion of [`TraverseState`], restored when a scope ends
#[derive(Debug, Clone, Copy)]
pub struct StateScope {
    mode: TraverseMode,
    visual: VisualKey,
    stacks: StackSet,
    in_layer: bool,
    three_d: bool,
    transform: Mat3,
    model: Mat4,
    cull: CullResult,
    clip: Rect,
    viewport: Rect,
    gains: Option<ChannelGains>,
    collide_gravity: bool,
    sensors_len: usize,
    clip_planes_len: usize,
}

impl TraverseState {
    /// Fresh state for a pass over one visual
    pub fn for_visual(mode: TraverseMode, key: VisualKey, visual: &Visual) -> Self {
        Self {
            mode,
            visual: key,
            stacks: visual.stacks,
            in_layer: false,
            three_d: visual.three_d,
            transform: Mat3::identity(),
            model: Mat4::identity(),
            cull: CullResult::Intersects,
            clip: Rect::from_center(0.0, 0.0, visual.width, visual.height),
            viewport: Rect::new(0.0, 0.0, visual.width, visual.height),
            gains: None,
            collide_gravity: false,
            sensors: Vec::new(),
            clip_planes: Vec::new(),
            draw: None,
            bbox: Aabb::empty(),
        }
    }

    /// Snapshot the scoped fields
    pub fn save(&self) -> StateScope {
        StateScope {
            mode: self.mode,
            visual: self.visual,
            stacks: self.stacks,
            in_layer: self.in_layer,
            three_d: self.three_d,
            transform: self.transform,
            model: self.model,
            cull: self.cull,
            clip: self.clip,
            viewport: self.viewport,
            gains: self.gains,
            collide_gravity: self.collide_gravity,
            sensors_len: self.sensors.len(),
            clip_planes_len: self.clip_planes.len(),
        }
    }

    /// Restore a snapshot, dropping sensors and clip planes pushed since
    pub fn restore(&mut self, scope: StateScope) {
        self.mode = scope.mode;
        self.visual = scope.visual;
        self.stacks = scope.stacks;
        self.in_layer = scope.in_layer;
        self.three_d = scope.three_d;
        self.transform = scope.transform;
        self.model = scope.model;
        self.cull = scope.cull;
        self.clip = scope.clip;
        self.viewport = scope.viewport;
        self.gains = scope.gains;
        self.collide_gravity = scope.collide_gravity;
        self.sensors.truncate(scope.sensors_len);
        self.clip_planes.truncate(scope.clip_planes_len);
    }
}

/// Everything a behavior can reach while being traversed
pub struct TraverseCtx<'a> {
    /// Scene graph, minus the behavior currently taken out
    pub graph: &'a mut SceneGraph,
    /// Shared compositor services
    pub srv: &'a mut Services,
    /// State carried down the tree
    pub state: TraverseState,
}

impl<'a> TraverseCtx<'a> {
    /// Traverse one node
    ///
    /// The behavior is taken out of the node for the duration of the call;
    /// re-entering the same node (a cycle, or a node drawing itself) finds
    /// nothing to take and returns without effect.
    pub fn traverse_node(&mut self, key: NodeKey) {
        let Some(mut behavior) = self.graph.take_behavior(key) else {
            return;
        };
        behavior.traverse(key, self);
        self.graph.put_behavior(key, behavior);
    }

    /// Traverse the children of a node in order
    pub fn traverse_children(&mut self, key: NodeKey) {
        let mut index = 0;
        while let Some(child) = self.graph.child_at(key, index) {
            self.traverse_node(child);
            index += 1;
        }
    }

    /// Run a closure with state changes contained to it
    pub fn scoped<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let scope = self.state.save();
        let out = f(self);
        self.state.restore(scope);
        out
    }

    /// Bounds of a node's children in the node's own frame
    ///
    /// Runs a bounds sub-traversal with identity transforms, so the result
    /// is local to `key` and can be cached until a child changes.
    pub fn child_bounds(&mut self, key: NodeKey) -> Aabb {
        self.local_bounds(|ctx| ctx.traverse_children(key))
    }

    /// Bounds of a single node's subtree in its parent's frame
    pub fn node_bounds(&mut self, key: NodeKey) -> Aabb {
        self.local_bounds(|ctx| ctx.traverse_node(key))
    }

    fn local_bounds(&mut self, walk: impl FnOnce(&mut Self)) -> Aabb {
        let outer = std::mem::take(&mut self.state.bbox);
        let local = self.scoped(|ctx| {
            ctx.state.mode = TraverseMode::Bounds;
            ctx.state.transform = Mat3::identity();
            ctx.state.model = Mat4::identity();
            walk(ctx);
            ctx.state.bbox
        });
        self.state.bbox = outer;
        local
    }

    /// Visual this traversal targets
    pub fn visual(&mut self) -> Option<&mut Visual> {
        self.srv.visuals.get_mut(self.state.visual)
    }

    /// Add a user clip plane; false when the per-traversal limit is hit
    pub fn push_clip_plane(&mut self, plane: Plane) -> bool {
        if self.state.clip_planes.len() >= MAX_CLIP_PLANES {
            return false;
        }
        self.state.clip_planes.push(plane);
        true
    }
}
