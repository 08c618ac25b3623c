//! Node records, kind tags and the behavior trait

use std::any::Any;

use bitflags::bitflags;
use slotmap::new_key_type;

use crate::bind::BindableState;
use crate::services::Services;
use crate::timing::TickCtx;
use crate::traverse::TraverseCtx;

new_key_type! {
    /// Stable handle of a scene node
    pub struct NodeKey;
}

bitflags! {
    /// Pending invalidation reasons on a node
    ///
    /// Flags accumulate between frames and are consumed by the owner during
    /// its next traversal. `SUBTREE` is the upward-propagated marker telling
    /// an ancestor that something below it changed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DirtyFlags: u32 {
        /// Own geometry (size, mesh, points) changed
        const GEOMETRY = 1 << 0;
        /// Own transform fields changed
        const TRANSFORM = 1 << 1;
        /// Paint-only change, cached bounds stay valid
        const APPEARANCE = 1 << 2;
        /// Binding state of this node changed
        const BINDING = 1 << 3;
        /// Child list was edited
        const CHILDREN = 1 << 4;
        /// Some descendant carries dirty flags
        const SUBTREE = 1 << 5;
    }
}

impl DirtyFlags {
    /// Flags that invalidate cached subtree bounds
    pub fn invalidates_bounds(self) -> bool {
        self.intersects(Self::GEOMETRY | Self::TRANSFORM | Self::CHILDREN | Self::SUBTREE)
    }
}

/// Kind tag selecting a node's behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Plain grouping node
    Group,
    /// 2D affine transform group
    Transform2D,
    /// 3D transform group
    Transform3D,
    /// 2D drawable (rectangle geometry)
    Shape2D,
    /// 3D drawable (triangle mesh geometry)
    Shape3D,
    /// Bindable clear color / backdrop
    Background,
    /// Bindable camera pose
    Viewpoint,
    /// Bindable navigation parameters
    NavigationInfo,
    /// Bindable fog parameters
    Fog,
    /// Nested 3D rendering context with private stacks
    Layer3D,
    /// Timed audio source
    AudioClip,
    /// Timed video source usable as texture
    MovieTexture,
    /// Audio emitter without spatialization
    Sound2D,
    /// Spatialized audio emitter
    Sound3D,
    /// Pointing-device sensor over sibling shapes
    TouchSensor,
    /// Directional light contributing to the frame light list
    DirectionalLight,
    /// User clip plane scoped to the parent group
    ClipPlane,
    /// Line-based layout with justification and scrolling
    Layout,
    /// Placement of children along a polyline
    PathLayout,
}

impl NodeKind {
    /// Bindable kinds participate in the stack protocol
    pub fn is_bindable(self) -> bool {
        matches!(
            self,
            Self::Background | Self::Viewpoint | Self::NavigationInfo | Self::Fog
        )
    }

    /// Grouping kinds traverse children
    pub fn is_grouping(self) -> bool {
        matches!(
            self,
            Self::Group
                | Self::Transform2D
                | Self::Transform3D
                | Self::Layer3D
                | Self::Layout
                | Self::PathLayout
        )
    }

    /// Time-dependent kinds join the tick registry
    pub fn is_time_dependent(self) -> bool {
        matches!(self, Self::AudioClip | Self::MovieTexture)
    }
}

/// Per-kind node logic and private state
///
/// One boxed behavior per node. During traversal the engine takes it out of
/// the arena, runs the hook, and puts it back; a hook may therefore freely
/// traverse other nodes through the context but never re-enter itself.
pub trait NodeBehavior: Any {
    /// One traversal visit; the purpose is in `ctx.state.mode`
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>);

    /// Per-frame clock tick for registered time nodes
    ///
    /// Returning `false` unregisters the node from the tick order.
    fn update_time(&mut self, _key: NodeKey, _ctx: &mut TickCtx<'_>) -> bool {
        false
    }

    /// Called after the node enters the arena
    fn attached(&mut self, _key: NodeKey, _srv: &mut Services) {}

    /// Called before the node leaves the arena
    ///
    /// Unregister timers and mixer inputs and release stack membership here;
    /// the behavior is dropped right after.
    fn detached(&mut self, _key: NodeKey, _srv: &mut Services) {}

    /// Stack bookkeeping access for bindable kinds
    fn bindable_mut(&mut self) -> Option<&mut BindableState> {
        None
    }
}

/// One arena record: structure plus owned behavior
pub struct SceneNode {
    /// Kind tag, fixed at creation
    pub kind: NodeKind,
    /// Optional authoring name, used in log output
    pub name: Option<String>,
    /// Parent link, `None` for the root and detached nodes
    pub parent: Option<NodeKey>,
    /// Child keys in traversal order
    pub children: Vec<NodeKey>,
    /// Pending invalidation flags
    pub dirty: DirtyFlags,
    pub(crate) behavior: Option<Box<dyn NodeBehavior>>,
}

impl SceneNode {
    /// Create a node without a behavior
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            name: None,
            parent: None,
            children: Vec::new(),
            dirty: DirtyFlags::empty(),
            behavior: None,
        }
    }

    /// Attach the behavior object
    #[must_use]
    pub fn with_behavior(mut self, behavior: Box<dyn NodeBehavior>) -> Self {
        self.behavior = Some(behavior);
        self
    }

    /// Set the authoring name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// True while the behavior is in place and not taken by a traversal
    pub fn has_behavior(&self) -> bool {
        self.behavior.is_some()
    }
}
