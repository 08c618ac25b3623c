//! Bindable resource stacks
//!
//! Background, viewpoint, navigation-info and fog nodes share one protocol:
//! per visual there is one stack per kind, the front member is bound, and at
//! most one member is bound at any time. Binding a node unbinds the previous
//! front; unbinding the front pops it to the back and promotes the new
//! front. Stack membership is established lazily the first time a bindable
//! node is traversed under a visual.
//!
//! Stack order lives here; the per-node bound flag lives in the node's
//! behavior as a [`BindableState`] reached through the
//! [`bindable_mut`](crate::graph::NodeBehavior::bindable_mut) hook, so the
//! same operations serve every bindable kind.

use slotmap::{new_key_type, SlotMap};

use crate::events::CompositorEvent;
use crate::graph::{DirtyFlags, NodeKey, NodeKind, SceneGraph};
use crate::services::Services;
use crate::traverse::TraverseCtx;

new_key_type! {
    /// Handle of one bindable stack
    pub struct BindStackKey;
}

/// The four stacks owned by one visual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackSet {
    /// Background stack
    pub background: BindStackKey,
    /// Viewpoint stack
    pub viewpoint: BindStackKey,
    /// Navigation-info stack
    pub navigation: BindStackKey,
    /// Fog stack
    pub fog: BindStackKey,
}

impl StackSet {
    /// Stack responsible for a node kind, if the kind is bindable
    pub fn for_kind(&self, kind: NodeKind) -> Option<BindStackKey> {
        match kind {
            NodeKind::Background => Some(self.background),
            NodeKind::Viewpoint => Some(self.viewpoint),
            NodeKind::NavigationInfo => Some(self.navigation),
            NodeKind::Fog => Some(self.fog),
            _ => None,
        }
    }
}

/// Per-node stack bookkeeping stored inside bindable behaviors
#[derive(Debug, Clone, Copy, Default)]
pub struct BindableState {
    /// Stack the node registered on, `None` before first traversal
    pub stack: Option<BindStackKey>,
    /// True while this node is the bound member of its stack
    pub bound: bool,
    /// Scene time of the last bind edge
    pub bind_time: f64,
    /// `set_bind` received before registration, applied right after
    pub requested: Option<bool>,
}

impl BindableState {
    /// Register on the traversal state's stack of the node's kind
    ///
    /// First registration on an empty stack binds the node immediately, but
    /// the caller contributes nothing on that frame; a redraw is requested
    /// so the next frame shows it.
    pub fn ensure_registered(&mut self, key: NodeKey, kind: NodeKind, ctx: &mut TraverseCtx<'_>) {
        if self.stack.is_some() {
            return;
        }
        let Some(stack) = ctx.state.stacks.for_kind(kind) else {
            return;
        };
        self.stack = Some(stack);
        if ctx.srv.stacks.register(stack, key) {
            self.bound = true;
            self.bind_time = ctx.srv.time.now();
            ctx.srv.events.push(CompositorEvent::NodeBound { node: key, bound: true });
            ctx.srv.request_redraw();
        }
        if let Some(value) = self.requested.take() {
            ctx.srv.stacks.queue_request(key, value);
        }
    }
}

#[derive(Default)]
struct BindStack {
    nodes: Vec<NodeKey>,
}

/// Registry of all bindable stacks plus deferred bind requests
#[derive(Default)]
pub struct BindStacks {
    stacks: SlotMap<BindStackKey, BindStack>,
    requests: Vec<(NodeKey, bool)>,
}

impl BindStacks {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate one stack
    pub fn alloc(&mut self) -> BindStackKey {
        self.stacks.insert(BindStack::default())
    }

    /// Allocate the four stacks of a new visual
    pub fn alloc_set(&mut self) -> StackSet {
        StackSet {
            background: self.alloc(),
            viewpoint: self.alloc(),
            navigation: self.alloc(),
            fog: self.alloc(),
        }
    }

    /// Release one stack
    pub fn free(&mut self, key: BindStackKey) {
        self.stacks.remove(key);
    }

    /// Release a visual's stacks
    pub fn free_set(&mut self, set: StackSet) {
        self.free(set.background);
        self.free(set.viewpoint);
        self.free(set.navigation);
        self.free(set.fog);
    }

    /// Append a node to a stack; true when it became the sole member
    pub fn register(&mut self, stack: BindStackKey, node: NodeKey) -> bool {
        let Some(s) = self.stacks.get_mut(stack) else {
            return false;
        };
        if s.nodes.contains(&node) {
            return false;
        }
        s.nodes.push(node);
        s.nodes.len() == 1
    }

    /// Front member of a stack
    pub fn top(&self, stack: BindStackKey) -> Option<NodeKey> {
        self.stacks.get(stack)?.nodes.first().copied()
    }

    /// All members, front first
    pub fn members(&self, stack: BindStackKey) -> &[NodeKey] {
        self.stacks.get(stack).map_or(&[], |s| &s.nodes)
    }

    fn move_to_front(&mut self, stack: BindStackKey, node: NodeKey) {
        if let Some(s) = self.stacks.get_mut(stack) {
            s.nodes.retain(|k| *k != node);
            s.nodes.insert(0, node);
        }
    }

    fn move_to_back(&mut self, stack: BindStackKey, node: NodeKey) {
        if let Some(s) = self.stacks.get_mut(stack) {
            s.nodes.retain(|k| *k != node);
            s.nodes.push(node);
        }
    }

    /// Drop a node from its stack during detach
    ///
    /// When the departing node was bound, the next front is queued for
    /// promotion so the stack never stays headless while members remain.
    pub fn remove_node(&mut self, stack: BindStackKey, node: NodeKey, was_bound: bool) {
        let Some(s) = self.stacks.get_mut(stack) else {
            return;
        };
        s.nodes.retain(|k| *k != node);
        self.requests.retain(|(k, _)| *k != node);
        if was_bound {
            if let Some(&next) = s.nodes.first() {
                self.requests.push((next, true));
            }
        }
    }

    /// Queue a bind request for application at the next frame start
    pub fn queue_request(&mut self, node: NodeKey, value: bool) {
        self.requests.push((node, value));
    }

    /// Drain queued bind requests
    pub fn take_requests(&mut self) -> Vec<(NodeKey, bool)> {
        std::mem::take(&mut self.requests)
    }
}

/// Flip a node's bound flag, emitting the edge event once
fn set_bound_flag(graph: &mut SceneGraph, srv: &mut Services, node: NodeKey, value: bool) {
    let Some(mut behavior) = graph.take_behavior(node) else {
        return;
    };
    if let Some(state) = behavior.bindable_mut() {
        if state.bound != value {
            state.bound = value;
            if value {
                state.bind_time = srv.time.now();
            }
            if let Some(record) = graph.get(node) {
                let edge = if value { "bound" } else { "unbound" };
                match record.name.as_deref() {
                    Some(name) => log::debug!("{:?} '{name}' {edge}", record.kind),
                    None => log::debug!("{:?} {edge}", record.kind),
                }
            }
            srv.events.push(CompositorEvent::NodeBound { node, bound: value });
            srv.request_redraw();
        }
    }
    graph.put_behavior(node, behavior);
    graph.mark_dirty(node, DirtyFlags::BINDING);
}

/// Apply one `set_bind` event to a bindable node
///
/// Binding an already-bound front is a no-op. Unbinding a non-front member
/// clears nothing but its own request state. A node not yet registered
/// stores the request and applies it right after registration.
pub fn apply_set_bind(graph: &mut SceneGraph, srv: &mut Services, node: NodeKey, value: bool) {
    let Some(mut behavior) = graph.take_behavior(node) else {
        return;
    };
    let Some(state) = behavior.bindable_mut() else {
        graph.put_behavior(node, behavior);
        return;
    };
    let Some(stack) = state.stack else {
        state.requested = Some(value);
        graph.put_behavior(node, behavior);
        return;
    };
    let bound = state.bound;
    graph.put_behavior(node, behavior);

    if value {
        let top = srv.stacks.top(stack);
        if top == Some(node) && bound {
            return;
        }
        if let Some(prev) = top {
            if prev != node {
                set_bound_flag(graph, srv, prev, false);
            }
        }
        srv.stacks.move_to_front(stack, node);
        set_bound_flag(graph, srv, node, true);
    } else if bound {
        set_bound_flag(graph, srv, node, false);
        srv.stacks.move_to_back(stack, node);
        if let Some(next) = srv.stacks.top(stack) {
            if next != node {
                set_bound_flag(graph, srv, next, true);
            }
        }
    }
}

/// Promote the next candidate before a bound node leaves the arena
///
/// Called by the compositor ahead of node removal so a frame never starts
/// with an empty binding while alternatives exist.
pub fn rebind_on_removal(graph: &mut SceneGraph, srv: &mut Services, node: NodeKey) {
    let Some(mut behavior) = graph.take_behavior(node) else {
        return;
    };
    let info = behavior
        .bindable_mut()
        .and_then(|s| s.stack.map(|stack| (stack, s.bound)));
    graph.put_behavior(node, behavior);

    let Some((stack, true)) = info else {
        return;
    };
    let next = srv
        .stacks
        .members(stack)
        .iter()
        .copied()
        .find(|k| *k != node);
    if let Some(next) = next {
        set_bound_flag(graph, srv, next, true);
    }
}
