//! Node arena with parent links and dirty propagation

use std::any::Any;

use slotmap::SlotMap;
use thiserror::Error;

use super::{DirtyFlags, NodeBehavior, NodeKey, SceneNode};
use crate::services::Services;

/// Structural graph errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphError {
    /// The referenced node is not in the arena
    #[error("node key is not in the arena")]
    InvalidKey,
}

/// Arena of scene nodes plus the designated root
#[derive(Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeKey, SceneNode>,
    root: Option<NodeKey>,
}

impl SceneGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a detached node, firing its attached hook
    pub fn insert(&mut self, node: SceneNode, srv: &mut Services) -> NodeKey {
        let key = self.nodes.insert(node);
        if let Some(mut behavior) = self.take_behavior(key) {
            behavior.attached(key, srv);
            self.put_behavior(key, behavior);
        }
        key
    }

    /// Insert a node as the last child of `parent`
    pub fn insert_child(
        &mut self,
        parent: NodeKey,
        node: SceneNode,
        srv: &mut Services,
    ) -> Result<NodeKey, GraphError> {
        if !self.nodes.contains_key(parent) {
            return Err(GraphError::InvalidKey);
        }
        let key = self.insert(node, srv);
        self.nodes[key].parent = Some(parent);
        self.nodes[parent].children.push(key);
        self.mark_dirty(parent, DirtyFlags::CHILDREN);
        Ok(key)
    }

    /// Designate the traversal root
    pub fn set_root(&mut self, key: NodeKey) -> Result<(), GraphError> {
        if !self.nodes.contains_key(key) {
            return Err(GraphError::InvalidKey);
        }
        self.root = Some(key);
        Ok(())
    }

    /// Current traversal root
    pub fn root(&self) -> Option<NodeKey> {
        self.root
    }

    /// Borrow a node
    pub fn get(&self, key: NodeKey) -> Option<&SceneNode> {
        self.nodes.get(key)
    }

    /// Mutably borrow a node
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut SceneNode> {
        self.nodes.get_mut(key)
    }

    /// True when the key is live
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Child key at `index`, if any
    ///
    /// Index-based child access lets a taken-out behavior walk its own
    /// children without cloning the child list.
    pub fn child_at(&self, key: NodeKey, index: usize) -> Option<NodeKey> {
        self.nodes.get(key)?.children.get(index).copied()
    }

    /// Number of children of a node
    pub fn child_count(&self, key: NodeKey) -> usize {
        self.nodes.get(key).map_or(0, |n| n.children.len())
    }

    /// Remove a node and its whole subtree
    ///
    /// Detached hooks run child-first so parents still see a consistent
    /// arena while their descendants unregister.
    pub fn remove(&mut self, key: NodeKey, srv: &mut Services) {
        if !self.nodes.contains_key(key) {
            return;
        }
        if let Some(parent) = self.nodes[key].parent {
            if let Some(node) = self.nodes.get_mut(parent) {
                node.children.retain(|c| *c != key);
            }
            self.mark_dirty(parent, DirtyFlags::CHILDREN);
        }
        if self.root == Some(key) {
            self.root = None;
        }

        let mut order = Vec::new();
        let mut stack = vec![key];
        while let Some(k) = stack.pop() {
            order.push(k);
            if let Some(node) = self.nodes.get(k) {
                stack.extend(node.children.iter().copied());
            }
        }
        for &k in order.iter().rev() {
            if let Some(mut node) = self.nodes.remove(k) {
                if let Some(mut behavior) = node.behavior.take() {
                    behavior.detached(k, srv);
                }
            }
        }
    }

    /// Take the behavior out for a traversal visit
    ///
    /// Returns `None` while the behavior is already taken, which is what
    /// protects recursive traversal from re-entering a node.
    pub fn take_behavior(&mut self, key: NodeKey) -> Option<Box<dyn NodeBehavior>> {
        self.nodes.get_mut(key)?.behavior.take()
    }

    /// Return a behavior taken with [`SceneGraph::take_behavior`], or swap
    /// in a replacement configured by the embedder
    pub fn put_behavior(&mut self, key: NodeKey, behavior: Box<dyn NodeBehavior>) {
        if let Some(node) = self.nodes.get_mut(key) {
            node.behavior = Some(behavior);
        }
    }

    /// Borrow a behavior downcast to its concrete type
    pub fn behavior_ref<T: NodeBehavior>(&self, key: NodeKey) -> Option<&T> {
        let behavior = self.nodes.get(key)?.behavior.as_deref()?;
        (behavior as &dyn Any).downcast_ref::<T>()
    }

    /// Mutably borrow a behavior downcast to its concrete type
    pub fn behavior_mut<T: NodeBehavior>(&mut self, key: NodeKey) -> Option<&mut T> {
        let behavior = self.nodes.get_mut(key)?.behavior.as_deref_mut()?;
        (behavior as &mut dyn Any).downcast_mut::<T>()
    }

    /// Set dirty flags and propagate the subtree marker to ancestors
    ///
    /// Propagation stops at the first ancestor already carrying the marker,
    /// so repeated marking in one frame stays cheap.
    pub fn mark_dirty(&mut self, key: NodeKey, flags: DirtyFlags) {
        let Some(node) = self.nodes.get_mut(key) else {
            return;
        };
        node.dirty |= flags;
        let mut cursor = node.parent;
        while let Some(k) = cursor {
            let Some(parent) = self.nodes.get_mut(k) else {
                break;
            };
            if parent.dirty.contains(DirtyFlags::SUBTREE) {
                break;
            }
            parent.dirty |= DirtyFlags::SUBTREE;
            cursor = parent.parent;
        }
    }

    /// Consume and clear a node's dirty flags
    pub fn take_dirty(&mut self, key: NodeKey) -> DirtyFlags {
        self.nodes
            .get_mut(key)
            .map_or(DirtyFlags::empty(), |n| std::mem::take(&mut n.dirty))
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when the arena is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
