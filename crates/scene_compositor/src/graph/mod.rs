//! Scene graph arena and the node behavior contract
//!
//! Nodes live in a [`slotmap`] arena behind stable [`NodeKey`]s. Structure
//! (kind, parent, children, dirty flags) is stored in [`SceneNode`]; per-kind
//! logic and private state live in an owned [`NodeBehavior`] object that the
//! traversal engine temporarily takes out of the arena while it runs, so a
//! behavior can walk its own children through the same arena without aliasing.

mod node;
mod scene;

pub use node::{DirtyFlags, NodeBehavior, NodeKey, NodeKind, SceneNode};
pub use scene::{GraphError, SceneGraph};
