//! # Scene Compositor
//!
//! The scene compositor of an interactive multimedia player: a live graph of
//! timed, bindable and renderable nodes, traversed several times per output
//! frame to resolve binding, lighting, culling and draw order, then flushed
//! through a pluggable rasterization backend.
//!
//! ## Features
//!
//! - **Timed Nodes**: Activation state machine with scene-time start/stop,
//!   looping media and boundary-exact events
//! - **Bindable Stacks**: Background, viewpoint, navigation and fog stacks
//!   with exactly-one-bound semantics per visual
//! - **Multi-Pass Traversal**: Bounds, sort, draw, pick, collide, lighting
//!   and bindable-eval passes over one arena-backed graph
//! - **3D Camera**: Frustum culling with p-vertex tests, ray picking,
//!   animated viewpoint transitions
//! - **Collision & Gravity**: Stepped avatar-sphere resolution with ground
//!   snapping
//! - **Spatialized Audio**: Ellipsoidal distance gain, constant-power pan,
//!   ring-buffered mixing with resampling and channel mapping
//! - **Layout**: Line/justify/scroll layout and path-following placement
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_compositor::prelude::*;
//!
//! fn main() -> Result<(), CompositorError> {
//!     let config = CompositorConfig::new(800, 600);
//!     let mut compositor = Compositor::new(config)?;
//!
//!     let root = compositor.add_node(NodeKind::Group);
//!     compositor.set_root(root)?;
//!     compositor.add_child(root, NodeKind::Shape3D)?;
//!
//!     // One output frame: advance scene time, traverse, flush.
//!     compositor.advance(1.0 / 60.0);
//!     compositor.frame();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod audio;
pub mod bind;
pub mod camera;
pub mod collision;
pub mod config;
pub mod events;
pub mod foundation;
pub mod graph;
pub mod media;
pub mod nodes;
pub mod render;
pub mod services;
pub mod timing;
pub mod traverse;

mod compositor;

pub use compositor::{Compositor, CompositorError};

/// Common imports for compositor embedders
pub mod prelude {
    pub use crate::{
        Compositor, CompositorError,
        camera::{Camera, CameraPose, NavigationParams},
        config::{
            AudioConfig, CollisionMode, CompositorConfig, Config, NavigationConfig,
            NavigationMode, OutputConfig,
        },
        events::CompositorEvent,
        foundation::{
            geometry::{Aabb, Plane, Ray, Rect},
            math::{Mat3, Mat4, Point3, Vec2, Vec3},
        },
        graph::{NodeBehavior, NodeKey, NodeKind, SceneGraph, SceneNode},
        media::{MediaKey, MediaObject},
        render::{DrawCommand, FrameInfo, NullBackend, Paint, RasterBackend},
        timing::ActivationTimes,
        traverse::{PickResult, TraverseCtx, TraverseMode},
    };
}
