//! Draw command collection, visuals and the rasterization seam
//!
//! Traversal fills each visual's [`DrawList`] during the sort pass; the flush
//! pass replays the ordered commands through their nodes and hands them to
//! the configured [`RasterBackend`]. Meshes live in a shared registry keyed
//! by [`MeshKey`] so commands stay small.

pub mod backend;
pub mod draw;
pub mod mesh;
pub mod visual;

pub use backend::{FrameInfo, NullBackend, RasterBackend};
pub use draw::{DrawCommand, DrawList, Paint};
pub use mesh::{Mesh, MeshHit, MeshKey, MeshRegistry, Vertex};
pub use visual::{FogKind, FogParams, LightParams, Visual, VisualKey, VisualRegistry};
