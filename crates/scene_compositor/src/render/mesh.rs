//! Triangle mesh storage and geometry queries
//!
//! Meshes live in a central registry so draw commands can reference them by
//! key after traversal ends. The queries here back picking (closest ray hit
//! with normal and texture coordinates) and collision (closest surface point
//! within a radius).

use slotmap::{new_key_type, SlotMap};

use crate::foundation::geometry::{closest_point_on_triangle, Aabb, Ray};
use crate::foundation::math::Vec3;

new_key_type! {
    /// Handle of a registered mesh
    pub struct MeshKey;
}

/// One mesh vertex
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Unit normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

/// Closest ray/mesh intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshHit {
    /// Ray parameter of the hit
    pub t: f32,
    /// Geometric face normal, object space
    pub normal: Vec3,
    /// Interpolated texture coordinates
    pub uv: [f32; 2],
}

/// Indexed triangle mesh with cached object-space bounds
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle indices, three per face
    pub indices: Vec<u32>,
    /// Object-space bounding box
    pub bounds: Aabb,
}

impl Mesh {
    /// Build a mesh and compute its bounds
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let mut bounds = Aabb::empty();
        for v in &vertices {
            bounds.grow_point(Vec3::new(v.position[0], v.position[1], v.position[2]));
        }
        Self {
            vertices,
            indices,
            bounds,
        }
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    fn triangle(&self, face: usize) -> (Vec3, Vec3, Vec3) {
        let read = |i: usize| {
            let p = self.vertices[self.indices[i] as usize].position;
            Vec3::new(p[0], p[1], p[2])
        };
        (read(face * 3), read(face * 3 + 1), read(face * 3 + 2))
    }

    /// Closest ray intersection over all faces
    pub fn intersect_ray(&self, ray: &Ray) -> Option<MeshHit> {
        let mut best: Option<MeshHit> = None;
        for face in 0..self.triangle_count() {
            let (a, b, c) = self.triangle(face);
            if let Some(hit) = ray.intersect_triangle(a, b, c) {
                if best.map_or(true, |h| hit.t < h.t) {
                    let normal = (b - a).cross(&(c - a));
                    let normal = if normal.norm_squared() > 0.0 {
                        normal.normalize()
                    } else {
                        Vec3::z()
                    };
                    let base = self.indices[face * 3] as usize;
                    let uv0 = self.vertices[base].uv;
                    let uv1 = self.vertices[self.indices[face * 3 + 1] as usize].uv;
                    let uv2 = self.vertices[self.indices[face * 3 + 2] as usize].uv;
                    let w = 1.0 - hit.u - hit.v;
                    best = Some(MeshHit {
                        t: hit.t,
                        normal,
                        uv: [
                            w * uv0[0] + hit.u * uv1[0] + hit.v * uv2[0],
                            w * uv0[1] + hit.u * uv1[1] + hit.v * uv2[1],
                        ],
                    });
                }
            }
        }
        best
    }

    /// Closest surface point within `radius` of a query point
    pub fn closest_within(&self, point: Vec3, radius: f32) -> Option<Vec3> {
        let mut best_sq = radius * radius;
        let mut best = None;
        for face in 0..self.triangle_count() {
            let (a, b, c) = self.triangle(face);
            let candidate = closest_point_on_triangle(point, a, b, c);
            let sq = (candidate - point).norm_squared();
            if sq <= best_sq {
                best_sq = sq;
                best = Some(candidate);
            }
        }
        best
    }

    /// Axis-aligned cube centered on the origin
    pub fn cube(size: f32) -> Self {
        let h = size / 2.0;
        let faces: [(Vec3, Vec3, Vec3); 6] = [
            (Vec3::z(), Vec3::x(), Vec3::y()),
            (-Vec3::z(), -Vec3::x(), Vec3::y()),
            (Vec3::x(), -Vec3::z(), Vec3::y()),
            (-Vec3::x(), Vec3::z(), Vec3::y()),
            (Vec3::y(), Vec3::x(), -Vec3::z()),
            (-Vec3::y(), Vec3::x(), Vec3::z()),
        ];
        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u_axis, v_axis) in faces {
            let base = vertices.len() as u32;
            for (du, dv, uv) in [
                (-1.0, -1.0, [0.0, 0.0]),
                (1.0, -1.0, [1.0, 0.0]),
                (1.0, 1.0, [1.0, 1.0]),
                (-1.0, 1.0, [0.0, 1.0]),
            ] {
                let p = normal * h + u_axis * (du * h) + v_axis * (dv * h);
                vertices.push(Vertex {
                    position: [p.x, p.y, p.z],
                    normal: [normal.x, normal.y, normal.z],
                    uv,
                });
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        Self::new(vertices, indices)
    }

    /// Axis-aligned quad in the xy plane facing +z
    pub fn quad(width: f32, height: f32) -> Self {
        let hw = width / 2.0;
        let hh = height / 2.0;
        let vertices = vec![
            Vertex {
                position: [-hw, -hh, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [0.0, 0.0],
            },
            Vertex {
                position: [hw, -hh, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [1.0, 0.0],
            },
            Vertex {
                position: [hw, hh, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [1.0, 1.0],
            },
            Vertex {
                position: [-hw, hh, 0.0],
                normal: [0.0, 0.0, 1.0],
                uv: [0.0, 1.0],
            },
        ];
        Self::new(vertices, vec![0, 1, 2, 0, 2, 3])
    }
}

/// Central mesh arena shared across visuals
#[derive(Default)]
pub struct MeshRegistry {
    meshes: SlotMap<MeshKey, Mesh>,
}

impl MeshRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a mesh
    pub fn add(&mut self, mesh: Mesh) -> MeshKey {
        self.meshes.insert(mesh)
    }

    /// Drop a mesh
    pub fn remove(&mut self, key: MeshKey) {
        self.meshes.remove(key);
    }

    /// Borrow a mesh
    pub fn get(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    /// Replace the geometry behind a key, keeping the key stable
    pub fn replace(&mut self, key: MeshKey, mesh: Mesh) {
        if let Some(slot) = self.meshes.get_mut(key) {
            *slot = mesh;
        }
    }

    /// Number of registered meshes
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
