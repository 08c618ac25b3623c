//! Geometric primitives shared by culling, picking and collision
//!
//! The axis-aligned box keeps an explicit empty state (fresh accumulators start
//! empty and grow by union), planes carry a precomputable "most positive
//! vertex" index for fast box classification, and rays support the slab,
//! plane and triangle tests used by the pick and collide passes.

use crate::foundation::math::{constants, Mat3, Mat4, Point2, Point3, Vec3};

/// 2D rectangle with min corner and size, y up
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    /// Minimum x (left edge)
    pub x: f32,
    /// Minimum y (bottom edge)
    pub y: f32,
    /// Width, non-negative
    pub width: f32,
    /// Height, non-negative
    pub height: f32,
}

impl Rect {
    /// Create a rectangle from its min corner and size
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Create a rectangle centered on a point
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// True when the rectangle has no area
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Center point of the rectangle
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Smallest rectangle containing both inputs; empty inputs are ignored
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = (self.x + self.width).max(other.x + other.width);
        let y1 = (self.y + self.height).max(other.y + other.height);
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Intersection of two rectangles, empty when they do not overlap
    pub fn intersection(&self, other: &Rect) -> Rect {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        if x1 <= x0 || y1 <= y0 {
            Rect::default()
        } else {
            Rect::new(x0, y0, x1 - x0, y1 - y0)
        }
    }

    /// True when the point lies inside or on the boundary
    pub fn contains_point(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.x + self.width && py >= self.y && py <= self.y + self.height
    }

    /// Axis-aligned bounds of the four corners mapped through an affine matrix
    pub fn transformed(&self, m: &Mat3) -> Rect {
        if self.is_empty() {
            return Rect::default();
        }
        let corners = [
            (self.x, self.y),
            (self.x + self.width, self.y),
            (self.x, self.y + self.height),
            (self.x + self.width, self.y + self.height),
        ];
        let mut x0 = f32::INFINITY;
        let mut y0 = f32::INFINITY;
        let mut x1 = f32::NEG_INFINITY;
        let mut y1 = f32::NEG_INFINITY;
        for (cx, cy) in corners {
            let p = m.transform_point(&Point2::new(cx, cy));
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }
}

/// Axis-aligned bounding box with an explicit empty state
///
/// An empty box has `min > max` on every axis; union with an empty box is a
/// no-op, so accumulators can start from [`Aabb::empty`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// An empty box, the identity for [`Aabb::union`]
    pub fn empty() -> Self {
        Self {
            min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    /// Create from explicit corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create from a center point and half-extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// True when no point has ever been added
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Center of the box
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half-extents of the box
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Radius of the bounding sphere around [`Aabb::center`]
    pub fn radius(&self) -> f32 {
        self.extents().norm()
    }

    /// Bounding sphere of the box
    pub fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.center(), self.radius())
    }

    /// Grow to include a point
    pub fn grow_point(&mut self, p: Vec3) {
        self.min = self.min.inf(&p);
        self.max = self.max.sup(&p);
    }

    /// Grow to include another box; empty inputs are ignored
    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.inf(&other.min);
        self.max = self.max.sup(&other.max);
    }

    /// True when the point lies inside or on the boundary
    pub fn contains_point(&self, p: Vec3) -> bool {
        !self.is_empty()
            && p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    /// True when the boxes overlap
    pub fn intersects(&self, other: &Aabb) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// The eight corners, indexed so that bit 0/1/2 of the index selects the
    /// max corner on x/y/z. The complement index (7 - i) is the opposite
    /// corner, which is what plane classification relies on.
    pub fn vertices(&self) -> [Vec3; 8] {
        let mut v = [Vec3::zeros(); 8];
        for (i, vertex) in v.iter_mut().enumerate() {
            vertex.x = if i & 1 != 0 { self.max.x } else { self.min.x };
            vertex.y = if i & 2 != 0 { self.max.y } else { self.min.y };
            vertex.z = if i & 4 != 0 { self.max.z } else { self.min.z };
        }
        v
    }

    /// Box covering this box transformed by a matrix
    pub fn transformed(&self, m: &Mat4) -> Aabb {
        if self.is_empty() {
            return Aabb::empty();
        }
        let mut out = Aabb::empty();
        for v in self.vertices() {
            out.grow_point(m.transform_point(&Point3::from(v)).coords);
        }
        out
    }

    /// Slab test: nearest non-negative ray parameter hitting the box
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;
        for axis in 0..3 {
            let o = ray.origin[axis];
            let d = ray.direction[axis];
            if d.abs() < constants::EPSILON {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
            } else {
                let inv = 1.0 / d;
                let mut t0 = (self.min[axis] - o) * inv;
                let mut t1 = (self.max[axis] - o) * inv;
                if t0 > t1 {
                    std::mem::swap(&mut t0, &mut t1);
                }
                t_min = t_min.max(t0);
                t_max = t_max.min(t1);
                if t_min > t_max {
                    return None;
                }
            }
        }
        if t_max < 0.0 {
            None
        } else {
            Some(t_min.max(0.0))
        }
    }
}

/// Sphere used for broad-phase culling and collision queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    /// Center position
    pub center: Vec3,
    /// Radius, non-negative
    pub radius: f32,
}

impl BoundingSphere {
    /// Create a new bounding sphere
    pub fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }

    /// True when the spheres overlap or touch
    pub fn intersects(&self, other: &BoundingSphere) -> bool {
        let r = self.radius + other.radius;
        (self.center - other.center).norm_squared() <= r * r
    }

    /// True when the point lies inside or on the sphere
    pub fn contains_point(&self, p: Vec3) -> bool {
        (p - self.center).norm_squared() <= self.radius * self.radius
    }
}

/// Relation of a volume to a plane's half-spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Entirely on the positive (normal) side
    Front,
    /// Entirely on the negative side
    Back,
    /// Crosses the plane
    Straddle,
}

/// Plane in normal/distance form: `normal . p + distance = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal, expected unit length for metric distances
    pub normal: Vec3,
    /// Signed distance term
    pub distance: f32,
}

impl Plane {
    /// Create a plane from its coefficients
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Plane through a point with the given normal
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            distance: -normal.dot(&point),
        }
    }

    /// Scale coefficients so the normal is unit length
    pub fn normalize(&mut self) {
        let len = self.normal.norm();
        if len > constants::EPSILON {
            self.normal /= len;
            self.distance /= len;
        }
    }

    /// Copy of the plane with unit-length normal
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.normalize();
        self
    }

    /// Signed distance from the point to the plane
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }

    /// Index (in [`Aabb::vertices`] encoding) of the box corner lying
    /// furthest along the plane normal
    pub fn p_vertex_index(&self) -> usize {
        let mut idx = 0;
        if self.normal.x >= 0.0 {
            idx |= 1;
        }
        if self.normal.y >= 0.0 {
            idx |= 2;
        }
        if self.normal.z >= 0.0 {
            idx |= 4;
        }
        idx
    }

    /// Classify a box against the plane using its p/n vertices
    pub fn classify_aabb(&self, aabb: &Aabb) -> PlaneSide {
        let verts = aabb.vertices();
        let p_idx = self.p_vertex_index();
        if self.distance_to_point(verts[p_idx]) < 0.0 {
            PlaneSide::Back
        } else if self.distance_to_point(verts[7 - p_idx]) < 0.0 {
            PlaneSide::Straddle
        } else {
            PlaneSide::Front
        }
    }
}

/// Barycentric hit on a triangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Ray parameter of the hit, in units of the ray direction length
    pub t: f32,
    /// Barycentric coordinate toward the second vertex
    pub u: f32,
    /// Barycentric coordinate toward the third vertex
    pub v: f32,
}

/// Ray with origin and direction
///
/// The direction is not forced to unit length: picking transforms rays by
/// inverse model matrices and compares hit distances in world space, so local
/// parameters are only ever used to locate points, never as metric distances.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Starting point
    pub origin: Vec3,
    /// Direction, any non-zero length
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at the given ray parameter
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Ray transformed by a matrix (origin as point, direction as vector)
    pub fn transformed(&self, m: &Mat4) -> Ray {
        Ray {
            origin: m.transform_point(&Point3::from(self.origin)).coords,
            direction: m.transform_vector(&self.direction),
        }
    }

    /// Non-negative ray parameter where the ray crosses the plane
    pub fn intersect_plane(&self, plane: &Plane) -> Option<f32> {
        let denom = plane.normal.dot(&self.direction);
        if denom.abs() < constants::EPSILON {
            return None;
        }
        let t = -plane.distance_to_point(self.origin) / denom;
        if t >= 0.0 {
            Some(t)
        } else {
            None
        }
    }

    /// Moeller-Trumbore ray/triangle intersection
    pub fn intersect_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<TriangleHit> {
        let e1 = v1 - v0;
        let e2 = v2 - v0;
        let p = self.direction.cross(&e2);
        let det = e1.dot(&p);
        if det.abs() < constants::EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;
        let s = self.origin - v0;
        let u = s.dot(&p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(&e1);
        let v = self.direction.dot(&q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = e2.dot(&q) * inv_det;
        if t > constants::EPSILON {
            Some(TriangleHit { t, u, v })
        } else {
            None
        }
    }
}

/// Closest point on a triangle to a query point (Voronoi region walk)
pub fn closest_point_on_triangle(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Vec3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a;
    }

    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b;
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return a + ab * v;
    }

    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c;
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return a + ac * w;
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return b + (c - b) * w;
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    a + ab * v + ac * w
}
