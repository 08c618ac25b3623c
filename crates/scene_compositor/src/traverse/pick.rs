//! Pick queries over the scene
//!
//! A pick starts from window coordinates, becomes a world-space ray through
//! the camera, and travels the graph in pick mode. Shapes transform the ray
//! into their local frame, intersect their geometry and offer the hit here;
//! the closest offer wins, with later offers winning ties so that geometry
//! drawn on top is picked first.

use crate::foundation::geometry::{Aabb, Ray};
use crate::foundation::math::{constants, Point3, Vec3};
use crate::graph::NodeKey;

/// Resolved pick hit
#[derive(Debug, Clone, PartialEq)]
pub struct PickResult {
    /// Node owning the hit geometry
    pub node: NodeKey,
    /// World-space distance from the ray origin
    pub distance: f32,
    /// Hit point, world space
    pub world_point: Point3,
    /// Hit point in the shape's local frame
    pub local_point: Point3,
    /// Geometric normal at the hit, local frame
    pub normal: Vec3,
    /// Texture coordinates at the hit
    pub uv: [f32; 2],
    /// Pointing sensors enclosing the hit, innermost first
    pub sensors: Vec<NodeKey>,
}

/// In-flight pick query
#[derive(Debug)]
pub struct PickState {
    /// World-space query ray
    pub ray: Ray,
    active: bool,
    best: Option<PickResult>,
    best_sq: f32,
}

impl Default for PickState {
    fn default() -> Self {
        Self {
            ray: Ray::new(Vec3::zeros(), -Vec3::z()),
            active: false,
            best: None,
            best_sq: f32::MAX,
        }
    }
}

impl PickState {
    /// Arm the query with a world-space ray
    pub fn begin(&mut self, ray: Ray) {
        self.ray = ray;
        self.active = true;
        self.best = None;
        self.best_sq = f32::MAX;
    }

    /// True between [`PickState::begin`] and [`PickState::finish`]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Offer a candidate hit; true when it became the best
    ///
    /// Ties within tolerance go to the later offer, so of two coincident
    /// surfaces the one traversed last (drawn on top) wins.
    pub fn consider(
        &mut self,
        node: NodeKey,
        world_point: Point3,
        local_point: Point3,
        normal: Vec3,
        uv: [f32; 2],
        sensors: &[NodeKey],
    ) -> bool {
        let sq = (world_point.coords - self.ray.origin).norm_squared();
        if sq >= self.best_sq + constants::EPSILON {
            return false;
        }
        self.best_sq = sq;
        self.best = Some(PickResult {
            node,
            distance: sq.sqrt(),
            world_point,
            local_point,
            normal,
            uv,
            sensors: {
                let mut chain: Vec<NodeKey> = sensors.to_vec();
                chain.reverse();
                chain
            },
        });
        true
    }

    /// True when a shape with these world bounds cannot beat the best hit
    ///
    /// Either the ray misses the box entirely, or the box starts farther
    /// along the ray than the current best hit.
    pub fn skip_box(&self, world_box: &Aabb) -> bool {
        let Some(t) = world_box.intersect_ray(&self.ray) else {
            return true;
        };
        if self.best.is_none() {
            return false;
        }
        let reach_sq = t * t * self.ray.direction.norm_squared();
        reach_sq >= self.best_sq + constants::EPSILON
    }

    /// Current best hit, if any
    pub fn best(&self) -> Option<&PickResult> {
        self.best.as_ref()
    }

    /// End the query and take the result
    pub fn finish(&mut self) -> Option<PickResult> {
        self.active = false;
        self.best_sq = f32::MAX;
        self.best.take()
    }
}

/// Map window pixel coordinates (origin top-left, y down) to NDC
pub fn screen_to_ndc(x: f32, y: f32, width: f32, height: f32) -> (f32, f32) {
    let w = width.max(1.0);
    let h = height.max(1.0);
    (2.0 * x / w - 1.0, 1.0 - 2.0 * y / h)
}
