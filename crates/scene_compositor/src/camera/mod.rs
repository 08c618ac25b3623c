//! Camera state, frustum extraction and viewpoint transitions
//!
//! One camera per visual. It owns the pose and projection parameters, the
//! matrices derived from them, the six world-space frustum planes with their
//! precomputed most-positive-vertex indices, and the navigation/collision
//! scratch the resolver works on between frames.

mod cull;

pub use cull::{cull_aabb, CullResult};

use bitflags::bitflags;

use crate::config::NavigationMode;
use crate::foundation::geometry::{BoundingSphere, Plane, Ray};
use crate::foundation::math::{constants, utils, Mat4, Mat4Ext, Point3, Vec3};

/// Position/orientation/opening of a camera
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    /// Eye position
    pub position: Point3,
    /// Look-at target
    pub target: Point3,
    /// Up hint
    pub up: Vec3,
    /// Vertical field of view in radians
    pub fov: f32,
}

impl Default for CameraPose {
    fn default() -> Self {
        Self {
            position: Point3::new(0.0, 0.0, 10.0),
            target: Point3::origin(),
            up: Vec3::y(),
            fov: constants::PI / 4.0,
        }
    }
}

impl CameraPose {
    /// Linear interpolation between two poses
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        let up = self.up.lerp(&other.up, t);
        let up = if up.norm() < constants::EPSILON {
            other.up
        } else {
            up.normalize()
        };
        Self {
            position: Point3::from(self.position.coords.lerp(&other.position.coords, t)),
            target: Point3::from(self.target.coords.lerp(&other.target.coords, t)),
            up,
            fov: utils::lerp(self.fov, other.fov, t),
        }
    }

    /// Unit view direction
    pub fn direction(&self) -> Vec3 {
        let dir = self.target - self.position;
        if dir.norm() < constants::EPSILON {
            -Vec3::z()
        } else {
            dir.normalize()
        }
    }
}

/// In-flight viewpoint transition
#[derive(Debug, Clone, Copy)]
pub struct ViewpointAnim {
    from: CameraPose,
    to: CameraPose,
    start: f64,
    duration: f64,
}

bitflags! {
    /// Collision probe results for the current resolver step
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CollideFlags: u32 {
        /// Geometry inside the avatar sphere
        const HIT = 1 << 0;
        /// The gravity ray found ground below
        const GROUND = 1 << 1;
    }
}

/// Scratch fields written by Collide traversals, read by the resolver
#[derive(Debug, Clone, Copy)]
pub struct CollisionScratch {
    /// Probe results of the current step
    pub flags: CollideFlags,
    /// Distance to the closest colliding point
    pub dist: f32,
    /// Closest colliding point, world space
    pub point: Point3,
    /// Distance straight down to the ground hit
    pub ground_dist: f32,
    /// Ground hit point, world space
    pub ground_point: Point3,
    /// Ground existed on the previous resolved move
    pub last_had_ground: bool,
}

impl Default for CollisionScratch {
    fn default() -> Self {
        Self {
            flags: CollideFlags::empty(),
            dist: f32::MAX,
            point: Point3::origin(),
            ground_dist: f32::MAX,
            ground_point: Point3::origin(),
            last_had_ground: false,
        }
    }
}

impl CollisionScratch {
    /// Clear probe results for a new move, keeping cross-move state
    pub fn begin_move(&mut self) {
        self.flags = CollideFlags::empty();
        self.dist = f32::MAX;
        self.ground_dist = f32::MAX;
    }

    /// Record a colliding point if it is the closest so far
    pub fn record_hit(&mut self, point: Point3, dist: f32) {
        if dist < self.dist {
            self.flags |= CollideFlags::HIT;
            self.dist = dist;
            self.point = point;
        }
    }

    /// Record a ground candidate if it is the closest so far
    pub fn record_ground(&mut self, point: Point3, dist: f32) {
        if dist < self.ground_dist {
            self.flags |= CollideFlags::GROUND;
            self.ground_dist = dist;
            self.ground_point = point;
        }
    }
}

/// Navigation parameters applied from the bound navigation-info node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NavigationParams {
    /// Active navigation mode
    pub mode: NavigationMode,
    /// Travel speed in scene units per second
    pub speed: f32,
    /// Avatar collision radius
    pub avatar_radius: f32,
    /// Avatar eye height above ground
    pub avatar_height: f32,
    /// Tallest obstacle the avatar steps over
    pub step_height: f32,
    /// Camera-aligned light on
    pub headlight: bool,
    /// Far visibility limit, 0 keeps the default far plane
    pub visibility_limit: f32,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            mode: NavigationMode::Walk,
            speed: 1.0,
            avatar_radius: 0.25,
            avatar_height: 1.6,
            step_height: 0.75,
            headlight: true,
            visibility_limit: 0.0,
        }
    }
}

/// Frustum plane indices in test order
pub mod plane_index {
    /// Near plane
    pub const NEAR: usize = 0;
    /// Far plane
    pub const FAR: usize = 1;
    /// Left plane
    pub const LEFT: usize = 2;
    /// Right plane
    pub const RIGHT: usize = 3;
    /// Bottom plane
    pub const BOTTOM: usize = 4;
    /// Top plane
    pub const TOP: usize = 5;
}

/// Camera of one visual
#[derive(Debug, Clone)]
pub struct Camera {
    /// Perspective 3D camera when true, orthographic 2D otherwise
    pub three_d: bool,
    /// Current pose
    pub pose: CameraPose,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Navigation parameters
    pub nav: NavigationParams,
    /// Collision scratch
    pub collide: CollisionScratch,
    /// Position at the last resolved move
    pub last_pos: Point3,
    anim: Option<ViewpointAnim>,
    viewport: (f32, f32),
    view: Mat4,
    proj: Mat4,
    view_proj: Mat4,
    inv_view_proj: Mat4,
    planes: [Plane; 6],
    p_idx: [usize; 6],
    frustum_sphere: BoundingSphere,
}

impl Camera {
    /// Create a camera with the default pose
    pub fn new(three_d: bool) -> Self {
        let mut camera = Self {
            three_d,
            pose: CameraPose::default(),
            near: 0.1,
            far: 1000.0,
            nav: NavigationParams::default(),
            collide: CollisionScratch::default(),
            last_pos: CameraPose::default().position,
            anim: None,
            viewport: (1.0, 1.0),
            view: Mat4::identity(),
            proj: Mat4::identity(),
            view_proj: Mat4::identity(),
            inv_view_proj: Mat4::identity(),
            planes: [Plane::new(Vec3::z(), 0.0); 6],
            p_idx: [0; 6],
            frustum_sphere: BoundingSphere::new(Vec3::zeros(), 0.0),
        };
        camera.update(1.0, 1.0);
        camera
    }

    /// Recompute matrices, frustum planes and the frustum sphere
    ///
    /// Call after any pose, projection or viewport change and before the
    /// frame's traversal passes.
    pub fn update(&mut self, width: f32, height: f32) {
        self.viewport = (width.max(1.0), height.max(1.0));
        let (w, h) = self.viewport;
        let far = if self.nav.visibility_limit > 0.0 {
            self.nav.visibility_limit
        } else {
            self.far
        };

        if self.three_d {
            self.view = Mat4::view_rh(self.pose.position, self.pose.target, self.pose.up);
            self.proj = Mat4::perspective_rh(w / h, self.pose.fov, self.near, far);
        } else {
            self.view = Mat4::identity();
            self.proj = Mat4::new_orthographic(-w / 2.0, w / 2.0, -h / 2.0, h / 2.0, -far, far);
        }
        self.view_proj = self.proj * self.view;
        self.inv_view_proj = self.view_proj.try_inverse().unwrap_or_else(Mat4::identity);
        self.extract_planes();
        self.update_frustum_sphere(far);
    }

    fn extract_planes(&mut self) {
        let m = &self.view_proj;
        let row = |i: usize| {
            Plane::new(
                Vec3::new(m[(i, 0)], m[(i, 1)], m[(i, 2)]),
                m[(i, 3)],
            )
        };
        let last = row(3);
        let combine = |base: &Plane, sign: f32, other: &Plane| {
            Plane::new(
                base.normal + other.normal * sign,
                base.distance + other.distance * sign,
            )
            .normalized()
        };
        self.planes[plane_index::NEAR] = combine(&last, 1.0, &row(2));
        self.planes[plane_index::FAR] = combine(&last, -1.0, &row(2));
        self.planes[plane_index::LEFT] = combine(&last, 1.0, &row(0));
        self.planes[plane_index::RIGHT] = combine(&last, -1.0, &row(0));
        self.planes[plane_index::BOTTOM] = combine(&last, 1.0, &row(1));
        self.planes[plane_index::TOP] = combine(&last, -1.0, &row(1));
        for (i, plane) in self.planes.iter().enumerate() {
            self.p_idx[i] = plane.p_vertex_index();
        }
    }

    fn update_frustum_sphere(&mut self, far: f32) {
        if !self.three_d {
            let (w, h) = self.viewport;
            self.frustum_sphere = BoundingSphere::new(Vec3::zeros(), (w * w + h * h).sqrt() / 2.0);
            return;
        }
        let dir = self.pose.direction();
        let near_c = self.pose.position.coords + dir * self.near;
        let far_c = self.pose.position.coords + dir * far;
        let center = (near_c + far_c) / 2.0;
        let far_h = (self.pose.fov / 2.0).tan() * far;
        let far_w = far_h * (self.viewport.0 / self.viewport.1);
        let axis = far_c - center;
        let radius = (axis.norm_squared() + far_w * far_w + far_h * far_h).sqrt();
        self.frustum_sphere = BoundingSphere::new(center, radius);
    }

    /// World-to-clip matrix
    pub fn view_proj(&self) -> &Mat4 {
        &self.view_proj
    }

    /// World-to-eye matrix
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// Projection matrix
    pub fn projection(&self) -> &Mat4 {
        &self.proj
    }

    /// Frustum planes in test order (near, far, left, right, bottom, top)
    pub fn planes(&self) -> &[Plane; 6] {
        &self.planes
    }

    /// Most-positive-vertex index of each frustum plane
    pub fn p_indices(&self) -> &[usize; 6] {
        &self.p_idx
    }

    /// Sphere enclosing the whole view frustum
    pub fn frustum_sphere(&self) -> BoundingSphere {
        self.frustum_sphere
    }

    /// Viewport used by the last update
    pub fn viewport(&self) -> (f32, f32) {
        self.viewport
    }

    /// Eye-space depth of a world point, positive in front of the camera
    pub fn depth_of(&self, point: Point3) -> f32 {
        if self.three_d {
            (point - self.pose.position).dot(&self.pose.direction())
        } else {
            -point.z
        }
    }

    /// World-space ray through normalized device coordinates
    ///
    /// Unprojects the near-plane and far-plane points and spans the ray
    /// between them; the direction keeps the near-to-far length.
    pub fn pick_ray(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let near = self
            .inv_view_proj
            .transform_point(&Point3::new(ndc_x, ndc_y, -1.0));
        let far = self
            .inv_view_proj
            .transform_point(&Point3::new(ndc_x, ndc_y, 1.0));
        Ray::new(near.coords, far - near)
    }

    /// Jump or glide to a new pose
    ///
    /// A non-positive duration snaps. While a transition runs the pose is
    /// owned by [`Camera::tick_transition`].
    pub fn start_transition(&mut self, to: CameraPose, now: f64, duration: f64) {
        if duration <= 0.0 {
            self.pose = to;
            self.anim = None;
            return;
        }
        self.anim = Some(ViewpointAnim {
            from: self.pose,
            to,
            start: now,
            duration,
        });
    }

    /// Advance a running transition; true while still animating
    pub fn tick_transition(&mut self, now: f64) -> bool {
        let Some(anim) = self.anim else {
            return false;
        };
        let t = ((now - anim.start) / anim.duration).clamp(0.0, 1.0);
        self.pose = anim.from.lerp(&anim.to, t as f32);
        if t >= 1.0 {
            self.anim = None;
            return false;
        }
        true
    }

    /// True while a viewpoint transition runs
    pub fn is_transitioning(&self) -> bool {
        self.anim.is_some()
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn updated_camera() -> Camera {
        let mut camera = Camera::new(true);
        camera.update(800.0, 600.0);
        camera
    }

    #[test]
    fn test_origin_is_inside_default_frustum() {
        let camera = updated_camera();
        for plane in camera.planes() {
            assert!(
                plane.distance_to_point(Vec3::zeros()) > 0.0,
                "origin should be on the inner side of every plane"
            );
        }
    }

    #[test]
    fn test_point_behind_camera_fails_near_plane() {
        let camera = updated_camera();
        let behind = Vec3::new(0.0, 0.0, 20.0);
        let near = &camera.planes()[plane_index::NEAR];
        assert!(near.distance_to_point(behind) < 0.0);
    }

    #[test]
    fn test_frustum_sphere_covers_clip_range() {
        let camera = updated_camera();
        let sphere = camera.frustum_sphere();
        let dir = camera.pose.direction();
        let near_c = camera.pose.position.coords + dir * camera.near;
        let far_c = camera.pose.position.coords + dir * camera.far;
        assert!(sphere.contains_point(near_c));
        assert!(sphere.contains_point(far_c));
    }

    #[test]
    fn test_center_pick_ray_matches_view_direction() {
        let camera = updated_camera();
        let ray = camera.pick_ray(0.0, 0.0);
        let dir = ray.direction.normalize();
        let view_dir = camera.pose.direction();
        assert_relative_eq!(dir.dot(&view_dir), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn test_transition_interpolates_and_ends() {
        let mut camera = updated_camera();
        let to = CameraPose {
            position: Point3::new(10.0, 0.0, 10.0),
            ..CameraPose::default()
        };
        camera.start_transition(to, 1.0, 2.0);
        assert!(camera.tick_transition(2.0));
        assert_relative_eq!(camera.pose.position.x, 5.0, epsilon = 1e-5);
        assert!(!camera.tick_transition(3.0));
        assert_relative_eq!(camera.pose.position.x, 10.0, epsilon = 1e-5);
        assert!(!camera.is_transitioning());
    }

    #[test]
    fn test_zero_duration_transition_snaps() {
        let mut camera = updated_camera();
        let to = CameraPose {
            position: Point3::new(-3.0, 2.0, 1.0),
            ..CameraPose::default()
        };
        camera.start_transition(to, 5.0, 0.0);
        assert!(!camera.is_transitioning());
        assert_relative_eq!(camera.pose.position.x, -3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_visibility_limit_overrides_far() {
        let mut camera = Camera::new(true);
        camera.nav.visibility_limit = 50.0;
        camera.update(800.0, 600.0);
        let beyond = Vec3::new(0.0, 0.0, -60.0);
        let far = &camera.planes()[plane_index::FAR];
        assert!(far.distance_to_point(beyond) < 0.0);
    }

    #[test]
    fn test_2d_camera_covers_viewport() {
        let mut camera = Camera::new(false);
        camera.update(400.0, 300.0);
        let inside = Vec3::new(150.0, -100.0, 0.0);
        let outside = Vec3::new(250.0, 0.0, 0.0);
        let left = &camera.planes()[plane_index::LEFT];
        let right = &camera.planes()[plane_index::RIGHT];
        assert!(left.distance_to_point(inside) > 0.0);
        assert!(right.distance_to_point(inside) > 0.0);
        assert!(right.distance_to_point(outside) < 0.0);
    }

    #[test]
    fn test_depth_increases_away_from_camera() {
        let camera = updated_camera();
        let near_point = Point3::new(0.0, 0.0, 5.0);
        let far_point = Point3::new(0.0, 0.0, -5.0);
        assert!(camera.depth_of(far_point) > camera.depth_of(near_point));
    }
}
