//! Hierarchical frustum culling
//!
//! Classification is conservative: geometry is only ever rejected when its
//! world-space box provably lies outside one frustum plane. A subtree
//! classified Inside short-circuits every descendant test.

use super::{plane_index, Camera};
use crate::foundation::geometry::Aabb;

/// Relation of a subtree's bounds to the view frustum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullResult {
    /// Entirely outside, skip the subtree
    Outside,
    /// Partially visible, descendants keep testing
    Intersects,
    /// Entirely inside, descendants skip plane tests
    Inside,
}

/// Classify a world-space box against the camera frustum
///
/// `skip_near_far` drops the near/far planes for backward-looking queries;
/// 2D cameras drop them always. The test order is sphere reject, then per
/// plane a sphere test refined by the box's p-vertex and n-vertex.
pub fn cull_aabb(
    camera: &Camera,
    world_bbox: &Aabb,
    inherited: CullResult,
    skip_near_far: bool,
) -> CullResult {
    if inherited == CullResult::Inside {
        return CullResult::Inside;
    }
    if world_bbox.is_empty() {
        return CullResult::Outside;
    }
    // Geometry around the eye can never be culled.
    if world_bbox.contains_point(camera.pose.position.coords) {
        return CullResult::Intersects;
    }

    let sphere = world_bbox.bounding_sphere();
    if camera.three_d && !camera.frustum_sphere().intersects(&sphere) {
        return CullResult::Outside;
    }

    let skip_nf = skip_near_far || !camera.three_d;
    let verts = world_bbox.vertices();
    let mut result = CullResult::Inside;
    for (i, plane) in camera.planes().iter().enumerate() {
        let is_near_far = i == plane_index::NEAR || i == plane_index::FAR;
        if skip_nf && is_near_far {
            continue;
        }
        let center_dist = plane.distance_to_point(sphere.center);
        if center_dist + sphere.radius < 0.0 {
            return CullResult::Outside;
        }
        if center_dist >= sphere.radius {
            continue;
        }
        // Sphere straddles; refine with the box corners.
        let p_idx = camera.p_indices()[i];
        if plane.distance_to_point(verts[p_idx]) < 0.0 {
            return CullResult::Outside;
        }
        if !is_near_far && plane.distance_to_point(verts[7 - p_idx]) < 0.0 {
            result = CullResult::Intersects;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;

    fn camera_3d() -> Camera {
        let mut camera = Camera::new(true);
        camera.update(800.0, 600.0);
        camera
    }

    fn cube(center: Vec3, half: f32) -> Aabb {
        Aabb::from_center_extents(center, Vec3::new(half, half, half))
    }

    #[test]
    fn test_empty_box_is_outside() {
        let camera = camera_3d();
        let r = cull_aabb(&camera, &Aabb::empty(), CullResult::Intersects, false);
        assert_eq!(r, CullResult::Outside);
    }

    #[test]
    fn test_box_behind_camera_is_outside() {
        let camera = camera_3d();
        let behind = cube(Vec3::new(0.0, 0.0, 20.0), 1.0);
        let r = cull_aabb(&camera, &behind, CullResult::Intersects, false);
        assert_eq!(r, CullResult::Outside);
    }

    #[test]
    fn test_small_box_ahead_is_inside() {
        let camera = camera_3d();
        let ahead = cube(Vec3::zeros(), 1.0);
        let r = cull_aabb(&camera, &ahead, CullResult::Intersects, false);
        assert_eq!(r, CullResult::Inside);
    }

    #[test]
    fn test_box_straddling_side_plane_intersects() {
        let camera = camera_3d();
        // Frustum half-width at z=0 is tan(fov/2) * 10 * aspect, about 5.5.
        let straddling = cube(Vec3::new(6.0, 0.0, 0.0), 2.0);
        let r = cull_aabb(&camera, &straddling, CullResult::Intersects, false);
        assert_eq!(r, CullResult::Intersects);
    }

    #[test]
    fn test_box_far_to_the_side_is_outside() {
        let camera = camera_3d();
        let aside = cube(Vec3::new(40.0, 0.0, 0.0), 1.0);
        let r = cull_aabb(&camera, &aside, CullResult::Intersects, false);
        assert_eq!(r, CullResult::Outside);
    }

    #[test]
    fn test_box_around_camera_never_culled() {
        let camera = camera_3d();
        let around = cube(camera.pose.position.coords, 0.5);
        let r = cull_aabb(&camera, &around, CullResult::Intersects, false);
        assert_eq!(r, CullResult::Intersects);
    }

    #[test]
    fn test_inherited_inside_short_circuits() {
        let camera = camera_3d();
        let anywhere = cube(Vec3::new(1000.0, 0.0, 0.0), 1.0);
        let r = cull_aabb(&camera, &anywhere, CullResult::Inside, false);
        assert_eq!(r, CullResult::Inside);
    }

    #[test]
    fn test_2d_camera_ignores_depth() {
        let mut camera = Camera::new(false);
        camera.update(400.0, 300.0);
        let tall = Aabb::from_center_extents(Vec3::zeros(), Vec3::new(10.0, 10.0, 5000.0));
        let r = cull_aabb(&camera, &tall, CullResult::Intersects, false);
        assert_eq!(r, CullResult::Inside);

        let off_screen = cube(Vec3::new(500.0, 0.0, 0.0), 10.0);
        let r = cull_aabb(&camera, &off_screen, CullResult::Intersects, false);
        assert_eq!(r, CullResult::Outside);
    }

    #[test]
    fn test_skip_near_far_keeps_box_between_eye_and_near_plane() {
        // Eye sits at z=10 with near 0.1, so the near plane is at z=9.9.
        let camera = camera_3d();
        let close = cube(Vec3::new(0.0, 0.0, 9.97), 0.01);
        let strict = cull_aabb(&camera, &close, CullResult::Intersects, false);
        assert_eq!(strict, CullResult::Outside);
        let relaxed = cull_aabb(&camera, &close, CullResult::Intersects, true);
        assert_ne!(relaxed, CullResult::Outside);
    }
}
