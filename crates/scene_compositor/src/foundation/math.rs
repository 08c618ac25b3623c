//! Math utilities and types
//!
//! Provides the fundamental math types shared by the traversal, camera and
//! audio subsystems.

pub use nalgebra::{
    Matrix3, Matrix4,
    Unit,
    Vector2, Vector3,
};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type (2D affine transforms in homogeneous form)
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 2D point type
pub type Point2 = nalgebra::Point2<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Common math constants
pub mod constants {
    /// Pi
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = std::f32::consts::TAU;

    /// Tolerance below which lengths and distances are treated as zero
    pub const EPSILON: f32 = 1e-5;

    /// Conversion factor from degrees to radians
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Conversion factor from radians to degrees
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * constants::RAD_TO_DEG
    }

    /// Linear interpolation between two values
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

/// Extension helpers for building view and projection matrices
pub trait Mat4Ext {
    /// Right-handed look-at view matrix (camera looks down -Z)
    fn view_rh(eye: Point3, target: Point3, up: Vec3) -> Mat4;

    /// Right-handed perspective projection with OpenGL clip conventions
    /// (NDC z in [-1, 1])
    fn perspective_rh(aspect: f32, fov_y: f32, z_near: f32, z_far: f32) -> Mat4;

    /// 2D affine transform lifted into a 4x4 matrix (z untouched)
    fn from_affine_2d(affine: &Mat3) -> Mat4;
}

impl Mat4Ext for Mat4 {
    fn view_rh(eye: Point3, target: Point3, up: Vec3) -> Mat4 {
        Mat4::look_at_rh(&eye, &target, &up)
    }

    fn perspective_rh(aspect: f32, fov_y: f32, z_near: f32, z_far: f32) -> Mat4 {
        Mat4::new_perspective(aspect, fov_y, z_near, z_far)
    }

    fn from_affine_2d(affine: &Mat3) -> Mat4 {
        let m = affine;
        Mat4::new(
            m[(0, 0)], m[(0, 1)], 0.0, m[(0, 2)],
            m[(1, 0)], m[(1, 1)], 0.0, m[(1, 2)],
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lerp_endpoints() {
        assert_relative_eq!(utils::lerp(2.0, 6.0, 0.0), 2.0);
        assert_relative_eq!(utils::lerp(2.0, 6.0, 1.0), 6.0);
        assert_relative_eq!(utils::lerp(2.0, 6.0, 0.5), 4.0);
    }

    #[test]
    fn test_deg_rad_round_trip() {
        assert_relative_eq!(utils::rad_to_deg(utils::deg_to_rad(45.0)), 45.0, epsilon = 1e-4);
    }

    #[test]
    fn test_view_rh_looks_down_negative_z() {
        let view = Mat4::view_rh(Point3::new(0.0, 0.0, 5.0), Point3::origin(), Vec3::y());
        // A point in front of the camera maps to negative view-space z.
        let p = view.transform_point(&Point3::new(0.0, 0.0, 0.0));
        assert!(p.z < 0.0);
        assert_relative_eq!(p.z, -5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_affine_2d_lift() {
        let mut affine = Mat3::identity();
        affine[(0, 2)] = 3.0;
        affine[(1, 2)] = -2.0;
        let m = Mat4::from_affine_2d(&affine);
        let p = m.transform_point(&Point3::new(1.0, 1.0, 0.5));
        assert_relative_eq!(p.x, 4.0);
        assert_relative_eq!(p.y, -1.0);
        assert_relative_eq!(p.z, 0.5);
    }
}
