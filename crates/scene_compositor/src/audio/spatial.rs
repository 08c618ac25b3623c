//! Ellipsoidal distance gain and stereo panning
//!
//! A sound's audible field is described by two nested ellipsoids sharing a
//! focus at the sound position, stretched along its direction axis: full gain
//! inside the inner (min-back/min-front) surface, silence outside the outer
//! (max-back/max-front) one, and an exponential falloff in between reaching
//! -20 dB at the outer boundary. Pan derives from the listener-space azimuth
//! of the source with constant-power left/right curves.

use crate::audio::pipe::ChannelGains;
use crate::foundation::math::{constants, Vec3};

/// Attenuation ellipsoid pair along the sound's direction axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundShape {
    /// Inner ellipsoid extent behind the sound
    pub min_back: f32,
    /// Inner ellipsoid extent in front of the sound
    pub min_front: f32,
    /// Outer ellipsoid extent behind the sound
    pub max_back: f32,
    /// Outer ellipsoid extent in front of the sound
    pub max_front: f32,
}

impl Default for SoundShape {
    fn default() -> Self {
        Self {
            min_back: 1.0,
            min_front: 1.0,
            max_back: 10.0,
            max_front: 10.0,
        }
    }
}

/// One ellipsoid with a focus at the origin, extending `back` along -axis and
/// `front` along +axis. Radial symmetry around the axis reduces every query to
/// the (axial, radial) half-plane.
#[derive(Debug, Clone, Copy)]
struct Ellipsoid {
    /// Semi-major axis
    a: f32,
    /// Center offset from the focus along the axis
    c: f32,
    /// Squared semi-minor axis
    b_sq: f32,
}

impl Ellipsoid {
    fn new(back: f32, front: f32) -> Self {
        let back = back.max(0.0);
        let front = front.max(0.0);
        let a = (front + back) * 0.5;
        let c = (front - back) * 0.5;
        Self {
            a,
            c,
            b_sq: (a * a - c * c).max(0.0),
        }
    }

    /// True when the point (axial z, radial^2 r_sq) lies inside
    fn contains(&self, z: f32, r_sq: f32) -> bool {
        if self.a < constants::EPSILON {
            return z.abs() < constants::EPSILON && r_sq < constants::EPSILON;
        }
        let dz = z - self.c;
        if self.b_sq < constants::EPSILON {
            // Degenerate segment along the axis.
            return r_sq < constants::EPSILON && dz.abs() <= self.a;
        }
        dz * dz / (self.a * self.a) + r_sq / self.b_sq <= 1.0
    }

    /// Distance from the focus to the surface along the unit direction
    /// (dz axial component, dr_sq squared radial component)
    fn exit_distance(&self, dz: f32, dr_sq: f32) -> f32 {
        if self.a < constants::EPSILON {
            return 0.0;
        }
        let a_sq = self.a * self.a;
        if self.b_sq < constants::EPSILON {
            // Degenerate segment: meaningful exit only along the axis.
            return if dz > 0.0 { self.c + self.a } else { self.a - self.c };
        }
        let qa = dz * dz / a_sq + dr_sq / self.b_sq;
        let qb = -2.0 * self.c * dz / a_sq;
        let qc = self.c * self.c / a_sq - 1.0;
        if qa < constants::EPSILON {
            return 0.0;
        }
        let disc = (qb * qb - 4.0 * qa * qc).max(0.0);
        // The focus lies inside, so the positive root is the exit.
        (-qb + disc.sqrt()) / (2.0 * qa)
    }
}

/// Per-source spatialization parameters and gain math
#[derive(Debug, Clone, PartialEq)]
pub struct Spatializer {
    /// Overall source intensity in [0, 1]
    pub intensity: f32,
    /// Attenuation ellipsoid pair
    pub shape: SoundShape,
    /// Direction axis in the sound's local space
    pub direction: Vec3,
    /// Whether directional panning applies (otherwise gain only)
    pub spatialize: bool,
}

impl Default for Spatializer {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            shape: SoundShape::default(),
            direction: Vec3::z(),
            spatialize: true,
        }
    }
}

impl Spatializer {
    /// Distance gain for a listener position given in the sound's local space
    pub fn distance_gain(&self, listener_local: Vec3) -> f32 {
        let axis_len = self.direction.norm();
        let axis = if axis_len < constants::EPSILON {
            Vec3::z()
        } else {
            self.direction / axis_len
        };

        let dist_sq = listener_local.norm_squared();
        if dist_sq < constants::EPSILON * constants::EPSILON {
            return 1.0;
        }

        let z = listener_local.dot(&axis);
        let r_sq = (dist_sq - z * z).max(0.0);

        let inner = Ellipsoid::new(self.shape.min_back, self.shape.min_front);
        if inner.contains(z, r_sq) {
            return 1.0;
        }
        let outer = Ellipsoid::new(self.shape.max_back, self.shape.max_front);
        if !outer.contains(z, r_sq) {
            return 0.0;
        }

        // Falloff over the normalized span between the two boundaries along
        // the ray from the focus through the listener.
        let dist = dist_sq.sqrt();
        let dz = z / dist;
        let dr_sq = r_sq / dist_sq;
        let t_inner = inner.exit_distance(dz, dr_sq);
        let t_outer = outer.exit_distance(dz, dr_sq);
        let span = t_outer - t_inner;
        let frac = if span < constants::EPSILON {
            1.0
        } else {
            ((dist - t_inner) / span).clamp(0.0, 1.0)
        };
        10.0_f32.powf(-frac)
    }

    /// Map a signed listener-space azimuth (0 ahead, positive toward the
    /// right ear) into a [0, 1] pan position
    pub fn stereo_pan(azimuth: f32) -> f32 {
        (0.5 * (1.0 + azimuth.sin())).clamp(0.0, 1.0)
    }

    /// Per-channel gain vector for this source
    ///
    /// Stereo outputs get constant-power panning on the first two channels;
    /// remaining channels receive the flat distance gain.
    pub fn channel_gains(&self, distance_gain: f32, azimuth: f32) -> ChannelGains {
        let g = (distance_gain * self.intensity).clamp(0.0, 1.0);
        if !self.spatialize {
            return ChannelGains::splat(g);
        }
        let pan = Self::stereo_pan(azimuth);
        let angle = pan * constants::PI / 2.0;
        let mut gains = ChannelGains::splat(g);
        gains.gains[0] = g * angle.cos();
        gains.gains[1] = g * angle.sin();
        gains.identity = gains.gains.iter().all(|v| (*v - 1.0).abs() < 1e-6);
        gains
    }
}
