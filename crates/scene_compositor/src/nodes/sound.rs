//! Sound grouping nodes
//!
//! Sound nodes do not emit audio themselves; they compute per-channel gains
//! during the sort pass and leave them in the traversal state for the audio
//! clips below them. A clip picks the gains up and writes them into its pipe,
//! so the mixer sees the result on the next render window without any extra
//! synchronization.

use crate::audio::pipe::ChannelGains;
use crate::audio::spatial::Spatializer;
use crate::foundation::math::{Point3, Vec3};
use crate::graph::{NodeBehavior, NodeKey};
use crate::traverse::{TraverseCtx, TraverseMode};

/// Flat intensity scaling for 2D scenes
pub struct Sound2DBehavior {
    /// Gain applied to all channels, clamped to [0, 1]
    pub intensity: f32,
}

impl Sound2DBehavior {
    pub fn new() -> Self {
        Self { intensity: 1.0 }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = intensity;
        self
    }
}

impl Default for Sound2DBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for Sound2DBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.state.mode == TraverseMode::Sort {
            let gains = ChannelGains::splat(self.intensity.clamp(0.0, 1.0));
            ctx.scoped(|c| {
                c.state.gains = Some(gains);
                c.traverse_children(key);
            });
        } else {
            ctx.scoped(|c| c.traverse_children(key));
        }
    }
}

/// Positional sound with ellipsoidal attenuation and stereo panning
pub struct Sound3DBehavior {
    /// Attenuation and panning parameters
    pub spatializer: Spatializer,
}

impl Sound3DBehavior {
    pub fn new() -> Self {
        Self {
            spatializer: Spatializer::default(),
        }
    }

    pub fn with_spatializer(mut self, spatializer: Spatializer) -> Self {
        self.spatializer = spatializer;
        self
    }

    /// Channel gains for the current listener, or `None` without a camera
    fn compute_gains(&self, ctx: &TraverseCtx<'_>) -> Option<ChannelGains> {
        let visual = ctx.srv.visuals.get(ctx.state.visual)?;
        let camera = &visual.camera;
        let listener = camera.pose.position;

        let inverse = ctx.state.model.try_inverse()?;
        let listener_local = inverse.transform_point(&listener);
        let gain = self.spatializer.distance_gain(listener_local.coords);

        // Azimuth of the source in listener space, positive to the right.
        let source = ctx.state.model.transform_point(&Point3::origin());
        let to_source = source - listener;
        let forward = camera.pose.direction();
        let right = forward.cross(&camera.pose.up);
        let right = if right.norm() < f32::EPSILON {
            Vec3::x()
        } else {
            right.normalize()
        };
        let azimuth = to_source.dot(&right).atan2(to_source.dot(&forward));

        Some(self.spatializer.channel_gains(gain, azimuth))
    }
}

impl Default for Sound3DBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for Sound3DBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.state.mode == TraverseMode::Sort {
            let gains = self.compute_gains(ctx);
            ctx.scoped(|c| {
                if gains.is_some() {
                    c.state.gains = gains;
                }
                c.traverse_children(key);
            });
        } else {
            ctx.scoped(|c| c.traverse_children(key));
        }
    }
}
