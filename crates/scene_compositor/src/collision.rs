//! Camera collision and gravity resolution
//!
//! Runs between bindable application and the sort pass whenever the camera
//! moved. The move from the last resolved position is cut into steps no
//! longer than the avatar radius so thin geometry cannot be tunnelled
//! through; each step probes the scene in collide mode and the first hit
//! resolves the move according to the configured policy. Ground snapping
//! rides the first step's downward probe.

use crate::camera::CollideFlags;
use crate::config::{CollisionMode, NavigationMode};
use crate::foundation::math::{constants, Vec3};
use crate::graph::{NodeKey, SceneGraph};
use crate::render::VisualKey;
use crate::services::Services;
use crate::traverse::{TraverseCtx, TraverseMode, TraverseState};

/// Upper bound on probe steps for one move
const MAX_STEPS: u32 = 64;

/// Ground gap below which the avatar counts as standing
const GROUND_TOLERANCE: f32 = 0.01;

/// What the resolver did to the camera this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollisionOutcome {
    /// A probe step hit geometry
    pub collided: bool,
    /// The move was fully reverted
    pub reverted: bool,
    /// The avatar was snapped onto ground
    pub grounded: bool,
}

/// Resolve the camera move of a visual against the scene
///
/// Reads the move from `camera.last_pos` to the current pose, adjusts the
/// pose in place and refreshes `last_pos`. Returns what happened so the
/// caller can log or redraw.
pub fn resolve_camera_move(
    graph: &mut SceneGraph,
    srv: &mut Services,
    visual_key: VisualKey,
    root: NodeKey,
    mode: CollisionMode,
    gravity: bool,
) -> CollisionOutcome {
    let mut outcome = CollisionOutcome::default();

    let Some(visual) = srv.visuals.get_mut(visual_key) else {
        return outcome;
    };
    let camera = &mut visual.camera;
    let wanted = camera.pose.position;
    let last = camera.last_pos;
    let nav = camera.nav;

    let excluded = mode == CollisionMode::Disabled
        || matches!(nav.mode, NavigationMode::None | NavigationMode::Examine);
    let move_vec = wanted - last;
    let len = move_vec.norm();
    if excluded || len < constants::EPSILON {
        camera.last_pos = wanted;
        return outcome;
    }

    let radius = nav.avatar_radius.max(constants::EPSILON);
    let steps = ((len / radius).ceil() as u32).clamp(1, MAX_STEPS);
    let step_vec = move_vec / steps as f32;
    let use_gravity = gravity && nav.mode == NavigationMode::Walk;

    camera.collide.begin_move();
    let mut resolved = wanted;
    for step in 0..steps {
        let candidate = last + step_vec * (step + 1) as f32;
        {
            let Some(visual) = srv.visuals.get_mut(visual_key) else {
                return outcome;
            };
            visual.camera.pose.position = candidate;
        }

        let Some(visual) = srv.visuals.get(visual_key) else {
            return outcome;
        };
        let mut state = TraverseState::for_visual(TraverseMode::Collide, visual_key, visual);
        state.collide_gravity = use_gravity && step == 0;
        let mut ctx = TraverseCtx {
            graph: &mut *graph,
            srv: &mut *srv,
            state,
        };
        ctx.traverse_node(root);

        let Some(visual) = srv.visuals.get_mut(visual_key) else {
            return outcome;
        };
        let camera = &mut visual.camera;
        if camera.collide.flags.contains(CollideFlags::HIT) {
            outcome.collided = true;
            match mode {
                CollisionMode::Normal | CollisionMode::Disabled => {
                    resolved = last;
                    outcome.reverted = true;
                }
                CollisionMode::Displacement => {
                    let hit = camera.collide.point;
                    let away = candidate - hit;
                    let away = if away.norm() < constants::EPSILON {
                        Vec3::y()
                    } else {
                        away.normalize()
                    };
                    let mut slid = hit + away * radius;
                    let offset = slid - candidate;
                    if offset.norm() > radius {
                        slid = candidate + offset.normalize() * radius;
                    }
                    resolved = slid;
                }
            }
            log::debug!(
                "collision at step {}/{}: dist {:.4}, {}",
                step + 1,
                steps,
                camera.collide.dist,
                if outcome.reverted { "reverted" } else { "displaced" }
            );
            break;
        }
    }

    let Some(visual) = srv.visuals.get_mut(visual_key) else {
        return outcome;
    };
    let camera = &mut visual.camera;
    let shift = resolved - wanted;
    camera.pose.position = resolved;
    camera.pose.target += shift;

    if use_gravity {
        if camera.collide.flags.contains(CollideFlags::GROUND) {
            let gap = camera.collide.ground_point.y + nav.avatar_height - camera.pose.position.y;
            if gap > nav.step_height {
                // Too tall to climb; undo the whole move instead.
                let back = last - camera.pose.position;
                camera.pose.position = last;
                camera.pose.target += back;
                outcome.reverted = true;
                log::debug!("obstacle above step height ({gap:.3}), move reverted");
            } else if gap.abs() > GROUND_TOLERANCE {
                camera.pose.position.y += gap;
                camera.pose.target.y += gap;
                outcome.grounded = true;
            }
            camera.collide.last_had_ground = true;
        } else if camera.collide.last_had_ground {
            camera.collide.last_had_ground = false;
            log::debug!("ground lost, gravity released");
        }
    }

    camera.last_pos = camera.pose.position;
    if outcome.collided || outcome.grounded {
        srv.request_redraw();
    }
    outcome
}
