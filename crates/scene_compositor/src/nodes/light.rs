//! Light and clip-plane nodes
//!
//! Both are scope nodes rather than drawables. A directional light adds its
//! world-space parameters to the visual during the lighting pass; a clip
//! plane pushes its world-space half-space onto the traversal state during
//! sort and pick, where it rides on recorded mesh commands and vetoes pick
//! hits until the enclosing group scope restores.

use crate::foundation::geometry::Plane;
use crate::foundation::math::{constants, Point3, Vec3};
use crate::graph::{NodeBehavior, NodeKey};
use crate::render::LightParams;
use crate::traverse::{TraverseCtx, TraverseMode};

/// Light shining along a fixed direction, collected per visual
pub struct DirectionalLightBehavior {
    /// Lights that are off contribute nothing
    pub on: bool,
    /// Direction the light travels, local space
    pub direction: Vec3,
    /// Light color, RGB
    pub color: [f32; 3],
    /// Brightness scale
    pub intensity: f32,
    /// Ambient contribution scale
    pub ambient_intensity: f32,
}

impl Default for DirectionalLightBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectionalLightBehavior {
    pub fn new() -> Self {
        Self {
            on: true,
            direction: -Vec3::z(),
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            ambient_intensity: 0.0,
        }
    }
}

impl NodeBehavior for DirectionalLightBehavior {
    fn traverse(&mut self, _key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.state.mode != TraverseMode::Lighting || !self.on {
            return;
        }
        let world = ctx.state.model.transform_vector(&self.direction);
        let norm = world.norm();
        if norm <= constants::EPSILON {
            return;
        }
        let params = LightParams {
            direction: world / norm,
            color: self.color,
            intensity: self.intensity,
            ambient_intensity: self.ambient_intensity,
        };
        if let Some(visual) = ctx.visual() {
            visual.lights.push(params);
        }
    }
}

/// Half-space clip governing the shapes that follow it in its parent group
pub struct ClipPlaneBehavior {
    /// Disabled planes clip nothing
    pub enabled: bool,
    /// Keeps the positive side, local space
    pub plane: Plane,
}

impl Default for ClipPlaneBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipPlaneBehavior {
    pub fn new() -> Self {
        Self {
            enabled: true,
            plane: Plane::new(Vec3::z(), 0.0),
        }
    }

    pub fn with_plane(mut self, plane: Plane) -> Self {
        self.plane = plane;
        self
    }
}

impl NodeBehavior for ClipPlaneBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if !self.enabled {
            return;
        }
        if !matches!(ctx.state.mode, TraverseMode::Sort | TraverseMode::Pick) {
            return;
        }
        // Rebuild the plane from a world-space anchor point and normal so
        // the distance term stays consistent under translation.
        let local = self.plane.normalized();
        let anchor = Point3::from(local.normal * -local.distance);
        let world_point = ctx.state.model.transform_point(&anchor);
        let world_normal = ctx.state.model.transform_vector(&local.normal);
        let norm = world_normal.norm();
        if norm <= constants::EPSILON {
            return;
        }
        let world = Plane::from_point_normal(world_point.coords, world_normal / norm);
        if !ctx.push_clip_plane(world) {
            log::debug!("clip plane limit reached, ignoring plane on {key:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::config::CompositorConfig;
    use crate::foundation::math::Vec3;
    use crate::graph::{NodeKind, SceneGraph, SceneNode};
    use crate::nodes::grouping::{GroupBehavior, Transform3DBehavior};
    use crate::nodes::shape::Shape3DBehavior;
    use crate::render::DrawCommand;
    use crate::services::Services;
    use crate::traverse::{TraverseState, MAX_CLIP_PLANES};
    use approx::assert_relative_eq;

    struct Fixture {
        graph: SceneGraph,
        srv: Services,
        visual: crate::render::VisualKey,
        root: NodeKey,
    }

    fn fixture(root_behavior: Box<dyn NodeBehavior>) -> Fixture {
        let mut srv = Services::new(&CompositorConfig::default());
        let visual = srv.create_visual(true, 320.0, 240.0);
        let mut graph = SceneGraph::new();
        let root = graph.insert(
            SceneNode::new(NodeKind::Transform3D).with_behavior(root_behavior),
            &mut srv,
        );
        graph.set_root(root).unwrap();
        Fixture {
            graph,
            srv,
            visual,
            root,
        }
    }

    fn run_with(
        f: &mut Fixture,
        mode: TraverseMode,
        prepare: impl FnOnce(&mut TraverseCtx<'_>),
    ) {
        let state = {
            let visual = f.srv.visuals.get(f.visual).unwrap();
            TraverseState::for_visual(mode, f.visual, visual)
        };
        let mut ctx = TraverseCtx {
            graph: &mut f.graph,
            srv: &mut f.srv,
            state,
        };
        prepare(&mut ctx);
        ctx.traverse_node(f.root);
    }

    fn run(f: &mut Fixture, mode: TraverseMode) {
        run_with(f, mode, |_| {});
    }

    /// Records the clip planes in scope when visited during sort
    struct PlaneProbe(Rc<RefCell<Vec<Plane>>>);

    impl NodeBehavior for PlaneProbe {
        fn traverse(&mut self, _key: NodeKey, ctx: &mut TraverseCtx<'_>) {
            if ctx.state.mode == TraverseMode::Sort {
                *self.0.borrow_mut() = ctx.state.clip_planes.clone();
            }
        }
    }

    fn add_plane_probe(f: &mut Fixture) -> Rc<RefCell<Vec<Plane>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        f.graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::Group).with_behavior(Box::new(PlaneProbe(seen.clone()))),
                &mut f.srv,
            )
            .unwrap();
        seen
    }

    #[test]
    fn rotated_light_contributes_world_direction() {
        let mut f = fixture(Box::new(
            Transform3DBehavior::new().with_rotation(Vec3::y(), constants::PI / 2.0),
        ));
        f.graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::DirectionalLight)
                    .with_behavior(Box::new(DirectionalLightBehavior::new())),
                &mut f.srv,
            )
            .unwrap();
        run(&mut f, TraverseMode::Lighting);
        let visual = f.srv.visuals.get(f.visual).unwrap();
        assert_eq!(visual.lights.len(), 1);
        let dir = visual.lights[0].direction;
        assert_relative_eq!(dir.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(dir.y, 0.0, epsilon = 1e-5);
        assert_relative_eq!(dir.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn switched_off_light_adds_nothing() {
        let mut f = fixture(Box::new(Transform3DBehavior::new()));
        let mut light = DirectionalLightBehavior::new();
        light.on = false;
        f.graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::DirectionalLight).with_behavior(Box::new(light)),
                &mut f.srv,
            )
            .unwrap();
        run(&mut f, TraverseMode::Lighting);
        assert!(f.srv.visuals.get(f.visual).unwrap().lights.is_empty());
    }

    #[test]
    fn light_is_ignored_outside_lighting_pass() {
        let mut f = fixture(Box::new(Transform3DBehavior::new()));
        f.graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::DirectionalLight)
                    .with_behavior(Box::new(DirectionalLightBehavior::new())),
                &mut f.srv,
            )
            .unwrap();
        run(&mut f, TraverseMode::Sort);
        assert!(f.srv.visuals.get(f.visual).unwrap().lights.is_empty());
    }

    #[test]
    fn clip_plane_travels_with_transform() {
        let mut f = fixture(Box::new(
            Transform3DBehavior::new().with_translation(0.0, 0.0, 5.0),
        ));
        // Local plane keeps z >= 2; under the translation the world boundary
        // sits at z = 7.
        f.graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::ClipPlane).with_behavior(Box::new(
                    ClipPlaneBehavior::new().with_plane(Plane::new(Vec3::z(), -2.0)),
                )),
                &mut f.srv,
            )
            .unwrap();
        let seen = add_plane_probe(&mut f);
        run(&mut f, TraverseMode::Sort);
        let planes = seen.borrow();
        assert_eq!(planes.len(), 1);
        assert_relative_eq!(planes[0].normal.z, 1.0, epsilon = 1e-5);
        assert_relative_eq!(planes[0].distance, -7.0, epsilon = 1e-4);
    }

    #[test]
    fn disabled_plane_is_skipped() {
        let mut f = fixture(Box::new(Transform3DBehavior::new()));
        let mut plane = ClipPlaneBehavior::new();
        plane.enabled = false;
        f.graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::ClipPlane).with_behavior(Box::new(plane)),
                &mut f.srv,
            )
            .unwrap();
        let seen = add_plane_probe(&mut f);
        run(&mut f, TraverseMode::Sort);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn planes_beyond_limit_are_dropped() {
        let mut f = fixture(Box::new(Transform3DBehavior::new()));
        f.graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::ClipPlane)
                    .with_behavior(Box::new(ClipPlaneBehavior::new())),
                &mut f.srv,
            )
            .unwrap();
        let seen = add_plane_probe(&mut f);
        run_with(&mut f, TraverseMode::Sort, |ctx| {
            for _ in 0..MAX_CLIP_PLANES {
                assert!(ctx.push_clip_plane(Plane::new(Vec3::y(), 0.0)));
            }
        });
        let planes = seen.borrow();
        assert_eq!(planes.len(), MAX_CLIP_PLANES);
        assert!(planes.iter().all(|p| p.normal.y == 1.0));
    }

    #[test]
    fn plane_rides_on_mesh_commands() {
        let mut srv = Services::new(&CompositorConfig::default());
        let visual = srv.create_visual(true, 320.0, 240.0);
        let mut graph = SceneGraph::new();
        let root = graph.insert(
            SceneNode::new(NodeKind::Group).with_behavior(Box::new(GroupBehavior::new())),
            &mut srv,
        );
        graph.set_root(root).unwrap();
        graph
            .insert_child(
                root,
                SceneNode::new(NodeKind::ClipPlane)
                    .with_behavior(Box::new(ClipPlaneBehavior::new())),
                &mut srv,
            )
            .unwrap();
        graph
            .insert_child(
                root,
                SceneNode::new(NodeKind::Shape3D)
                    .with_behavior(Box::new(Shape3DBehavior::cube(1.0))),
                &mut srv,
            )
            .unwrap();

        let state = {
            let v = srv.visuals.get(visual).unwrap();
            TraverseState::for_visual(TraverseMode::Sort, visual, v)
        };
        let mut ctx = TraverseCtx {
            graph: &mut graph,
            srv: &mut srv,
            state,
        };
        ctx.traverse_node(root);

        let commands = srv.visuals.get_mut(visual).unwrap().draw.take_ordered();
        assert_eq!(commands.len(), 1);
        match &commands[0] {
            DrawCommand::Mesh3D { clip_planes, .. } => assert_eq!(clip_planes.len(), 1),
            DrawCommand::Rect2D { .. } => panic!("expected a mesh command"),
        }
    }
}
