//! Grouping and transform nodes
//!
//! Groups cache the combined bounds of their children in their own frame and
//! invalidate the cache from dirty flags, so a static subtree costs one box
//! union per frame instead of a full descent. The same cache feeds frustum
//! culling during the sort pass: a subtree whose box falls entirely outside
//! the camera is not traversed at all.
//!
//! Transforms are groups that additionally compose a local matrix into the
//! traversal state before visiting children. 2D transforms fold into both the
//! flat matrix and the model matrix so flat content stays addressable from 3D
//! passes.

use crate::camera::{cull_aabb, CullResult};
use crate::foundation::geometry::Aabb;
use crate::foundation::math::{constants, Mat3, Mat4, Mat4Ext, Unit, Vec2, Vec3};
use crate::graph::{NodeBehavior, NodeKey};
use crate::traverse::{TraverseCtx, TraverseMode};

/// Plain grouping node, no transform of its own
#[derive(Default)]
pub struct GroupBehavior {
    bounds: Option<Aabb>,
}

impl GroupBehavior {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeBehavior for GroupBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        traverse_group(&mut self.bounds, key, ctx);
    }
}

/// 2D transform: translate, rotate and scale flat content
pub struct Transform2DBehavior {
    pub translation: Vec2,
    /// Rotation around the z axis in radians
    pub rotation: f32,
    pub scale: Vec2,
    bounds: Option<Aabb>,
}

impl Transform2DBehavior {
    pub fn new() -> Self {
        Self {
            translation: Vec2::zeros(),
            rotation: 0.0,
            scale: Vec2::new(1.0, 1.0),
            bounds: None,
        }
    }

    pub fn with_translation(mut self, x: f32, y: f32) -> Self {
        self.translation = Vec2::new(x, y);
        self
    }

    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32) -> Self {
        self.scale = Vec2::new(x, y);
        self
    }

    /// Local matrix, translation applied after rotation after scale
    pub fn matrix(&self) -> Mat3 {
        let mut m = Mat3::new_rotation(self.rotation) * Mat3::new_nonuniform_scaling(&self.scale);
        m[(0, 2)] = self.translation.x;
        m[(1, 2)] = self.translation.y;
        m
    }
}

impl Default for Transform2DBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for Transform2DBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let local = self.matrix();
        let bounds = &mut self.bounds;
        ctx.scoped(|c| {
            c.state.transform *= local;
            c.state.model *= Mat4::from_affine_2d(&local);
            traverse_group(bounds, key, c);
        });
    }
}

/// 3D transform: translate, axis-angle rotate and scale
pub struct Transform3DBehavior {
    pub translation: Vec3,
    pub rotation_axis: Vec3,
    /// Rotation angle in radians
    pub rotation_angle: f32,
    pub scale: Vec3,
    bounds: Option<Aabb>,
}

impl Transform3DBehavior {
    pub fn new() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation_axis: Vec3::y(),
            rotation_angle: 0.0,
            scale: Vec3::new(1.0, 1.0, 1.0),
            bounds: None,
        }
    }

    pub fn with_translation(mut self, x: f32, y: f32, z: f32) -> Self {
        self.translation = Vec3::new(x, y, z);
        self
    }

    pub fn with_rotation(mut self, axis: Vec3, radians: f32) -> Self {
        self.rotation_axis = axis;
        self.rotation_angle = radians;
        self
    }

    pub fn with_scale(mut self, x: f32, y: f32, z: f32) -> Self {
        self.scale = Vec3::new(x, y, z);
        self
    }

    /// Local matrix, translation applied after rotation after scale
    pub fn matrix(&self) -> Mat4 {
        let rotation = if self.rotation_angle == 0.0
            || self.rotation_axis.norm() < constants::EPSILON
        {
            Mat4::identity()
        } else {
            Mat4::from_axis_angle(&Unit::new_normalize(self.rotation_axis), self.rotation_angle)
        };
        Mat4::new_translation(&self.translation)
            * rotation
            * Mat4::new_nonuniform_scaling(&self.scale)
    }
}

impl Default for Transform3DBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for Transform3DBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let local = self.matrix();
        let bounds = &mut self.bounds;
        ctx.scoped(|c| {
            c.state.model *= local;
            traverse_group(bounds, key, c);
        });
    }
}

/// Mode dispatch shared by all grouping nodes
///
/// `bounds` caches the combined child bounds in the node's own frame; the
/// caller has already folded its local transform into the traversal state.
fn traverse_group(bounds: &mut Option<Aabb>, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
    match ctx.state.mode {
        TraverseMode::Bounds => {
            let local = cached_bounds(bounds, key, ctx);
            if !local.is_empty() {
                ctx.state.bbox.union(&local.transformed(&ctx.state.model));
            }
        }
        TraverseMode::Sort => {
            let local = cached_bounds(bounds, key, ctx);
            let cull = classify(&local, ctx);
            if cull == CullResult::Outside {
                return;
            }
            ctx.scoped(|c| {
                c.state.cull = cull;
                c.traverse_children(key);
            });
        }
        TraverseMode::Pick => {
            let local = cached_bounds(bounds, key, ctx);
            if !local.is_empty() && ctx.srv.pick.skip_box(&local.transformed(&ctx.state.model)) {
                return;
            }
            ctx.scoped(|c| c.traverse_children(key));
        }
        _ => ctx.scoped(|c| c.traverse_children(key)),
    }
}

/// Cached local-frame child bounds, rebuilt when dirty flags demand it
fn cached_bounds(cache: &mut Option<Aabb>, key: NodeKey, ctx: &mut TraverseCtx<'_>) -> Aabb {
    if ctx.graph.take_dirty(key).invalidates_bounds() {
        *cache = None;
    }
    match *cache {
        Some(bounds) => bounds,
        None => {
            let computed = ctx.child_bounds(key);
            *cache = Some(computed);
            computed
        }
    }
}

fn classify(local: &Aabb, ctx: &TraverseCtx<'_>) -> CullResult {
    // Empty bounds mean a geometry-free subtree; sounds, sensors and
    // bindables below it still need the visit.
    if local.is_empty() {
        return ctx.state.cull;
    }
    let Some(visual) = ctx.srv.visuals.get(ctx.state.visual) else {
        return ctx.state.cull;
    };
    cull_aabb(
        &visual.camera,
        &local.transformed(&ctx.state.model),
        ctx.state.cull,
        false,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompositorConfig;
    use crate::foundation::math::{Point3, Vec3};
    use crate::graph::{DirtyFlags, NodeKind, SceneGraph, SceneNode};
    use crate::services::Services;
    use crate::traverse::TraverseState;
    use approx::assert_relative_eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Unit box contributor that records which modes visited it
    struct Probe {
        half: f32,
        visits: Rc<RefCell<Vec<TraverseMode>>>,
    }

    impl NodeBehavior for Probe {
        fn traverse(&mut self, _key: NodeKey, ctx: &mut TraverseCtx<'_>) {
            self.visits.borrow_mut().push(ctx.state.mode);
            if ctx.state.mode == TraverseMode::Bounds {
                let local = Aabb::new(
                    Vec3::new(-self.half, -self.half, -self.half),
                    Vec3::new(self.half, self.half, self.half),
                );
                ctx.state.bbox.union(&local.transformed(&ctx.state.model));
            }
        }
    }

    struct Fixture {
        graph: SceneGraph,
        srv: Services,
        visual: crate::render::VisualKey,
        root: NodeKey,
        visits: Rc<RefCell<Vec<TraverseMode>>>,
    }

    fn fixture(build: impl FnOnce(&mut SceneGraph, &mut Services, NodeKey, Box<Probe>)) -> Fixture {
        let mut srv = Services::new(&CompositorConfig::default());
        let visual = srv.create_visual(true, 320.0, 240.0);
        let mut graph = SceneGraph::new();
        let root = graph.insert(
            SceneNode::new(NodeKind::Group).with_behavior(Box::new(GroupBehavior::new())),
            &mut srv,
        );
        graph.set_root(root).unwrap();
        let visits = Rc::new(RefCell::new(Vec::new()));
        let probe = Box::new(Probe {
            half: 0.5,
            visits: Rc::clone(&visits),
        });
        build(&mut graph, &mut srv, root, probe);
        Fixture {
            graph,
            srv,
            visual,
            root,
            visits,
        }
    }

    fn run(f: &mut Fixture, mode: TraverseMode) -> TraverseState {
        let state = {
            let visual = f.srv.visuals.get(f.visual).unwrap();
            TraverseState::for_visual(mode, f.visual, visual)
        };
        let mut ctx = TraverseCtx {
            graph: &mut f.graph,
            srv: &mut f.srv,
            state,
        };
        ctx.traverse_node(f.root);
        ctx.state
    }

    fn count(f: &Fixture, mode: TraverseMode) -> usize {
        f.visits.borrow().iter().filter(|m| **m == mode).count()
    }

    #[test]
    fn bounds_cached_until_dirty() {
        let mut f = fixture(|graph, srv, root, probe| {
            let shape = SceneNode::new(NodeKind::Shape3D).with_behavior(probe);
            graph.insert_child(root, shape, srv).unwrap();
        });
        // Root insertion marks the tree dirty, first pass computes.
        let first = run(&mut f, TraverseMode::Bounds);
        assert_eq!(count(&f, TraverseMode::Bounds), 1);
        assert_relative_eq!(first.bbox.min.x, -0.5);

        // Clean second pass serves the cache without descending.
        let second = run(&mut f, TraverseMode::Bounds);
        assert_eq!(count(&f, TraverseMode::Bounds), 1);
        assert_eq!(second.bbox, first.bbox);

        // Geometry change propagates up and forces a recompute.
        let child = f.graph.child_at(f.root, 0).unwrap();
        f.graph.mark_dirty(child, DirtyFlags::GEOMETRY);
        run(&mut f, TraverseMode::Bounds);
        assert_eq!(count(&f, TraverseMode::Bounds), 2);
    }

    #[test]
    fn transform2d_shifts_bounds_in_model_space() {
        let mut f = fixture(|graph, srv, root, probe| {
            let transform = SceneNode::new(NodeKind::Transform2D)
                .with_behavior(Box::new(Transform2DBehavior::new().with_translation(10.0, 0.0)));
            let t = graph.insert_child(root, transform, srv).unwrap();
            let shape = SceneNode::new(NodeKind::Shape2D).with_behavior(probe);
            graph.insert_child(t, shape, srv).unwrap();
        });
        let state = run(&mut f, TraverseMode::Bounds);
        assert_relative_eq!(state.bbox.min.x, 9.5);
        assert_relative_eq!(state.bbox.max.x, 10.5);
        assert_relative_eq!(state.bbox.min.y, -0.5);
    }

    #[test]
    fn sort_skips_subtree_outside_frustum() {
        let mut f = fixture(|graph, srv, root, probe| {
            let transform = SceneNode::new(NodeKind::Transform3D).with_behavior(Box::new(
                Transform3DBehavior::new().with_translation(-10_000.0, 0.0, 0.0),
            ));
            let t = graph.insert_child(root, transform, srv).unwrap();
            let shape = SceneNode::new(NodeKind::Shape3D).with_behavior(probe);
            graph.insert_child(t, shape, srv).unwrap();
        });
        run(&mut f, TraverseMode::Sort);
        assert_eq!(count(&f, TraverseMode::Sort), 0);
        // Bounds visits happened only to fill the culling cache.
        assert!(count(&f, TraverseMode::Bounds) >= 1);
    }

    #[test]
    fn sort_visits_subtree_inside_frustum() {
        let mut f = fixture(|graph, srv, root, probe| {
            let shape = SceneNode::new(NodeKind::Shape3D).with_behavior(probe);
            graph.insert_child(root, shape, srv).unwrap();
        });
        run(&mut f, TraverseMode::Sort);
        assert_eq!(count(&f, TraverseMode::Sort), 1);
    }

    #[test]
    fn scoped_transform_is_restored_after_children() {
        let mut f = fixture(|graph, srv, root, probe| {
            let transform = SceneNode::new(NodeKind::Transform3D).with_behavior(Box::new(
                Transform3DBehavior::new().with_translation(1.0, 2.0, 3.0),
            ));
            let t = graph.insert_child(root, transform, srv).unwrap();
            let shape = SceneNode::new(NodeKind::Shape3D).with_behavior(probe);
            graph.insert_child(t, shape, srv).unwrap();
        });
        let state = run(&mut f, TraverseMode::Bounds);
        assert_eq!(state.model, Mat4::identity());
        assert_eq!(state.transform, Mat3::identity());
    }

    #[test]
    fn transform3d_composes_scale_rotate_translate() {
        let behavior = Transform3DBehavior::new()
            .with_translation(10.0, 0.0, 0.0)
            .with_rotation(Vec3::z(), constants::PI / 2.0)
            .with_scale(2.0, 2.0, 2.0);
        let p = behavior.matrix().transform_point(&Point3::new(1.0, 0.0, 0.0));
        // Scale doubles x, rotation turns it onto y, translation shifts x.
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 2.0, epsilon = 1e-5);
        assert_relative_eq!(p.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn empty_group_still_traversed_in_sort() {
        let mut f = fixture(|graph, srv, root, _probe| {
            // A child group with no geometry below it.
            let group = SceneNode::new(NodeKind::Group).with_behavior(Box::new(GroupBehavior::new()));
            graph.insert_child(root, group, srv).unwrap();
        });
        // Nothing to assert beyond not panicking and not culling; run both passes.
        run(&mut f, TraverseMode::Bounds);
        let state = run(&mut f, TraverseMode::Sort);
        assert!(state.bbox.is_empty());
    }
}
