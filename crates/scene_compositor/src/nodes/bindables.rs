//! Bindable scene nodes
//!
//! All four kinds share the stack protocol in [`crate::bind`]: the first
//! traversal under a visual registers the node on that visual's stack of its
//! kind, and from then on only the bound member contributes during the
//! bindable-eval pass. Contributions are re-applied every frame into state
//! that [`Visual::begin_frame`](crate::render::Visual::begin_frame) clears,
//! except the viewpoint, which applies once per bind edge and then leaves
//! the camera to navigation.

use crate::bind::BindableState;
use crate::camera::{CameraPose, NavigationParams};
use crate::foundation::geometry::Rect;
use crate::foundation::math::Mat3;
use crate::graph::{NodeBehavior, NodeKey, NodeKind};
use crate::render::{DrawCommand, FogParams, Paint};
use crate::services::Services;
use crate::traverse::{TraverseCtx, TraverseMode};

use super::media_nodes::movie_child;
use super::shape::replay_2d;

fn unregister(bindable: &BindableState, key: NodeKey, srv: &mut Services) {
    if let Some(stack) = bindable.stack {
        srv.stacks.remove_node(stack, key, bindable.bound);
    }
}

/// Bindable clear color, with an optional movie-texture backdrop
pub struct BackgroundBehavior {
    bindable: BindableState,
    /// Clear color while bound
    pub color: [f32; 4],
}

impl BackgroundBehavior {
    pub fn new(color: [f32; 4]) -> Self {
        Self {
            bindable: BindableState::default(),
            color,
        }
    }
}

impl NodeBehavior for BackgroundBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        match ctx.state.mode {
            TraverseMode::BindableEval => {
                if self.bindable.stack.is_none() {
                    self.bindable.ensure_registered(key, NodeKind::Background, ctx);
                    return;
                }
                if !self.bindable.bound {
                    return;
                }
                let movie = movie_child(ctx.graph, key).is_some();
                let Some(visual) = ctx.visual() else {
                    return;
                };
                visual.clear_color = self.color;
                if movie {
                    // The backdrop covers the whole visual and is drawn
                    // before any sorted command; the frame is resolved when
                    // the flush replays this command through the node.
                    let rect = Rect::from_center(0.0, 0.0, visual.width, visual.height);
                    visual.backdrop = Some(DrawCommand::Rect2D {
                        node: key,
                        rect,
                        transform: Mat3::identity(),
                        clip: rect,
                        paint: Paint::default(),
                    });
                }
            }
            TraverseMode::Draw2d => replay_2d(key, ctx),
            _ => {}
        }
    }

    fn detached(&mut self, key: NodeKey, srv: &mut Services) {
        unregister(&self.bindable, key, srv);
    }

    fn bindable_mut(&mut self) -> Option<&mut BindableState> {
        Some(&mut self.bindable)
    }
}

/// Bindable camera pose
pub struct ViewpointBehavior {
    bindable: BindableState,
    /// Pose the camera takes when this node binds
    pub pose: CameraPose,
    last_applied: Option<f64>,
}

impl ViewpointBehavior {
    pub fn new(pose: CameraPose) -> Self {
        Self {
            bindable: BindableState::default(),
            pose,
            last_applied: None,
        }
    }
}

impl NodeBehavior for ViewpointBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.state.mode != TraverseMode::BindableEval {
            return;
        }
        if self.bindable.stack.is_none() {
            self.bindable.ensure_registered(key, NodeKind::Viewpoint, ctx);
            return;
        }
        if !self.bindable.bound {
            return;
        }
        // One application per bind edge; afterwards navigation owns the pose.
        if self.last_applied == Some(self.bindable.bind_time) {
            return;
        }
        self.last_applied = Some(self.bindable.bind_time);
        let now = ctx.srv.time.now();
        let duration = f64::from(ctx.srv.viewpoint_transition);
        if let Some(visual) = ctx.visual() {
            visual.camera.start_transition(self.pose, now, duration);
        }
        ctx.srv.request_redraw();
    }

    fn detached(&mut self, key: NodeKey, srv: &mut Services) {
        unregister(&self.bindable, key, srv);
    }

    fn bindable_mut(&mut self) -> Option<&mut BindableState> {
        Some(&mut self.bindable)
    }
}

/// Bindable navigation parameters
pub struct NavigationInfoBehavior {
    bindable: BindableState,
    /// Parameters applied while bound
    pub params: NavigationParams,
}

impl NavigationInfoBehavior {
    pub fn new(params: NavigationParams) -> Self {
        Self {
            bindable: BindableState::default(),
            params,
        }
    }
}

impl NodeBehavior for NavigationInfoBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.state.mode != TraverseMode::BindableEval {
            return;
        }
        if self.bindable.stack.is_none() {
            self.bindable
                .ensure_registered(key, NodeKind::NavigationInfo, ctx);
            return;
        }
        if !self.bindable.bound {
            return;
        }
        if let Some(visual) = ctx.visual() {
            visual.camera.nav = self.params;
        }
    }

    fn detached(&mut self, key: NodeKey, srv: &mut Services) {
        unregister(&self.bindable, key, srv);
    }

    fn bindable_mut(&mut self) -> Option<&mut BindableState> {
        Some(&mut self.bindable)
    }
}

/// Bindable fog parameters
pub struct FogBehavior {
    bindable: BindableState,
    /// Parameters applied while bound
    pub params: FogParams,
}

impl FogBehavior {
    pub fn new(params: FogParams) -> Self {
        Self {
            bindable: BindableState::default(),
            params,
        }
    }
}

impl NodeBehavior for FogBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.state.mode != TraverseMode::BindableEval {
            return;
        }
        if self.bindable.stack.is_none() {
            self.bindable.ensure_registered(key, NodeKind::Fog, ctx);
            return;
        }
        if !self.bindable.bound {
            return;
        }
        if let Some(visual) = ctx.visual() {
            visual.fog = Some(self.params);
        }
    }

    fn detached(&mut self, key: NodeKey, srv: &mut Services) {
        unregister(&self.bindable, key, srv);
    }

    fn bindable_mut(&mut self) -> Option<&mut BindableState> {
        Some(&mut self.bindable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::apply_set_bind;
    use crate::config::CompositorConfig;
    use crate::events::CompositorEvent;
    use crate::foundation::math::Point3;
    use crate::graph::{SceneGraph, SceneNode};
    use crate::nodes::grouping::GroupBehavior;
    use crate::render::FogKind;
    use crate::traverse::TraverseState;
    use approx::assert_relative_eq;

    struct Fixture {
        graph: SceneGraph,
        srv: Services,
        visual: crate::render::VisualKey,
        root: NodeKey,
    }

    fn fixture() -> Fixture {
        let mut srv = Services::new(&CompositorConfig::default());
        let visual = srv.create_visual(true, 320.0, 240.0);
        let mut graph = SceneGraph::new();
        let root = graph.insert(
            SceneNode::new(NodeKind::Group).with_behavior(Box::new(GroupBehavior::new())),
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

    fn add(f: &mut Fixture, kind: NodeKind, behavior: Box<dyn NodeBehavior>) -> NodeKey {
        f.graph
            .insert_child(f.root, SceneNode::new(kind).with_behavior(behavior), &mut f.srv)
            .unwrap()
    }

    /// One frame's bindable handling: requests, frame reset, then the pass
    fn eval(f: &mut Fixture) {
        for (node, value) in f.srv.stacks.take_requests() {
            apply_set_bind(&mut f.graph, &mut f.srv, node, value);
        }
        f.srv.visuals.get_mut(f.visual).unwrap().begin_frame();
        let state = {
            let visual = f.srv.visuals.get(f.visual).unwrap();
            TraverseState::for_visual(TraverseMode::BindableEval, f.visual, visual)
        };
        let mut ctx = TraverseCtx {
            graph: &mut f.graph,
            srv: &mut f.srv,
            state,
        };
        ctx.traverse_node(f.root);
    }

    #[test]
    fn background_binds_then_contributes() {
        let mut f = fixture();
        let bg = add(
            &mut f,
            NodeKind::Background,
            Box::new(BackgroundBehavior::new([1.0, 0.0, 0.0, 1.0])),
        );

        eval(&mut f);
        let events = f.srv.events.drain();
        assert!(events.contains(&CompositorEvent::NodeBound { node: bg, bound: true }));
        let first = f.srv.visuals.get(f.visual).unwrap().clear_color;
        assert_eq!(first, [0.0, 0.0, 0.0, 1.0]);

        eval(&mut f);
        let second = f.srv.visuals.get(f.visual).unwrap().clear_color;
        assert_eq!(second, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn only_the_stack_front_contributes() {
        let mut f = fixture();
        add(
            &mut f,
            NodeKind::Background,
            Box::new(BackgroundBehavior::new([1.0, 0.0, 0.0, 1.0])),
        );
        let second = add(
            &mut f,
            NodeKind::Background,
            Box::new(BackgroundBehavior::new([0.0, 1.0, 0.0, 1.0])),
        );

        eval(&mut f);
        eval(&mut f);
        assert_eq!(
            f.srv.visuals.get(f.visual).unwrap().clear_color,
            [1.0, 0.0, 0.0, 1.0]
        );

        apply_set_bind(&mut f.graph, &mut f.srv, second, true);
        eval(&mut f);
        assert_eq!(
            f.srv.visuals.get(f.visual).unwrap().clear_color,
            [0.0, 1.0, 0.0, 1.0]
        );
    }

    #[test]
    fn background_with_movie_child_records_backdrop() {
        let mut f = fixture();
        let bg = add(
            &mut f,
            NodeKind::Background,
            Box::new(BackgroundBehavior::new([0.0, 0.0, 0.0, 1.0])),
        );
        f.graph
            .insert_child(
                bg,
                SceneNode::new(NodeKind::MovieTexture)
                    .with_behavior(Box::new(crate::nodes::media_nodes::MovieTextureBehavior::new())),
                &mut f.srv,
            )
            .unwrap();

        eval(&mut f);
        eval(&mut f);
        let visual = f.srv.visuals.get(f.visual).unwrap();
        let Some(DrawCommand::Rect2D { node, rect, .. }) = &visual.backdrop else {
            panic!("expected a backdrop command");
        };
        assert_eq!(*node, bg);
        assert_relative_eq!(rect.width, 320.0, epsilon = 1e-5);
    }

    #[test]
    fn viewpoint_snaps_without_transition() {
        let mut f = fixture();
        f.srv.viewpoint_transition = 0.0;
        let pose = CameraPose {
            position: Point3::new(5.0, 1.0, 5.0),
            ..CameraPose::default()
        };
        add(&mut f, NodeKind::Viewpoint, Box::new(ViewpointBehavior::new(pose)));

        eval(&mut f);
        eval(&mut f);
        let camera = &f.srv.visuals.get(f.visual).unwrap().camera;
        assert!(!camera.is_transitioning());
        assert_relative_eq!(camera.pose.position.x, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn viewpoint_glides_and_does_not_restart() {
        let mut f = fixture();
        f.srv.viewpoint_transition = 1.0;
        let pose = CameraPose {
            position: Point3::new(8.0, 0.0, 10.0),
            ..CameraPose::default()
        };
        add(&mut f, NodeKind::Viewpoint, Box::new(ViewpointBehavior::new(pose)));

        eval(&mut f);
        eval(&mut f);
        {
            let camera = &mut f.srv.visuals.get_mut(f.visual).unwrap().camera;
            assert!(camera.is_transitioning());
            camera.tick_transition(2.0);
            assert!(!camera.is_transitioning());
        }

        // Still bound, but the same bind edge must not re-arm the glide.
        eval(&mut f);
        let camera = &f.srv.visuals.get(f.visual).unwrap().camera;
        assert!(!camera.is_transitioning());
        assert_relative_eq!(camera.pose.position.x, 8.0, epsilon = 1e-5);
    }

    #[test]
    fn navigation_info_overrides_defaults() {
        let mut f = fixture();
        let params = NavigationParams {
            speed: 4.0,
            headlight: false,
            ..NavigationParams::default()
        };
        add(
            &mut f,
            NodeKind::NavigationInfo,
            Box::new(NavigationInfoBehavior::new(params)),
        );

        eval(&mut f);
        eval(&mut f);
        let nav = f.srv.visuals.get(f.visual).unwrap().camera.nav;
        assert_relative_eq!(nav.speed, 4.0, epsilon = 1e-6);
        assert!(!nav.headlight);
    }

    #[test]
    fn unbound_fog_clears_at_next_frame() {
        let mut f = fixture();
        let fog = add(
            &mut f,
            NodeKind::Fog,
            Box::new(FogBehavior::new(FogParams {
                kind: FogKind::Exponential,
                color: [0.5, 0.5, 0.5],
                visibility: 100.0,
            })),
        );

        eval(&mut f);
        eval(&mut f);
        let bound = f.srv.visuals.get(f.visual).unwrap().fog;
        assert_eq!(bound.map(|p| p.kind), Some(FogKind::Exponential));

        apply_set_bind(&mut f.graph, &mut f.srv, fog, false);
        eval(&mut f);
        assert!(f.srv.visuals.get(f.visual).unwrap().fog.is_none());
    }

    #[test]
    fn detached_bound_node_queues_promotion() {
        let mut f = fixture();
        let first = add(
            &mut f,
            NodeKind::Background,
            Box::new(BackgroundBehavior::new([1.0, 0.0, 0.0, 1.0])),
        );
        add(
            &mut f,
            NodeKind::Background,
            Box::new(BackgroundBehavior::new([0.0, 0.0, 1.0, 1.0])),
        );

        eval(&mut f);
        f.graph.remove(first, &mut f.srv);

        // The queued promotion lands at the start of the next eval.
        eval(&mut f);
        eval(&mut f);
        assert_eq!(
            f.srv.visuals.get(f.visual).unwrap().clear_color,
            [0.0, 0.0, 1.0, 1.0]
        );
    }
}
