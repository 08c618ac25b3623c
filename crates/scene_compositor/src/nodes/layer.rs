//! Nested 3D rendering context
//!
//! A layer owns a private visual: its own camera, bindable stacks, lights
//! and draw list. During the outer sort pass the layer runs a full inner
//! frame (bindable eval, lighting, sort) over its children when anything
//! below it changed, caches the ordered commands, and records a single flat
//! composite rectangle on the outer visual. The outer flush replays the
//! cached inner commands through their nodes before drawing the composite,
//! so inner content re-resolves textures per frame while the inner
//! traversals are skipped entirely for clean subtrees.
//!
//! Layers do not nest. A layer found below another layer logs once and
//! renders as empty space. Outer pick, collide and lighting passes stop at
//! the layer boundary; the inner world is reachable only through its own
//! camera.

use crate::camera::CullResult;
use crate::foundation::geometry::{Aabb, Rect};
use crate::foundation::math::{Mat3, Mat4, Vec3};
use crate::graph::{NodeBehavior, NodeKey};
use crate::render::{DrawCommand, LightParams, Paint, VisualKey};
use crate::services::Services;
use crate::traverse::{TraverseCtx, TraverseMode};

/// Nested rendering context composited as a flat rectangle
pub struct Layer3DBehavior {
    /// Composite width in the outer visual's units
    pub width: f32,
    /// Composite height in the outer visual's units
    pub height: f32,
    visual: Option<VisualKey>,
    cache: Vec<DrawCommand>,
    rendered: bool,
    unsupported: bool,
}

impl Layer3DBehavior {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            visual: None,
            cache: Vec::new(),
            rendered: false,
            unsupported: false,
        }
    }

    /// Private visual of this layer, `None` before the first sort pass
    pub fn inner_visual(&self) -> Option<VisualKey> {
        self.visual
    }

    fn local_rect(&self) -> Rect {
        Rect::from_center(0.0, 0.0, self.width, self.height)
    }

    fn local_aabb(&self) -> Aabb {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Aabb::empty();
        }
        Aabb::new(
            Vec3::new(-self.width / 2.0, -self.height / 2.0, 0.0),
            Vec3::new(self.width / 2.0, self.height / 2.0, 0.0),
        )
    }

    fn sort(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let rect = self.local_rect();
        if rect.is_empty() {
            return;
        }
        let inner = match self.visual {
            Some(v) => v,
            None => {
                let v = ctx.srv.create_visual(true, self.width, self.height);
                self.visual = Some(v);
                v
            }
        };
        let dirty = !ctx.graph.take_dirty(key).is_empty();
        let transitioning = ctx
            .srv
            .visuals
            .get(inner)
            .map_or(false, |v| v.camera.is_transitioning());
        if !self.rendered || dirty || transitioning {
            self.render_inner(key, inner, ctx);
            self.rendered = true;
        }
        let covered = rect.transformed(&ctx.state.transform);
        if covered.intersection(&ctx.state.clip).is_empty() {
            return;
        }
        let command = DrawCommand::Rect2D {
            node: key,
            rect,
            transform: ctx.state.transform,
            clip: ctx.state.clip,
            paint: Paint::default(),
        };
        let Some(visual) = ctx.visual() else {
            return;
        };
        visual.draw.push_opaque(command);
    }

    /// One inner frame: bindable eval, camera tick, lighting, sort
    fn render_inner(&mut self, key: NodeKey, inner: VisualKey, ctx: &mut TraverseCtx<'_>) {
        let now = ctx.srv.time.now();
        let (width, height) = (self.width, self.height);
        let Some(stacks) = ctx.srv.visuals.get_mut(inner).map(|v| {
            v.begin_frame();
            v.stacks
        }) else {
            return;
        };

        for mode in [
            TraverseMode::BindableEval,
            TraverseMode::Lighting,
            TraverseMode::Sort,
        ] {
            // The camera settles after bindables had their say and before
            // lighting and sort read the pose.
            if mode == TraverseMode::Lighting {
                let Some(visual) = ctx.srv.visuals.get_mut(inner) else {
                    return;
                };
                let animating = visual.camera.tick_transition(now);
                visual.camera.update(width, height);
                if animating {
                    ctx.srv.request_redraw();
                }
            }
            ctx.scoped(|c| {
                c.state.mode = mode;
                c.state.visual = inner;
                c.state.stacks = stacks;
                c.state.in_layer = true;
                c.state.three_d = true;
                c.state.transform = Mat3::identity();
                c.state.model = Mat4::identity();
                c.state.cull = CullResult::Intersects;
                c.state.clip = Rect::from_center(0.0, 0.0, width, height);
                c.state.viewport = Rect::new(0.0, 0.0, width, height);
                c.traverse_children(key);
            });
        }

        let Some(visual) = ctx.srv.visuals.get_mut(inner) else {
            return;
        };
        if visual.camera.nav.headlight {
            let direction = visual.camera.pose.direction();
            visual.lights.push(LightParams::headlight(direction));
        }
        self.cache.clear();
        if let Some(backdrop) = visual.backdrop.take() {
            self.cache.push(backdrop);
        }
        self.cache.extend(visual.draw.take_ordered());
    }

    /// Replay the cached inner commands, then draw the composite
    fn replay(&mut self, _key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let Some(composite) = ctx.state.draw.take() else {
            return;
        };
        let Some(inner) = self.visual else {
            return;
        };
        let Some(stacks) = ctx.srv.visuals.get(inner).map(|v| v.stacks) else {
            return;
        };
        for command in self.cache.clone() {
            let mode = match &command {
                DrawCommand::Rect2D { .. } => TraverseMode::Draw2d,
                DrawCommand::Mesh3D { .. } => TraverseMode::Draw3d,
            };
            let node = command.node();
            ctx.scoped(|c| {
                c.state.mode = mode;
                c.state.visual = inner;
                c.state.stacks = stacks;
                c.state.in_layer = true;
                c.state.three_d = true;
                c.state.draw = Some(command);
                c.traverse_node(node);
            });
            // The command channel is not part of the scope snapshot.
            ctx.state.draw = None;
        }
        ctx.srv.backend.draw(&composite, None);
    }
}

impl NodeBehavior for Layer3DBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.state.in_layer {
            if !self.unsupported {
                log::warn!("nested 3D layer renders as empty space");
                self.unsupported = true;
            }
            if ctx.state.mode == TraverseMode::Bounds {
                let local = self.local_aabb();
                if !local.is_empty() {
                    ctx.state.bbox.union(&local.transformed(&ctx.state.model));
                }
            }
            return;
        }
        match ctx.state.mode {
            TraverseMode::Bounds => {
                let local = self.local_aabb();
                if !local.is_empty() {
                    ctx.state.bbox.union(&local.transformed(&ctx.state.model));
                }
            }
            TraverseMode::Sort => self.sort(key, ctx),
            TraverseMode::Draw2d => self.replay(key, ctx),
            _ => {}
        }
    }

    fn detached(&mut self, _key: NodeKey, srv: &mut Services) {
        if let Some(visual) = self.visual.take() {
            srv.release_visual(visual);
        }
        self.cache.clear();
        self.rendered = false;
    }
}
