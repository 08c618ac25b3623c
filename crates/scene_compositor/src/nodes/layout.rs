//! Layout groups
//!
//! A layout measures each child's local bounds through a bounds sub-traversal
//! and derives a per-child offset from them, so children never know they are
//! being placed. Offsets are cached until a dirty flag invalidates them. The
//! line layout packs children left to right inside a fixed region, wrapping
//! and justifying per line, with an optional constant-rate scroll; the path
//! layout spaces children by arc length along a polyline.

use crate::foundation::geometry::{Aabb, Rect};
use crate::foundation::math::{Mat3, Mat4, Mat4Ext, Point2, Vec2, Vec3};
use crate::graph::{NodeBehavior, NodeKey};
use crate::traverse::{TraverseCtx, TraverseMode};

/// Placement of each line inside the layout region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Justify {
    /// Pack against the left edge
    Begin,
    /// Center the line
    Center,
    /// Pack against the right edge
    End,
}

/// Line-based layout region with wrapping, justification and scrolling
pub struct LayoutBehavior {
    /// Region width in local units
    pub width: f32,
    /// Region height in local units
    pub height: f32,
    /// Start a new line instead of overflowing the region
    pub wrap: bool,
    /// Per-line placement
    pub justify: Justify,
    /// Scroll speed in local units per second, zero disables scrolling
    pub scroll_rate: f32,
    /// Scroll along y instead of x
    pub scroll_vertical: bool,
    entries: Vec<(NodeKey, Vec2)>,
    children_extent: Vec2,
    scroll_offset: f32,
    last_time: Option<f64>,
}

impl LayoutBehavior {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            wrap: false,
            justify: Justify::Begin,
            scroll_rate: 0.0,
            scroll_vertical: false,
            entries: Vec::new(),
            children_extent: Vec2::zeros(),
            scroll_offset: 0.0,
            last_time: None,
        }
    }

    pub fn with_justify(mut self, justify: Justify) -> Self {
        self.justify = justify;
        self
    }

    pub fn with_wrap(mut self) -> Self {
        self.wrap = true;
        self
    }

    pub fn with_scroll(mut self, rate: f32, vertical: bool) -> Self {
        self.scroll_rate = rate;
        self.scroll_vertical = vertical;
        self
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

    /// Rebuild per-child offsets from measured child bounds
    fn measure(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        self.entries.clear();
        self.children_extent = Vec2::zeros();
        let mut children = Vec::new();
        let mut index = 0;
        while let Some(child) = ctx.graph.child_at(key, index) {
            children.push(child);
            index += 1;
        }
        let mut line: Vec<(NodeKey, Aabb)> = Vec::new();
        let mut line_width = 0.0f32;
        let mut cursor_y = self.height / 2.0;
        for child in children {
            let bounds = ctx.node_bounds(child);
            if bounds.is_empty() {
                continue;
            }
            let w = bounds.max.x - bounds.min.x;
            if self.wrap && !line.is_empty() && line_width + w > self.width {
                cursor_y = self.flush_line(&line, line_width, cursor_y);
                line.clear();
                line_width = 0.0;
            }
            line.push((child, bounds));
            line_width += w;
        }
        if !line.is_empty() {
            cursor_y = self.flush_line(&line, line_width, cursor_y);
        }
        self.children_extent.y = self.height / 2.0 - cursor_y;
    }

    /// Assign offsets for one finished line, returning the next line's top
    fn flush_line(&mut self, line: &[(NodeKey, Aabb)], line_width: f32, cursor_y: f32) -> f32 {
        let mut x = match self.justify {
            Justify::Begin => -self.width / 2.0,
            Justify::Center => -line_width / 2.0,
            Justify::End => self.width / 2.0 - line_width,
        };
        let mut line_height = 0.0f32;
        for (child, bounds) in line {
            let w = bounds.max.x - bounds.min.x;
            let h = bounds.max.y - bounds.min.y;
            self.entries
                .push((*child, Vec2::new(x - bounds.min.x, cursor_y - bounds.max.y)));
            x += w;
            line_height = line_height.max(h);
        }
        self.children_extent.x = self.children_extent.x.max(line_width);
        cursor_y - line_height
    }

    fn advance_scroll(&mut self, ctx: &mut TraverseCtx<'_>) {
        if self.scroll_rate == 0.0 {
            return;
        }
        let now = ctx.srv.time.now();
        if let Some(last) = self.last_time {
            self.scroll_offset += self.scroll_rate * (now - last) as f32;
            let region = if self.scroll_vertical { self.height } else { self.width };
            let content = if self.scroll_vertical {
                self.children_extent.y
            } else {
                self.children_extent.x
            };
            // Wrap once the content has fully left the region on one side.
            let half = (region + content) / 2.0;
            if half > 0.0 {
                self.scroll_offset = (self.scroll_offset + half).rem_euclid(2.0 * half) - half;
            }
        }
        self.last_time = Some(now);
        ctx.srv.request_redraw();
    }

    fn place_children(&mut self, ctx: &mut TraverseCtx<'_>) {
        let region = Rect::from_center(0.0, 0.0, self.width, self.height);
        let scroll = if self.scroll_vertical {
            Vec2::new(0.0, self.scroll_offset)
        } else {
            Vec2::new(self.scroll_offset, 0.0)
        };
        let entries = self.entries.clone();
        ctx.scoped(|c| {
            // Content is clipped to the region, so scrolled-out children
            // stop drawing and picking without extra bookkeeping.
            let covered = region.transformed(&c.state.transform);
            c.state.clip = c.state.clip.intersection(&covered);
            if c.state.clip.is_empty() {
                return;
            }
            for (child, offset) in entries {
                c.scoped(|cc| {
                    let mut local = Mat3::identity();
                    local[(0, 2)] = offset.x + scroll.x;
                    local[(1, 2)] = offset.y + scroll.y;
                    cc.state.transform *= local;
                    cc.state.model *= Mat4::from_affine_2d(&local);
                    cc.traverse_node(child);
                });
            }
        });
    }
}

impl NodeBehavior for LayoutBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        if ctx.graph.take_dirty(key).invalidates_bounds() {
            self.entries.clear();
        }
        match ctx.state.mode {
            TraverseMode::Bounds => {
                let local = self.local_aabb();
                if !local.is_empty() {
                    ctx.state.bbox.union(&local.transformed(&ctx.state.model));
                }
            }
            TraverseMode::Sort | TraverseMode::Pick => {
                if self.entries.is_empty() {
                    self.measure(key, ctx);
                }
                if ctx.state.mode == TraverseMode::Sort {
                    self.advance_scroll(ctx);
                }
                self.place_children(ctx);
            }
            _ => ctx.scoped(|c| c.traverse_children(key)),
        }
    }
}

/// Places children at successive arc-length offsets along a polyline
pub struct PathLayoutBehavior {
    /// Polyline vertices in local coordinates
    pub points: Vec<Point2>,
    /// Arc-length distance between consecutive children
    pub spacing: f32,
    /// Arc-length position of the first child
    pub start_offset: f32,
    /// Wrap offsets past the end back to the start
    pub wrap: bool,
    /// Rotate children to follow the path direction
    pub align_tangent: bool,
}

impl PathLayoutBehavior {
    pub fn new(points: Vec<Point2>, spacing: f32) -> Self {
        Self {
            points,
            spacing,
            start_offset: 0.0,
            wrap: false,
            align_tangent: false,
        }
    }

    pub fn with_start_offset(mut self, offset: f32) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn with_wrap(mut self) -> Self {
        self.wrap = true;
        self
    }

    pub fn with_tangent(mut self) -> Self {
        self.align_tangent = true;
        self
    }

    fn total_length(&self) -> f32 {
        self.points
            .windows(2)
            .map(|seg| (seg[1] - seg[0]).norm())
            .sum()
    }

    /// Point and tangent angle at the given arc length, None past the end
    fn sample(&self, s: f32) -> Option<(Point2, f32)> {
        if self.points.len() < 2 {
            return self.points.first().map(|p| (*p, 0.0));
        }
        let mut remaining = s;
        for seg in self.points.windows(2) {
            let dir = seg[1] - seg[0];
            let len = dir.norm();
            if remaining <= len && len > 0.0 {
                let t = remaining / len;
                return Some((seg[0] + dir * t, dir.y.atan2(dir.x)));
            }
            remaining -= len;
        }
        None
    }
}

impl NodeBehavior for PathLayoutBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let total = self.total_length();
        let align = self.align_tangent;
        let mut index = 0;
        while let Some(child) = ctx.graph.child_at(key, index) {
            let mut s = self.start_offset + self.spacing * index as f32;
            index += 1;
            if self.wrap && total > 0.0 {
                s = s.rem_euclid(total);
            }
            let Some((point, angle)) = self.sample(s) else {
                continue;
            };
            ctx.scoped(|c| {
                let mut local = if align {
                    Mat3::new_rotation(angle)
                } else {
                    Mat3::identity()
                };
                local[(0, 2)] = point.x;
                local[(1, 2)] = point.y;
                c.state.transform *= local;
                c.state.model *= Mat4::from_affine_2d(&local);
                c.traverse_node(child);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::config::CompositorConfig;
    use crate::graph::{NodeKind, SceneGraph, SceneNode};
    use crate::services::Services;
    use crate::traverse::TraverseState;
    use approx::assert_relative_eq;

    /// Fixed-size square that records its flat transform at sort time
    struct SizedProbe {
        size: f32,
        visits: Rc<RefCell<Vec<Mat3>>>,
    }

    impl NodeBehavior for SizedProbe {
        fn traverse(&mut self, _key: NodeKey, ctx: &mut TraverseCtx<'_>) {
            match ctx.state.mode {
                TraverseMode::Bounds => {
                    let half = self.size / 2.0;
                    let local =
                        Aabb::new(Vec3::new(-half, -half, 0.0), Vec3::new(half, half, 0.0));
                    ctx.state.bbox.union(&local.transformed(&ctx.state.model));
                }
                TraverseMode::Sort => self.visits.borrow_mut().push(ctx.state.transform),
                _ => {}
            }
        }
    }

    struct Fixture {
        graph: SceneGraph,
        srv: Services,
        visual: crate::render::VisualKey,
        root: NodeKey,
        visits: Rc<RefCell<Vec<Mat3>>>,
    }

    fn fixture(kind: NodeKind, behavior: Box<dyn NodeBehavior>, children: usize) -> Fixture {
        let mut srv = Services::new(&CompositorConfig::default());
        let visual = srv.create_visual(false, 320.0, 240.0);
        let mut graph = SceneGraph::new();
        let root = graph.insert(SceneNode::new(kind).with_behavior(behavior), &mut srv);
        graph.set_root(root).unwrap();
        let visits = Rc::new(RefCell::new(Vec::new()));
        for _ in 0..children {
            graph
                .insert_child(
                    root,
                    SceneNode::new(NodeKind::Shape2D).with_behavior(Box::new(SizedProbe {
                        size: 10.0,
                        visits: visits.clone(),
                    })),
                    &mut srv,
                )
                .unwrap();
        }
        Fixture {
            graph,
            srv,
            visual,
            root,
            visits,
        }
    }

    fn sort(f: &mut Fixture) {
        let state = {
            let visual = f.srv.visuals.get(f.visual).unwrap();
            TraverseState::for_visual(TraverseMode::Sort, f.visual, visual)
        };
        let mut ctx = TraverseCtx {
            graph: &mut f.graph,
            srv: &mut f.srv,
            state,
        };
        ctx.traverse_node(f.root);
    }

    fn centers(f: &Fixture) -> Vec<(f32, f32)> {
        f.visits
            .borrow()
            .iter()
            .map(|m| (m[(0, 2)], m[(1, 2)]))
            .collect()
    }

    #[test]
    fn begin_justified_line_packs_left() {
        let mut f = fixture(
            NodeKind::Layout,
            Box::new(LayoutBehavior::new(40.0, 20.0)),
            3,
        );
        sort(&mut f);
        let got = centers(&f);
        assert_eq!(got.len(), 3);
        assert_relative_eq!(got[0].0, -15.0, epsilon = 1e-4);
        assert_relative_eq!(got[1].0, -5.0, epsilon = 1e-4);
        assert_relative_eq!(got[2].0, 5.0, epsilon = 1e-4);
        for (_, y) in got {
            assert_relative_eq!(y, 5.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn wrap_moves_overflow_to_next_line() {
        let mut f = fixture(
            NodeKind::Layout,
            Box::new(LayoutBehavior::new(25.0, 30.0).with_wrap()),
            3,
        );
        sort(&mut f);
        let got = centers(&f);
        assert_relative_eq!(got[0].1, 10.0, epsilon = 1e-4);
        assert_relative_eq!(got[1].1, 10.0, epsilon = 1e-4);
        assert_relative_eq!(got[2].0, -7.5, epsilon = 1e-4);
        assert_relative_eq!(got[2].1, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn center_justify_centers_each_line() {
        let mut f = fixture(
            NodeKind::Layout,
            Box::new(LayoutBehavior::new(40.0, 20.0).with_justify(Justify::Center)),
            2,
        );
        sort(&mut f);
        let got = centers(&f);
        assert_relative_eq!(got[0].0, -5.0, epsilon = 1e-4);
        assert_relative_eq!(got[1].0, 5.0, epsilon = 1e-4);
    }

    #[test]
    fn end_justify_packs_right() {
        let mut f = fixture(
            NodeKind::Layout,
            Box::new(LayoutBehavior::new(40.0, 20.0).with_justify(Justify::End)),
            2,
        );
        sort(&mut f);
        let got = centers(&f);
        assert_relative_eq!(got[0].0, 5.0, epsilon = 1e-4);
        assert_relative_eq!(got[1].0, 15.0, epsilon = 1e-4);
    }

    #[test]
    fn scroll_advances_with_time() {
        let mut f = fixture(
            NodeKind::Layout,
            Box::new(LayoutBehavior::new(40.0, 20.0).with_scroll(10.0, false)),
            1,
        );
        sort(&mut f);
        let base = centers(&f)[0].0;
        assert!(f.srv.take_redraw());

        f.srv.time.set_time(1.0);
        f.visits.borrow_mut().clear();
        sort(&mut f);
        assert_relative_eq!(centers(&f)[0].0, base + 10.0, epsilon = 1e-4);
        assert!(f.srv.take_redraw());
    }

    #[test]
    fn scroll_wraps_past_combined_extent() {
        let mut f = fixture(
            NodeKind::Layout,
            Box::new(LayoutBehavior::new(40.0, 20.0).with_scroll(10.0, false)),
            2,
        );
        sort(&mut f);
        let base = centers(&f)[0].0;

        // Region 40 plus content 20 wraps at +-30.
        f.srv.time.set_time(7.0);
        f.visits.borrow_mut().clear();
        sort(&mut f);
        assert_relative_eq!(centers(&f)[0].0, base + 10.0, epsilon = 1e-3);
    }

    #[test]
    fn dirty_flag_remeasures_children() {
        let mut f = fixture(
            NodeKind::Layout,
            Box::new(LayoutBehavior::new(40.0, 20.0)),
            2,
        );
        sort(&mut f);
        let before = centers(&f);

        let third = f
            .graph
            .insert_child(
                f.root,
                SceneNode::new(NodeKind::Shape2D).with_behavior(Box::new(SizedProbe {
                    size: 10.0,
                    visits: f.visits.clone(),
                })),
                &mut f.srv,
            )
            .unwrap();
        assert!(f.graph.get(third).is_some());
        f.visits.borrow_mut().clear();
        sort(&mut f);
        let after = centers(&f);
        assert_eq!(before.len(), 2);
        assert_eq!(after.len(), 3);
    }

    #[test]
    fn path_layout_places_along_polyline() {
        let points = vec![
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 0.0),
            Point2::new(10.0, 10.0),
        ];
        let mut f = fixture(
            NodeKind::PathLayout,
            Box::new(PathLayoutBehavior::new(points, 5.0).with_tangent()),
            4,
        );
        sort(&mut f);
        let got = centers(&f);
        assert_eq!(got.len(), 4);
        assert_relative_eq!(got[0].0, 0.0, epsilon = 1e-4);
        assert_relative_eq!(got[1].0, 5.0, epsilon = 1e-4);
        assert_relative_eq!(got[2].0, 10.0, epsilon = 1e-4);
        assert_relative_eq!(got[3].0, 10.0, epsilon = 1e-4);
        assert_relative_eq!(got[3].1, 5.0, epsilon = 1e-4);

        // The last child sits on the vertical segment, rotated to follow it.
        let m = f.visits.borrow()[3];
        assert_relative_eq!(m[(0, 0)], 0.0, epsilon = 1e-5);
        assert_relative_eq!(m[(1, 0)], 1.0, epsilon = 1e-5);
    }

    #[test]
    fn path_skips_children_past_the_end() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(20.0, 0.0)];
        let mut f = fixture(
            NodeKind::PathLayout,
            Box::new(PathLayoutBehavior::new(points, 25.0)),
            2,
        );
        sort(&mut f);
        assert_eq!(centers(&f).len(), 1);
    }

    #[test]
    fn path_wraps_offsets_when_enabled() {
        let points = vec![Point2::new(0.0, 0.0), Point2::new(20.0, 0.0)];
        let mut f = fixture(
            NodeKind::PathLayout,
            Box::new(
                PathLayoutBehavior::new(points, 25.0)
                    .with_start_offset(2.0)
                    .with_wrap(),
            ),
            2,
        );
        sort(&mut f);
        let got = centers(&f);
        assert_eq!(got.len(), 2);
        assert_relative_eq!(got[0].0, 2.0, epsilon = 1e-4);
        assert_relative_eq!(got[1].0, 7.0, epsilon = 1e-4);
    }
}
