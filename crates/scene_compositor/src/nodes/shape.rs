//! Drawable shape nodes
//!
//! Shapes are the leaves that actually emit draw commands. During the sort
//! pass a shape culls itself against the camera (3D) or the inherited clip
//! rectangle (2D), then records a command on the visual's draw list; the
//! flush later hands each command back to its node through the traversal
//! state, which is where lazy texture resolution happens. Picking intersects
//! the pointer ray in local space so shapes never need their own world-space
//! copies of geometry.

use crate::camera::{cull_aabb, CullResult};
use crate::foundation::geometry::{Aabb, Plane, Ray, Rect};
use crate::foundation::math::{Point2, Point3, Vec3};
use crate::graph::{DirtyFlags, NodeBehavior, NodeKey};
use crate::render::{DrawCommand, Mesh, MeshKey, Paint};
use crate::services::Services;
use crate::traverse::{TraverseCtx, TraverseMode};

use super::media_nodes::video_texture_frame;

/// Flat rectangle, drawn in the 2D pipeline
pub struct Shape2DBehavior {
    pub width: f32,
    pub height: f32,
    pub paint: Paint,
}

impl Shape2DBehavior {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            paint: Paint::default(),
        }
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.paint = Paint::solid(color);
        self
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

    fn record(&self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let rect = self.local_rect();
        if rect.is_empty() {
            return;
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
            paint: self.paint.clone(),
        };
        let transparent = self.paint.is_transparent();
        let Some(visual) = ctx.visual() else {
            return;
        };
        if transparent {
            visual.draw.push_transparent(command);
        } else {
            visual.draw.push_opaque(command);
        }
    }

    fn pick(&self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let local = self.local_aabb();
        if local.is_empty() {
            return;
        }
        if ctx.srv.pick.skip_box(&local.transformed(&ctx.state.model)) {
            return;
        }
        let Some(inverse) = ctx.state.model.try_inverse() else {
            return;
        };
        let ray = ctx.srv.pick.ray.transformed(&inverse);
        let Some(t) = ray.intersect_plane(&Plane::new(Vec3::z(), 0.0)) else {
            return;
        };
        let hit = ray.point_at(t);
        if hit.x.abs() > self.width / 2.0 || hit.y.abs() > self.height / 2.0 {
            return;
        }
        // The clip rectangle gates picking the same way it gates drawing.
        let flat = ctx
            .state
            .transform
            .transform_point(&Point2::new(hit.x, hit.y));
        if !ctx.state.clip.contains_point(flat.x, flat.y) {
            return;
        }
        let local_point = Point3::from(hit);
        let world_point = ctx.state.model.transform_point(&local_point);
        if clipped(&ctx.state.clip_planes, world_point) {
            return;
        }
        let uv = [hit.x / self.width + 0.5, 0.5 - hit.y / self.height];
        ctx.srv.pick.consider(
            key,
            world_point,
            local_point,
            Vec3::z(),
            uv,
            &ctx.state.sensors,
        );
    }
}

impl NodeBehavior for Shape2DBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        match ctx.state.mode {
            TraverseMode::Bounds => {
                let local = self.local_aabb();
                if !local.is_empty() {
                    ctx.state.bbox.union(&local.transformed(&ctx.state.model));
                }
            }
            TraverseMode::Sort => self.record(key, ctx),
            TraverseMode::Pick => self.pick(key, ctx),
            TraverseMode::Draw2d => replay_2d(key, ctx),
            _ => {}
        }
    }
}

/// Built-in 3D geometry kinds
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Geometry3D {
    /// Axis-aligned cube with the given edge length
    Cube { size: f32 },
    /// Flat quad in the xy plane
    Quad { width: f32, height: f32 },
}

/// Mesh-backed shape, drawn in the 3D pipeline
pub struct Shape3DBehavior {
    pub geometry: Geometry3D,
    pub paint: Paint,
    mesh: Option<MeshKey>,
}

impl Shape3DBehavior {
    pub fn new(geometry: Geometry3D) -> Self {
        Self {
            geometry,
            paint: Paint::default(),
            mesh: None,
        }
    }

    pub fn cube(size: f32) -> Self {
        Self::new(Geometry3D::Cube { size })
    }

    pub fn quad(width: f32, height: f32) -> Self {
        Self::new(Geometry3D::Quad { width, height })
    }

    pub fn with_color(mut self, color: [f32; 4]) -> Self {
        self.paint = Paint::solid(color);
        self
    }

    fn build_mesh(&self) -> Mesh {
        match self.geometry {
            Geometry3D::Cube { size } => Mesh::cube(size),
            Geometry3D::Quad { width, height } => Mesh::quad(width, height),
        }
    }

    /// Registered mesh key, building or rebuilding the mesh as needed
    fn ensure_mesh(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) -> MeshKey {
        if ctx.graph.take_dirty(key).contains(DirtyFlags::GEOMETRY) {
            if let Some(existing) = self.mesh {
                ctx.srv.meshes.replace(existing, self.build_mesh());
            }
        }
        match self.mesh {
            Some(existing) => existing,
            None => {
                let created = ctx.srv.meshes.add(self.build_mesh());
                self.mesh = Some(created);
                created
            }
        }
    }

    fn local_bounds(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) -> Aabb {
        let mesh_key = self.ensure_mesh(key, ctx);
        ctx.srv
            .meshes
            .get(mesh_key)
            .map_or_else(Aabb::empty, |mesh| mesh.bounds)
    }

    fn record(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let mesh_key = self.ensure_mesh(key, ctx);
        let local = self.local_bounds(key, ctx);
        if local.is_empty() {
            return;
        }
        let world = local.transformed(&ctx.state.model);
        let depth = {
            let Some(visual) = ctx.srv.visuals.get(ctx.state.visual) else {
                return;
            };
            let cull = cull_aabb(&visual.camera, &world, ctx.state.cull, false);
            if cull == CullResult::Outside {
                return;
            }
            visual.camera.depth_of(Point3::from(world.center())) + world.radius()
        };
        let command = DrawCommand::Mesh3D {
            node: key,
            mesh: mesh_key,
            model: ctx.state.model,
            clip_planes: ctx.state.clip_planes.clone(),
            paint: self.paint.clone(),
            depth,
        };
        let transparent = self.paint.is_transparent();
        let Some(visual) = ctx.visual() else {
            return;
        };
        if transparent {
            visual.draw.push_transparent(command);
        } else {
            visual.draw.push_opaque(command);
        }
    }

    fn pick(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let mesh_key = self.ensure_mesh(key, ctx);
        let local = self.local_bounds(key, ctx);
        if local.is_empty() {
            return;
        }
        if ctx.srv.pick.skip_box(&local.transformed(&ctx.state.model)) {
            return;
        }
        let Some(inverse) = ctx.state.model.try_inverse() else {
            return;
        };
        let hit = {
            let ray = ctx.srv.pick.ray.transformed(&inverse);
            let Some(mesh) = ctx.srv.meshes.get(mesh_key) else {
                return;
            };
            match mesh.intersect_ray(&ray) {
                Some(hit) => (Point3::from(ray.point_at(hit.t)), hit.normal, hit.uv),
                None => return,
            }
        };
        let (local_point, normal, uv) = hit;
        let world_point = ctx.state.model.transform_point(&local_point);
        if clipped(&ctx.state.clip_planes, world_point) {
            return;
        }
        ctx.srv
            .pick
            .consider(key, world_point, local_point, normal, uv, &ctx.state.sensors);
    }

    fn collide(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let mesh_key = self.ensure_mesh(key, ctx);
        let Some(inverse) = ctx.state.model.try_inverse() else {
            return;
        };
        let (position, radius) = {
            let Some(visual) = ctx.srv.visuals.get(ctx.state.visual) else {
                return;
            };
            (visual.camera.pose.position, visual.camera.nav.avatar_radius)
        };
        if ctx.state.collide_gravity {
            let ray = Ray::new(position.coords, -Vec3::y()).transformed(&inverse);
            let hit = {
                let Some(mesh) = ctx.srv.meshes.get(mesh_key) else {
                    return;
                };
                mesh.intersect_ray(&ray)
            };
            let Some(hit) = hit else {
                return;
            };
            let world = ctx
                .state
                .model
                .transform_point(&Point3::from(ray.point_at(hit.t)));
            let dist = (position - world).norm();
            if let Some(visual) = ctx.srv.visuals.get_mut(ctx.state.visual) {
                visual.camera.collide.record_ground(world, dist);
            }
        } else {
            let local_center = inverse.transform_point(&position);
            // Conservative local-space radius under anisotropic scale.
            let linear = inverse.fixed_view::<3, 3>(0, 0);
            let scale = linear.column_iter().map(|c| c.norm()).fold(0.0f32, f32::max);
            let closest = {
                let Some(mesh) = ctx.srv.meshes.get(mesh_key) else {
                    return;
                };
                mesh.closest_within(local_center.coords, radius * scale.max(1.0))
            };
            let Some(closest) = closest else {
                return;
            };
            let world = ctx.state.model.transform_point(&Point3::from(closest));
            let dist = (world - position).norm();
            if dist <= radius {
                if let Some(visual) = ctx.srv.visuals.get_mut(ctx.state.visual) {
                    visual.camera.collide.record_hit(world, dist);
                }
            }
        }
    }

    fn replay(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        let Some(mut command) = ctx.state.draw.take() else {
            return;
        };
        if let Some(frame) = video_texture_frame(key, ctx) {
            if let DrawCommand::Mesh3D { paint, .. } = &mut command {
                paint.video = Some(frame);
            }
        }
        let srv = &mut *ctx.srv;
        let mesh = match &command {
            DrawCommand::Mesh3D { mesh, .. } => srv.meshes.get(*mesh),
            _ => None,
        };
        srv.backend.draw(&command, mesh);
    }
}

impl NodeBehavior for Shape3DBehavior {
    fn traverse(&mut self, key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        match ctx.state.mode {
            TraverseMode::Bounds => {
                let local = self.local_bounds(key, ctx);
                if !local.is_empty() {
                    ctx.state.bbox.union(&local.transformed(&ctx.state.model));
                }
            }
            TraverseMode::Sort => self.record(key, ctx),
            TraverseMode::Pick => self.pick(key, ctx),
            TraverseMode::Collide => self.collide(key, ctx),
            TraverseMode::Draw3d => self.replay(key, ctx),
            _ => {}
        }
    }

    fn detached(&mut self, _key: NodeKey, srv: &mut Services) {
        if let Some(mesh) = self.mesh.take() {
            srv.meshes.remove(mesh);
        }
    }
}

/// Replay a 2D draw command handed back through the traversal state
///
/// Resolves the node's movie-texture child at the last moment so only
/// commands that survived sorting and clipping touch the decoder.
pub(crate) fn replay_2d(key: NodeKey, ctx: &mut TraverseCtx<'_>) {
    let Some(mut command) = ctx.state.draw.take() else {
        return;
    };
    if let Some(frame) = video_texture_frame(key, ctx) {
        if let DrawCommand::Rect2D { paint, .. } = &mut command {
            paint.video = Some(frame);
        }
    }
    ctx.srv.backend.draw(&command, None);
}

fn clipped(planes: &[Plane], point: Point3) -> bool {
    planes.iter().any(|p| p.distance_to_point(point.coords) < 0.0)
}
