//! Top-level compositor owning the scene, the frame loop and input routing
//!
//! One [`Compositor`] wraps a scene graph, the shared [`Services`] and the
//! main visual. The embedding player advances the scene clock, feeds pointer
//! input and calls [`Compositor::frame`] whenever it wants a frame; whether
//! that frame actually rasterizes is decided by the redraw gate, so an idle
//! scene costs one tick pass and nothing else.

use thiserror::Error;

use crate::bind;
use crate::camera::Camera;
use crate::collision;
use crate::config::CompositorConfig;
use crate::events::CompositorEvent;
use crate::foundation::geometry::Rect;
use crate::graph::{GraphError, NodeKey, NodeKind, SceneGraph};
use crate::nodes::{self, TouchSensorBehavior};
use crate::render::{DrawCommand, FrameInfo, LightParams, VisualKey};
use crate::services::Services;
use crate::timing;
use crate::traverse::{screen_to_ndc, PickResult, TraverseCtx, TraverseMode, TraverseState};

/// Errors surfaced by the compositor API
#[derive(Error, Debug)]
pub enum CompositorError {
    /// The configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A scene-graph operation referenced a dead node
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// # Scene Compositor
///
/// Owns the scene graph, the shared services and the main visual, and turns
/// them into frames. A frame runs the timed-node tick, applies queued bind
/// requests, and only then consults the redraw gate; when a redraw is due it
/// runs the traversal passes over the root and flushes the recorded commands
/// through the backend.
///
/// Scene time never advances on its own. The embedder calls
/// [`Compositor::advance`] between frames, typically slaved to the audio
/// clock, so pausing or seeking the player is a clock operation rather than
/// a compositor one.
pub struct Compositor {
    config: CompositorConfig,
    graph: SceneGraph,
    srv: Services,
    visual: VisualKey,
    over_sensors: Vec<NodeKey>,
    grabbed: Vec<NodeKey>,
}

impl Compositor {
    /// Build a compositor from a validated configuration
    ///
    /// # Errors
    ///
    /// Returns [`CompositorError::Config`] when the configuration fails
    /// validation.
    pub fn new(config: CompositorConfig) -> Result<Self, CompositorError> {
        config.validate().map_err(CompositorError::Config)?;
        let mut srv = Services::new(&config);
        let width = config.output.width as f32;
        let height = config.output.height as f32;
        let visual = srv.create_visual(config.output.three_d, width, height);
        if let Some(v) = srv.visuals.get_mut(visual) {
            v.default_clear = config.output.clear_color;
            v.clear_color = config.output.clear_color;
        }
        log::info!(
            "compositor up: {}x{} {}",
            config.output.width,
            config.output.height,
            if config.output.three_d { "3d" } else { "2d" }
        );
        Ok(Self {
            config,
            graph: SceneGraph::new(),
            srv,
            visual,
            over_sensors: Vec::new(),
            grabbed: Vec::new(),
        })
    }

    /// Active configuration
    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Scene graph
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    /// Mutable scene graph, for direct node edits
    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Shared services
    pub fn services(&self) -> &Services {
        &self.srv
    }

    /// Mutable shared services, for media registration and backend swaps
    pub fn services_mut(&mut self) -> &mut Services {
        &mut self.srv
    }

    /// Visual the compositor renders into
    pub fn main_visual(&self) -> VisualKey {
        self.visual
    }

    /// Camera of the main visual
    pub fn camera(&self) -> Option<&Camera> {
        self.srv.visuals.get(self.visual).map(|v| &v.camera)
    }

    /// Mutable camera of the main visual, for navigation input
    pub fn camera_mut(&mut self) -> Option<&mut Camera> {
        self.srv.visuals.get_mut(self.visual).map(|v| &mut v.camera)
    }

    /// Current scene time in seconds
    pub fn now(&self) -> f64 {
        self.srv.time.now()
    }

    /// Frames composed since startup
    pub fn frames_composed(&self) -> u64 {
        self.srv.frame_no
    }

    /// Advance the scene clock
    pub fn advance(&mut self, dt: f64) {
        self.srv.time.advance(dt);
    }

    /// Pause or resume the scene clock
    pub fn set_paused(&mut self, paused: bool) {
        self.srv.time.set_paused(paused);
    }

    /// True while the scene clock is paused
    pub fn is_paused(&self) -> bool {
        self.srv.time.is_paused()
    }

    /// Jump the scene clock to an absolute time
    pub fn seek(&mut self, time: f64) {
        self.srv.time.set_time(time);
        self.srv.request_redraw();
    }

    /// Ask for a redraw at the next [`Compositor::frame`] call
    pub fn request_redraw(&mut self) {
        self.srv.request_redraw();
    }

    /// True while a redraw request is pending
    pub fn redraw_pending(&self) -> bool {
        self.srv.redraw_pending()
    }

    /// Next queued event, if any
    pub fn poll_event(&mut self) -> Option<CompositorEvent> {
        self.srv.events.poll()
    }

    /// All queued events, oldest first
    pub fn drain_events(&mut self) -> Vec<CompositorEvent> {
        self.srv.events.drain()
    }

    /// Insert a detached node of the given kind with its stock behavior
    pub fn add_node(&mut self, kind: NodeKind) -> NodeKey {
        self.graph.insert(nodes::create_node(kind), &mut self.srv)
    }

    /// Insert a node of the given kind as the last child of `parent`
    ///
    /// # Errors
    ///
    /// Returns [`CompositorError::Graph`] when `parent` is not in the arena.
    pub fn add_child(
        &mut self,
        parent: NodeKey,
        kind: NodeKind,
    ) -> Result<NodeKey, CompositorError> {
        let key = self
            .graph
            .insert_child(parent, nodes::create_node(kind), &mut self.srv)?;
        self.srv.request_redraw();
        Ok(key)
    }

    /// Designate the traversal root
    ///
    /// # Errors
    ///
    /// Returns [`CompositorError::Graph`] when `key` is not in the arena.
    pub fn set_root(&mut self, key: NodeKey) -> Result<(), CompositorError> {
        self.graph.set_root(key)?;
        self.srv.request_redraw();
        Ok(())
    }

    /// Remove a node and its subtree
    ///
    /// A bound bindable promotes the next stack member before it leaves, so
    /// the following frame never starts with an empty binding while
    /// alternatives exist.
    pub fn remove_node(&mut self, key: NodeKey) {
        bind::rebind_on_removal(&mut self.graph, &mut self.srv, key);
        self.graph.remove(key, &mut self.srv);
        self.over_sensors.retain(|k| *k != key);
        self.grabbed.retain(|k| *k != key);
        self.srv.request_redraw();
    }

    /// Queue a `set_bind` request for a bindable node
    ///
    /// Requests apply at the start of the next frame, before the redraw
    /// gate, so a request that changes a binding always produces a frame.
    pub fn set_bind(&mut self, node: NodeKey, value: bool) {
        self.srv.stacks.queue_request(node, value);
    }

    /// Change the output size
    ///
    /// # Errors
    ///
    /// Returns [`CompositorError::Config`] when either dimension is zero.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CompositorError> {
        if width == 0 || height == 0 {
            return Err(CompositorError::Config(
                "output size must be non-zero".to_string(),
            ));
        }
        self.config.output.width = width;
        self.config.output.height = height;
        if let Some(visual) = self.srv.visuals.get_mut(self.visual) {
            visual.resize(width as f32, height as f32);
        }
        self.srv.request_redraw();
        log::debug!("output resized to {width}x{height}");
        Ok(())
    }

    /// Fill `out` with mixed audio and return the frames produced
    ///
    /// Safe to call from an audio thread; the mixer state is behind its own
    /// lock and never touches the scene graph.
    pub fn render_audio(&self, out: &mut [u8]) -> usize {
        self.srv.audio.render_frame(out)
    }

    /// Compose one frame
    ///
    /// Timed nodes tick and queued bind requests apply on every call; the
    /// traversal passes and the backend flush run only when a redraw request
    /// is pending. With no root the frame still clears the target.
    pub fn frame(&mut self) {
        timing::run_tick_pass(&mut self.graph, &mut self.srv);

        for (node, value) in self.srv.stacks.take_requests() {
            bind::apply_set_bind(&mut self.graph, &mut self.srv, node, value);
        }

        if !self.srv.take_redraw() {
            return;
        }

        let now = self.srv.time.now();
        let Some((width, height, three_d)) = self.srv.visuals.get_mut(self.visual).map(|v| {
            v.begin_frame();
            (v.width, v.height, v.three_d)
        }) else {
            return;
        };
        let root = self.graph.root();

        if let Some(root) = root {
            self.run_pass(TraverseMode::BindableEval, root);
        }

        // The camera settles after bindables had their say and before
        // lighting and sort read the pose.
        let animating = self
            .srv
            .visuals
            .get_mut(self.visual)
            .map_or(false, |v| v.camera.tick_transition(now));
        if animating {
            self.srv.request_redraw();
        }

        if let Some(root) = root {
            if three_d {
                collision::resolve_camera_move(
                    &mut self.graph,
                    &mut self.srv,
                    self.visual,
                    root,
                    self.config.navigation.collisions,
                    self.config.navigation.gravity,
                );
            }
        }

        if let Some(visual) = self.srv.visuals.get_mut(self.visual) {
            visual.camera.update(width, height);
        }

        if let Some(root) = root {
            if three_d {
                self.run_pass(TraverseMode::Lighting, root);
                if let Some(visual) = self.srv.visuals.get_mut(self.visual) {
                    if visual.camera.nav.headlight {
                        let direction = visual.camera.pose.direction();
                        visual.lights.push(LightParams::headlight(direction));
                    }
                }
            }
            self.run_pass(TraverseMode::Sort, root);
        }

        self.flush();
        self.srv.frame_no += 1;
    }

    /// Closest pickable shape under a screen-space point
    ///
    /// Pixel origin is the top-left corner, y down. Runs against the current
    /// scene state and leaves no trace, so repeated queries at the same point
    /// return the same result.
    pub fn pick(&mut self, x: f32, y: f32) -> Option<PickResult> {
        let root = self.graph.root()?;
        let (ray, state) = {
            let visual = self.srv.visuals.get_mut(self.visual)?;
            let (width, height) = (visual.width, visual.height);
            visual.camera.update(width, height);
            let (ndc_x, ndc_y) = screen_to_ndc(x, y, width, height);
            let ray = visual.camera.pick_ray(ndc_x, ndc_y);
            let state = TraverseState::for_visual(TraverseMode::Pick, self.visual, visual);
            (ray, state)
        };
        self.srv.pick.begin(ray);
        let mut ctx = TraverseCtx {
            graph: &mut self.graph,
            srv: &mut self.srv,
            state,
        };
        ctx.traverse_node(root);
        self.srv.pick.finish()
    }

    /// Route a pointer move, updating sensor over states
    ///
    /// Sensors the pointer left get their over flag cleared before sensors
    /// it entered are set, each edge emitting one event.
    pub fn pointer_move(&mut self, x: f32, y: f32) -> Option<PickResult> {
        let result = self.pick(x, y);
        let chain = result.as_ref().map_or(Vec::new(), |r| r.sensors.clone());
        let previous = std::mem::take(&mut self.over_sensors);
        for node in &previous {
            if !chain.contains(node) {
                self.route_over(*node, false);
            }
        }
        for node in &chain {
            if !previous.contains(node) {
                self.route_over(*node, true);
            }
        }
        self.over_sensors = chain;
        result
    }

    /// Route a pointer press or release
    ///
    /// A press grabs the sensors currently under the pointer; the matching
    /// release deactivates exactly those, even if the pointer moved away in
    /// between.
    pub fn pointer_button(&mut self, pressed: bool) {
        if pressed {
            self.grabbed = self.over_sensors.clone();
            for node in self.grabbed.clone() {
                self.route_active(node, true);
            }
        } else {
            for node in std::mem::take(&mut self.grabbed) {
                self.route_active(node, false);
            }
        }
    }

    fn route_over(&mut self, node: NodeKey, over: bool) {
        if let Some(sensor) = self.graph.behavior_mut::<TouchSensorBehavior>(node) {
            sensor.set_over(node, &mut self.srv, over);
        }
    }

    fn route_active(&mut self, node: NodeKey, active: bool) {
        if let Some(sensor) = self.graph.behavior_mut::<TouchSensorBehavior>(node) {
            sensor.set_active(node, &mut self.srv, active);
        }
    }

    fn run_pass(&mut self, mode: TraverseMode, root: NodeKey) {
        let state = match self.srv.visuals.get(self.visual) {
            Some(visual) => TraverseState::for_visual(mode, self.visual, visual),
            None => return,
        };
        let mut ctx = TraverseCtx {
            graph: &mut self.graph,
            srv: &mut self.srv,
            state,
        };
        ctx.traverse_node(root);
    }

    /// Hand the frame to the backend: clear, backdrop, sorted commands
    fn flush(&mut self) {
        let Some(visual) = self.srv.visuals.get_mut(self.visual) else {
            return;
        };
        let viewport = Rect::new(0.0, 0.0, visual.width, visual.height);
        let clear_color = visual.clear_color;
        let three_d = visual.three_d;
        let fog = visual.fog;
        let lights = visual.lights.clone();
        let mut commands = Vec::new();
        if let Some(backdrop) = visual.backdrop.take() {
            commands.push(backdrop);
        }
        commands.extend(visual.draw.take_ordered());

        self.srv.backend.begin_frame(&FrameInfo {
            viewport,
            clear_color,
            three_d,
            fog,
            lights: &lights,
        });
        for command in commands {
            self.replay(command);
        }
        self.srv.backend.end_frame();
    }

    /// Replay one recorded command through its node's draw arm
    fn replay(&mut self, command: DrawCommand) {
        let mode = match &command {
            DrawCommand::Rect2D { .. } => TraverseMode::Draw2d,
            DrawCommand::Mesh3D { .. } => TraverseMode::Draw3d,
        };
        let node = command.node();
        let state = match self.srv.visuals.get(self.visual) {
            Some(visual) => TraverseState::for_visual(mode, self.visual, visual),
            None => return,
        };
        let mut ctx = TraverseCtx {
            graph: &mut self.graph,
            srv: &mut self.srv,
            state,
        };
        ctx.state.draw = Some(command);
        ctx.traverse_node(node);
    }
}
