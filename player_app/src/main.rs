//! Scene walkthrough demo
//!
//! Drives the compositor headlessly through a small interactive scene:
//! - Background/navigation stacks auto-binding on the first frame
//! - A touch-sensor switch that swaps the bound background when pressed
//! - Walk navigation arrested by sphere collision against a wall
//! - A deterministic ray pick through the screen center
//! - A viewpoint inserted mid-run, auto-binding and gliding the camera up
//!   to an overview pose

use scene_compositor::foundation::math::utils;
use scene_compositor::nodes::{
    BackgroundBehavior, NavigationInfoBehavior, Shape3DBehavior, Transform3DBehavior,
    ViewpointBehavior,
};
use scene_compositor::prelude::*;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;
const DT: f64 = 1.0 / 60.0;

// Scene layout
const WALL_SIZE: f32 = 4.0;
const SWITCH_SIZE: f32 = 1.0;
const WALK_SPEED: f32 = 4.0;
const OVERVIEW_POSITION: [f32; 3] = [0.0, 6.0, 14.0];
const OVERVIEW_FOV_DEG: f32 = 60.0;

// Loop limits
const WALK_FRAMES: usize = 150;
const GLIDE_FRAMES: usize = 90;
const SWEEP_STEP: f32 = 16.0;

struct WalkthroughApp {
    comp: Compositor,
    root: NodeKey,
    wall: NodeKey,
    bg_night: NodeKey,
}

impl WalkthroughApp {
    fn new(config: CompositorConfig) -> Result<Self, CompositorError> {
        let mut comp = Compositor::new(config)?;

        let root = comp.add_node(NodeKind::Group);
        comp.set_root(root)?;

        // Two backgrounds; the first one inserted auto-binds.
        let bg_day = comp.add_child(root, NodeKind::Background)?;
        comp.graph_mut().put_behavior(
            bg_day,
            Box::new(BackgroundBehavior::new([0.35, 0.55, 0.9, 1.0])),
        );
        let bg_night = comp.add_child(root, NodeKind::Background)?;
        comp.graph_mut().put_behavior(
            bg_night,
            Box::new(BackgroundBehavior::new([0.02, 0.03, 0.1, 1.0])),
        );

        // No viewpoint yet: the camera keeps its stock pose until the
        // overview viewpoint joins the scene later on.
        let nav = comp.add_child(root, NodeKind::NavigationInfo)?;
        let params = NavigationParams {
            speed: WALK_SPEED,
            ..NavigationParams::default()
        };
        comp.graph_mut()
            .put_behavior(nav, Box::new(NavigationInfoBehavior::new(params)));

        comp.add_child(root, NodeKind::DirectionalLight)?;

        // The wall straight ahead of the camera.
        let wall = comp.add_child(root, NodeKind::Shape3D)?;
        comp.graph_mut()
            .put_behavior(wall, Box::new(Shape3DBehavior::cube(WALL_SIZE)));

        // A switch off to the right: the sensor governs the sibling shape
        // that follows it.
        let pedestal = comp.add_child(root, NodeKind::Transform3D)?;
        comp.graph_mut().put_behavior(
            pedestal,
            Box::new(Transform3DBehavior::new().with_translation(3.5, 0.0, 4.0)),
        );
        comp.add_child(pedestal, NodeKind::TouchSensor)?;
        let switch_shape = comp.add_child(pedestal, NodeKind::Shape3D)?;
        comp.graph_mut()
            .put_behavior(switch_shape, Box::new(Shape3DBehavior::cube(SWITCH_SIZE)));

        log::info!("scene built: {} nodes", comp.graph().len());

        Ok(Self {
            comp,
            root,
            wall,
            bg_night,
        })
    }

    fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.settle();
        self.press_switch();
        self.walk_to_wall()?;
        self.pick_wall();
        self.glide_to_overview()?;
        self.report()
    }

    /// Two frames: the first elects stack fronts, the second applies their
    /// contributions (clear color, navigation parameters)
    fn settle(&mut self) {
        self.comp.frame();
        self.comp.frame();
        for event in self.comp.drain_events() {
            log::info!("settle event: {event:?}");
        }
    }

    fn view_size(&self) -> (f32, f32) {
        let out = &self.comp.config().output;
        (out.width as f32, out.height as f32)
    }

    /// Sweep the pointer along the center line until a sensor answers, then
    /// press and release over it
    fn press_switch(&mut self) {
        let (width, height) = self.view_size();
        let y = height / 2.0;
        let mut found = false;
        let mut x = 0.0;
        while x < width {
            if let Some(hit) = self.comp.pointer_move(x, y) {
                if !hit.sensors.is_empty() {
                    log::info!(
                        "switch under the pointer at x={x:.0}, world ({:.2}, {:.2}, {:.2})",
                        hit.world_point.x,
                        hit.world_point.y,
                        hit.world_point.z
                    );
                    found = true;
                    break;
                }
            }
            x += SWEEP_STEP;
        }
        if !found {
            log::warn!("no sensor under the sweep line, skipping the switch");
            return;
        }

        self.comp.pointer_button(true);
        self.comp.pointer_button(false);
        self.comp.pointer_move(0.0, 0.0);

        let mut pressed = false;
        for event in self.comp.drain_events() {
            log::info!("switch event: {event:?}");
            if matches!(event, CompositorEvent::SensorActive { active: true, .. }) {
                pressed = true;
            }
        }
        if pressed {
            log::info!("switch pressed, binding the night background");
            self.comp.set_bind(self.bg_night, true);
            self.comp.frame();
            for event in self.comp.drain_events() {
                log::info!("background event: {event:?}");
            }
        }
    }

    /// Walk straight at the wall until collision stops making progress
    fn walk_to_wall(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let speed = self.comp.camera().ok_or("main visual lost")?.nav.speed;
        log::info!("walking toward the wall at {speed} units/s");
        let mut last_z = f32::MAX;
        for frame in 0..WALK_FRAMES {
            {
                let camera = self.comp.camera_mut().ok_or("main visual lost")?;
                let step = camera.pose.direction() * speed * DT as f32;
                camera.pose.position += step;
            }
            self.comp.request_redraw();
            self.comp.advance(DT);
            self.comp.frame();

            let position = self.comp.camera().ok_or("main visual lost")?.pose.position;
            if frame % 30 == 0 {
                log::debug!(
                    "avatar at ({:.2}, {:.2}, {:.2})",
                    position.x,
                    position.y,
                    position.z
                );
            }
            if (position.z - last_z).abs() < 1e-4 {
                log::info!(
                    "wall arrested the walk at z={:.3} after {frame} frames",
                    position.z
                );
                return Ok(());
            }
            last_z = position.z;
        }
        log::warn!("walk never collided within {WALK_FRAMES} frames");
        Ok(())
    }

    /// Cast a pick ray through the screen center
    fn pick_wall(&mut self) {
        let (width, height) = self.view_size();
        let Some(hit) = self.comp.pick(width / 2.0, height / 2.0) else {
            log::warn!("center pick found nothing");
            return;
        };
        let what = if hit.node == self.wall {
            "the wall"
        } else {
            "another node"
        };
        log::info!(
            "center pick hit {what} at ({:.2}, {:.2}, {:.2}), {:.3} units from the near plane",
            hit.world_point.x,
            hit.world_point.y,
            hit.world_point.z,
            hit.distance
        );
    }

    /// Insert the overview viewpoint; the first member of an empty stack
    /// binds itself and the bind starts a camera transition
    fn glide_to_overview(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        log::info!("inserting the overview viewpoint");
        let overview = CameraPose {
            position: Point3::new(
                OVERVIEW_POSITION[0],
                OVERVIEW_POSITION[1],
                OVERVIEW_POSITION[2],
            ),
            fov: utils::deg_to_rad(OVERVIEW_FOV_DEG),
            ..CameraPose::default()
        };
        let vp = self.comp.add_child(self.root, NodeKind::Viewpoint)?;
        self.comp
            .graph_mut()
            .put_behavior(vp, Box::new(ViewpointBehavior::new(overview)));

        self.comp.frame();
        for event in self.comp.drain_events() {
            log::info!("viewpoint event: {event:?}");
        }
        for frame in 0..GLIDE_FRAMES {
            self.comp.advance(DT);
            self.comp.frame();
            if frame % 15 == 0 {
                if let Some(camera) = self.comp.camera() {
                    let p = camera.pose.position;
                    log::debug!("camera gliding through ({:.2}, {:.2}, {:.2})", p.x, p.y, p.z);
                }
            }
        }
        if let Some(camera) = self.comp.camera() {
            let p = camera.pose.position;
            log::info!(
                "overview reached at ({:.2}, {:.2}, {:.2}), transitioning={}",
                p.x,
                p.y,
                p.z,
                camera.is_transitioning()
            );
        }
        Ok(())
    }

    fn report(&self) -> Result<(), Box<dyn std::error::Error>> {
        let stats = self
            .comp
            .services()
            .null_backend()
            .ok_or("demo runs on the null backend")?;
        log::info!(
            "composed {} frames, {} mesh draws, {} mesh uploads",
            self.comp.frames_composed(),
            stats.meshes,
            stats.uploads
        );
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .init();

    // An optional TOML or RON file on the command line overrides the
    // built-in configuration.
    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("loading configuration from {path}");
            CompositorConfig::load_from_file(&path)?
        }
        // 1.2 s glide; the demo loop gives the transition 90 frames to land.
        None => CompositorConfig::new(WIDTH, HEIGHT)
            .with_navigation(NavigationConfig::default().with_viewpoint_transition(1.2)),
    };

    log::info!("starting the walkthrough demo");
    let mut app = WalkthroughApp::new(config)?;
    app.run()?;
    log::info!("walkthrough demo finished");
    Ok(())
}
