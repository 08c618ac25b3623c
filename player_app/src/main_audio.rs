//! Spatial audio mixing demo
//!
//! Feeds two looping sine sources through spatialized sound nodes and pulls
//! mixed PCM windows the way an audio output thread would:
//! - Ellipsoidal distance gain and stereo panning from the listener pose
//! - Scene-clock activation with the second source joining mid-run
//! - Master volume and balance applied at the mixer

use scene_compositor::media::PcmMedia;
use scene_compositor::nodes::{AudioClipBehavior, Transform3DBehavior};
use scene_compositor::prelude::*;

const WIDTH: u32 = 640;
const HEIGHT: u32 = 480;

// One mixing window per scene-clock step, 100 ms at the stock output format
// (44.1 kHz stereo s16). The buffer-ahead margin is 200 ms, so the pipes
// never starve between pulls.
const DT: f64 = 0.1;
const WINDOW_FRAMES: usize = 4_410;
const BYTES_PER_FRAME: usize = 4;
const ITERATIONS: usize = 20;

const SOURCE_DISTANCE: f32 = 2.0;
const RIGHT_START: f64 = 0.6;

/// Transform -> spatialized sound -> looping audio clip
fn spawn_source(
    comp: &mut Compositor,
    root: NodeKey,
    x: f32,
    media: MediaKey,
    start: f64,
) -> Result<NodeKey, CompositorError> {
    let mount = comp.add_child(root, NodeKind::Transform3D)?;
    comp.graph_mut().put_behavior(
        mount,
        Box::new(Transform3DBehavior::new().with_translation(x, 0.0, 8.0)),
    );
    let sound = comp.add_child(mount, NodeKind::Sound3D)?;
    let clip = comp.add_child(sound, NodeKind::AudioClip)?;
    let times = ActivationTimes {
        start,
        looping: true,
        ..ActivationTimes::default()
    };
    comp.graph_mut().put_behavior(
        clip,
        Box::new(AudioClipBehavior::new().with_media(media).with_times(times)),
    );
    Ok(clip)
}

/// Largest absolute sample per channel in a stereo s16 window
fn channel_peaks(buf: &[u8]) -> (i16, i16) {
    let mut left = 0i16;
    let mut right = 0i16;
    for frame in buf.chunks_exact(BYTES_PER_FRAME) {
        let l = i16::from_le_bytes([frame[0], frame[1]]).saturating_abs();
        let r = i16::from_le_bytes([frame[2], frame[3]]).saturating_abs();
        left = left.max(l);
        right = right.max(r);
    }
    (left, right)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    scene_compositor::foundation::logging::init();

    log::info!("starting the audio mix demo");
    let mut comp = Compositor::new(CompositorConfig::new(WIDTH, HEIGHT))?;
    let root = comp.add_node(NodeKind::Group);
    comp.set_root(root)?;

    let left_media = comp
        .services_mut()
        .media
        .add(Box::new(PcmMedia::sine(44_100, 330.0, 2.0, 0.5)));
    let right_media = comp
        .services_mut()
        .media
        .add(Box::new(PcmMedia::sine(44_100, 440.0, 2.0, 0.5)));

    // The listener sits at the stock camera pose; both sources land in the
    // falloff zone of the stock sound shape, panned hard to their sides.
    let left_clip = spawn_source(&mut comp, root, -SOURCE_DISTANCE, left_media, 0.0)?;
    let right_clip = spawn_source(&mut comp, root, SOURCE_DISTANCE, right_media, RIGHT_START)?;

    let mut window = vec![0u8; WINDOW_FRAMES * BYTES_PER_FRAME];
    for iteration in 0..ITERATIONS {
        // Redraw every step so the sort pass refreshes spatial gains.
        comp.request_redraw();
        comp.advance(DT);
        comp.frame();

        let produced = comp.render_audio(&mut window);
        let (peak_l, peak_r) = channel_peaks(&window);
        log::info!(
            "t={:.1}s {produced} frames mixed, peaks L={peak_l} R={peak_r}",
            comp.now()
        );

        for event in comp.drain_events() {
            log::info!("activity event: {event:?}");
        }

        match iteration {
            9 => {
                log::info!("dropping master volume to 40%");
                comp.services().audio.set_volume(40);
            }
            14 => {
                log::info!("panning the master balance toward the left");
                comp.services().audio.set_pan(10);
            }
            _ => {}
        }
    }

    let left_active = comp
        .graph()
        .behavior_ref::<AudioClipBehavior>(left_clip)
        .map_or(false, |c| c.is_active());
    let right_active = comp
        .graph()
        .behavior_ref::<AudioClipBehavior>(right_clip)
        .map_or(false, |c| c.is_active());
    log::info!(
        "clips active at the end: left={left_active} right={right_active}, \
         delivered {} frames ({:.2}s)",
        comp.services().audio.frames_played(),
        comp.services().audio.audio_time()
    );
    log::info!("audio mix demo finished");
    Ok(())
}
