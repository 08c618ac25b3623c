//! Timed media nodes
//!
//! Audio clips and movie textures share one activation machine: every tick
//! they evaluate their interval against the scene clock and apply the
//! resulting transition to the media object the embedder registered. A node
//! whose interval can never fire again drops out of the tick order; external
//! reconfiguration puts it back.
//!
//! Audio clips additionally own the [`AudioPipe`] that carries PCM to the
//! mixer and keep it filled up to the configured buffer-ahead margin. Movie
//! textures only hold the latest decoded frame; the drawable parent pulls it
//! during the flush, at most once per compositor frame.

use crate::audio::mixer::SourceKey;
use crate::audio::pipe::AudioPipe;
use crate::events::CompositorEvent;
use crate::graph::{NodeBehavior, NodeKey, NodeKind, SceneGraph};
use crate::media::{MediaKey, MediaRegistry, VideoFrame};
use crate::services::Services;
use crate::timing::{Activation, ActivationTimes, TickCtx, TimedAction};
use crate::traverse::{TraverseCtx, TraverseMode};

/// Audio source node driven by the scene clock
pub struct AudioClipBehavior {
    /// Activation interval and playback shaping
    pub times: ActivationTimes,
    media: Option<MediaKey>,
    activation: Activation,
    pipe: Option<AudioPipe>,
    source: Option<SourceKey>,
}

impl AudioClipBehavior {
    pub fn new() -> Self {
        Self {
            times: ActivationTimes::default(),
            media: None,
            activation: Activation::default(),
            pipe: None,
            source: None,
        }
    }

    pub fn with_media(mut self, media: MediaKey) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_times(mut self, times: ActivationTimes) -> Self {
        self.times = times;
        self
    }

    /// True while the clip is between its activation edges
    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    /// Pipe feeding the mixer, present once the clip started at least once
    pub fn pipe(&self) -> Option<&AudioPipe> {
        self.pipe.as_ref()
    }

    /// Point the clip at a new media object and interval
    ///
    /// An active clip swaps the resource in place without an activity
    /// toggle. Clears any previous open failure and rejoins the tick order.
    pub fn configure(
        &mut self,
        key: NodeKey,
        srv: &mut Services,
        media: MediaKey,
        times: ActivationTimes,
    ) {
        let was_active = self.activation.is_active();
        if was_active {
            if let Some(previous) = self.media {
                if previous != media {
                    if let Some(object) = srv.media.get_mut(previous) {
                        object.stop();
                    }
                }
            }
        }
        self.media = Some(media);
        self.times = times;
        self.activation.clear_failure();
        if was_active {
            let out_format = srv.audio.out_format();
            let now = srv.time.now();
            if let Some(object) = srv.media.get_mut(media) {
                match object.open() {
                    Err(err) => {
                        log::error!("audio clip media open failed: {err}");
                        self.activation.mark_failed();
                    }
                    Ok(()) => {
                        let format = object.audio_format().unwrap_or(out_format);
                        object.set_speed(times.speed);
                        let offset = (now - times.start).max(0.0);
                        let end = times.stop_valid().then(|| times.stop - times.start);
                        object.play(offset, end, times.looping);
                        if let Some(pipe) = &mut self.pipe {
                            pipe.clear();
                            pipe.set_format(format);
                            pipe.set_eos(false);
                            pipe.set_speed(times.speed);
                        }
                    }
                }
            }
        }
        srv.timing.register(key);
    }

    /// Move decoded samples into the pipe up to the buffer-ahead margin
    fn pump(&mut self, media_key: MediaKey, ctx: &mut TickCtx<'_>) {
        let Some(pipe) = &self.pipe else {
            return;
        };
        let ahead = ctx.srv.audio_buffer_ahead;
        let Some(object) = ctx.srv.media.get_mut(media_key) else {
            return;
        };
        loop {
            let buffered = pipe.buffered_seconds();
            if buffered >= ahead {
                break;
            }
            let format = pipe.format();
            let missing = ahead - buffered;
            let frames = (missing * f64::from(format.sample_rate)).ceil() as usize;
            let budget = format.frames_to_bytes(frames);
            if budget == 0 {
                break;
            }
            let chunk = object.fetch_samples();
            if chunk.is_empty() {
                break;
            }
            let take = chunk.len().min(budget);
            let pushed = pipe.push(&chunk[..take]);
            object.release_samples(pushed);
            if pushed == 0 {
                break;
            }
        }
    }

    fn start(&mut self, key: NodeKey, now: f64, ctx: &mut TickCtx<'_>) {
        let Some(media_key) = self.media else {
            return;
        };
        let out_format = ctx.srv.audio.out_format();
        let Some(object) = ctx.srv.media.get_mut(media_key) else {
            return;
        };
        if let Err(err) = object.open() {
            log::error!("audio clip media open failed: {err}");
            self.activation.mark_failed();
            return;
        }
        let format = object.audio_format().unwrap_or(out_format);
        object.set_speed(self.times.speed);
        let offset = (now - self.times.start).max(0.0);
        let end = self.times.stop_valid().then(|| self.times.stop - self.times.start);
        object.play(offset, end, self.times.looping);

        let pipe = self.pipe.get_or_insert_with(|| AudioPipe::new(format));
        pipe.set_format(format);
        pipe.clear();
        pipe.set_eos(false);
        pipe.set_speed(self.times.speed);
        if self.source.is_none() {
            self.source = Some(ctx.srv.audio.register_source(pipe.clone()));
        }

        self.activation.begin(now);
        ctx.srv.events.push(CompositorEvent::NodeActive {
            node: key,
            active: true,
        });
        ctx.srv.request_redraw();
        log::debug!("audio clip activated at {now:.3}s");
    }

    fn stop(&mut self, key: NodeKey, ctx: &mut TickCtx<'_>) {
        if let Some(media_key) = self.media {
            if let Some(object) = ctx.srv.media.get_mut(media_key) {
                object.stop();
            }
        }
        // The source stays registered so buffered samples drain.
        if let Some(pipe) = &self.pipe {
            pipe.set_eos(true);
        }
        self.activation.end();
        ctx.srv.events.push(CompositorEvent::NodeActive {
            node: key,
            active: false,
        });
        ctx.srv.request_redraw();
        log::debug!("audio clip deactivated");
    }

    fn restart(&mut self, ctx: &mut TickCtx<'_>) {
        if let Some(media_key) = self.media {
            if let Some(object) = ctx.srv.media.get_mut(media_key) {
                object.restart();
            }
        }
        if let Some(pipe) = &self.pipe {
            pipe.set_eos(false);
        }
        self.activation.bump_cycle();
        log::debug!("audio clip loop {}", self.activation.cycle());
    }
}

impl Default for AudioClipBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for AudioClipBehavior {
    fn traverse(&mut self, _key: NodeKey, ctx: &mut TraverseCtx<'_>) {
        // Sound parents leave per-channel gains in the traversal state.
        if ctx.state.mode == TraverseMode::Sort {
            if let (Some(pipe), Some(gains)) = (&self.pipe, ctx.state.gains) {
                pipe.set_gains(gains);
            }
        }
    }

    fn update_time(&mut self, key: NodeKey, ctx: &mut TickCtx<'_>) -> bool {
        let now = ctx.srv.time.now();
        let Some(media_key) = self.media else {
            return false;
        };
        if self.activation.is_active() {
            self.pump(media_key, ctx);
        }
        let (done, auto) = match ctx.srv.media.get(media_key) {
            Some(object) => (object.is_done(), object.should_auto_deactivate()),
            None => (false, true),
        };
        if done {
            if let Some(pipe) = &self.pipe {
                pipe.set_eos(true);
            }
        }
        let drained = self.pipe.as_ref().map_or(true, |p| p.is_done());
        match self
            .activation
            .evaluate(now, &self.times, done && drained, auto)
        {
            Some(TimedAction::Start) => {
                self.start(key, now, ctx);
                if self.activation.is_active() {
                    self.pump(media_key, ctx);
                }
            }
            Some(TimedAction::Stop) => {
                self.stop(key, ctx);
                return false;
            }
            Some(TimedAction::Restart) => self.restart(ctx),
            None => {}
        }
        self.activation.is_active()
            || (!self.activation.is_failed()
                && self.times.start >= 0.0
                && !(self.times.stop_valid() && now >= self.times.stop))
    }

    fn attached(&mut self, key: NodeKey, srv: &mut Services) {
        srv.timing.register(key);
    }

    fn detached(&mut self, key: NodeKey, srv: &mut Services) {
        srv.timing.unregister(key);
        if let Some(source) = self.source.take() {
            srv.audio.unregister_source(source);
        }
        if self.activation.is_active() {
            if let Some(media_key) = self.media {
                if let Some(object) = srv.media.get_mut(media_key) {
                    object.stop();
                }
            }
            self.activation.end();
        }
    }
}

/// Video texture node; a drawable parent samples it during the flush
pub struct MovieTextureBehavior {
    /// Activation interval and playback shaping
    pub times: ActivationTimes,
    media: Option<MediaKey>,
    activation: Activation,
    frame: Option<VideoFrame>,
    fetched_frame: Option<u64>,
}

impl MovieTextureBehavior {
    pub fn new() -> Self {
        Self {
            times: ActivationTimes::default(),
            media: None,
            activation: Activation::default(),
            frame: None,
            fetched_frame: None,
        }
    }

    pub fn with_media(mut self, media: MediaKey) -> Self {
        self.media = Some(media);
        self
    }

    pub fn with_times(mut self, times: ActivationTimes) -> Self {
        self.times = times;
        self
    }

    /// True while the texture is between its activation edges
    pub fn is_active(&self) -> bool {
        self.activation.is_active()
    }

    /// Point the texture at a new media object and interval
    pub fn configure(
        &mut self,
        key: NodeKey,
        srv: &mut Services,
        media: MediaKey,
        times: ActivationTimes,
    ) {
        let was_active = self.activation.is_active();
        if was_active {
            if let Some(previous) = self.media {
                if previous != media {
                    if let Some(object) = srv.media.get_mut(previous) {
                        object.stop();
                    }
                }
            }
        }
        self.media = Some(media);
        self.times = times;
        self.activation.clear_failure();
        self.fetched_frame = None;
        if was_active {
            let now = srv.time.now();
            if let Some(object) = srv.media.get_mut(media) {
                match object.open() {
                    Err(err) => {
                        log::error!("movie texture media open failed: {err}");
                        self.activation.mark_failed();
                    }
                    Ok(()) => {
                        object.set_speed(times.speed);
                        let offset = (now - times.start).max(0.0);
                        let end = times.stop_valid().then(|| times.stop - times.start);
                        object.play(offset, end, times.looping);
                    }
                }
            }
        }
        srv.timing.register(key);
    }

    /// Latest decoded frame, fetched at most once per compositor frame
    ///
    /// Keeps serving the last frame after deactivation so the image freezes
    /// instead of vanishing.
    pub fn current_frame(
        &mut self,
        media: &mut MediaRegistry,
        frame_no: u64,
    ) -> Option<VideoFrame> {
        if self.activation.is_active() && self.fetched_frame != Some(frame_no) {
            self.fetched_frame = Some(frame_no);
            if let Some(media_key) = self.media {
                if let Some(object) = media.get_mut(media_key) {
                    if let Some(frame) = object.video_frame() {
                        self.frame = Some(frame);
                    }
                }
            }
        }
        self.frame.clone()
    }

    fn start(&mut self, key: NodeKey, now: f64, ctx: &mut TickCtx<'_>) {
        let Some(media_key) = self.media else {
            return;
        };
        let Some(object) = ctx.srv.media.get_mut(media_key) else {
            return;
        };
        if let Err(err) = object.open() {
            log::error!("movie texture media open failed: {err}");
            self.activation.mark_failed();
            return;
        }
        object.set_speed(self.times.speed);
        let offset = (now - self.times.start).max(0.0);
        let end = self.times.stop_valid().then(|| self.times.stop - self.times.start);
        object.play(offset, end, self.times.looping);
        self.activation.begin(now);
        ctx.srv.events.push(CompositorEvent::NodeActive {
            node: key,
            active: true,
        });
        ctx.srv.request_redraw();
        log::debug!("movie texture activated at {now:.3}s");
    }

    fn stop(&mut self, key: NodeKey, ctx: &mut TickCtx<'_>) {
        if let Some(media_key) = self.media {
            if let Some(object) = ctx.srv.media.get_mut(media_key) {
                object.stop();
            }
        }
        self.activation.end();
        ctx.srv.events.push(CompositorEvent::NodeActive {
            node: key,
            active: false,
        });
        ctx.srv.request_redraw();
        log::debug!("movie texture deactivated");
    }

    fn restart(&mut self, ctx: &mut TickCtx<'_>) {
        if let Some(media_key) = self.media {
            if let Some(object) = ctx.srv.media.get_mut(media_key) {
                object.restart();
            }
        }
        self.activation.bump_cycle();
    }
}

impl Default for MovieTextureBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeBehavior for MovieTextureBehavior {
    fn traverse(&mut self, _key: NodeKey, _ctx: &mut TraverseCtx<'_>) {}

    fn update_time(&mut self, key: NodeKey, ctx: &mut TickCtx<'_>) -> bool {
        let now = ctx.srv.time.now();
        let Some(media_key) = self.media else {
            return false;
        };
        let (done, auto) = match ctx.srv.media.get(media_key) {
            Some(object) => (object.is_done(), object.should_auto_deactivate()),
            None => (false, true),
        };
        match self.activation.evaluate(now, &self.times, done, auto) {
            Some(TimedAction::Start) => self.start(key, now, ctx),
            Some(TimedAction::Stop) => {
                self.stop(key, ctx);
                return false;
            }
            Some(TimedAction::Restart) => self.restart(ctx),
            None => {}
        }
        // A playing video changes content every frame.
        if self.activation.is_active() {
            ctx.srv.request_redraw();
        }
        self.activation.is_active()
            || (!self.activation.is_failed()
                && self.times.start >= 0.0
                && !(self.times.stop_valid() && now >= self.times.stop))
    }

    fn attached(&mut self, key: NodeKey, srv: &mut Services) {
        srv.timing.register(key);
    }

    fn detached(&mut self, key: NodeKey, srv: &mut Services) {
        srv.timing.unregister(key);
        if self.activation.is_active() {
            if let Some(media_key) = self.media {
                if let Some(object) = srv.media.get_mut(media_key) {
                    object.stop();
                }
            }
            self.activation.end();
        }
    }
}

/// First movie-texture child of a node, if any
pub(crate) fn movie_child(graph: &SceneGraph, key: NodeKey) -> Option<NodeKey> {
    let mut index = 0;
    while let Some(child) = graph.child_at(key, index) {
        if graph.get(child).map(|n| n.kind) == Some(NodeKind::MovieTexture) {
            return Some(child);
        }
        index += 1;
    }
    None
}

/// Latest frame of `key`'s first movie-texture child
pub(crate) fn video_texture_frame(key: NodeKey, ctx: &mut TraverseCtx<'_>) -> Option<VideoFrame> {
    let child = movie_child(ctx.graph, key)?;
    let frame_no = ctx.srv.frame_no;
    let behavior = ctx.graph.behavior_mut::<MovieTextureBehavior>(child)?;
    behavior.current_frame(&mut ctx.srv.media, frame_no)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex, MutexGuard};

    use super::*;
    use crate::audio::{AudioFormat, SampleFormat};
    use crate::config::CompositorConfig;
    use crate::events::CompositorEvent;
    use crate::graph::SceneNode;
    use crate::media::{MediaError, MediaObject, PcmMedia, StubMedia};
    use crate::timing::run_tick_pass;
    use approx::assert_relative_eq;

    /// Registry-owned stub the test keeps a handle to
    #[derive(Clone)]
    struct SharedStub(Arc<Mutex<StubMedia>>);

    impl SharedStub {
        fn new(stub: StubMedia) -> Self {
            Self(Arc::new(Mutex::new(stub)))
        }

        fn lock(&self) -> MutexGuard<'_, StubMedia> {
            self.0.lock().unwrap()
        }
    }

    impl MediaObject for SharedStub {
        fn open(&mut self) -> Result<(), MediaError> {
            self.lock().open()
        }

        fn close(&mut self) {
            self.lock().close()
        }

        fn is_open(&self) -> bool {
            self.lock().is_open()
        }

        fn is_ready(&self) -> bool {
            self.lock().is_ready()
        }

        fn play(&mut self, start: f64, end: Option<f64>, looping: bool) {
            self.lock().play(start, end, looping)
        }

        fn stop(&mut self) {
            self.lock().stop()
        }

        fn restart(&mut self) {
            self.lock().restart()
        }

        fn set_speed(&mut self, speed: f64) {
            self.lock().set_speed(speed)
        }

        fn is_done(&self) -> bool {
            self.lock().is_done()
        }

        fn should_auto_deactivate(&self) -> bool {
            self.lock().should_auto_deactivate()
        }

        fn video_frame(&mut self) -> Option<VideoFrame> {
            self.lock().video_frame()
        }
    }

    struct Fixture {
        graph: SceneGraph,
        srv: Services,
        node: NodeKey,
        stub: SharedStub,
    }

    fn audio_fixture(stub: StubMedia, times: ActivationTimes) -> Fixture {
        let mut srv = Services::new(&CompositorConfig::default());
        let stub = SharedStub::new(stub);
        let media = srv.media.add(Box::new(stub.clone()));
        let mut graph = SceneGraph::new();
        let node = graph.insert(
            SceneNode::new(NodeKind::AudioClip).with_behavior(Box::new(
                AudioClipBehavior::new().with_media(media).with_times(times),
            )),
            &mut srv,
        );
        Fixture {
            graph,
            srv,
            node,
            stub,
        }
    }

    fn tick(f: &mut Fixture, time: f64) {
        f.srv.time.set_time(time);
        run_tick_pass(&mut f.graph, &mut f.srv);
    }

    fn active_events(f: &mut Fixture) -> Vec<bool> {
        f.srv
            .events
            .drain()
            .into_iter()
            .filter_map(|e| match e {
                CompositorEvent::NodeActive { active, .. } => Some(active),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn clip_activates_and_deactivates_on_interval_edges() {
        let times = ActivationTimes {
            start: 2.0,
            stop: 5.0,
            ..ActivationTimes::default()
        };
        let mut f = audio_fixture(StubMedia::new(), times);

        tick(&mut f, 0.0);
        tick(&mut f, 1.0);
        assert!(active_events(&mut f).is_empty());
        assert_eq!(f.stub.lock().play_count, 0);

        tick(&mut f, 2.0);
        assert_eq!(active_events(&mut f), vec![true]);
        assert_eq!(f.stub.lock().play_count, 1);

        tick(&mut f, 3.0);
        tick(&mut f, 4.0);
        assert!(active_events(&mut f).is_empty());
        assert_eq!(f.stub.lock().play_count, 1);

        tick(&mut f, 5.0);
        assert_eq!(active_events(&mut f), vec![false]);
        assert_eq!(f.stub.lock().stop_count, 1);
        // The interval is spent; the node left the tick order.
        assert!(!f.srv.timing.is_registered(f.node));

        tick(&mut f, 6.0);
        assert!(active_events(&mut f).is_empty());
        assert_eq!(f.stub.lock().play_count, 1);
    }

    #[test]
    fn interval_entirely_past_never_activates() {
        let times = ActivationTimes {
            start: 1.0,
            stop: 2.0,
            ..ActivationTimes::default()
        };
        let mut f = audio_fixture(StubMedia::new(), times);
        tick(&mut f, 10.0);
        assert!(active_events(&mut f).is_empty());
        assert_eq!(f.stub.lock().play_count, 0);
        assert!(!f.srv.timing.is_registered(f.node));
    }

    #[test]
    fn negative_start_never_activates() {
        let times = ActivationTimes {
            start: -1.0,
            ..ActivationTimes::default()
        };
        let mut f = audio_fixture(StubMedia::new(), times);
        tick(&mut f, 0.0);
        assert!(active_events(&mut f).is_empty());
        assert!(!f.srv.timing.is_registered(f.node));
    }

    #[test]
    fn open_failure_marks_failed_without_events() {
        let mut f = audio_fixture(StubMedia::failing(), ActivationTimes::default());
        tick(&mut f, 0.0);
        assert!(active_events(&mut f).is_empty());
        assert!(!f.srv.timing.is_registered(f.node));
        let clip = f.graph.behavior_ref::<AudioClipBehavior>(f.node).unwrap();
        assert!(!clip.is_active());
    }

    #[test]
    fn looping_media_restarts_without_events() {
        let times = ActivationTimes {
            looping: true,
            ..ActivationTimes::default()
        };
        let mut f = audio_fixture(StubMedia::new(), times);
        tick(&mut f, 0.0);
        assert_eq!(active_events(&mut f), vec![true]);

        f.stub.lock().done = true;
        tick(&mut f, 1.0);
        assert!(active_events(&mut f).is_empty());
        assert_eq!(f.stub.lock().restart_count, 1);
        let clip = f.graph.behavior_ref::<AudioClipBehavior>(f.node).unwrap();
        assert!(clip.is_active());
    }

    #[test]
    fn finished_media_auto_deactivates() {
        let mut f = audio_fixture(StubMedia::new(), ActivationTimes::default());
        tick(&mut f, 0.0);
        assert_eq!(active_events(&mut f), vec![true]);

        f.stub.lock().done = true;
        tick(&mut f, 1.0);
        assert_eq!(active_events(&mut f), vec![false]);
        assert_eq!(f.stub.lock().stop_count, 1);
        assert!(!f.srv.timing.is_registered(f.node));
    }

    #[test]
    fn pump_fills_pipe_to_buffer_ahead() {
        let mut srv = Services::new(&CompositorConfig::default());
        let media = srv
            .media
            .add(Box::new(PcmMedia::sine(44_100, 440.0, 2.0, 0.5)));
        let mut graph = SceneGraph::new();
        let node = graph.insert(
            SceneNode::new(NodeKind::AudioClip).with_behavior(Box::new(
                AudioClipBehavior::new().with_media(media),
            )),
            &mut srv,
        );
        srv.time.set_time(0.0);
        run_tick_pass(&mut graph, &mut srv);

        assert_eq!(srv.audio.source_count(), 1);
        let clip = graph.behavior_ref::<AudioClipBehavior>(node).unwrap();
        let pipe = clip.pipe().unwrap();
        assert_relative_eq!(pipe.buffered_seconds(), 0.2, epsilon = 1e-3);
        assert_eq!(pipe.format(), AudioFormat::new(44_100, 1, SampleFormat::S16));
    }

    #[test]
    fn configure_swaps_media_while_active() {
        let mut f = audio_fixture(StubMedia::new(), ActivationTimes::default());
        tick(&mut f, 0.0);
        assert_eq!(active_events(&mut f), vec![true]);

        let replacement = SharedStub::new(StubMedia::new());
        let new_key = f.srv.media.add(Box::new(replacement.clone()));
        let clip = f.graph.behavior_mut::<AudioClipBehavior>(f.node).unwrap();
        clip.configure(f.node, &mut f.srv, new_key, ActivationTimes::default());
        assert!(clip.is_active());

        // Old stream stopped, new one playing, no activity toggle.
        assert_eq!(f.stub.lock().stop_count, 1);
        assert_eq!(replacement.lock().play_count, 1);
        assert!(active_events(&mut f).is_empty());
        assert!(f.srv.timing.is_registered(f.node));
    }

    #[test]
    fn detach_unregisters_mixer_source() {
        let mut f = audio_fixture(StubMedia::new(), ActivationTimes::default());
        tick(&mut f, 0.0);
        assert_eq!(f.srv.audio.source_count(), 1);
        f.graph.remove(f.node, &mut f.srv);
        assert_eq!(f.srv.audio.source_count(), 0);
        assert_eq!(f.stub.lock().stop_count, 1);
    }

    #[test]
    fn movie_texture_fetches_once_per_frame() {
        let mut srv = Services::new(&CompositorConfig::default());
        let stub = SharedStub::new(StubMedia::new().with_video(4, 4));
        let media = srv.media.add(Box::new(stub.clone()));
        let mut graph = SceneGraph::new();
        let node = graph.insert(
            SceneNode::new(NodeKind::MovieTexture).with_behavior(Box::new(
                MovieTextureBehavior::new().with_media(media),
            )),
            &mut srv,
        );
        srv.time.set_time(0.0);
        run_tick_pass(&mut graph, &mut srv);

        let texture = graph.behavior_mut::<MovieTextureBehavior>(node).unwrap();
        let first = texture.current_frame(&mut srv.media, 1).unwrap();
        assert_eq!(first.stamp, 0);

        // Newer content within the same compositor frame is not refetched.
        stub.lock().bump_video();
        let again = texture.current_frame(&mut srv.media, 1).unwrap();
        assert_eq!(again.stamp, 0);

        let next = texture.current_frame(&mut srv.media, 2).unwrap();
        assert_eq!(next.stamp, 1);
    }

    #[test]
    fn inactive_texture_keeps_last_frame() {
        let mut srv = Services::new(&CompositorConfig::default());
        let stub = SharedStub::new(StubMedia::new().with_video(4, 4));
        let media = srv.media.add(Box::new(stub.clone()));
        let mut graph = SceneGraph::new();
        let times = ActivationTimes {
            start: 0.0,
            stop: 1.0,
            ..ActivationTimes::default()
        };
        let node = graph.insert(
            SceneNode::new(NodeKind::MovieTexture).with_behavior(Box::new(
                MovieTextureBehavior::new().with_media(media).with_times(times),
            )),
            &mut srv,
        );
        srv.time.set_time(0.0);
        run_tick_pass(&mut graph, &mut srv);
        {
            let texture = graph.behavior_mut::<MovieTextureBehavior>(node).unwrap();
            assert!(texture.current_frame(&mut srv.media, 1).is_some());
        }

        srv.time.set_time(2.0);
        run_tick_pass(&mut graph, &mut srv);
        let texture = graph.behavior_mut::<MovieTextureBehavior>(node).unwrap();
        assert!(!texture.is_active());
        stub.lock().bump_video();
        // Frozen on the last fetched frame.
        let frozen = texture.current_frame(&mut srv.media, 2).unwrap();
        assert_eq!(frozen.stamp, 0);
    }

    #[test]
    fn has_movie_child_lookup() {
        let mut srv = Services::new(&CompositorConfig::default());
        let mut graph = SceneGraph::new();
        let parent = graph.insert(SceneNode::new(NodeKind::Shape2D), &mut srv);
        assert!(movie_child(&graph, parent).is_none());
        let texture = graph
            .insert_child(parent, SceneNode::new(NodeKind::MovieTexture), &mut srv)
            .unwrap();
        assert_eq!(movie_child(&graph, parent), Some(texture));
    }
}
