//! Start/stop activation machine for timed nodes
//!
//! The machine itself is a pure value type: [`Activation::evaluate`] maps
//! scene time plus media status to at most one [`TimedAction`] and never
//! touches the node or the media pipeline. The owning node applies the
//! action (open/play/stop media, emit activity events) and records the
//! transition back through [`Activation::begin`] and friends.

/// Authored timing fields of a timed node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationTimes {
    /// Scene time at which the node becomes active; negative never activates
    pub start: f64,
    /// Scene time at which the node deactivates; ignored unless `stop > start`
    pub stop: f64,
    /// Restart the media at zero when it runs out
    pub looping: bool,
    /// Playback speed handed to the media object
    pub speed: f64,
}

impl Default for ActivationTimes {
    fn default() -> Self {
        Self {
            start: 0.0,
            stop: 0.0,
            looping: false,
            speed: 1.0,
        }
    }
}

impl ActivationTimes {
    /// True when the stop field bounds the active interval
    pub fn stop_valid(&self) -> bool {
        self.stop > self.start
    }
}

/// Transition requested by one evaluation step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedAction {
    /// Enter the active state and start the media
    Start,
    /// Leave the active state and stop the media
    Stop,
    /// Stay active, rewind the media, bump the cycle count
    Restart,
}

/// Live activation state of one timed node
#[derive(Debug, Clone, Copy, Default)]
pub struct Activation {
    active: bool,
    cycle: u32,
    failed: bool,
    last_start: f64,
}

impl Activation {
    /// True while the node is active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Completed restart count of the current activation
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// True after a resource-open failure; blocks all activation
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Scene time of the last activation edge
    pub fn last_start(&self) -> f64 {
        self.last_start
    }

    /// Decide the transition for the current scene time, if any
    ///
    /// Transitions fire only on interval boundaries: an interval entirely in
    /// the past on first evaluation yields nothing.
    pub fn evaluate(
        &self,
        scene_time: f64,
        times: &ActivationTimes,
        media_done: bool,
        media_auto_deactivates: bool,
    ) -> Option<TimedAction> {
        if self.failed {
            return None;
        }
        if !self.active {
            if times.start < 0.0 {
                return None;
            }
            let within = scene_time >= times.start
                && (!times.stop_valid() || scene_time < times.stop);
            return within.then_some(TimedAction::Start);
        }
        if times.stop_valid() && scene_time >= times.stop {
            return Some(TimedAction::Stop);
        }
        if media_done {
            if times.looping {
                return Some(TimedAction::Restart);
            }
            if media_auto_deactivates {
                return Some(TimedAction::Stop);
            }
        }
        None
    }

    /// Record the Start transition
    pub fn begin(&mut self, scene_time: f64) {
        self.active = true;
        self.cycle = 0;
        self.last_start = scene_time;
    }

    /// Record the Stop transition
    pub fn end(&mut self) {
        self.active = false;
    }

    /// Record a loop restart
    pub fn bump_cycle(&mut self) {
        self.cycle += 1;
    }

    /// Latch the permanent failure flag
    pub fn mark_failed(&mut self) {
        self.failed = true;
        self.active = false;
    }

    /// Clear the failure flag after reconfiguration
    pub fn clear_failure(&mut self) {
        self.failed = false;
    }
}
