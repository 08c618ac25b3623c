//! Scene-time management
//!
//! The compositor runs off one monotonic scene clock in seconds. The embedding
//! player advances it between frames (from a system clock or the audio clock);
//! all activation decisions and animations sample it, never wall time.

/// Monotonic scene clock driving timing decisions
#[derive(Debug, Clone)]
pub struct SceneClock {
    time: f64,
    paused: bool,
}

impl Default for SceneClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneClock {
    /// Create a clock at time zero
    pub fn new() -> Self {
        Self {
            time: 0.0,
            paused: false,
        }
    }

    /// Current scene time in seconds
    pub fn now(&self) -> f64 {
        self.time
    }

    /// Advance the clock; no-op while paused, negative deltas ignored
    pub fn advance(&mut self, dt: f64) {
        if !self.paused && dt > 0.0 {
            self.time += dt;
        }
    }

    /// Jump to an absolute scene time (seeks)
    pub fn set_time(&mut self, time: f64) {
        self.time = time.max(0.0);
    }

    /// Pause or resume clock advancement
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// True while the clock ignores [`SceneClock::advance`]
    pub fn is_paused(&self) -> bool {
        self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let mut clock = SceneClock::new();
        clock.advance(0.5);
        clock.advance(0.25);
        assert!((clock.now() - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_clock_pause_blocks_advance() {
        let mut clock = SceneClock::new();
        clock.advance(1.0);
        clock.set_paused(true);
        clock.advance(1.0);
        assert!((clock.now() - 1.0).abs() < 1e-9);
        clock.set_paused(false);
        clock.advance(1.0);
        assert!((clock.now() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_clock_ignores_negative_delta() {
        let mut clock = SceneClock::new();
        clock.advance(1.0);
        clock.advance(-5.0);
        assert!((clock.now() - 1.0).abs() < 1e-9);
    }
}
