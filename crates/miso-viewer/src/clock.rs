use std::time::{Duration, Instant};

/// Frame timing snapshot.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Seconds since the previous tick, clamped.
    pub dt: f32,
    /// Seconds since the clock was created.
    pub elapsed: f32,
    pub frame_index: u64,
}

/// Frame clock with clamped delta time and a smoothed frame rate.
///
/// Delta time is clamped so a debugger pause or a minimized window does not
/// produce a huge step in the water animation.
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
    /// Exponential moving average of `dt`.
    smoothed_dt: f32,
}

impl FrameClock {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last: now,
            frame_index: 0,
            dt_min: Duration::from_micros(100),
            dt_max: Duration::from_millis(250),
            smoothed_dt: 1.0 / 60.0,
        }
    }

    /// Resets the delta baseline, e.g. after the window was hidden.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    pub fn tick(&mut self) -> FrameTime {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> FrameTime {
        let dt = now
            .saturating_duration_since(self.last)
            .clamp(self.dt_min, self.dt_max)
            .as_secs_f32();
        self.last = now;
        self.smoothed_dt += (dt - self.smoothed_dt) * 0.1;

        let ft = FrameTime {
            dt,
            elapsed: now.saturating_duration_since(self.start).as_secs_f32(),
            frame_index: self.frame_index,
        };
        self.frame_index = self.frame_index.wrapping_add(1);
        ft
    }

    /// Smoothed frames per second.
    pub fn fps(&self) -> f32 {
        1.0 / self.smoothed_dt
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dt_is_clamped() {
        let mut clock = FrameClock::new();
        let base = clock.last;

        let ft = clock.tick_at(base + Duration::from_secs(5));
        assert_eq!(ft.dt, 0.25);

        let ft = clock.tick_at(base + Duration::from_secs(5));
        assert_eq!(ft.dt, Duration::from_micros(100).as_secs_f32());
    }

    #[test]
    fn frame_index_counts_ticks() {
        let mut clock = FrameClock::new();
        let base = clock.last;
        assert_eq!(clock.tick_at(base).frame_index, 0);
        assert_eq!(clock.tick_at(base).frame_index, 1);
    }

    #[test]
    fn fps_tracks_steady_rate() {
        let mut clock = FrameClock::new();
        let mut t = clock.last;
        for _ in 0..200 {
            t += Duration::from_millis(10);
            clock.tick_at(t);
        }
        assert!((clock.fps() - 100.0).abs() < 1.0);
    }
}
