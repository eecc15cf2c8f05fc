//! Frame timing for the render loop.

use std::time::{Duration, Instant};

/// Tracks wall-clock time for the host that drives the render loop.
#[derive(Debug)]
pub struct FrameClock {
    /// Time when the clock started.
    start_time: Instant,
    /// Time of the last tick.
    last_tick: Instant,
    /// Duration between the last two ticks.
    delta: Duration,
    /// Total elapsed time since start.
    elapsed: Duration,
    /// Ticks since start.
    frame_count: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    /// Create a clock starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            last_tick: now,
            delta: Duration::ZERO,
            elapsed: Duration::ZERO,
            frame_count: 0,
        }
    }

    /// Advance to the current instant. Returns total elapsed seconds.
    pub fn tick(&mut self) -> f64 {
        self.advance_to(Instant::now())
    }

    /// Advance to a given instant. Instants earlier than the last tick are ignored.
    pub fn advance_to(&mut self, now: Instant) -> f64 {
        if now >= self.last_tick {
            self.delta = now - self.last_tick;
            self.last_tick = now;
            self.elapsed = now - self.start_time;
            self.frame_count += 1;
        }
        self.elapsed_seconds()
    }

    /// Delta between the last two ticks in seconds.
    pub fn delta_seconds(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    /// Total elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Frames per second derived from the last delta.
    pub fn fps(&self) -> f32 {
        if self.delta.as_secs_f32() > 0.0 {
            1.0 / self.delta.as_secs_f32()
        } else {
            0.0
        }
    }
}

/// `multiplier * sin(2π * (t mod period) / period)`, with `t` and `period` in milliseconds.
///
/// Every animated value in the scene is a sinusoid of wall-clock time; taking
/// the modulus first keeps precision stable for long-running wallpapers.
pub fn periodic_sin(elapsed_ms: f64, period_ms: f64, multiplier: f32) -> f32 {
    let phase = (elapsed_ms.rem_euclid(period_ms)) / period_ms;
    multiplier * (std::f64::consts::TAU * phase).sin() as f32
}
