//! Adaptive admission control for continuous-controller traffic
//!
//! The limiter measures the parameter/volume message rate over short windows
//! and, when the rate exceeds the configured maximum, admits each message
//! with a probability proportional to the inverse overload. It is a
//! statistical limiter: under sustained overload it samples the stream
//! rather than enforcing a hard ceiling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::{Duration, Instant};
use tracing::info;

/// Length of a measurement window
pub const MEASURE_INTERVAL: Duration = Duration::from_millis(100);

/// Admission bias below the ideal 1/overload ratio
pub const SAFETY_FACTOR: f32 = 0.5;

/// Shortest elapsed time used when computing a rate
const MIN_ELAPSED_SECS: f32 = 0.001;

/// Source of uniform draws in `[0, 1)`
pub trait UniformSource: Send {
    fn next_unit(&mut self) -> f32;
}

impl UniformSource for StdRng {
    fn next_unit(&mut self) -> f32 {
        self.gen::<f32>()
    }
}

/// Draws from the thread-local generator
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl UniformSource for ThreadRandom {
    fn next_unit(&mut self) -> f32 {
        rand::thread_rng().gen::<f32>()
    }
}

/// Read-only view of the window state for diagnostics
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateSnapshot {
    pub messages_since_window_start: u32,
    pub current_rate: f32,
    pub pass_probability: f32,
}

/// Sliding measurement window
#[derive(Debug, Clone)]
struct RateWindow {
    messages_since_window_start: u32,
    window_start: Instant,
    current_rate: f32,
    pass_probability: f32,
}

/// Rate limiter for parameter and volume messages
pub struct RateLimiter {
    max_rate: u32,
    verbose: bool,
    window: RateWindow,
    random: Box<dyn UniformSource>,
}

impl RateLimiter {
    /// Create a limiter with the thread-local random source
    pub fn new(max_rate: u32, verbose: bool) -> Self {
        Self::with_source(max_rate, verbose, Instant::now(), Box::new(ThreadRandom))
    }

    /// Create a seeded limiter (reproducible admission decisions)
    pub fn seeded(max_rate: u32, verbose: bool, seed: u64, start: Instant) -> Self {
        Self::with_source(
            max_rate,
            verbose,
            start,
            Box::new(StdRng::seed_from_u64(seed)),
        )
    }

    /// Create a limiter with an explicit window start and random source
    pub fn with_source(
        max_rate: u32,
        verbose: bool,
        start: Instant,
        random: Box<dyn UniformSource>,
    ) -> Self {
        Self {
            max_rate,
            verbose,
            window: RateWindow {
                messages_since_window_start: 0,
                window_start: start,
                current_rate: 0.0,
                pass_probability: 1.0,
            },
            random,
        }
    }

    /// Whether the current message should be dropped
    pub fn should_drop(&mut self) -> bool {
        self.should_drop_at(Instant::now())
    }

    /// Whether a message arriving at `now` should be dropped
    pub fn should_drop_at(&mut self, now: Instant) -> bool {
        // Nothing to enforce and nothing to report
        if self.max_rate == 0 && !self.verbose {
            return false;
        }

        self.window.messages_since_window_start += 1;
        self.measure(now);

        if self.max_rate == 0 {
            return false;
        }

        let max_rate = self.max_rate as f32;
        self.window.pass_probability = if self.window.current_rate > max_rate {
            let overload_factor = self.window.current_rate / max_rate;
            (1.0 / overload_factor * SAFETY_FACTOR).clamp(0.0, 1.0)
        } else {
            1.0
        };

        if self.random.next_unit() > self.window.pass_probability {
            if self.verbose {
                info!("Dropped message to limit message rate");
            }
            return true;
        }

        false
    }

    /// Close the window when it has run its interval or the burst already
    /// exceeds the maximum
    fn measure(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window.window_start);
        let burst_exceeded =
            self.max_rate > 0 && self.window.messages_since_window_start > self.max_rate;

        if elapsed > MEASURE_INTERVAL || burst_exceeded {
            let elapsed_secs = elapsed.as_secs_f32().max(MIN_ELAPSED_SECS);
            self.window.current_rate =
                self.window.messages_since_window_start as f32 / elapsed_secs;
            self.window.window_start = now;
            self.window.messages_since_window_start = 0;

            if self.verbose {
                info!("Messages per second: {:.1}", self.window.current_rate);
            }
        }
    }

    pub fn snapshot(&self) -> RateSnapshot {
        RateSnapshot {
            messages_since_window_start: self.window.messages_since_window_start,
            current_rate: self.window.current_rate,
            pass_probability: self.window.pass_probability,
        }
    }
}
