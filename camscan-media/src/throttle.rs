//! Frame-count throttling of decode attempts.
//!
//! Decoding runs on one frame out of every `interval`, where the interval is
//! the configured rate raised to a minimum safety cap. The counter is reset
//! when a decode is dispatched, not when it completes, so a slow decode never
//! causes a burst of eligible frames afterwards.

/// Default "decode every N frames" rate.
pub const DEFAULT_FRAME_RATE: i32 = 10;

/// Default lower bound on the decode interval. A cap of 1 disables it.
pub const DEFAULT_MIN_INTERVAL: u32 = 10;

/// Throttle configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Decode every N-th frame. Zero or negative disables decoding.
    pub frame_rate: i32,
    /// Smallest interval allowed regardless of `frame_rate`.
    pub min_interval: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_FRAME_RATE,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

/// Effective decode interval, or `None` when decoding is disabled.
pub fn effective_interval(configured_rate: i32, min_interval: u32) -> Option<u32> {
    if configured_rate <= 0 {
        return None;
    }
    Some((configured_rate as u32).max(min_interval).max(1))
}

/// Whether a frame counter has reached the decode interval.
///
/// `frame_counter` counts frames since the last dispatched decode, including
/// the current one.
pub fn should_decode(frame_counter: u32, configured_rate: i32, min_interval: u32) -> bool {
    match effective_interval(configured_rate, min_interval) {
        Some(interval) => frame_counter >= interval,
        None => false,
    }
}

/// Stateful frame counter applying [`should_decode`] to a frame stream.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    config: ThrottleConfig,
    counter: u32,
}

impl FrameThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self { config, counter: 0 }
    }

    /// Count one delivered frame and report whether it may be decoded.
    ///
    /// Eligibility persists until [`reset`](Self::reset) is called, so a frame
    /// that could not be dispatched leaves the next one eligible.
    pub fn tick(&mut self) -> bool {
        if effective_interval(self.config.frame_rate, self.config.min_interval).is_none() {
            return false;
        }
        self.counter = self.counter.saturating_add(1);
        should_decode(self.counter, self.config.frame_rate, self.config.min_interval)
    }

    /// Restart counting; called when a decode is dispatched.
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    /// Change the configured rate. The current count is kept.
    pub fn set_rate(&mut self, frame_rate: i32) {
        self.config.frame_rate = frame_rate;
    }

    pub fn set_min_interval(&mut self, min_interval: u32) {
        self.config.min_interval = min_interval;
    }

    pub fn config(&self) -> ThrottleConfig {
        self.config
    }

    /// Frames counted since the last reset.
    pub fn counter(&self) -> u32 {
        self.counter
    }
}
