//! Eased polling interval for the now-playing display.
//!
//! The delay between two edits follows a half-cosine over the track: it
//! starts at `min_interval` and widens as playback advances, reaching 40%
//! of the span at the very end. The ceiling itself is capped at 10% of the
//! track length so short tracks never go several seconds without an update.

use std::f64::consts::PI;
use std::time::Duration;

/// Bounds applied to [`next_interval`], in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for IntervalBounds {
    fn default() -> Self {
        Self { min: 1.0, max: 15.0 }
    }
}

impl IntervalBounds {
    /// Delay until the next edit, or `max` when the duration is unknown.
    pub fn delay(&self, elapsed: f64, duration: f64) -> Duration {
        let secs = if duration > 0.0 {
            next_interval(elapsed, duration, self.min, self.max)
        } else {
            self.max
        };
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Seconds to wait before the next progress update.
///
/// `duration` must be positive; callers handle live/unknown tracks.
pub fn next_interval(elapsed: f64, duration: f64, min_interval: f64, max_interval: f64) -> f64 {
    let max_interval = (duration * 0.1).max(min_interval).min(max_interval);

    let x = (elapsed / duration).clamp(0.0, 1.0);
    let weight = (1.0 - (PI * x).cos()) / 5.0;

    let interval = min_interval + weight * (max_interval - min_interval);
    (interval * 100.0).round() / 100.0
}
