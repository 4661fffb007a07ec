//! Drift-corrected pacing. Delays are measured against the absolute
//! session start rather than accumulated per record, so publish latency
//! and timer jitter never compound over a long replay.

use std::time::{Duration, Instant};

/// A single computed delay above this is treated as a corrupted or
/// out-of-order timestamp and clamped.
pub const DEFAULT_SLEEP_CEILING: Duration = Duration::from_secs(5);

/// Pure pacing rule: `max(0, source_elapsed / speed - actual_elapsed)`,
/// clamped to `ceiling`. Non-positive source elapsed (duplicate or
/// out-of-order timestamps) never sleeps and never errors.
pub fn sleep_for(
    source_elapsed: f64,
    actual_elapsed: Duration,
    speed: f64,
    ceiling: Duration,
) -> Duration {
    if !source_elapsed.is_finite() || source_elapsed <= 0.0 {
        return Duration::ZERO;
    }
    let target = source_elapsed / speed;
    let remaining = target - actual_elapsed.as_secs_f64();
    if remaining <= 0.0 {
        return Duration::ZERO;
    }
    // Clamp before converting: a corrupted timestamp can put `remaining`
    // beyond what Duration::from_secs_f64 accepts.
    Duration::from_secs_f64(remaining.min(ceiling.as_secs_f64()))
}

/// Per-session pacing state: the wall-clock anchor and the first record's
/// source timestamp.
#[derive(Debug, Clone)]
pub struct Pacer {
    speed: f64,
    ceiling: Duration,
    anchor: Option<Anchor>,
}

#[derive(Debug, Clone, Copy)]
struct Anchor {
    first_ts: f64,
    started: Instant,
}

impl Pacer {
    /// `speed` must be finite and positive; the session config validates
    /// that before a pacer is built.
    pub fn new(speed: f64, ceiling: Duration) -> Self {
        Self {
            speed,
            ceiling,
            anchor: None,
        }
    }

    /// Delay to apply before publishing the record stamped `source_ts`.
    /// The first call anchors the session and returns zero.
    pub fn delay(&mut self, source_ts: f64) -> Duration {
        self.delay_at(source_ts, Instant::now())
    }

    fn delay_at(&mut self, source_ts: f64, now: Instant) -> Duration {
        let anchor = match self.anchor {
            Some(a) => a,
            None => {
                self.anchor = Some(Anchor {
                    first_ts: source_ts,
                    started: now,
                });
                return Duration::ZERO;
            }
        };
        sleep_for(
            source_ts - anchor.first_ts,
            now.duration_since(anchor.started),
            self.speed,
            self.ceiling,
        )
    }
}
