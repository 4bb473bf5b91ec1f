//! Clock and frame pacing utilities for playback.
//!
//! A playback loop is anchored to a monotonic instant captured when the
//! loop starts. Show time is measured from that anchor plus the position
//! playback started at, so a loop restarted after a pause continues from
//! where it froze. Frames are scheduled against absolute deadlines
//! (`anchor + n * frame_duration`) so sleep jitter never accumulates.

use std::time::{Duration, Instant};

/// A monotonic playback clock positioned at an arbitrary start time.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    /// The instant the clock was started.
    anchor: Instant,

    /// Show time (seconds) at the anchor instant. May be negative.
    start_at: f64,

    /// Wall-clock time at the anchor (RFC 3339 string), for logs.
    started_wall: String,
}

impl PlaybackClock {
    /// Start a clock now, reading `start_at` seconds.
    pub fn start(start_at: f64) -> Self {
        Self {
            anchor: Instant::now(),
            start_at,
            started_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Current show time in seconds: start position plus wall time since the anchor.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_at + self.anchor.elapsed().as_secs_f64()
    }

    /// Show time the clock was started at.
    pub fn start_at(&self) -> f64 {
        self.start_at
    }

    /// Wall-clock time at the anchor.
    pub fn started_wall(&self) -> &str {
        &self.started_wall
    }

    /// The underlying anchor instant.
    pub fn anchor(&self) -> Instant {
        self.anchor
    }

    /// Convert a (possibly negative or non-finite) second count to a sleepable duration.
    pub fn secs_to_duration(secs: f64) -> Duration {
        if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }
}

/// Fixed-rate frame scheduler.
#[derive(Debug)]
pub struct FramePacer {
    anchor: Instant,
    frame_duration: Duration,
    frame_count: u64,
}

impl FramePacer {
    /// Create a pacer targeting `fps` frames per second, anchored at `anchor`.
    pub fn new(anchor: Instant, fps: f64) -> Self {
        Self {
            anchor,
            frame_duration: PlaybackClock::secs_to_duration(1.0 / fps),
            frame_count: 0,
        }
    }

    /// Advance to the next frame and return its deadline.
    pub fn advance(&mut self) -> Instant {
        self.frame_count += 1;
        self.deadline()
    }

    /// Deadline of the current frame.
    pub fn deadline(&self) -> Instant {
        self.anchor + self.frame_duration.mul_f64(self.frame_count as f64)
    }

    /// Time left until the current frame's deadline, zero when already late.
    pub fn delay_from(&self, now: Instant) -> Duration {
        self.deadline().saturating_duration_since(now)
    }

    /// Frames advanced since the anchor.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Target interval between frames.
    pub fn frame_duration(&self) -> Duration {
        self.frame_duration
    }
}
