//! Cuelist Runner
//!
//! Drives a clip in real time on a dedicated thread:
//! - Fixed-rate frame loop with absolute deadlines
//! - Pause/resume from the frozen position, stop with a `done` signal
//! - Live clip swapping and smoothed time nudges
//! - One-shot `tick`/`render_frame` for caller-owned loops

pub mod runner;
pub mod signal;

pub use runner::*;
pub use signal::Signal;
