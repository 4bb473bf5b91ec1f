//! Cuelist Core
//!
//! Generic timeline evaluation, independent of what is being controlled:
//! - **Clips:** anything with a duration that renders per-target deltas
//! - **Timelines:** clips positioned in seconds or beats, composed per target
//! - **Decorators:** fades and amounts, beat-space nesting, document metadata
//! - **Verify points:** start/end instants for previewing a show
//!
//! The context `C`, target key `K` and delta `D` are chosen by the caller.
//! Timelines are clips themselves, so they nest to any depth.

pub mod bpm;
pub mod clip;
pub mod compose;
pub mod metadata;
pub mod nested;
pub mod render;
pub mod scaled;
pub mod tempo;
pub mod timeline;
pub mod verify;

pub use bpm::*;
pub use clip::*;
pub use compose::*;
pub use metadata::*;
pub use nested::*;
pub use render::*;
pub use scaled::*;
pub use tempo::*;
pub use timeline::*;
pub use verify::*;
