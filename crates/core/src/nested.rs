//! Beat timelines nested inside beat timelines.
//!
//! A parent [`BpmTimeline`] hands its children local *beats*. A child that is
//! itself a `BpmTimeline` would treat that number as seconds and convert it
//! again, and would report its duration in seconds for the parent to add to
//! beat positions. [`NestedBpmClip`] keeps both in beat space: it renders
//! through the raw beat activation path and reports the child's end in beats.

use std::hash::Hash;
use std::sync::Arc;

use crate::bpm::BpmTimeline;
use crate::clip::{Clip, TimelineRef};
use crate::render::Render;

/// Unit-correcting wrapper for a beat timeline inside a beat timeline.
pub struct NestedBpmClip<C, K, D> {
    inner: Arc<BpmTimeline<C, K, D>>,
}

impl<C, K, D> NestedBpmClip<C, K, D> {
    pub fn new(inner: impl Into<Arc<BpmTimeline<C, K, D>>>) -> Self {
        Self {
            inner: inner.into(),
        }
    }

    /// The wrapped timeline.
    pub fn inner(&self) -> &Arc<BpmTimeline<C, K, D>> {
        &self.inner
    }
}

impl<C, K, D> Clip<C, K, D> for NestedBpmClip<C, K, D>
where
    C: Sync,
    K: Eq + Hash + Send,
    D: Send,
{
    /// End of the inner timeline in beats.
    fn duration(&self) -> Option<f64> {
        self.inner.end_beat()
    }

    /// `t` is already a beat position.
    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        self.inner.render_beats(t, ctx)
    }

    fn as_timeline(&self) -> Option<TimelineRef<'_, C, K, D>> {
        Some(TimelineRef::NestedBeats(self.inner.as_ref()))
    }
}
