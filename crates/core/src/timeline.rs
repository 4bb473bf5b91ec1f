//! Second-denominated timelines.
//!
//! A timeline is an ordered list of `(position, clip)` events plus a compose
//! function. Rendering at `t` activates every event whose local time
//! `t - position` lies within `[0, duration]`, renders those clips, groups
//! their deltas per target in event storage order, and reduces each group
//! with the compose function.

use std::hash::Hash;
use std::sync::Arc;

use cuelist_common::error::{CuelistError, CuelistResult};
use futures::future::join_all;

use crate::clip::{is_active, Clip, SharedClip, TimelineRef};
use crate::compose::{default_compose, ComposeFn};
use crate::render::{Frame, Render};

/// A clip placed at a position.
pub struct Event<C, K, D> {
    /// Start position in the owning timeline's unit.
    pub position: f64,
    /// The clip; may be shared with other events.
    pub clip: SharedClip<C, K, D>,
}

impl<C, K, D> Clone for Event<C, K, D> {
    fn clone(&self) -> Self {
        Self {
            position: self.position,
            clip: Arc::clone(&self.clip),
        }
    }
}

impl<C, K, D> std::fmt::Debug for Event<C, K, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("position", &self.position)
            .field("duration", &self.clip.duration())
            .finish()
    }
}

/// Event storage and activation logic shared by both timeline kinds.
pub(crate) struct EventList<C, K, D> {
    events: Vec<Event<C, K, D>>,
    compose_fn: ComposeFn<D>,
}

impl<C, K, D> EventList<C, K, D> {
    pub(crate) fn new(compose_fn: ComposeFn<D>) -> Self {
        Self {
            events: Vec::new(),
            compose_fn,
        }
    }

    pub(crate) fn events(&self) -> &[Event<C, K, D>] {
        &self.events
    }

    pub(crate) fn compose_fn(&self) -> &ComposeFn<D> {
        &self.compose_fn
    }

    pub(crate) fn set_compose_fn(&mut self, compose_fn: ComposeFn<D>) {
        self.compose_fn = compose_fn;
    }

    pub(crate) fn push(&mut self, position: f64, clip: SharedClip<C, K, D>) {
        self.events.push(Event { position, clip });
    }

    pub(crate) fn remove(&mut self, position: f64, clip: &SharedClip<C, K, D>) -> CuelistResult<()> {
        self.remove_where(position, |candidate| Arc::ptr_eq(candidate, clip))
    }

    pub(crate) fn remove_where<P>(&mut self, position: f64, mut matches: P) -> CuelistResult<()>
    where
        P: FnMut(&SharedClip<C, K, D>) -> bool,
    {
        let index = self
            .events
            .iter()
            .position(|e| e.position == position && matches(&e.clip))
            .ok_or(CuelistError::EventNotFound { position })?;
        self.events.remove(index);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        self.events.clear();
    }

    /// Latest `position + duration`; `Some(0.0)` when empty, `None` when any clip is unbounded.
    pub(crate) fn end_position(&self) -> Option<f64> {
        if self.events.is_empty() {
            return Some(0.0);
        }
        let mut end = f64::NEG_INFINITY;
        for event in &self.events {
            end = end.max(event.position + event.clip.duration()?);
        }
        Some(end)
    }
}

impl<C, K, D> EventList<C, K, D>
where
    C: Sync,
    K: Eq + Hash + Send,
    D: Send,
{
    /// Render every event active at `t` (in this list's unit) and compose.
    pub(crate) fn render_at<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        let mut renders = Vec::new();
        let mut pending = false;
        for event in &self.events {
            let local_t = t - event.position;
            if !is_active(local_t, event.clip.duration()) {
                continue;
            }
            let render = event.clip.render(local_t, ctx);
            pending |= render.is_pending();
            renders.push(render);
        }

        let compose_fn = &self.compose_fn;
        if !pending {
            let frames = renders
                .into_iter()
                .filter_map(Render::into_ready)
                .collect::<CuelistResult<Vec<_>>>();
            return Render::Ready(frames.map(|frames| compose_frames(frames, compose_fn)));
        }

        Render::pending(async move {
            let frames = join_all(renders.into_iter().map(Render::resolve))
                .await
                .into_iter()
                .collect::<CuelistResult<Vec<_>>>()?;
            Ok(compose_frames(frames, compose_fn))
        })
    }
}

/// Group deltas per target in frame order and reduce each group.
pub fn compose_frames<K, D>(frames: Vec<Frame<K, D>>, compose_fn: &ComposeFn<D>) -> Frame<K, D>
where
    K: Eq + Hash,
{
    let mut grouped: Frame<K, Vec<D>> = Frame::new();
    for frame in frames {
        for (target, delta) in frame {
            grouped.entry(target).or_default().push(delta);
        }
    }
    grouped
        .into_iter()
        .filter_map(|(target, deltas)| compose_fn(deltas).map(|d| (target, d)))
        .collect()
}

/// A timeline whose event positions are seconds.
pub struct Timeline<C, K, D> {
    list: EventList<C, K, D>,
}

impl<C, K, D: 'static> Default for Timeline<C, K, D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, K, D> Timeline<C, K, D> {
    /// Empty timeline composing with [`compose_last`](crate::compose::compose_last).
    pub fn new() -> Self
    where
        D: 'static,
    {
        Self::with_compose(default_compose())
    }

    /// Empty timeline with the given compose function.
    pub fn with_compose(compose_fn: ComposeFn<D>) -> Self {
        Self {
            list: EventList::new(compose_fn),
        }
    }

    /// Append an event.
    pub fn add(&mut self, position: f64, clip: SharedClip<C, K, D>) -> &mut Self {
        self.list.push(position, clip);
        self
    }

    /// Remove the first event at exactly `position` holding this same clip instance.
    pub fn remove(&mut self, position: f64, clip: &SharedClip<C, K, D>) -> CuelistResult<&mut Self> {
        self.list.remove(position, clip)?;
        Ok(self)
    }

    /// Remove the first event at exactly `position` whose clip satisfies `matches`.
    pub fn remove_where<P>(&mut self, position: f64, matches: P) -> CuelistResult<&mut Self>
    where
        P: FnMut(&SharedClip<C, K, D>) -> bool,
    {
        self.list.remove_where(position, matches)?;
        Ok(self)
    }

    /// Remove all events.
    pub fn clear(&mut self) -> &mut Self {
        self.list.clear();
        self
    }

    /// Events in storage (insertion) order.
    pub fn events(&self) -> &[Event<C, K, D>] {
        self.list.events()
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.list.events().len()
    }

    /// Whether the timeline has no events.
    pub fn is_empty(&self) -> bool {
        self.list.events().is_empty()
    }

    /// The compose function in use.
    pub fn compose_fn(&self) -> &ComposeFn<D> {
        self.list.compose_fn()
    }

    /// Replace the compose function.
    pub fn set_compose_fn(&mut self, compose_fn: ComposeFn<D>) -> &mut Self {
        self.list.set_compose_fn(compose_fn);
        self
    }
}

impl<C, K, D> Clip<C, K, D> for Timeline<C, K, D>
where
    C: Sync,
    K: Eq + Hash + Send,
    D: Send,
{
    fn duration(&self) -> Option<f64> {
        self.list.end_position()
    }

    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        self.list.render_at(t, ctx)
    }

    fn as_timeline(&self) -> Option<TimelineRef<'_, C, K, D>> {
        Some(TimelineRef::Seconds(self))
    }
}
