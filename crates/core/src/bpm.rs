//! Beat-denominated timelines.
//!
//! Event positions and child durations are beats. [`Clip::render`] takes the
//! caller's time in seconds, converts it once through the tempo map, and
//! activates children in beat space, handing each child its local *beat*.
//! The reported [`Clip::duration`] is in seconds so the timeline can sit in a
//! second-denominated parent; nesting inside another beat timeline goes
//! through [`NestedBpmClip`](crate::nested::NestedBpmClip) instead.

use std::hash::Hash;

use cuelist_common::error::CuelistResult;

use crate::clip::{Clip, SharedClip, TimelineRef};
use crate::compose::{default_compose, ComposeFn};
use crate::render::Render;
use crate::tempo::TempoMap;
use crate::timeline::{Event, EventList};

/// A timeline whose event positions are beats.
pub struct BpmTimeline<C, K, D> {
    list: EventList<C, K, D>,
    tempo_map: TempoMap,
}

impl<C, K, D: 'static> Default for BpmTimeline<C, K, D> {
    fn default() -> Self {
        Self::new(TempoMap::default())
    }
}

impl<C, K, D> BpmTimeline<C, K, D> {
    /// Empty timeline composing with [`compose_last`](crate::compose::compose_last).
    pub fn new(tempo_map: TempoMap) -> Self
    where
        D: 'static,
    {
        Self::with_compose(tempo_map, default_compose())
    }

    /// Empty timeline with the given compose function.
    pub fn with_compose(tempo_map: TempoMap, compose_fn: ComposeFn<D>) -> Self {
        Self {
            list: EventList::new(compose_fn),
            tempo_map,
        }
    }

    /// Append an event at `beat`.
    pub fn add(&mut self, beat: f64, clip: SharedClip<C, K, D>) -> &mut Self {
        self.list.push(beat, clip);
        self
    }

    /// Remove the first event at exactly `beat` holding this same clip instance.
    pub fn remove(&mut self, beat: f64, clip: &SharedClip<C, K, D>) -> CuelistResult<&mut Self> {
        self.list.remove(beat, clip)?;
        Ok(self)
    }

    /// Remove the first event at exactly `beat` whose clip satisfies `matches`.
    pub fn remove_where<P>(&mut self, beat: f64, matches: P) -> CuelistResult<&mut Self>
    where
        P: FnMut(&SharedClip<C, K, D>) -> bool,
    {
        self.list.remove_where(beat, matches)?;
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

    pub fn len(&self) -> usize {
        self.list.events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.events().is_empty()
    }

    pub fn compose_fn(&self) -> &ComposeFn<D> {
        self.list.compose_fn()
    }

    pub fn set_compose_fn(&mut self, compose_fn: ComposeFn<D>) -> &mut Self {
        self.list.set_compose_fn(compose_fn);
        self
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    pub fn tempo_map_mut(&mut self) -> &mut TempoMap {
        &mut self.tempo_map
    }

    /// Latest event end in beats; `None` when any child is unbounded.
    pub fn end_beat(&self) -> Option<f64> {
        self.list.end_position()
    }
}

impl<C, K, D> BpmTimeline<C, K, D>
where
    C: Sync,
    K: Eq + Hash + Send,
    D: Send,
{
    /// Render at a position already expressed in beats.
    pub fn render_beats<'a>(&'a self, beat: f64, ctx: &'a C) -> Render<'a, K, D> {
        self.list.render_at(beat, ctx)
    }
}

impl<C, K, D> Clip<C, K, D> for BpmTimeline<C, K, D>
where
    C: Sync,
    K: Eq + Hash + Send,
    D: Send,
{
    /// Duration in seconds through the tempo map.
    fn duration(&self) -> Option<f64> {
        self.end_beat().map(|beat| self.tempo_map.time(beat))
    }

    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        let beat = self.tempo_map.beat(t);
        self.render_beats(beat, ctx)
    }

    fn as_timeline(&self) -> Option<TimelineRef<'_, C, K, D>> {
        Some(TimelineRef::Beats(self))
    }
}
