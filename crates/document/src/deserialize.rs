//! Documents to timelines.
//!
//! Every clip built here is wrapped in a [`MetadataClip`] recording what the
//! event looked like, so the timeline can be written back out. Problems with
//! a single event are logged, recorded as [`SkippedEvent`]s and otherwise
//! ignored. Only an unknown `compose_fn` on the document itself is an error.

use std::hash::Hash;
use std::sync::Arc;

use serde_json::{Map, Value};

use cuelist_common::error::{CuelistError, CuelistResult};
use cuelist_core::{
    default_compose, BpmTimeline, Clip, ClipMetadata, EventMeta, MetadataClip, NestedBpmClip,
    ScaledClip, SharedClip, TempoMap, Timeline, TimelineLink, TimelineRef,
};

use crate::model::{ClipRefDoc, EventDoc, TimelineDoc, TimelineKind, SCHEMA_ID};
use crate::params::{resolve_variables, ClipParams};
use crate::registry::ClipRegistry;
use crate::seteval::{evaluate_set, parse_set_ops};

/// Loads a nested timeline document by name.
pub type LoadFn<'a> = dyn Fn(&str) -> CuelistResult<TimelineDoc> + 'a;

/// A deserialized timeline of either kind.
pub enum AnyTimeline<C, K, D> {
    Seconds(Timeline<C, K, D>),
    Beats(BpmTimeline<C, K, D>),
}

impl<C, K, D> AnyTimeline<C, K, D> {
    pub fn kind(&self) -> TimelineKind {
        match self {
            Self::Seconds(_) => TimelineKind::Seconds,
            Self::Beats(_) => TimelineKind::Beats,
        }
    }

    pub fn as_timeline_ref(&self) -> TimelineRef<'_, C, K, D> {
        match self {
            Self::Seconds(timeline) => TimelineRef::Seconds(timeline),
            Self::Beats(timeline) => TimelineRef::Beats(timeline),
        }
    }

    pub fn len(&self) -> usize {
        self.as_timeline_ref().events().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C, K, D> AnyTimeline<C, K, D>
where
    C: Sync + 'static,
    K: Eq + Hash + Send + 'static,
    D: Send + 'static,
{
    /// Duration in seconds.
    pub fn duration(&self) -> Option<f64> {
        match self {
            Self::Seconds(timeline) => timeline.duration(),
            Self::Beats(timeline) => timeline.duration(),
        }
    }

    /// The timeline as a clip rendered in seconds.
    pub fn into_clip(self) -> SharedClip<C, K, D> {
        match self {
            Self::Seconds(timeline) => Arc::new(timeline),
            Self::Beats(timeline) => Arc::new(timeline),
        }
    }
}

/// An event that did not make it into the timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedEvent {
    /// Nested timeline the event belongs to; `None` for the top document.
    pub timeline: Option<String>,
    /// Index in the document's `events` array.
    pub index: usize,
    pub position: Option<f64>,
    pub reason: String,
}

/// Turns documents into timelines against a registry.
pub struct Deserializer<'a, C, K, D> {
    registry: &'a ClipRegistry<C, K, D>,
    load_fn: Option<&'a LoadFn<'a>>,
    loading: Vec<String>,
    skipped: Vec<SkippedEvent>,
}

impl<'a, C, K, D> Deserializer<'a, C, K, D> {
    pub fn new(registry: &'a ClipRegistry<C, K, D>) -> Self {
        Self {
            registry,
            load_fn: None,
            loading: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Resolve nested timeline references through `load_fn`.
    pub fn with_loader(mut self, load_fn: &'a LoadFn<'a>) -> Self {
        self.load_fn = Some(load_fn);
        self
    }

    /// Events skipped so far, including those of nested documents.
    pub fn skipped(&self) -> &[SkippedEvent] {
        &self.skipped
    }

    pub fn into_skipped(self) -> Vec<SkippedEvent> {
        self.skipped
    }

    fn skip(&mut self, index: usize, position: Option<f64>, reason: String) {
        let timeline = self.loading.last().cloned();
        tracing::warn!(
            timeline = timeline.as_deref().unwrap_or("<root>"),
            index,
            position,
            reason = %reason,
            "Skipping event"
        );
        self.skipped.push(SkippedEvent {
            timeline,
            index,
            position,
            reason,
        });
    }
}

impl<'a, C, K, D> Deserializer<'a, C, K, D>
where
    C: Sync + 'static,
    K: Eq + Hash + Send + 'static,
    D: Send + 'static,
{
    /// Build the timeline a document describes.
    pub fn deserialize(&mut self, doc: &TimelineDoc) -> CuelistResult<AnyTimeline<C, K, D>> {
        if !doc.has_known_schema() {
            tracing::warn!(
                schema = doc.schema.as_deref().unwrap_or_default(),
                expected = SCHEMA_ID,
                "Unknown document schema, reading anyway"
            );
        }

        let compose = match &doc.compose_fn {
            Some(name) => self.registry.get_compose(name)?,
            None => default_compose(),
        };

        let mut timeline = match doc.kind {
            TimelineKind::Seconds => AnyTimeline::Seconds(Timeline::with_compose(compose)),
            TimelineKind::Beats => {
                let tempo = doc.tempo.clone().unwrap_or_default();
                let mut tempo_map = TempoMap::new(tempo.bpm);
                for change in &tempo.changes {
                    tempo_map.set_tempo(change.beat, change.bpm);
                }
                AnyTimeline::Beats(BpmTimeline::with_compose(tempo_map, compose))
            }
        };

        for (index, raw) in doc.events.iter().enumerate() {
            let event: EventDoc = match serde_json::from_value(raw.clone()) {
                Ok(event) => event,
                Err(e) => {
                    let position = raw.get("position").and_then(Value::as_f64);
                    self.skip(index, position, format!("malformed event: {e}"));
                    continue;
                }
            };
            if !event.position.is_finite() {
                self.skip(index, None, "position is not finite".to_string());
                continue;
            }

            match self.build_event(&event, doc, timeline.kind()) {
                Ok(clip) => match &mut timeline {
                    AnyTimeline::Seconds(t) => {
                        t.add(event.position, clip);
                    }
                    AnyTimeline::Beats(t) => {
                        t.add(event.position, clip);
                    }
                },
                Err(e) => self.skip(index, Some(event.position), e.to_string()),
            }
        }

        Ok(timeline)
    }

    fn build_event(
        &mut self,
        event: &EventDoc,
        doc: &TimelineDoc,
        parent: TimelineKind,
    ) -> CuelistResult<SharedClip<C, K, D>> {
        if let Some(link) = &event.timeline {
            return self.build_nested(link, &event.meta, parent);
        }
        match &event.clip {
            Some(clip_ref) => self.build_clip(clip_ref, &event.meta, doc),
            None => Err(CuelistError::document("event has neither clip nor timeline")),
        }
    }

    /// Load a referenced timeline and wrap it for its parent.
    ///
    /// Units follow the parent. A beat timeline inside a beat timeline is
    /// rendered in the parent's beats through [`NestedBpmClip`]. Any other
    /// child is added as a plain clip: its duration and render time are read
    /// in the parent's unit, so a seconds timeline under a beat parent plays
    /// one of its seconds per parent beat. `meta.durationBeats` clamps in the
    /// parent's unit as well, seconds under a seconds parent.
    fn build_nested(
        &mut self,
        link: &TimelineLink,
        meta: &EventMeta,
        parent: TimelineKind,
    ) -> CuelistResult<SharedClip<C, K, D>> {
        let name = link.name.as_str();
        if name.is_empty() {
            return Err(CuelistError::document("timeline event has no name"));
        }
        let load_fn = self
            .load_fn
            .ok_or_else(|| CuelistError::load(name, "no loader configured"))?;
        if self.loading.iter().any(|n| n == name) {
            return Err(CuelistError::load(name, "circular timeline reference"));
        }

        let sub_doc = load_fn(name).map_err(|e| match e {
            CuelistError::Load { .. } => e,
            other => CuelistError::load(name, other.to_string()),
        })?;

        self.loading.push(name.to_string());
        let child = self.deserialize(&sub_doc);
        self.loading.pop();
        let child = child.map_err(|e| CuelistError::load(name, e.to_string()))?;

        let inner: SharedClip<C, K, D> = match (parent, child) {
            (TimelineKind::Beats, AnyTimeline::Beats(bpm)) => Arc::new(NestedBpmClip::new(bpm)),
            (TimelineKind::Beats, child) => {
                tracing::warn!(
                    timeline = name,
                    "Seconds timeline nested in a beat timeline, its seconds play as parent beats"
                );
                child.into_clip()
            }
            (_, child) => child.into_clip(),
        };

        let scaled = ScaledClip::new(inner)
            .with_fades(link.fade_in, link.fade_out)
            .with_amount(link.amount)
            .with_scale_fn(self.registry.scale_fn())
            .with_duration(meta.duration_beats);

        let metadata = ClipMetadata::for_timeline(link.clone()).with_meta(meta.clone());
        Ok(Arc::new(MetadataClip::new(Arc::new(scaled), metadata)))
    }

    fn build_clip(
        &self,
        clip_ref: &ClipRefDoc,
        meta: &EventMeta,
        doc: &TimelineDoc,
    ) -> CuelistResult<SharedClip<C, K, D>> {
        let clip_type = clip_ref.clip_type.as_str();
        let mut merged = clip_ref.params.clone();

        if let Some(template_id) = &clip_ref.template_id {
            match doc.templates.get(template_id) {
                Some(template) => {
                    if let Some(expected) = template.clip_type.as_deref() {
                        if expected != clip_type {
                            tracing::warn!(
                                template = %template_id,
                                expected,
                                clip_type,
                                "Template clip type mismatch"
                            );
                        }
                    }
                    let mut base = template.params.clone();
                    base.extend(merged);
                    merged = base;
                }
                None => {
                    tracing::warn!(template = %template_id, "Template not found, using instance params");
                }
            }
        }

        let resolved = resolve_variables(merged, &doc.variables);
        let params = self.resolve_params(clip_type, resolved);
        let clip = self.registry.create(clip_type, &params)?;

        let metadata = ClipMetadata::for_clip(clip_type, clip_ref.params.clone())
            .with_meta(meta.clone())
            .with_template(clip_ref.template_id.clone());
        Ok(Arc::new(MetadataClip::new(clip, metadata)))
    }

    /// Evaluate set params and attach named resources.
    fn resolve_params(&self, clip_type: &str, values: Map<String, Value>) -> ClipParams {
        let schema_params = self
            .registry
            .get_schema(clip_type)
            .and_then(|schema| schema.get("params"))
            .and_then(Value::as_object);

        let mut params = ClipParams::new();
        for (key, value) in values {
            let field = schema_params.and_then(|p| p.get(&key));
            let is_set = field.and_then(|f| f.get("type")).and_then(Value::as_str) == Some("set");

            if is_set && value.is_array() {
                let items_key = field
                    .and_then(|f| f.get("items_key"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                match self.evaluate_set_param(items_key, &value) {
                    Ok(evaluated) => {
                        params.insert(key, evaluated);
                    }
                    Err(e) => {
                        tracing::warn!(param = %key, error = %e, "Failed to evaluate set param, passing through");
                        params.insert(key, value);
                    }
                }
                continue;
            }

            if let Some(name) = value.as_str() {
                if let Ok(resource) = self.registry.get_resource(name) {
                    params.insert_resource(key.clone(), resource.clone());
                }
            }
            params.insert(key, value);
        }
        params
    }

    fn evaluate_set_param(&self, items_key: &str, value: &Value) -> CuelistResult<Value> {
        let ops = parse_set_ops(value)?;
        let sets = self.registry.get_set(items_key)?;
        Ok(match evaluate_set(&ops, sets)? {
            Some(members) => Value::from(members.into_iter().collect::<Vec<_>>()),
            None => Value::Null,
        })
    }
}

/// Deserialize a document, optionally resolving nested timelines with `load_fn`.
pub fn deserialize_timeline<C, K, D>(
    doc: &TimelineDoc,
    registry: &ClipRegistry<C, K, D>,
    load_fn: Option<&LoadFn<'_>>,
) -> CuelistResult<AnyTimeline<C, K, D>>
where
    C: Sync + 'static,
    K: Eq + Hash + Send + 'static,
    D: Send + 'static,
{
    let mut deserializer = Deserializer::new(registry);
    if let Some(load_fn) = load_fn {
        deserializer = deserializer.with_loader(load_fn);
    }
    deserializer.deserialize(doc)
}
