//! Document metadata carried alongside clips.
//!
//! Clips built from a timeline document are wrapped in a [`MetadataClip`] so
//! the document can be written back out and so verify points get readable
//! labels. Rendering is untouched by the wrapper.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::clip::{Clip, SharedClip, TimelineRef};
use crate::render::Render;

fn is_zero(value: &f64) -> bool {
    *value == 0.0
}

fn is_one(value: &f64) -> bool {
    *value == 1.0
}

fn default_amount() -> f64 {
    1.0
}

/// Free-form per-event metadata (`meta` in the document).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Duration clamp for nested timelines, in the parent's unit.
    #[serde(
        default,
        rename = "durationBeats",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_beats: Option<f64>,

    /// Any other editor fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EventMeta {
    pub fn is_empty(&self) -> bool {
        self.label.is_none() && self.duration_beats.is_none() && self.extra.is_empty()
    }
}

/// Reference from an event to another named timeline document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineLink {
    pub name: String,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub fade_in: f64,

    #[serde(default, skip_serializing_if = "is_zero")]
    pub fade_out: f64,

    #[serde(default = "default_amount", skip_serializing_if = "is_one")]
    pub amount: f64,
}

impl TimelineLink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fade_in: 0.0,
            fade_out: 0.0,
            amount: 1.0,
        }
    }
}

/// What a document event looked like before it became a clip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClipMetadata {
    /// Registered clip type, for clip events.
    pub clip_type: Option<String>,
    /// Instance params as written (before template merge and resolution).
    pub params: Map<String, Value>,
    pub meta: EventMeta,
    /// Nested timeline reference, for timeline events.
    pub timeline: Option<TimelineLink>,
    pub template_id: Option<String>,
}

impl ClipMetadata {
    /// Metadata for a registered clip event.
    pub fn for_clip(clip_type: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            clip_type: Some(clip_type.into()),
            params,
            ..Self::default()
        }
    }

    /// Metadata for a nested timeline event.
    pub fn for_timeline(link: TimelineLink) -> Self {
        Self {
            timeline: Some(link),
            ..Self::default()
        }
    }

    pub fn with_meta(mut self, meta: EventMeta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_template(mut self, template_id: Option<String>) -> Self {
        self.template_id = template_id;
        self
    }

    /// Display name: clip type, then `meta.label`, then the timeline name.
    pub fn label(&self) -> Option<&str> {
        self.clip_type
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.meta.label.as_deref().filter(|s| !s.is_empty()))
            .or_else(|| {
                self.timeline
                    .as_ref()
                    .map(|link| link.name.as_str())
                    .filter(|s| !s.is_empty())
            })
    }
}

/// Transparent wrapper attaching [`ClipMetadata`] to a clip.
pub struct MetadataClip<C, K, D> {
    inner: SharedClip<C, K, D>,
    metadata: ClipMetadata,
}

impl<C, K, D> MetadataClip<C, K, D> {
    pub fn new(inner: SharedClip<C, K, D>, metadata: ClipMetadata) -> Self {
        Self { inner, metadata }
    }

    pub fn inner(&self) -> &SharedClip<C, K, D> {
        &self.inner
    }
}

impl<C, K, D> Clip<C, K, D> for MetadataClip<C, K, D> {
    fn duration(&self) -> Option<f64> {
        self.inner.duration()
    }

    fn render<'a>(&'a self, t: f64, ctx: &'a C) -> Render<'a, K, D> {
        self.inner.render(t, ctx)
    }

    fn metadata(&self) -> Option<&ClipMetadata> {
        Some(&self.metadata)
    }

    fn as_timeline(&self) -> Option<TimelineRef<'_, C, K, D>> {
        self.inner.as_timeline()
    }
}
