//! Timeline document types (`cuelist-timeline-v1`).
//!
//! Events are kept as raw JSON values at the document level and decoded one
//! at a time, so a single malformed event cannot make the whole document
//! unreadable.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use cuelist_common::error::{CuelistError, CuelistResult};
use cuelist_core::{EventMeta, TempoChange, TimelineLink};

/// Schema identifier written to and expected in `$schema`.
pub const SCHEMA_ID: &str = "cuelist-timeline-v1";

fn default_bpm() -> f64 {
    120.0
}

/// Which unit event positions are in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimelineKind {
    /// Positions in seconds.
    #[default]
    #[serde(rename = "Timeline")]
    Seconds,
    /// Positions in beats, with a tempo map.
    #[serde(rename = "BPMTimeline")]
    Beats,
}

/// Top-level timeline document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineDoc {
    /// Schema identifier, normally [`SCHEMA_ID`].
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(rename = "type", default)]
    pub kind: TimelineKind,

    /// Registered compose function name; absent means the default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose_fn: Option<String>,

    /// Tempo for beat timelines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tempo: Option<TempoDoc>,

    /// Raw events, decoded individually as [`EventDoc`].
    #[serde(default)]
    pub events: Vec<Value>,

    /// Editor variables referenced from params as `{"$var": name}`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, VariableDef>,

    /// Editor clip presets referenced by `templateId`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub templates: BTreeMap<String, TemplateDoc>,

    /// Fields this crate does not interpret (e.g. editor audio tracks).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tempo section of a beat timeline document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TempoDoc {
    #[serde(default = "default_bpm")]
    pub bpm: f64,

    /// Breakpoints after beat 0.
    #[serde(default)]
    pub changes: Vec<TempoChange>,
}

impl Default for TempoDoc {
    fn default() -> Self {
        Self {
            bpm: default_bpm(),
            changes: Vec::new(),
        }
    }
}

/// A named value substituted into clip params.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    /// Editor type hint ("number", "color", ...). Not interpreted.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default)]
    pub value: Value,
}

/// Clip parameter preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDoc {
    #[serde(rename = "clipType", default, skip_serializing_if = "Option::is_none")]
    pub clip_type: Option<String>,

    #[serde(default)]
    pub params: Map<String, Value>,
}

/// One event: a registered clip or a nested timeline at a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDoc {
    /// Seconds or beats, depending on the owning document.
    pub position: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clip: Option<ClipRefDoc>,

    /// Takes precedence over `clip` when both are present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeline: Option<TimelineLink>,

    #[serde(default, skip_serializing_if = "EventMeta::is_empty")]
    pub meta: EventMeta,
}

/// Registered clip reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipRefDoc {
    #[serde(rename = "type")]
    pub clip_type: String,

    #[serde(default)]
    pub params: Map<String, Value>,

    #[serde(rename = "templateId", default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl EventDoc {
    pub fn at(position: f64) -> Self {
        Self {
            position,
            clip: None,
            timeline: None,
            meta: EventMeta::default(),
        }
    }
}

impl TimelineDoc {
    /// Empty document of the given kind, stamped with [`SCHEMA_ID`].
    pub fn new(kind: TimelineKind) -> Self {
        Self {
            schema: Some(SCHEMA_ID.to_string()),
            kind,
            ..Self::default()
        }
    }

    /// Whether `$schema` is absent or the supported version.
    pub fn has_known_schema(&self) -> bool {
        self.schema.as_deref().map_or(true, |s| s == SCHEMA_ID)
    }

    pub fn from_json_str(json: &str) -> CuelistResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_value(value: Value) -> CuelistResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json_pretty(&self) -> CuelistResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Read a document from disk.
    pub fn load(path: impl AsRef<Path>) -> CuelistResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json).map_err(|e| {
            CuelistError::document(format!("{}: {e}", path.display()))
        })
    }

    /// Write the document to disk as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> CuelistResult<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Append an event.
    pub fn push_event(&mut self, event: &EventDoc) -> CuelistResult<&mut Self> {
        self.events.push(serde_json::to_value(event)?);
        Ok(self)
    }
}
