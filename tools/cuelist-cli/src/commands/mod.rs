//! Subcommands and the document loading they share.

pub mod info;
pub mod play;
pub mod validate;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cuelist_common::config::AppConfig;
use cuelist_common::error::{CuelistError, CuelistResult};
use cuelist_core::{
    clip, compose_first, compose_fn, compose_last, compose_max, compose_mean, compose_min,
    compose_sum, Frame, SharedClip,
};
use cuelist_document::{AnyTimeline, ClipParams, ClipRegistry, Deserializer, SkippedEvent, TimelineDoc};

/// Channel name to value.
pub type Channels = Frame<String, f64>;
pub type DemoRegistry = ClipRegistry<(), String, f64>;

/// A loaded document with the timeline it describes.
pub struct Loaded {
    pub doc: TimelineDoc,
    pub timeline: AnyTimeline<(), String, f64>,
    pub skipped: Vec<SkippedEvent>,
    pub registry: DemoRegistry,
}

/// Registry with the built-in `constant` and `ramp` clips on `f64` channels.
pub fn demo_registry() -> DemoRegistry {
    let mut registry = DemoRegistry::new();
    registry
        .register(
            "constant",
            constant,
            Some(serde_json::json!({"params": {
                "channel": {"type": "string", "default": "value"},
                "value": {"type": "number"},
                "duration": {"type": "number", "default": null}
            }})),
        )
        .register(
            "ramp",
            ramp,
            Some(serde_json::json!({"params": {
                "channel": {"type": "string", "default": "value"},
                "from": {"type": "number", "default": 0.0},
                "to": {"type": "number", "default": 1.0},
                "duration": {"type": "number"}
            }})),
        )
        .register_compose("last", compose_fn(compose_last::<f64>))
        .register_compose("first", compose_fn(compose_first::<f64>))
        .register_compose("sum", compose_fn(compose_sum::<f64>))
        .register_compose("mean", compose_fn(compose_mean::<f64>))
        .register_compose("max", compose_fn(compose_max::<f64>))
        .register_compose("min", compose_fn(compose_min::<f64>))
        .register_scale(Arc::new(|frame: Channels, factor: f64| {
            frame.into_iter().map(|(k, v)| (k, v * factor)).collect()
        }));
    registry
}

fn channel(params: &ClipParams) -> CuelistResult<String> {
    Ok(match params.get("channel") {
        Some(_) => params.str("channel")?.to_string(),
        None => "value".to_string(),
    })
}

fn constant(params: &ClipParams) -> CuelistResult<SharedClip<(), String, f64>> {
    let channel = channel(params)?;
    let value = params.f64("value")?;
    let duration = params.duration("duration")?;
    Ok(clip(duration, move |_, _| Frame::from([(channel.clone(), value)])))
}

fn ramp(params: &ClipParams) -> CuelistResult<SharedClip<(), String, f64>> {
    let channel = channel(params)?;
    let from = params.f64_or("from", 0.0)?;
    let to = params.f64_or("to", 1.0)?;
    let duration = params.f64("duration")?;
    if !(duration.is_finite() && duration > 0.0) {
        return Err(CuelistError::invalid_params("ramp duration must be positive"));
    }
    Ok(clip(Some(duration), move |t, _| {
        let progress = (t / duration).clamp(0.0, 1.0);
        Frame::from([(channel.clone(), from + (to - from) * progress)])
    }))
}

/// Where a nested timeline named `name` is looked up: next to the parent
/// document first, then in the configured timelines directory.
fn candidate_paths(base_dir: &Path, timelines_dir: &Path, name: &str) -> Vec<PathBuf> {
    let file = if name.ends_with(".json") {
        name.to_string()
    } else {
        format!("{name}.json")
    };
    vec![base_dir.join(&file), timelines_dir.join(&file)]
}

/// Load and deserialize a document, resolving nested timelines from disk.
pub fn load(path: &Path, config: &AppConfig) -> anyhow::Result<Loaded> {
    let doc = TimelineDoc::load(path)
        .map_err(|e| anyhow::anyhow!("Failed to load timeline document: {e}"))?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf();
    let timelines_dir = config.timelines_dir.clone();
    let load_nested = move |name: &str| -> CuelistResult<TimelineDoc> {
        let candidates = candidate_paths(&base_dir, &timelines_dir, name);
        match candidates.iter().find(|p| p.is_file()) {
            Some(found) => {
                tracing::debug!(name, path = %found.display(), "Loading nested timeline");
                TimelineDoc::load(found)
            }
            None => Err(CuelistError::load(name, "no document found")),
        }
    };

    let registry = demo_registry();
    let mut deserializer = Deserializer::new(&registry).with_loader(&load_nested);
    let timeline = deserializer
        .deserialize(&doc)
        .map_err(|e| anyhow::anyhow!("Failed to build timeline: {e}"))?;
    let skipped = deserializer.into_skipped();

    Ok(Loaded {
        doc,
        timeline,
        skipped,
        registry,
    })
}
