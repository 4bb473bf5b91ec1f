use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cuelist_common::error::{CuelistError, CuelistResult};
use cuelist_core::{clip, compose_fn, compose_sum, Clip, Frame, SharedClip, TimelineRef};
use cuelist_document::{
    deserialize_timeline, serialize_timeline, AnyTimeline, ClipParams, ClipRegistry,
    Deserializer, LoadFn, NamedSets, TimelineDoc,
};
use serde_json::{json, Value};

type Registry = ClipRegistry<(), String, f64>;
type Out = Frame<String, f64>;

struct Scene {
    level: f64,
}

fn constant(params: &ClipParams) -> CuelistResult<SharedClip<(), String, f64>> {
    let value = params.f64("value")?;
    let duration = params.duration("duration")?;
    Ok(clip(duration, move |_, _| Frame::from([("ch".to_string(), value)])))
}

fn group(params: &ClipParams) -> CuelistResult<SharedClip<(), String, f64>> {
    let members = params.set("fixtures")?;
    Ok(clip(None, move |_, _| {
        members.iter().map(|m| (m.clone(), 1.0)).collect()
    }))
}

fn scene(params: &ClipParams) -> CuelistResult<SharedClip<(), String, f64>> {
    let scene = params.resource::<Scene>("scene")?;
    Ok(clip(None, move |_, _| Frame::from([("ch".to_string(), scene.level)])))
}

fn registry() -> Registry {
    let mut registry = Registry::new();
    registry
        .register("constant", constant, None)
        .register(
            "group",
            group,
            Some(json!({"params": {"fixtures": {"type": "set", "items_key": "fixtures"}}})),
        )
        .register("scene", scene, None)
        .register_scale(Arc::new(|frame: Out, factor: f64| {
            frame.into_iter().map(|(k, v)| (k, v * factor)).collect()
        }));
    registry
}

fn render(clip: &dyn Clip<(), String, f64>, t: f64) -> Out {
    clip.render(t, &())
        .into_ready()
        .expect("document clips render synchronously")
        .expect("render should succeed")
}

fn render_timeline(timeline: &AnyTimeline<(), String, f64>, t: f64) -> Out {
    match timeline {
        AnyTimeline::Seconds(tl) => render(tl, t),
        AnyTimeline::Beats(tl) => render(tl, t),
    }
}

fn load(docs: BTreeMap<&'static str, Value>) -> impl Fn(&str) -> CuelistResult<TimelineDoc> {
    move |name: &str| {
        let raw = docs
            .get(name)
            .cloned()
            .ok_or_else(|| CuelistError::load(name, "no such document"))?;
        TimelineDoc::from_value(raw)
    }
}

fn constant_doc(kind: &str, value: f64, duration: f64) -> Value {
    json!({
        "$schema": "cuelist-timeline-v1",
        "type": kind,
        "tempo": {"bpm": 60.0},
        "events": [{"position": 0.0, "clip": {"type": "constant", "params": {"value": value, "duration": duration}}}]
    })
}

fn doc(raw: Value) -> TimelineDoc {
    TimelineDoc::from_value(raw).unwrap()
}

#[test]
fn nested_timeline_is_scaled_even_with_default_fades() {
    let registry = registry();
    let loader = load(BTreeMap::from([("sub", constant_doc("Timeline", 1.0, 10.0))]));
    let load_fn: &LoadFn = &loader;

    let timeline = deserialize_timeline(
        &doc(json!({
            "type": "Timeline",
            "events": [{"position": 1.0, "timeline": {"name": "sub"}, "meta": {"durationBeats": 2.0}}]
        })),
        &registry,
        Some(load_fn),
    )
    .unwrap();

    // the duration clamp only exists on the scaling wrapper
    assert_eq!(timeline.duration(), Some(3.0));
    assert_eq!(render_timeline(&timeline, 2.0)["ch"], 1.0);
    assert!(render_timeline(&timeline, 3.5).is_empty());

    let event = &timeline.as_timeline_ref().events()[0];
    let metadata = event.clip.metadata().unwrap();
    assert_eq!(metadata.timeline.as_ref().unwrap().name, "sub");
    assert!(matches!(event.clip.as_timeline(), Some(TimelineRef::Seconds(_))));
}

#[test]
fn nested_fades_use_registry_scale_fn() {
    let registry = registry();
    let loader = load(BTreeMap::from([("sub", constant_doc("Timeline", 1.0, 4.0))]));
    let load_fn: &LoadFn = &loader;

    let timeline = deserialize_timeline(
        &doc(json!({
            "events": [{"position": 0.0, "timeline": {"name": "sub", "fade_in": 2.0, "amount": 0.8}}]
        })),
        &registry,
        Some(load_fn),
    )
    .unwrap();

    let at = |t: f64| render_timeline(&timeline, t)["ch"];
    assert!((at(1.0) - 0.4).abs() < 1e-9);
    assert!((at(3.0) - 0.8).abs() < 1e-9);
}

#[test]
fn beat_child_of_beat_parent_plays_in_parent_beats() {
    let registry = registry();
    // the child's own 60 bpm is bypassed while nested
    let loader = load(BTreeMap::from([("chorus", constant_doc("BPMTimeline", 1.0, 4.0))]));
    let load_fn: &LoadFn = &loader;

    let timeline = deserialize_timeline(
        &doc(json!({
            "type": "BPMTimeline",
            "tempo": {"bpm": 120.0},
            "events": [{"position": 4.0, "timeline": {"name": "chorus", "amount": 0.5}}]
        })),
        &registry,
        Some(load_fn),
    )
    .unwrap();

    // beats 4..8 at 120 bpm
    assert_eq!(timeline.duration(), Some(4.0));
    assert_eq!(render_timeline(&timeline, 3.0)["ch"], 0.5);
    assert!(render_timeline(&timeline, 1.5).is_empty());

    let event = &timeline.as_timeline_ref().events()[0];
    assert!(matches!(event.clip.as_timeline(), Some(TimelineRef::NestedBeats(_))));
}

#[test]
fn beat_child_of_seconds_parent_keeps_own_tempo() {
    let registry = registry();
    let loader = load(BTreeMap::from([("loop", constant_doc("BPMTimeline", 1.0, 4.0))]));
    let load_fn: &LoadFn = &loader;

    let timeline = deserialize_timeline(
        &doc(json!({"events": [{"position": 10.0, "timeline": {"name": "loop"}}]})),
        &registry,
        Some(load_fn),
    )
    .unwrap();

    // 4 beats at 60 bpm
    assert_eq!(timeline.duration(), Some(14.0));
    let event = &timeline.as_timeline_ref().events()[0];
    assert!(matches!(event.clip.as_timeline(), Some(TimelineRef::Beats(_))));
}

#[test]
fn failed_nested_loads_are_skipped() {
    let registry = registry();
    let loader = load(BTreeMap::from([
        ("a", json!({"events": [{"position": 0.0, "timeline": {"name": "b"}}]})),
        ("b", json!({"events": [{"position": 0.0, "timeline": {"name": "a"}}]})),
        ("broken", json!({"compose_fn": "nope", "events": []})),
    ]));
    let load_fn: &LoadFn = &loader;

    let mut deserializer = Deserializer::new(&registry).with_loader(load_fn);
    let timeline = deserializer
        .deserialize(&doc(json!({
            "events": [
                {"position": 0.0, "timeline": {"name": "a"}},
                {"position": 1.0, "timeline": {"name": "missing"}},
                {"position": 2.0, "timeline": {"name": "broken"}},
                {"position": 3.0, "timeline": {"name": ""}}
            ]
        })))
        .unwrap();

    assert_eq!(timeline.len(), 1);
    let skipped = deserializer.skipped();
    assert_eq!(skipped.len(), 4);

    // a -> b -> a is cut inside b
    assert_eq!(skipped[0].timeline.as_deref(), Some("b"));
    assert!(skipped[0].reason.contains("circular"));
    assert_eq!(skipped[1].position, Some(1.0));
    assert!(skipped[2].reason.contains("nope"));
    assert_eq!(skipped[3].position, Some(3.0));
}

#[test]
fn templates_and_variables_resolve_but_raw_params_are_kept() {
    let registry = registry();
    let timeline = deserialize_timeline(
        &doc(json!({
            "variables": {"lvl": {"type": "number", "value": 0.25}},
            "templates": {"dim": {"clipType": "constant", "params": {"value": 0.1, "duration": 5.0}}},
            "events": [
                {"position": 0.0, "clip": {"type": "constant", "params": {"value": {"$var": "lvl"}}, "templateId": "dim"}}
            ]
        })),
        &registry,
        None,
    )
    .unwrap();

    assert_eq!(render_timeline(&timeline, 1.0)["ch"], 0.25);
    assert_eq!(timeline.duration(), Some(5.0));

    let metadata = timeline.as_timeline_ref().events()[0].clip.metadata().unwrap();
    assert_eq!(Value::Object(metadata.params.clone()), json!({"value": {"$var": "lvl"}}));
    assert_eq!(metadata.template_id.as_deref(), Some("dim"));
}

#[test]
fn template_mismatch_and_missing_template_still_build() {
    let registry = registry();
    let timeline = deserialize_timeline(
        &doc(json!({
            "templates": {"sweep": {"clipType": "ramp", "params": {"duration": 2.0}}},
            "events": [
                {"position": 0.0, "clip": {"type": "constant", "params": {"value": 1.0}, "templateId": "sweep"}},
                {"position": 0.0, "clip": {"type": "constant", "params": {"value": 2.0}, "templateId": "gone"}}
            ]
        })),
        &registry,
        None,
    )
    .unwrap();

    assert_eq!(timeline.len(), 2);
    let events = timeline.as_timeline_ref().events();
    assert_eq!(events[0].clip.duration(), Some(2.0));
    assert_eq!(events[1].clip.duration(), None);
}

#[test]
fn set_params_evaluate_against_registered_sets() {
    let mut registry = registry();
    let members = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
    registry.register_set(
        "fixtures",
        NamedSets::from([
            ("front".to_string(), members(&["p1", "p2", "p3"])),
            ("spots".to_string(), members(&["p2"])),
        ]),
    );

    let mut deserializer = Deserializer::new(&registry);
    let timeline = deserializer
        .deserialize(&doc(json!({
            "events": [
                {"position": 0.0, "clip": {"type": "group", "params": {"fixtures": [["add", "front"], ["sub", "spots"]]}}},
                {"position": 0.0, "clip": {"type": "group", "params": {"fixtures": [["add", "nowhere"]]}}}
            ]
        })))
        .unwrap();

    let frame = render_timeline(&timeline, 0.0);
    let mut keys: Vec<&str> = frame.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["p1", "p3"]);

    // the unevaluated list reaches the factory, which rejects it
    assert_eq!(timeline.len(), 1);
    assert_eq!(deserializer.skipped().len(), 1);
}

#[test]
fn resource_names_reach_factories() {
    let mut registry = registry();
    registry.register_resource("main", Arc::new(Scene { level: 0.7 }));

    let mut deserializer = Deserializer::new(&registry);
    let timeline = deserializer
        .deserialize(&doc(json!({
            "events": [
                {"position": 0.0, "clip": {"type": "scene", "params": {"scene": "main"}}},
                {"position": 1.0, "clip": {"type": "scene", "params": {"scene": "other"}}}
            ]
        })))
        .unwrap();

    assert_eq!(render_timeline(&timeline, 0.5)["ch"], 0.7);
    assert_eq!(timeline.len(), 1);
    assert!(deserializer.skipped()[0].reason.contains("other"));
}

#[test]
fn round_trip_preserves_document() {
    let mut registry = registry();
    registry.register_compose("sum", compose_fn(compose_sum::<f64>));
    let loader = load(BTreeMap::from([("sub", constant_doc("BPMTimeline", 1.0, 4.0))]));
    let load_fn: &LoadFn = &loader;

    let events = json!([
        {"position": 0.0, "clip": {"type": "constant", "params": {"value": {"$var": "lvl"}}, "templateId": "dim"}, "meta": {"label": "Intro"}},
        {"position": 8.0, "timeline": {"name": "sub", "fade_in": 2.0, "amount": 0.8}, "meta": {"durationBeats": 8.0}},
        {"position": 16.0, "clip": {"type": "constant", "params": {"value": 1.0, "duration": 2.0}}}
    ]);
    let original = doc(json!({
        "$schema": "cuelist-timeline-v1",
        "type": "BPMTimeline",
        "compose_fn": "sum",
        "tempo": {"bpm": 128.0, "changes": [{"beat": 16.0, "bpm": 140.0}]},
        "variables": {"lvl": {"type": "number", "value": 0.25}},
        "templates": {"dim": {"clipType": "constant", "params": {"duration": 4.0}}},
        "events": events.clone()
    }));

    let timeline = deserialize_timeline(&original, &registry, Some(load_fn)).unwrap();
    let mut written = serialize_timeline(timeline.as_timeline_ref(), &registry).unwrap();
    let value = serde_json::to_value(&written).unwrap();

    assert_eq!(value["$schema"], "cuelist-timeline-v1");
    assert_eq!(value["type"], "BPMTimeline");
    assert_eq!(value["compose_fn"], "sum");
    assert_eq!(value["tempo"], json!({"bpm": 128.0, "changes": [{"beat": 16.0, "bpm": 140.0}]}));
    assert_eq!(value["events"], events);
    assert!(value.get("variables").is_none());

    // editor fields are re-injected on save
    written.variables = original.variables.clone();
    written.templates = original.templates.clone();
    let reloaded = deserialize_timeline(&written, &registry, Some(load_fn)).unwrap();
    assert_eq!(reloaded.len(), 3);
}
