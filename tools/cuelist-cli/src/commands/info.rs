//! Show timeline information.

use std::path::PathBuf;

use cuelist_common::config::AppConfig;
use cuelist_document::AnyTimeline;

fn format_duration(duration: Option<f64>) -> String {
    match duration {
        Some(secs) => format!("{secs:.3}s"),
        None => "unbounded".to_string(),
    }
}

pub fn run(path: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    let loaded = super::load(&path, config)?;
    let doc = &loaded.doc;

    println!("Timeline: {}", path.display());
    println!("  Type: {:?}", loaded.timeline.kind());
    println!(
        "  Compose: {}",
        doc.compose_fn.as_deref().unwrap_or("last (default)")
    );
    println!("  Duration: {}", format_duration(loaded.timeline.duration()));
    println!();

    if let AnyTimeline::Beats(bpm) = &loaded.timeline {
        println!("Tempo:");
        for change in bpm.tempo_map().changes() {
            println!("  beat {:>8.2}: {} bpm", change.beat, change.bpm);
        }
        println!();
    }

    println!("Events:");
    for (index, event) in loaded.timeline.as_timeline_ref().events().iter().enumerate() {
        let label = event
            .clip
            .metadata()
            .and_then(|m| m.label())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("clip[{index}]"));
        println!(
            "  {:>8.2}  {label} ({})",
            event.position,
            format_duration(event.clip.duration())
        );
    }
    if !loaded.skipped.is_empty() {
        println!("  ({} skipped)", loaded.skipped.len());
    }
    println!();

    println!("Registry:");
    let clip_types: Vec<&str> = loaded
        .registry
        .list_factories()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    println!("  Clip types: {}", clip_types.join(", "));
    if !doc.variables.is_empty() {
        let names: Vec<&str> = doc.variables.keys().map(String::as_str).collect();
        println!("  Variables: {}", names.join(", "));
    }
    if !doc.templates.is_empty() {
        let names: Vec<&str> = doc.templates.keys().map(String::as_str).collect();
        println!("  Templates: {}", names.join(", "));
    }

    Ok(())
}
