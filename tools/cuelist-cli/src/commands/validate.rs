//! Validate a timeline document.

use std::path::PathBuf;

use cuelist_common::config::AppConfig;

pub fn run(path: PathBuf, config: &AppConfig) -> anyhow::Result<()> {
    println!("Validating timeline at: {}", path.display());

    let loaded = super::load(&path, config)?;

    if !loaded.doc.has_known_schema() {
        println!(
            "  Schema: {} (unrecognized)",
            loaded.doc.schema.as_deref().unwrap_or_default()
        );
    }
    println!("  Events: {} of {}", loaded.timeline.len(), loaded.doc.events.len());

    if loaded.skipped.is_empty() {
        println!("\nTimeline is valid.");
    } else {
        println!("\nSkipped events:");
        for skipped in &loaded.skipped {
            let position = skipped
                .position
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string());
            match &skipped.timeline {
                Some(name) => println!(
                    "  - {name}[{}] at {position}: {}",
                    skipped.index, skipped.reason
                ),
                None => println!("  - [{}] at {position}: {}", skipped.index, skipped.reason),
            }
        }
        println!(
            "\n{} event(s) skipped. The timeline will play without them.",
            loaded.skipped.len()
        );
    }

    Ok(())
}
