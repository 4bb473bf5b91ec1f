//! Print verification points.

use std::path::PathBuf;

use cuelist_common::config::AppConfig;
use cuelist_core::collect_verify_points;

pub fn run(path: PathBuf, json: bool, config: &AppConfig) -> anyhow::Result<()> {
    let loaded = super::load(&path, config)?;
    let points = collect_verify_points(loaded.timeline.as_timeline_ref());

    if json {
        for point in &points {
            println!("{}", serde_json::to_string(point)?);
        }
        return Ok(());
    }

    println!("{} verify point(s):", points.len());
    for point in &points {
        println!("  {:>10.3}s  {}", point.time_seconds, point.label);
    }
    Ok(())
}
