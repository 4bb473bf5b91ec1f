//! Play a timeline through a runner.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use cuelist_common::config::AppConfig;
use cuelist_runner::Runner;

use super::Channels;

pub fn run(
    path: PathBuf,
    fps: Option<f64>,
    start_at: f64,
    limit: Option<f64>,
    config: &AppConfig,
) -> anyhow::Result<()> {
    let loaded = super::load(&path, config)?;
    if !loaded.skipped.is_empty() {
        tracing::warn!(count = loaded.skipped.len(), "Playing with skipped events");
    }

    let duration = loaded.timeline.duration();
    if duration.is_none() && limit.is_none() {
        anyhow::bail!("Timeline is unbounded; pass --limit to stop playback");
    }

    let mut runner_config = config.runner;
    if let Some(fps) = fps {
        runner_config.fps = fps;
    }

    let runner: Runner<(), String, f64, Channels> = Runner::passthrough(())
        .with_config(runner_config)
        .with_output(Arc::new(|frame: &Channels| {
            let sorted: BTreeMap<&String, &f64> = frame.iter().collect();
            match serde_json::to_string(&sorted) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!("Failed to encode frame: {e}"),
            }
        }));

    tracing::info!(
        path = %path.display(),
        fps = runner_config.fps,
        start_at,
        "Starting playback"
    );

    let clip = loaded.timeline.into_clip();
    match limit {
        Some(limit) => {
            if !(limit.is_finite() && limit >= 0.0) {
                anyhow::bail!("--limit must be a non-negative number of seconds");
            }
            runner.play(clip, start_at)?;
            let finished = runner.wait_timeout(Duration::from_secs_f64(limit));
            if !finished {
                runner.stop();
            }
        }
        None => runner.play_sync(clip, start_at)?,
    }

    tracing::info!(elapsed = runner.elapsed(), "Playback finished");
    Ok(())
}
