//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CuelistError, CuelistResult};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory nested timeline documents are resolved against.
    pub timelines_dir: PathBuf,

    /// Playback defaults.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Playback parameters for a runner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Target frame rate of the playback loop.
    pub fps: f64,

    /// Fraction of the remaining nudge distance applied per frame, in `(0.0, 1.0]`.
    pub nudge_smoothing: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "cuelist_runner=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timelines_dir: dirs_default_timelines(),
            runner: RunnerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            fps: 40.0,
            nudge_smoothing: 0.1,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl RunnerConfig {
    /// Config with the given frame rate and default smoothing.
    pub fn with_fps(fps: f64) -> Self {
        Self {
            fps,
            ..Self::default()
        }
    }

    /// Check that the values can drive a playback loop.
    pub fn validate(&self) -> CuelistResult<()> {
        if !(self.fps.is_finite() && self.fps > 0.0) {
            return Err(CuelistError::config(format!(
                "fps must be a positive number, got {}",
                self.fps
            )));
        }
        if !(self.nudge_smoothing > 0.0 && self.nudge_smoothing <= 1.0) {
            return Err(CuelistError::config(format!(
                "nudge_smoothing must be in (0, 1], got {}",
                self.nudge_smoothing
            )));
        }
        Ok(())
    }

    /// Seconds between two frames.
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.fps
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
                    Ok(config) => match config.runner.validate() {
                        Ok(()) => return config,
                        Err(e) => {
                            tracing::warn!("Ignoring config at {:?}: {}", config_path, e);
                        }
                    },
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("cuelist").join("config.json")
}

/// Default timelines directory.
fn dirs_default_timelines() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("cuelist").join("timelines")
}
