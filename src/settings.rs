use crate::sketch::controller::LoopSettings;
use crate::sketch::gate::UnlockPolicy;
use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "configs/config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the classifier model file.
    pub model_path: PathBuf,
    /// Minimum confidence that, once the pen is lifted, freezes the prediction.
    pub confidence_threshold: f32,
    #[serde(default)]
    pub unlock_policy: UnlockPolicy,
    /// Period of the control loop in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// When enabled the logger starts at debug level and honours `RUST_LOG`.
    #[serde(default)]
    pub debug_logging: bool,
    /// Optional file that receives a copy of the log output.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_tick_interval_ms() -> u64 {
    20
}

impl Settings {
    pub fn new(model_path: impl Into<PathBuf>, confidence_threshold: f32) -> Self {
        Self {
            model_path: model_path.into(),
            confidence_threshold,
            unlock_policy: UnlockPolicy::default(),
            tick_interval_ms: default_tick_interval_ms(),
            debug_logging: false,
            log_file: None,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&content)
            .with_context(|| format!("deserialize config file {}", path.display()))?;
        settings
            .validate()
            .with_context(|| format!("validate config file {}", path.display()))?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            (0.0..=1.0).contains(&self.confidence_threshold),
            "confidence_threshold {} is outside [0, 1]",
            self.confidence_threshold
        );
        ensure!(self.tick_interval_ms > 0, "tick_interval_ms must be positive");
        ensure!(
            !self.model_path.as_os_str().is_empty(),
            "model_path must not be empty"
        );
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            confidence_threshold: self.confidence_threshold,
            unlock_policy: self.unlock_policy,
            tick_interval: self.tick_interval(),
        }
    }
}

/// Config path from the first command line argument, or the default.
pub fn config_path_from_args<I>(mut args: I) -> PathBuf
where
    I: Iterator<Item = String>,
{
    let _program = args.next();
    args.next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
