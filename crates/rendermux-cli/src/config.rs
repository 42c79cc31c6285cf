//! CLI configuration

use anyhow::Context;
use rendermux_classifiers::DetectionConfig;
use rendermux_core::StreamConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Looked up in the working directory when no `--config` is given
pub const DEFAULT_CONFIG_FILE: &str = "rendermux.yaml";

/// Detection thresholds plus streaming knobs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RendermuxConfig {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub streaming: StreamConfig,
}

impl RendermuxConfig {
    /// Parse and validate YAML
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Invalid rendermux configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Load an explicit file, else `rendermux.yaml` if present, else defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => {
                debug!("No config file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Apply `--pre-buffer` / `--throttle-ms`
    pub fn apply_stream_overrides(&mut self, pre_buffer: Option<usize>, throttle_ms: Option<u64>) {
        if let Some(pre_buffer) = pre_buffer {
            self.streaming.pre_buffer_size = pre_buffer;
        }
        if let Some(throttle_ms) = throttle_ms {
            self.streaming.throttle_interval_ms = throttle_ms;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.detection.validate()?;
        self.streaming
            .validate()
            .context("invalid streaming section")?;
        Ok(())
    }
}
