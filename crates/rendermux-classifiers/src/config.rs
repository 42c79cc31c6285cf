//! Detection thresholds and rule switches

use rendermux_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for the heuristic rules
///
/// Every field has a default, so a partial YAML document only overrides what
/// it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Minimum non-empty lines before a sample can be tabular
    #[serde(default = "default_tabular_min_lines")]
    pub tabular_min_lines: usize,

    /// Fraction of lines that must contain the delimiter
    #[serde(default = "default_tabular_consistency")]
    pub tabular_consistency: f32,

    /// Largest allowed distance of a line's delimiter count from the mean
    #[serde(default = "default_tabular_max_deviation")]
    pub tabular_max_deviation: f32,

    /// Minimum non-empty lines before a sample can be a config document
    #[serde(default = "default_config_min_lines")]
    pub config_min_lines: usize,

    /// Fraction of lines that must look like keys, sections or list items
    #[serde(default = "default_config_consistency")]
    pub config_consistency: f32,

    /// Key lines required for a flat (unsectioned, unindented) document
    #[serde(default = "default_config_min_key_lines")]
    pub config_min_key_lines: usize,

    /// Minimum lines before a sample can be art
    #[serde(default = "default_art_min_lines")]
    pub art_min_lines: usize,

    /// Fraction of visible characters that must be symbols
    #[serde(default = "default_art_symbol_ratio")]
    pub art_symbol_ratio: f32,

    /// Samples larger than this skip the rule table
    #[serde(default = "default_max_sample_bytes")]
    pub max_sample_bytes: usize,

    /// Rule names to skip
    #[serde(default)]
    pub disabled_rules: Vec<String>,
}

impl DetectionConfig {
    /// Parse from a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read detection config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Reject values the heuristics cannot work with
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tabular_consistency", self.tabular_consistency),
            ("config_consistency", self.config_consistency),
            ("art_symbol_ratio", self.art_symbol_ratio),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config(format!(
                    "{} must be within 0.0..=1.0, got {}",
                    name, value
                )));
            }
        }

        if self.tabular_max_deviation < 0.0 {
            return Err(Error::config("tabular_max_deviation must not be negative"));
        }

        if self.tabular_min_lines < 2 {
            return Err(Error::config("tabular_min_lines must be at least 2"));
        }

        Ok(())
    }

    /// Whether the named rule has been switched off
    pub fn is_disabled(&self, rule: &str) -> bool {
        self.disabled_rules.iter().any(|r| r == rule)
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            tabular_min_lines: default_tabular_min_lines(),
            tabular_consistency: default_tabular_consistency(),
            tabular_max_deviation: default_tabular_max_deviation(),
            config_min_lines: default_config_min_lines(),
            config_consistency: default_config_consistency(),
            config_min_key_lines: default_config_min_key_lines(),
            art_min_lines: default_art_min_lines(),
            art_symbol_ratio: default_art_symbol_ratio(),
            max_sample_bytes: default_max_sample_bytes(),
            disabled_rules: Vec::new(),
        }
    }
}

fn default_tabular_min_lines() -> usize {
    2
}

fn default_tabular_consistency() -> f32 {
    0.7
}

fn default_tabular_max_deviation() -> f32 {
    1.0
}

fn default_config_min_lines() -> usize {
    2
}

fn default_config_consistency() -> f32 {
    0.7
}

fn default_config_min_key_lines() -> usize {
    3
}

fn default_art_min_lines() -> usize {
    3
}

fn default_art_symbol_ratio() -> f32 {
    0.6
}

fn default_max_sample_bytes() -> usize {
    1024 * 1024
}
