//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml
//!
//! Every section and key is optional; a missing file falls back to defaults.

use anyhow::Context;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier stamped into report sources
    #[serde(default = "default_site_id")]
    pub id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self { id: default_site_id() }
    }
}

fn default_site_id() -> String {
    "flowtrack".to_string()
}

/// Trajectory segmentation and localization tuning
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Inter-sample gaps strictly greater than this split the trajectory
    pub max_gap_ms: i64,
    /// Distance within which a sample stays in its previous room
    pub stickiness_eps_m: f64,
    /// Assign unlocated samples to the nearest region within this distance
    pub nearest_fallback_m: Option<f64>,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self { max_gap_ms: 5000, stickiness_eps_m: 0.3, nearest_fallback_m: None }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PartitionSettings {
    /// Polygon pieces smaller than this are dropped after boolean ops
    pub min_sliver_area_m2: f64,
}

impl Default for PartitionSettings {
    fn default() -> Self {
        Self { min_sliver_area_m2: 1e-6 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Report file name, relative to the output directory
    #[serde(default = "default_report_file")]
    pub report_file: String,
    /// Stay segments (JSONL), relative to the output directory
    #[serde(default = "default_segments_file")]
    pub segments_file: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { report_file: default_report_file(), segments_file: default_segments_file() }
    }
}

fn default_report_file() -> String {
    "report.json".to_string()
}

fn default_segments_file() -> String {
    "segments.jsonl".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub segmentation: SegmentationSettings,
    #[serde(default)]
    pub partition: PartitionSettings,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    site_id: String,
    segmentation: SegmentationSettings,
    partition: PartitionSettings,
    report_file: String,
    segments_file: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_toml(TomlConfig::default(), "default".to_string())
    }
}

impl Config {
    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            site_id: toml_config.site.id,
            segmentation: toml_config.segmentation,
            partition: toml_config.partition,
            report_file: toml_config.output.report_file,
            segments_file: toml_config.output.segments_file,
            config_file,
        }
    }

    /// Determine config file path from args or environment
    pub fn resolve_config_path(args: &[String]) -> String {
        for (i, arg) in args.iter().enumerate() {
            if arg == "--config" {
                if let Some(path) = args.get(i + 1) {
                    return path.clone();
                }
            }
            if let Some(path) = arg.strip_prefix("--config=") {
                return path.to_string();
            }
        }

        if let Ok(path) = env::var("CONFIG_FILE") {
            return path;
        }

        "config/dev.toml".to_string()
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        if toml_config.segmentation.max_gap_ms <= 0 {
            anyhow::bail!(
                "Invalid segmentation.max_gap_ms {} in {}",
                toml_config.segmentation.max_gap_ms,
                path.display()
            );
        }

        Ok(Self::from_toml(toml_config, path.display().to_string()))
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(args: &[String]) -> Self {
        Self::load_from_path(Self::resolve_config_path(args))
    }

    /// Load from an explicit path, falling back to defaults on any error
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "config_fallback_to_defaults");
                Self::default()
            }
        }
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn segmentation(&self) -> &SegmentationSettings {
        &self.segmentation
    }

    pub fn partition(&self) -> &PartitionSettings {
        &self.partition
    }

    pub fn report_file(&self) -> &str {
        &self.report_file
    }

    pub fn segments_file(&self) -> &str {
        &self.segments_file
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to override segmentation tuning
    #[cfg(test)]
    pub fn with_segmentation(mut self, segmentation: SegmentationSettings) -> Self {
        self.segmentation = segmentation;
        self
    }
}
