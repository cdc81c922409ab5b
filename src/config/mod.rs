use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::logging::LoggingConfig;

/// Pixel size of the instrument the fixed good-hit threshold was calibrated on.
pub const CALIBRATED_MICRONS_PER_PIXEL: f64 = 16.0 / 60.0;

/// Good-hit distance measured on that instrument, in pixels.
pub const CALIBRATED_GOOD_HIT_PIXELS: f64 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AlignConfig {
    pub engine: EngineConfig,
    pub rough: RoughConfig,
    pub precision: PrecisionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub microns_per_pixel: f64,
    /// Nominal physical width of one sequencer tile.
    pub tile_width_um: f64,
    /// Standard deviation of a cluster's footprint, used to smooth tile rasters.
    pub cluster_sigma_um: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoughConfig {
    pub rotation_estimate_degrees: f64,
    /// Per-instrument correction added to the rotation estimate.
    pub rotation_adjustment_degrees: f64,
    pub snr_threshold: f64,
    pub side: ChipSide,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecisionConfig {
    pub min_hits: usize,
    /// Fraction of the longest correspondences dropped before fitting.
    pub outlier_trim: f64,
    pub hit_threshold: HitThresholdPolicy,
}

/// Which chip surface rough alignment considers candidate tiles on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChipSide {
    One,
    #[default]
    Two,
}

/// How the good-hit distance threshold is chosen during hit classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum HitThresholdPolicy {
    /// Fixed distance on the calibrated instrument, percentile otherwise.
    #[default]
    Calibrated,
    /// Always this many pixels.
    Fixed { pixels: f64 },
    /// This percentile of the exclusive-hit distances.
    ExclusivePercentile { percentile: f64 },
}

impl HitThresholdPolicy {
    /// Reduce `Calibrated` to a concrete policy for the given pixel size.
    pub fn resolve(self, microns_per_pixel: f64) -> Self {
        match self {
            HitThresholdPolicy::Calibrated => {
                if (16.0 / microns_per_pixel) as i64 == (16.0 / CALIBRATED_MICRONS_PER_PIXEL).round() as i64 {
                    HitThresholdPolicy::Fixed {
                        pixels: CALIBRATED_GOOD_HIT_PIXELS,
                    }
                } else {
                    HitThresholdPolicy::ExclusivePercentile { percentile: 95.0 }
                }
            }
            concrete => concrete,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            microns_per_pixel: CALIBRATED_MICRONS_PER_PIXEL,
            tile_width_um: 935.0,
            cluster_sigma_um: 0.25,
        }
    }
}

impl Default for RoughConfig {
    fn default() -> Self {
        Self {
            rotation_estimate_degrees: 180.0,
            rotation_adjustment_degrees: 0.0,
            snr_threshold: 1.2,
            side: ChipSide::Two,
        }
    }
}

impl Default for PrecisionConfig {
    fn default() -> Self {
        Self {
            min_hits: 15,
            outlier_trim: 0.1,
            hit_threshold: HitThresholdPolicy::Calibrated,
        }
    }
}

impl RoughConfig {
    pub fn rotation_degrees(&self) -> f64 {
        self.rotation_estimate_degrees + self.rotation_adjustment_degrees
    }
}

impl AlignConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;

        if content.trim_start().starts_with('{') {
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> Result<()> {
        let content = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !(self.engine.microns_per_pixel > 0.0) {
            errors.push("microns_per_pixel must be positive".to_string());
        }

        if !(self.engine.tile_width_um > 0.0) {
            errors.push("tile_width_um must be positive".to_string());
        }

        if self.engine.cluster_sigma_um < 0.0 {
            errors.push("cluster_sigma_um must be non-negative".to_string());
        }

        if !(self.rough.snr_threshold > 0.0) {
            errors.push("snr_threshold must be positive".to_string());
        }

        if !(0.0..1.0).contains(&self.precision.outlier_trim) {
            errors.push("outlier_trim must be in [0, 1)".to_string());
        }

        match self.precision.hit_threshold {
            HitThresholdPolicy::Fixed { pixels } if !(pixels > 0.0) => {
                errors.push("fixed hit threshold must be positive".to_string());
            }
            HitThresholdPolicy::ExclusivePercentile { percentile }
                if !(0.0..=100.0).contains(&percentile) =>
            {
                errors.push("hit threshold percentile must be in [0, 100]".to_string());
            }
            _ => {}
        }

        if let Err(e) = self.logging.validate() {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[derive(Debug, Clone)]
pub enum ConfigFormat {
    Json,
    Toml,
}

pub fn load_config_or_default(config_path: Option<&Path>) -> AlignConfig {
    match config_path {
        Some(path) => match AlignConfig::load_from_file(path) {
            Ok(config) => {
                if let Err(errors) = config.validate() {
                    eprintln!("Configuration validation errors:");
                    for error in errors {
                        eprintln!("  - {}", error);
                    }
                    eprintln!("Using default configuration instead.");
                    AlignConfig::default()
                } else {
                    config
                }
            }
            Err(e) => {
                eprintln!("Failed to load config from '{}': {:#}", path.display(), e);
                eprintln!("Using default configuration.");
                AlignConfig::default()
            }
        },
        None => AlignConfig::default(),
    }
}
