//! Converter configuration.
//!
//! Handles loading, validating, and merging `image-convert.toml`. User values
//! are layered over stock defaults; command-line flags are applied on top by
//! the binary before the config is frozen into a [`TargetSpec`].
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [conversion]
//! format = "png"            # jpeg, png, gif, bmp, tiff, webp, ico
//! quality = 85              # 0-100, honored by JPEG, PNG and WebP
//! animation = "auto"        # auto, force-first-frame, force-split, skip-if-animated
//! overwrite = false         # replace existing files outside the batch
//! # output_dir = "converted"
//!
//! [processing]
//! # max_processes = 4       # omit for auto = min(4, cores - 1)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::codec::Quality;
use crate::format::Format;
use crate::job::TargetSpec;
use crate::policy::AnimationPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "image-convert.toml";

/// Upper bound of the automatic worker count.
const AUTO_MAX_WORKERS: usize = 4;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Converter configuration loaded from `image-convert.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConvertConfig {
    /// What every job converts to.
    pub conversion: ConversionConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl ConvertConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.conversion.quality > 100 {
            return Err(ConfigError::Validation(
                "conversion.quality must be 0-100".into(),
            ));
        }
        if self.processing.max_processes == Some(0) {
            return Err(ConfigError::Validation(
                "processing.max_processes must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Freeze the conversion settings into the batch's target.
    pub fn target_spec(&self) -> TargetSpec {
        TargetSpec::new(
            self.conversion.format,
            Quality::new(self.conversion.quality),
            self.conversion.animation,
        )
    }
}

/// Target format and per-batch behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    pub format: Format,
    /// Quality 0-100. Kept as a plain integer so out-of-range values are
    /// reported instead of silently clamped.
    pub quality: u32,
    pub animation: AnimationPolicy,
    /// Replace files that already exist outside the batch.
    pub overwrite: bool,
    /// Write outputs here instead of next to each source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            format: Format::Png,
            quality: Quality::default().value() as u32,
            animation: AnimationPolicy::default(),
            overwrite: false,
            output_dir: None,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel conversion workers.
    /// When absent, defaults to `min(4, cores - 1)` (at least 1).
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → `min(4, max(1, cores - 1))`, leaving a core for the system
/// - `Some(n)` → `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    match config.max_processes {
        Some(n) => n.min(cores).max(1),
        None => auto_threads(cores),
    }
}

fn auto_threads(cores: usize) -> usize {
    cores.saturating_sub(1).max(1).min(AUTO_MAX_WORKERS)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ConvertConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(toml::from_str(&content)?))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and
/// validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<ConvertConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ConvertConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when the file is
/// missing.
pub fn load_config(path: &Path) -> Result<ConvertConfig, ConfigError> {
    resolve_config(load_raw_config(path)?)
}

/// Returns a fully-commented stock `image-convert.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# image-convert configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Command-line flags override them.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Conversion target
# ---------------------------------------------------------------------------
[conversion]
# Target format: jpeg (jpg), png, gif, bmp, tiff (tif), webp, ico.
format = "png"

# Encoding quality (0 = worst, 100 = best). Presets: 50 low, 85 medium, 100 high.
# JPEG and WebP use it directly, PNG maps it onto compression effort,
# other formats ignore it.
quality = 85

# What to do with animated sources when the target cannot animate
# (GIF and WebP keep animations as-is):
#   auto              - keep the first frame
#   force-first-frame - keep the first frame
#   force-split       - write one file per frame (name_0000.png, ...)
#   skip-if-animated  - leave the source alone
animation = "auto"

# Replace files that already exist. Sources in the same batch are never
# overwritten. When false, a numeric suffix is added instead (name_1.png).
overwrite = false

# Write every output here instead of next to its source.
# output_dir = "converted"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel conversion workers.
# Omit or comment out to auto-detect (= min(4, CPU cores - 1)).
# max_processes = 4
"##
}
