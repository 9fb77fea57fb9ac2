/// Engine configuration
///
/// Tunables for decode, crop interaction and export. Stored as JSON in the
/// same way edit state is, so the embedding app can ship overrides.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{EditorError, Result};

/// Configuration shared by the decode, crop, render and export stages
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest working-raster edge after downsampling (pixels)
    pub max_working_dimension: u32,

    /// JPEG quality for exported images (1-100)
    pub export_quality: u8,

    /// Visual radius of a crop corner handle (display pixels)
    pub handle_radius: f32,

    /// Hit radius around a crop corner; larger than the visual handle
    pub touch_tolerance: f32,

    /// Smallest allowed crop width/height (display pixels)
    pub min_crop_size: f32,

    /// Lower bound for user zoom
    pub min_scale: f32,

    /// Upper bound for user zoom
    pub max_scale: f32,

    /// Directory used by the filesystem export sink.
    /// `None` resolves to the user's pictures directory.
    pub export_dir: Option<PathBuf>,

    /// Prefix of generated export file names
    pub export_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let handle_radius = 12.0;
        Self {
            max_working_dimension: 1920,
            export_quality: 100,
            handle_radius,
            touch_tolerance: 48.0,
            min_crop_size: handle_radius * 2.0,
            min_scale: 0.5,
            max_scale: 5.0,
            export_dir: None,
            export_prefix: "Edit_".to_string(),
        }
    }
}

impl EngineConfig {
    /// Parse from JSON and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to a JSON string
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject values that would break the pipeline invariants
    pub fn validate(&self) -> Result<()> {
        if self.max_working_dimension == 0 {
            return Err(EditorError::Config("max_working_dimension must be > 0".into()));
        }
        if !(1..=100).contains(&self.export_quality) {
            return Err(EditorError::Config(format!(
                "export_quality {} outside 1..=100",
                self.export_quality
            )));
        }
        if self.min_crop_size <= 0.0 || self.handle_radius <= 0.0 {
            return Err(EditorError::Config("crop sizes must be positive".into()));
        }
        if self.touch_tolerance < self.handle_radius {
            return Err(EditorError::Config(
                "touch_tolerance must be at least handle_radius".into(),
            ));
        }
        if !(self.min_scale > 0.0 && self.min_scale <= 1.0 && self.max_scale >= 1.0) {
            return Err(EditorError::Config(format!(
                "scale bounds [{}, {}] must bracket 1.0",
                self.min_scale, self.max_scale
            )));
        }
        Ok(())
    }

    /// Resolve the export directory, falling back to pictures, then home
    pub fn resolved_export_dir(&self) -> Option<PathBuf> {
        self.export_dir
            .clone()
            .or_else(dirs::picture_dir)
            .or_else(dirs::home_dir)
    }
}
