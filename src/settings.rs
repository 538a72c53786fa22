//! Preview settings
//!
//! Every field has a default, so a settings file only needs the values it
//! changes:
//!
//! ```yaml
//! watermark:
//!   text: "Sample - Do Not Copy"
//!   opacity: 0.35
//! dpi: 150
//! merge_order: by-size
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layout::RasterSpec;
use crate::merge::MergeOrder;
use crate::watermark::WatermarkSpec;

fn default_dpi() -> u32 {
    200
}

fn default_jpeg_quality() -> u8 {
    90
}

fn default_output_suffix() -> String {
    "_preview".to_string()
}

fn default_true() -> bool {
    true
}

fn default_merged_file_name() -> String {
    "merged_previews.pdf".to_string()
}

fn default_zip_file_name() -> String {
    "previews.zip".to_string()
}

/// Everything a batch run needs besides the documents and their selections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSettings {
    #[serde(default)]
    pub watermark: WatermarkSpec,

    /// Render resolution
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,

    /// Appended to each document's base name
    #[serde(default = "default_output_suffix")]
    pub output_suffix: String,

    /// Skip documents with nothing selected instead of rasterizing them
    #[serde(default = "default_true")]
    pub skip_empty: bool,

    /// Also build one combined document from every output
    #[serde(default = "default_true")]
    pub merge: bool,

    #[serde(default)]
    pub merge_order: MergeOrder,

    #[serde(default = "default_merged_file_name")]
    pub merged_file_name: String,

    /// Also bundle every per-document preview into one ZIP archive
    #[serde(default = "default_true")]
    pub zip: bool,

    #[serde(default = "default_zip_file_name")]
    pub zip_file_name: String,
}

impl Default for PreviewSettings {
    fn default() -> Self {
        Self {
            watermark: WatermarkSpec::default(),
            dpi: default_dpi(),
            jpeg_quality: default_jpeg_quality(),
            output_suffix: default_output_suffix(),
            skip_empty: true,
            merge: true,
            merge_order: MergeOrder::default(),
            merged_file_name: default_merged_file_name(),
            zip: true,
            zip_file_name: default_zip_file_name(),
        }
    }
}

impl PreviewSettings {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    pub fn raster(&self) -> RasterSpec {
        RasterSpec::new(self.dpi)
    }

    /// Check every value is within its allowed range
    pub fn validate(&self) -> Result<()> {
        let wm = &self.watermark;

        if !(wm.opacity > 0.0 && wm.opacity <= 1.0) {
            return Err(Error::Config(format!(
                "opacity must be in (0, 1], got {}",
                wm.opacity
            )));
        }
        if !(wm.coverage > 0.0 && wm.coverage <= 1.0) {
            return Err(Error::Config(format!(
                "coverage must be in (0, 1], got {}",
                wm.coverage
            )));
        }
        if !(-180.0..=180.0).contains(&wm.angle_degrees) {
            return Err(Error::Config(format!(
                "angle must be between -180 and 180 degrees, got {}",
                wm.angle_degrees
            )));
        }
        if wm.font_size == 0 {
            return Err(Error::Config("font size must be positive".to_string()));
        }
        if self.dpi == 0 {
            return Err(Error::Config("dpi must be positive".to_string()));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(Error::Config(format!(
                "jpeg quality must be between 1 and 100, got {}",
                self.jpeg_quality
            )));
        }
        if self.merged_file_name.trim().is_empty() {
            return Err(Error::Config("merged file name cannot be empty".to_string()));
        }
        if self.zip_file_name.trim().is_empty() {
            return Err(Error::Config("zip file name cannot be empty".to_string()));
        }

        Ok(())
    }
}
