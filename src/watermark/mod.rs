//! Tiled text watermarks
//!
//! A watermark is a short piece of text drawn into a square tile, rotated, and
//! repeated across the whole page with some overlap. Coverage controls how
//! tightly the tiles are packed.
//!
//! - [`text`] shapes and rasterizes the stamp text
//! - [`tile`] builds the rotated tile and computes the tiling stride
//! - [`compositor`] lays tiles over a page raster and flattens the result

pub mod compositor;
pub mod text;
pub mod tile;

use serde::{Deserialize, Serialize};

pub use compositor::{apply_watermark, PreparedStamp};
pub use text::{measure_text, StampFont, TextExtent};
pub use tile::{build_tile, TileStride};

/// Appearance of the tiled stamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkSpec {
    /// Stamp text; empty or whitespace-only text leaves pages untouched
    pub text: String,
    /// Stamp opacity in (0, 1]
    pub opacity: f32,
    /// Counter-clockwise rotation of each tile
    pub angle_degrees: f32,
    /// Em size of the stamp text in pixels
    pub font_size: u32,
    /// Tiling density knob in (0, 1]; higher packs tiles more tightly
    pub coverage: f32,
}

impl WatermarkSpec {
    /// Whether applying this watermark changes anything
    pub fn is_visible(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            text: "Preview".to_string(),
            opacity: 0.5,
            angle_degrees: 45.0,
            font_size: 92,
            coverage: 0.8,
        }
    }
}
