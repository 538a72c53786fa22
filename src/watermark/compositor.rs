//! Lays the stamp tile over page rasters

use image::{Rgb, RgbImage, RgbaImage};

use super::text::{blend_over, StampFont};
use super::tile::{build_tile, TileStride};
use super::WatermarkSpec;
use crate::error::Result;

/// A stamp tile ready to be tiled over any number of pages
///
/// Building the tile (shaping, drawing, rotating) is the expensive part, so a
/// batch builds it once and shares it between pages.
#[derive(Debug, Clone)]
pub struct PreparedStamp {
    tile: RgbaImage,
    stride: TileStride,
}

impl PreparedStamp {
    /// Prepare a stamp; `None` when the watermark text is blank
    pub fn new(font: &StampFont, spec: &WatermarkSpec) -> Result<Option<Self>> {
        if !spec.is_visible() {
            return Ok(None);
        }
        let tile = build_tile(font, spec)?;
        let stride = TileStride::compute(tile.width(), tile.height(), spec.coverage);
        Ok(Some(Self { tile, stride }))
    }

    pub fn tile(&self) -> &RgbaImage {
        &self.tile
    }

    pub fn stride(&self) -> TileStride {
        self.stride
    }

    /// Top-left corners of every tile placed on a page of the given size
    ///
    /// Placement starts one tile before the origin and stops one tile past the
    /// far edge so partial tiles cover the borders.
    pub fn origins(&self, width: u32, height: u32) -> Vec<(i64, i64)> {
        let (tw, th) = (i64::from(self.tile.width()), i64::from(self.tile.height()));
        let (sx, sy) = (i64::from(self.stride.x), i64::from(self.stride.y));

        let mut origins = Vec::new();
        let mut y = -th;
        while y < i64::from(height) + th {
            let mut x = -tw;
            while x < i64::from(width) + tw {
                origins.push((x, y));
                x += sx;
            }
            y += sy;
        }
        origins
    }

    /// Stamp a page; the result has the page's exact dimensions
    pub fn apply(&self, page: &RgbImage) -> RgbImage {
        let (width, height) = page.dimensions();
        let mut overlay = RgbaImage::new(width, height);
        for (x, y) in self.origins(width, height) {
            blend_tile(&mut overlay, &self.tile, x, y);
        }
        flatten(page, &overlay)
    }
}

/// Composite a tiled text watermark over a page raster
///
/// Blank watermark text returns an identical copy of the page.
pub fn apply_watermark(
    page: &RgbImage,
    spec: &WatermarkSpec,
    font: &StampFont,
) -> Result<RgbImage> {
    match PreparedStamp::new(font, spec)? {
        Some(stamp) => Ok(stamp.apply(page)),
        None => Ok(page.clone()),
    }
}

/// Blend one tile onto the overlay, clipping to the overlay bounds
fn blend_tile(overlay: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    let (ow, oh) = (i64::from(overlay.width()), i64::from(overlay.height()));
    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + i64::from(tile.width())).min(ow);
    let y_end = (y + i64::from(tile.height())).min(oh);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let stamp = *tile.get_pixel((tx - x) as u32, (ty - y) as u32);
            if stamp[3] == 0 {
                continue;
            }
            let pixel = overlay.get_pixel_mut(tx as u32, ty as u32);
            *pixel = blend_over(*pixel, stamp);
        }
    }
}

/// Composite the overlay over the opaque page and drop the alpha channel
fn flatten(page: &RgbImage, overlay: &RgbaImage) -> RgbImage {
    let mut result = page.clone();
    for (pixel, stamp) in result.pixels_mut().zip(overlay.pixels()) {
        let alpha = u32::from(stamp[3]);
        if alpha == 0 {
            continue;
        }
        let mix = |top: u8, bottom: u8| -> u8 {
            ((u32::from(top) * alpha + u32::from(bottom) * (255 - alpha) + 127) / 255) as u8
        };
        *pixel = Rgb([
            mix(stamp[0], pixel[0]),
            mix(stamp[1], pixel[1]),
            mix(stamp[2], pixel[2]),
        ]);
    }
    result
}
