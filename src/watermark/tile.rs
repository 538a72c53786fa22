//! Stamp tile construction and tiling geometry

use image::{Rgba, RgbaImage};

use super::text::StampFont;
use super::WatermarkSpec;
use crate::error::Result;

/// Padding added around the text diagonal so rotated glyphs are never clipped
pub const TILE_MARGIN: u32 = 10;

/// Smallest distance between neighbouring tiles, in pixels
pub const MIN_STRIDE: u32 = 40;

/// Build the rotated stamp tile for a watermark
///
/// The text is centered in a square whose side is the text box diagonal plus
/// [`TILE_MARGIN`], drawn in black at the requested opacity, then rotated
/// counter-clockwise by `angle_degrees` onto an expanded canvas.
pub fn build_tile(font: &StampFont, spec: &WatermarkSpec) -> Result<RgbaImage> {
    let shaped = font.shape(&spec.text, spec.font_size as f32)?;
    let extent = shaped.extent;

    let diagonal = f64::from(extent.width).hypot(f64::from(extent.height));
    let side = diagonal.ceil() as u32 + TILE_MARGIN;

    let mut tile = RgbaImage::new(side, side);
    let x = (side - extent.width.min(side)) / 2;
    let y = (side - extent.height.min(side)) / 2;
    let alpha = (255.0 * spec.opacity.clamp(0.0, 1.0)) as u8;
    font.draw(&mut tile, &shaped, x as f32, y as f32, Rgba([0, 0, 0, alpha]))?;

    Ok(rotate_expand(&tile, spec.angle_degrees))
}

/// Distance between tile origins along each axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileStride {
    pub x: u32,
    pub y: u32,
}

impl TileStride {
    /// Compute tiling stride for a tile of the given size
    ///
    /// `step = max(MIN_STRIDE, min_side * (1 - coverage * 0.85))` is the spacing
    /// left between stamps along the tile's short side; the long side keeps its
    /// extra length on top of that. Higher coverage never yields a larger stride.
    pub fn compute(tile_width: u32, tile_height: u32, coverage: f32) -> Self {
        let coverage = coverage.clamp(0.0, 1.0);
        let min_side = tile_width.min(tile_height);
        let step = ((min_side as f32 * (1.0 - coverage * 0.85)) as u32).max(MIN_STRIDE);

        Self {
            x: (tile_width - min_side + step).max(MIN_STRIDE),
            y: (tile_height - min_side + step).max(MIN_STRIDE),
        }
    }
}

/// Rotate counter-clockwise about the center, growing the canvas to fit
fn rotate_expand(image: &RgbaImage, degrees: f32) -> RgbaImage {
    if degrees.rem_euclid(360.0) == 0.0 {
        return image.clone();
    }

    let radians = degrees.to_radians();
    let cos = radians.cos();
    let sin = radians.sin();

    let src_w = image.width() as f32;
    let src_h = image.height() as f32;

    let dst_w = rotated_extent(src_w * cos.abs() + src_h * sin.abs());
    let dst_h = rotated_extent(src_w * sin.abs() + src_h * cos.abs());
    let mut rotated = RgbaImage::new(dst_w, dst_h);

    let (cx, cy) = (src_w / 2.0, src_h / 2.0);
    let (dst_cx, dst_cy) = (dst_w as f32 / 2.0, dst_h as f32 / 2.0);

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            // Sample at pixel centers, mapping back into the source
            let rx = dx as f32 + 0.5 - dst_cx;
            let ry = dy as f32 + 0.5 - dst_cy;
            let sx = rx * cos - ry * sin + cx - 0.5;
            let sy = rx * sin + ry * cos + cy - 0.5;

            if let Some(pixel) = sample_bilinear(image, sx, sy) {
                rotated.put_pixel(dx, dy, pixel);
            }
        }
    }

    rotated
}

fn rotated_extent(size: f32) -> u32 {
    // Trim float noise so 90 degree turns do not gain a pixel
    ((size - 1e-3).ceil() as u32).max(1)
}

fn sample_bilinear(image: &RgbaImage, sx: f32, sy: f32) -> Option<Rgba<u8>> {
    let max_x = image.width() as f32 - 1.0;
    let max_y = image.height() as f32 - 1.0;
    if sx < 0.0 || sy < 0.0 || sx > max_x || sy > max_y {
        return None;
    }

    let x0 = sx.floor() as u32;
    let y0 = sy.floor() as u32;
    let x1 = (x0 + 1).min(image.width() - 1);
    let y1 = (y0 + 1).min(image.height() - 1);
    let fx = sx - x0 as f32;
    let fy = sy - y0 as f32;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let interpolate = |c: usize| -> u8 {
        let v = f32::from(p00[c]) * (1.0 - fx) * (1.0 - fy)
            + f32::from(p10[c]) * fx * (1.0 - fy)
            + f32::from(p01[c]) * (1.0 - fx) * fy
            + f32::from(p11[c]) * fx * fy;
        v.round().clamp(0.0, 255.0) as u8
    };

    Some(Rgba([interpolate(0), interpolate(1), interpolate(2), interpolate(3)]))
}
