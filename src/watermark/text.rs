//! Stamp text shaping and rasterization
//!
//! Text is shaped with rustybuzz (kerning, ligatures) and the resulting glyph
//! ids are rasterized with ab_glyph. Both read the same font bytes, so measured
//! extents and drawn pixels agree.

use std::borrow::Cow;
use std::path::Path;

use ab_glyph::{point, Font, FontRef, GlyphId, PxScale};
use image::{Rgba, RgbaImage};

use crate::error::{Error, Result};

/// DejaVu Sans Bold, embedded so stamps render the same on every machine
const EMBEDDED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");

/// Font used to draw stamp text
#[derive(Debug, Clone)]
pub struct StampFont {
    data: Cow<'static, [u8]>,
}

impl StampFont {
    /// The embedded default font
    pub fn embedded() -> Self {
        Self {
            data: Cow::Borrowed(EMBEDDED_FONT),
        }
    }

    /// Load a TrueType/OpenType font from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let font = Self {
            data: Cow::Owned(data),
        };
        font.face()?;
        font.glyph_font()?;
        Ok(font)
    }

    /// Load a font file from disk
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        Self::from_bytes(std::fs::read(path)?)
    }

    fn face(&self) -> Result<rustybuzz::Face<'_>> {
        rustybuzz::Face::from_slice(&self.data, 0)
            .ok_or_else(|| Error::Font("unable to parse font tables".to_string()))
    }

    fn glyph_font(&self) -> Result<FontRef<'_>> {
        FontRef::try_from_slice(&self.data).map_err(|e| Error::Font(e.to_string()))
    }

    /// Shape a line of text at the given em size in pixels
    pub fn shape(&self, text: &str, font_size: f32) -> Result<ShapedText> {
        let face = self.face()?;
        let units_per_em = face.units_per_em() as f32;
        if units_per_em <= 0.0 {
            return Err(Error::Font("font has no units per em".to_string()));
        }
        let scale = font_size / units_per_em;

        let mut buffer = rustybuzz::UnicodeBuffer::new();
        buffer.push_str(text);
        let output = rustybuzz::shape(&face, &[], buffer);

        let mut glyphs = Vec::with_capacity(output.len());
        let mut pen_x = 0.0f32;
        for (info, pos) in output.glyph_infos().iter().zip(output.glyph_positions()) {
            glyphs.push(ShapedGlyph {
                id: info.glyph_id as u16,
                x: pen_x + pos.x_offset as f32 * scale,
                y: -(pos.y_offset as f32) * scale,
            });
            pen_x += pos.x_advance as f32 * scale;
        }

        let ascent = f32::from(face.ascender()) * scale;
        let descent = f32::from(face.descender()) * scale;

        Ok(ShapedText {
            glyphs,
            font_size,
            ascent,
            extent: TextExtent {
                width: pen_x.max(0.0).ceil() as u32,
                height: (ascent - descent).max(0.0).ceil() as u32,
            },
        })
    }

    /// Draw shaped text with its box's top-left corner at `(x, y)`
    ///
    /// Glyph coverage is multiplied into the alpha of `color` and blended over
    /// whatever is already in `target`.
    pub fn draw(
        &self,
        target: &mut RgbaImage,
        shaped: &ShapedText,
        x: f32,
        y: f32,
        color: Rgba<u8>,
    ) -> Result<()> {
        let font = self.glyph_font()?;
        let units_per_em = font
            .units_per_em()
            .ok_or_else(|| Error::Font("font has no units per em".to_string()))?;
        // ab_glyph scales by ascent-to-descent height, not by em
        let scale = PxScale::from(shaped.font_size * font.height_unscaled() / units_per_em);
        let baseline = y + shaped.ascent;

        let (width, height) = (target.width() as i32, target.height() as i32);
        for glyph in &shaped.glyphs {
            let positioned = GlyphId(glyph.id)
                .with_scale_and_position(scale, point(x + glyph.x, baseline + glyph.y));
            let Some(outlined) = font.outline_glyph(positioned) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = gx as i32 + bounds.min.x as i32;
                let py = gy as i32 + bounds.min.y as i32;
                if px < 0 || py < 0 || px >= width || py >= height {
                    return;
                }
                let alpha = (coverage.clamp(0.0, 1.0) * f32::from(color[3])) as u8;
                if alpha == 0 {
                    return;
                }
                let top = Rgba([color[0], color[1], color[2], alpha]);
                let pixel = target.get_pixel_mut(px as u32, py as u32);
                *pixel = blend_over(*pixel, top);
            });
        }

        Ok(())
    }
}

impl Default for StampFont {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Width and height of a shaped line, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextExtent {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy)]
struct ShapedGlyph {
    id: u16,
    x: f32,
    y: f32,
}

/// A line of text laid out for drawing
#[derive(Debug, Clone)]
pub struct ShapedText {
    glyphs: Vec<ShapedGlyph>,
    font_size: f32,
    ascent: f32,
    pub extent: TextExtent,
}

/// Measure a line of text with the given font
pub fn measure_text(font: &StampFont, text: &str, font_size: f32) -> Result<TextExtent> {
    Ok(font.shape(text, font_size)?.extent)
}

/// Porter-Duff "over" for straight (non-premultiplied) RGBA
pub(crate) fn blend_over(bottom: Rgba<u8>, top: Rgba<u8>) -> Rgba<u8> {
    let top_alpha = f32::from(top[3]) / 255.0;
    if top_alpha <= 0.0 {
        return bottom;
    }
    let bottom_alpha = f32::from(bottom[3]) / 255.0;
    let out_alpha = top_alpha + bottom_alpha * (1.0 - top_alpha);

    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let blend = |t: u8, b: u8| -> u8 {
        let t = f32::from(t) / 255.0;
        let b = f32::from(b) / 255.0;
        let result = (t * top_alpha + b * bottom_alpha * (1.0 - top_alpha)) / out_alpha;
        (result * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        blend(top[0], bottom[0]),
        blend(top[1], bottom[1]),
        blend(top[2], bottom[2]),
        (out_alpha * 255.0).round() as u8,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_font_loads() {
        let font = StampFont::embedded();
        assert!(font.face().is_ok());
        assert!(font.glyph_font().is_ok());
    }

    #[test]
    fn test_invalid_font_bytes_rejected() {
        let result = StampFont::from_bytes(b"definitely not a font".to_vec());
        assert!(matches!(result, Err(Error::Font(_))));
    }

    #[test]
    fn test_missing_font_file() {
        let result = StampFont::from_file(Path::new("no/such/font.ttf"));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn test_measure_grows_with_text_and_size() {
        let font = StampFont::embedded();
        let short = measure_text(&font, "Pre", 40.0).unwrap();
        let long = measure_text(&font, "Preview", 40.0).unwrap();
        let big = measure_text(&font, "Preview", 80.0).unwrap();

        assert!(long.width > short.width);
        assert_eq!(long.height, short.height);
        assert!(big.width > long.width);
        assert!(big.height > long.height);
    }

    #[test]
    fn test_draw_marks_pixels() {
        let font = StampFont::embedded();
        let shaped = font.shape("W", 48.0).unwrap();
        let mut canvas = RgbaImage::new(shaped.extent.width + 4, shaped.extent.height + 4);

        font.draw(&mut canvas, &shaped, 2.0, 2.0, Rgba([0, 0, 0, 200])).unwrap();

        let max_alpha = canvas.pixels().map(|p| p[3]).max().unwrap();
        assert!(max_alpha > 150);
        assert!(max_alpha <= 200);
    }

    #[test]
    fn test_blend_over() {
        let bottom = Rgba([255, 255, 255, 255]);
        assert_eq!(blend_over(bottom, Rgba([0, 0, 0, 0])), bottom);
        assert_eq!(blend_over(bottom, Rgba([0, 0, 0, 255])), Rgba([0, 0, 0, 255]));

        let half = blend_over(bottom, Rgba([0, 0, 0, 128]));
        assert_eq!(half[3], 255);
        assert!(half[0] > 120 && half[0] < 135);
    }
}
