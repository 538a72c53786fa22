//! Page geometry and raster resolution

/// Length in PDF points (1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Length(pub f64);

impl Length {
    /// Create a length from points
    pub fn from_pt(pt: f64) -> Self {
        Length(pt)
    }

    /// Create a length from inches
    pub fn from_inches(inches: f64) -> Self {
        Length(inches * 72.0)
    }

    /// Get the value in points
    pub fn pt(&self) -> f64 {
        self.0
    }

    /// Get the value in inches
    pub fn inches(&self) -> f64 {
        self.0 / 72.0
    }
}

/// Native size of one page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageDimensions {
    pub width: Length,
    pub height: Length,
}

impl PageDimensions {
    pub fn from_pt(width: f64, height: f64) -> Self {
        Self {
            width: Length::from_pt(width),
            height: Length::from_pt(height),
        }
    }

    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self {
            width: Length::from_inches(8.5),
            height: Length::from_inches(11.0),
        }
    }
}

/// Resolution used when turning point-based pages into pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSpec {
    pub dpi: u32,
}

impl RasterSpec {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    /// Pixels per point
    pub fn scale(&self) -> f64 {
        f64::from(self.dpi) / 72.0
    }

    /// Convert a length to a pixel count (at least one pixel)
    pub fn to_pixels(&self, length: Length) -> u32 {
        ((length.pt() * self.scale()).round() as u32).max(1)
    }

    /// Convert a pixel count back to a length
    pub fn to_length(&self, pixels: u32) -> Length {
        Length::from_pt(f64::from(pixels) / self.scale())
    }

    /// Pixel size of a page rendered at this resolution
    pub fn pixel_size(&self, page: &PageDimensions) -> (u32, u32) {
        (self.to_pixels(page.width), self.to_pixels(page.height))
    }
}

impl Default for RasterSpec {
    fn default() -> Self {
        Self { dpi: 200 }
    }
}
