//! Page rasterization
//!
//! [`PageRenderer`] is the seam between the deterministic preview pipeline and
//! whatever actually turns PDF pages into pixels. [`PdfiumRenderer`] is the
//! production implementation.

use image::RgbImage;
use pdfium_render::prelude::*;

use super::source::SourceDocument;
use crate::error::{Error, Result};
use crate::layout::RasterSpec;

/// Outcome of rendering one page: its 1-based index and the raster or the reason it failed
pub type PageRender = (u32, Result<RgbImage>);

/// Renders document pages to RGB rasters
pub trait PageRenderer {
    /// Render the given 1-based pages at `raster` resolution
    ///
    /// Returns one entry per requested page, in request order. The outer error
    /// is reserved for failures that affect the whole document (it cannot be
    /// opened at all); a single bad page is reported in its own entry.
    fn render_pages(
        &self,
        document: &SourceDocument,
        pages: &[u32],
        raster: &RasterSpec,
    ) -> Result<Vec<PageRender>>;
}

/// Renders pages with PDFium
///
/// Binds to a PDFium library in the working directory, then `/opt/pdfium/lib`,
/// then the system library path.
pub struct PdfiumRenderer {
    pdfium: Pdfium,
}

impl PdfiumRenderer {
    pub fn new() -> Result<Self> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    "/opt/pdfium/lib",
                ))
            })
            .or_else(|_| Pdfium::bind_to_system_library())
            .map_err(|e| Error::General(format!("Failed to initialize PDFium: {}", e)))?;

        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PageRenderer for PdfiumRenderer {
    fn render_pages(
        &self,
        document: &SourceDocument,
        pages: &[u32],
        raster: &RasterSpec,
    ) -> Result<Vec<PageRender>> {
        let pdf = self
            .pdfium
            .load_pdf_from_byte_slice(document.bytes(), None)
            .map_err(|e| Error::DocumentDecode {
                name: document.name().to_string(),
                reason: e.to_string(),
            })?;

        let config = PdfRenderConfig::new()
            .scale_page_by_factor(raster.scale() as f32)
            .render_form_data(true)
            .render_annotations(true);

        let rendered = pages
            .iter()
            .map(|&page_num| {
                let result = render_one(&pdf, page_num, &config);
                (page_num, result)
            })
            .collect();

        Ok(rendered)
    }
}

fn render_one(pdf: &PdfDocument, page_num: u32, config: &PdfRenderConfig) -> Result<RgbImage> {
    let render_error = |reason: String| Error::Render {
        page: page_num,
        reason,
    };

    let index = page_num
        .checked_sub(1)
        .and_then(|i| u16::try_from(i).ok())
        .ok_or_else(|| render_error("page index out of range".to_string()))?;

    let page = pdf
        .pages()
        .get(index)
        .map_err(|e| render_error(e.to_string()))?;

    let bitmap = page
        .render_with_config(config)
        .map_err(|e| render_error(e.to_string()))?;

    Ok(bitmap.as_image().to_rgb8())
}
