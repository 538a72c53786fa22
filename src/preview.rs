//! Rasterize selected pages and stamp them with a watermark
//!
//! Rendering goes through a [`PageRenderer`] one page at a time; stamping is a
//! pure function of each raster and runs across the rayon pool. Pages that fail
//! are reported back instead of aborting the rest of the selection.

use image::RgbImage;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::layout::RasterSpec;
use crate::pdf::render::PageRenderer;
use crate::pdf::source::SourceDocument;
use crate::selection::PageSelection;
use crate::watermark::compositor::PreparedStamp;
use crate::watermark::{StampFont, WatermarkSpec};

/// One rasterized, watermarked page
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    /// 1-based index of the source page
    pub page: u32,
    pub image: RgbImage,
}

/// Rendered pages of one document, ascending by source page index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputSet {
    pages: Vec<RenderedPage>,
}

impl OutputSet {
    /// Build a set from pages in any order
    pub fn from_pages(mut pages: Vec<RenderedPage>) -> Self {
        pages.sort_by_key(|p| p.page);
        Self { pages }
    }

    pub fn pages(&self) -> &[RenderedPage] {
        &self.pages
    }

    /// Source page indices, in output order
    pub fn page_numbers(&self) -> Vec<u32> {
        self.pages.iter().map(|p| p.page).collect()
    }

    pub fn images(&self) -> impl Iterator<Item = &RgbImage> {
        self.pages.iter().map(|p| &p.image)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn into_pages(self) -> Vec<RenderedPage> {
        self.pages
    }
}

/// A page that could not be produced
#[derive(Debug)]
pub struct PageFailure {
    pub page: u32,
    pub error: Error,
}

/// Result of rasterizing one document
#[derive(Debug, Default)]
pub struct RasterOutcome {
    pub output: OutputSet,
    pub failures: Vec<PageFailure>,
}

impl RasterOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Render the selected pages of a document and stamp each with the watermark
///
/// The returned [`OutputSet`] follows ascending selection order and every image
/// keeps the pixel size the renderer produced. Selected pages beyond the
/// document's page count are ignored. The call itself only fails when the
/// renderer cannot open the document.
pub fn rasterize_with_watermark<R>(
    renderer: &R,
    document: &SourceDocument,
    selection: &PageSelection,
    raster: &RasterSpec,
    watermark: &WatermarkSpec,
    font: &StampFont,
) -> Result<RasterOutcome>
where
    R: PageRenderer + ?Sized,
{
    let pages: Vec<u32> = selection
        .iter()
        .filter(|&page| page <= document.page_count())
        .collect();

    if pages.is_empty() {
        debug!(document = document.name(), "no pages selected");
        return Ok(RasterOutcome::default());
    }

    let mut failures = Vec::new();
    let mut rasters = Vec::with_capacity(pages.len());
    for (page, result) in renderer.render_pages(document, &pages, raster)? {
        match result {
            Ok(image) => {
                debug!(
                    document = document.name(),
                    page,
                    width = image.width(),
                    height = image.height(),
                    "rendered page"
                );
                rasters.push((page, image));
            }
            Err(error) => {
                warn!(document = document.name(), page, %error, "skipping page");
                failures.push(PageFailure { page, error });
            }
        }
    }

    let stamped = match PreparedStamp::new(font, watermark) {
        Ok(Some(stamp)) => rasters
            .into_par_iter()
            .map(|(page, image)| RenderedPage {
                page,
                image: stamp.apply(&image),
            })
            .collect(),
        Ok(None) => rasters
            .into_iter()
            .map(|(page, image)| RenderedPage { page, image })
            .collect(),
        Err(error) => {
            // Without a stamp no page may go out unwatermarked
            let reason = error.to_string();
            warn!(document = document.name(), %reason, "unable to prepare watermark");
            failures.extend(rasters.into_iter().map(|(page, _)| PageFailure {
                page,
                error: Error::Font(reason.clone()),
            }));
            Vec::new()
        }
    };

    failures.sort_by_key(|f| f.page);
    Ok(RasterOutcome {
        output: OutputSet::from_pages(stamped),
        failures,
    })
}
