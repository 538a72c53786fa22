//! PDF input and output
//!
//! Source documents are decoded with lopdf, rasterized through a
//! [`PageRenderer`], and previews are written back out as image-only PDFs.

pub mod encode;
pub mod render;
pub mod source;

// Re-export commonly used items
pub use encode::{encode_pages, EncodeOptions};
pub use render::{PageRender, PageRenderer, PdfiumRenderer};
pub use source::SourceDocument;
