//! PDF Previews Library
//!
//! Builds watermarked preview copies of teaching materials. This library
//! provides functionality to:
//! - Pick pages with typed selections such as `"1-3, 6, 9-10"`
//! - Rasterize pages and tile a rotated, semi-transparent text stamp over them
//! - Encode the stamped pages as image-only PDFs
//! - Merge several documents' previews into one file, or bundle them in a ZIP
//! - Run a whole batch of uploads, converting Word documents on the way
//!
//! # Example
//!
//! ```no_run
//! use pdf_previews::pdf::PdfiumRenderer;
//! use pdf_previews::selection::Directive;
//! use pdf_previews::session::PreviewSession;
//! use pdf_previews::settings::PreviewSettings;
//! use pdf_previews::watermark::StampFont;
//! use std::path::Path;
//!
//! let mut session = PreviewSession::new();
//! let bytes = std::fs::read("fractions.pdf").expect("read input");
//! session.add_upload("fractions.pdf", bytes, None).expect("decode");
//! session.apply_to_all(&Directive::FirstN(3));
//!
//! let renderer = PdfiumRenderer::new().expect("PDFium");
//! let report = session
//!     .generate(&renderer, &PreviewSettings::default(), &StampFont::embedded())
//!     .expect("generate");
//! report.write_all(Path::new("previews")).expect("write");
//! ```

pub mod bundle;
pub mod convert;
pub mod error;
pub mod layout;
pub mod merge;
pub mod pdf;
pub mod preview;
pub mod selection;
pub mod session;
pub mod settings;
pub mod watermark;

// Re-export commonly used items
pub use error::{Error, Result};
