//! Error types for the preview library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the preview library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image encoding or decoding error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// ZIP archive error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// A whole source document could not be read
    #[error("Unable to read {name} as PDF: {reason}")]
    DocumentDecode { name: String, reason: String },

    /// A single page could not be rasterized
    #[error("Failed to render page {page}: {reason}")]
    Render { page: u32, reason: String },

    /// Font error
    #[error("Font error: {0}")]
    Font(String),

    /// Office document conversion failed
    #[error("Conversion failed: {0}")]
    Conversion(String),

    /// Invalid settings
    #[error("Invalid settings: {0}")]
    Config(String),

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid glob pattern
    #[error("Invalid glob pattern: {0}")]
    InvalidGlob(String),

    /// No files matched pattern
    #[error("No files found matching pattern: {0}")]
    NoFilesMatched(String),

    /// Nothing to encode
    #[error("No pages to encode")]
    EmptyOutput,

    /// General error
    #[error("{0}")]
    General(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_names_document() {
        let err = Error::DocumentDecode {
            name: "unit 3.pdf".to_string(),
            reason: "missing trailer".to_string(),
        };
        assert_eq!(err.to_string(), "Unable to read unit 3.pdf as PDF: missing trailer");
    }

    #[test]
    fn test_render_error_names_page() {
        let err = Error::Render { page: 4, reason: "corrupt stream".to_string() };
        assert!(err.to_string().contains("page 4"));
    }
}
