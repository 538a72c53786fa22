//! Batch preview sessions
//!
//! A [`PreviewSession`] holds the uploaded documents together with the pages
//! picked for each one, and turns the whole batch into preview files in one
//! call. The session is owned by the caller; nothing here is global.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::bundle::zip_files;
use crate::convert::{needs_conversion, DocumentConverter};
use crate::error::{Error, Result};
use crate::merge::{merge_outputs, NamedOutput};
use crate::pdf::encode::{encode_pages, EncodeOptions};
use crate::pdf::render::PageRenderer;
use crate::pdf::source::SourceDocument;
use crate::preview::rasterize_with_watermark;
use crate::selection::{Directive, PageSelection};
use crate::settings::PreviewSettings;
use crate::watermark::StampFont;

/// Identity of an upload: its file name and byte length
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn new(name: &str, length: u64) -> Self {
        Self(format!("{}::{}", name, length))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document in the session and the pages chosen from it
#[derive(Debug, Clone)]
pub struct SessionEntry {
    key: DocumentKey,
    document: SourceDocument,
    selection: PageSelection,
}

impl SessionEntry {
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.document.name()
    }

    pub fn document(&self) -> &SourceDocument {
        &self.document
    }

    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    pub fn selection(&self) -> &PageSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut PageSelection {
        &mut self.selection
    }
}

/// Output file name for a document: `<stem><suffix>.pdf`
///
/// Only the last extension is dropped, so `unit.docx` becomes
/// `unit_preview.pdf` and `a.b.pdf` becomes `a.b_preview.pdf`.
pub fn output_file_name(original: &str, suffix: &str) -> String {
    let stem = Path::new(original)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{}{}.pdf", stem, suffix)
}

/// Claim `name` in `used`, numbering it `<stem>-2.<ext>`, `-3`, ... if taken
///
/// Names are compared case-insensitively so outputs never overwrite each
/// other on case-insensitive file systems either.
fn claim_file_name(name: String, used: &mut BTreeSet<String>) -> String {
    if used.insert(name.to_lowercase()) {
        return name;
    }

    let path = Path::new(&name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 2;
    loop {
        let candidate = format!("{}-{}{}", stem, n, extension);
        if used.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

/// An encoded preview ready to be saved
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Pages in the file; for an archive, across all of its entries
    pub page_count: usize,
}

impl GeneratedFile {
    /// Write the file into `dir`, returning its path
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.name);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Something that went wrong for one document (or one of its pages)
#[derive(Debug)]
pub struct BatchFailure {
    pub document: String,
    /// Set when only this page failed
    pub page: Option<u32>,
    pub error: Error,
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "{} page {}: {}", self.document, page, self.error),
            None => write!(f, "{}: {}", self.document, self.error),
        }
    }
}

/// Everything a batch run produced
#[derive(Debug, Default)]
pub struct BatchReport {
    /// One preview per document that produced pages, in session order
    pub outputs: Vec<GeneratedFile>,
    /// Combined preview, when merging was on and anything was produced
    pub merged: Option<GeneratedFile>,
    /// ZIP of every entry in `outputs`, when bundling was on
    pub archive: Option<GeneratedFile>,
    /// Documents skipped for having no pages selected
    pub skipped: Vec<String>,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    /// Whether the run produced no files at all
    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty() && self.merged.is_none() && self.archive.is_none()
    }

    /// Write every produced file into `dir`: previews, then the merged
    /// document, then the archive
    pub fn write_all(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        self.outputs
            .iter()
            .chain(self.merged.as_ref())
            .chain(self.archive.as_ref())
            .map(|file| file.write_to(dir))
            .collect()
    }
}

/// Uploaded documents and their page selections
#[derive(Debug, Default)]
pub struct PreviewSession {
    entries: Vec<SessionEntry>,
}

impl PreviewSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an uploaded file
    ///
    /// Word documents are converted to PDF first, which requires a converter.
    /// Adding the same upload twice is a no-op that returns the existing key.
    /// New documents start with nothing selected. Any failure is reported as
    /// [`Error::DocumentDecode`] and leaves the session unchanged.
    pub fn add_upload(
        &mut self,
        name: &str,
        bytes: Vec<u8>,
        converter: Option<&dyn DocumentConverter>,
    ) -> Result<DocumentKey> {
        let key = DocumentKey::new(name, bytes.len() as u64);
        if self.entry(&key).is_some() {
            return Ok(key);
        }

        let upload_size = bytes.len() as u64;
        let pdf_bytes = if needs_conversion(name) {
            let converter = converter.ok_or_else(|| Error::DocumentDecode {
                name: name.to_string(),
                reason: "no document converter available".to_string(),
            })?;
            converter
                .convert(name, &bytes)
                .map_err(|e| Error::DocumentDecode {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?
        } else {
            bytes
        };

        let document = SourceDocument::from_bytes(name, pdf_bytes)?.with_original_size(upload_size);
        info!(document = name, pages = document.page_count(), "added document");

        let selection = PageSelection::new(document.page_count());
        self.entries.push(SessionEntry {
            key: key.clone(),
            document,
            selection,
        });
        Ok(key)
    }

    /// Add an already decoded document, keyed by its name and original size
    pub fn add_document(&mut self, document: SourceDocument) -> DocumentKey {
        let key = DocumentKey::new(document.name(), document.original_size());
        if self.entry(&key).is_none() {
            let selection = PageSelection::new(document.page_count());
            self.entries.push(SessionEntry {
                key: key.clone(),
                document,
                selection,
            });
        }
        key
    }

    /// Remove a document; returns whether it was present
    pub fn remove(&mut self, key: &DocumentKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| &entry.key != key);
        self.entries.len() != before
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Documents in the order they were added
    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn entry(&self, key: &DocumentKey) -> Option<&SessionEntry> {
        self.entries.iter().find(|entry| &entry.key == key)
    }

    pub fn entry_mut(&mut self, key: &DocumentKey) -> Option<&mut SessionEntry> {
        self.entries.iter_mut().find(|entry| &entry.key == key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace every document's selection with `directive`
    pub fn apply_to_all(&mut self, directive: &Directive) {
        for entry in &mut self.entries {
            entry.selection.replace(directive);
        }
    }

    /// Rasterize, watermark and encode every document in the session
    ///
    /// Problems with one document (or one page) are collected in the report and
    /// never stop the others. Only invalid settings fail the whole call.
    ///
    /// Output names are unique within the report: a preview whose name is
    /// already taken (two uploads with the same stem, or one clashing with the
    /// merged or archive name) gets a `-2`, `-3`, ... suffix.
    pub fn generate<R>(
        &self,
        renderer: &R,
        settings: &PreviewSettings,
        font: &StampFont,
    ) -> Result<BatchReport>
    where
        R: PageRenderer + ?Sized,
    {
        settings.validate()?;

        let raster = settings.raster();
        let encode_options = EncodeOptions {
            raster,
            jpeg_quality: settings.jpeg_quality,
            creation_date: Some(chrono::Local::now().naive_local()),
        };

        let mut report = BatchReport::default();
        let mut to_merge = Vec::new();

        let mut used_names = BTreeSet::new();
        if settings.merge {
            used_names.insert(settings.merged_file_name.to_lowercase());
        }
        if settings.zip {
            used_names.insert(settings.zip_file_name.to_lowercase());
        }

        for entry in &self.entries {
            let name = entry.name();

            if entry.selection.is_empty() && settings.skip_empty {
                warn!(document = name, "skipped, no pages selected");
                report.skipped.push(name.to_string());
                continue;
            }

            let outcome = match rasterize_with_watermark(
                renderer,
                &entry.document,
                &entry.selection,
                &raster,
                &settings.watermark,
                font,
            ) {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(document = name, %error, "document failed");
                    report.failures.push(BatchFailure {
                        document: name.to_string(),
                        page: None,
                        error,
                    });
                    continue;
                }
            };

            report
                .failures
                .extend(outcome.failures.into_iter().map(|failure| BatchFailure {
                    document: name.to_string(),
                    page: Some(failure.page),
                    error: failure.error,
                }));

            if outcome.output.is_empty() {
                info!(document = name, "no pages generated");
                continue;
            }

            let output_name =
                claim_file_name(output_file_name(name, &settings.output_suffix), &mut used_names);
            match encode_pages(outcome.output.images(), &encode_options) {
                Ok(bytes) => {
                    info!(
                        output = output_name.as_str(),
                        pages = outcome.output.len(),
                        "generated preview"
                    );
                    report.outputs.push(GeneratedFile {
                        name: output_name.clone(),
                        bytes,
                        page_count: outcome.output.len(),
                    });
                }
                Err(error) => {
                    warn!(document = name, %error, "encoding failed");
                    report.failures.push(BatchFailure {
                        document: name.to_string(),
                        page: None,
                        error,
                    });
                    continue;
                }
            }

            if settings.merge {
                to_merge.push(NamedOutput {
                    name: output_name,
                    weight: entry.document.original_size(),
                    output: outcome.output,
                });
            }
        }

        if !to_merge.is_empty() {
            let pages = merge_outputs(to_merge, settings.merge_order);
            let merged_name = settings.merged_file_name.clone();
            match encode_pages(pages.iter().map(|p| &p.image), &encode_options) {
                Ok(bytes) => {
                    info!(
                        output = merged_name.as_str(),
                        pages = pages.len(),
                        "generated merged preview"
                    );
                    report.merged = Some(GeneratedFile {
                        name: merged_name,
                        bytes,
                        page_count: pages.len(),
                    });
                }
                Err(error) => report.failures.push(BatchFailure {
                    document: merged_name,
                    page: None,
                    error,
                }),
            }
        }

        if settings.zip && !report.outputs.is_empty() {
            let archive_name = settings.zip_file_name.clone();
            match zip_files(&report.outputs) {
                Ok(bytes) => {
                    info!(
                        output = archive_name.as_str(),
                        files = report.outputs.len(),
                        "generated archive"
                    );
                    report.archive = Some(GeneratedFile {
                        name: archive_name,
                        bytes,
                        page_count: report.outputs.iter().map(|f| f.page_count).sum(),
                    });
                }
                Err(error) => report.failures.push(BatchFailure {
                    document: archive_name,
                    page: None,
                    error,
                }),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RasterSpec;
    use crate::pdf::render::PageRender;
    use image::{Rgb, RgbImage};
    use lopdf::{Dictionary, Document, Object};

    struct BlankRenderer;

    impl PageRenderer for BlankRenderer {
        fn render_pages(
            &self,
            document: &SourceDocument,
            pages: &[u32],
            raster: &RasterSpec,
        ) -> Result<Vec<PageRender>> {
            Ok(pages
                .iter()
                .map(|&page| {
                    let (w, h) = document
                        .page(page)
                        .map(|dims| raster.pixel_size(&dims))
                        .unwrap_or((1, 1));
                    (page, Ok(RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))))
                })
                .collect())
        }
    }

    struct FakeConverter;

    impl DocumentConverter for FakeConverter {
        fn convert(&self, _name: &str, _bytes: &[u8]) -> Result<Vec<u8>> {
            Ok(pdf_with_pages(2))
        }
    }

    fn pdf_with_pages(count: usize) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for _ in 0..count {
            let mut page = Dictionary::new();
            page.set("Type", Object::Name(b"Page".to_vec()));
            page.set("Parent", Object::Reference(pages_id));
            page.set(
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(72),
                    Object::Integer(72),
                ]),
            );
            kids.push(Object::Reference(doc.add_object(Object::Dictionary(page))));
        }
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(count as i64));
        pages.set("Kids", Object::Array(kids));
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn settings() -> PreviewSettings {
        let mut settings = PreviewSettings::default();
        settings.dpi = 72;
        settings.watermark.font_size = 12;
        settings
    }

    #[test]
    fn test_output_file_name() {
        assert_eq!(output_file_name("Fractions.pdf", "_preview"), "Fractions_preview.pdf");
        assert_eq!(output_file_name("unit plan.docx", "-sample"), "unit plan-sample.pdf");
        assert_eq!(output_file_name("a.b.pdf", "_preview"), "a.b_preview.pdf");
        assert_eq!(output_file_name("noext", ""), "noext.pdf");
    }

    #[test]
    fn test_document_key_format() {
        assert_eq!(DocumentKey::new("worksheet.pdf", 2048).as_str(), "worksheet.pdf::2048");
    }

    #[test]
    fn test_same_upload_added_once() {
        let mut session = PreviewSession::new();
        let bytes = pdf_with_pages(3);
        let first = session.add_upload("a.pdf", bytes.clone(), None).unwrap();
        let second = session.add_upload("a.pdf", bytes, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(session.len(), 1);
        assert_eq!(session.entries()[0].page_count(), 3);
        assert!(session.entries()[0].selection().is_empty());
    }

    #[test]
    fn test_bad_upload_leaves_session_unchanged() {
        let mut session = PreviewSession::new();
        session.add_upload("good.pdf", pdf_with_pages(1), None).unwrap();

        let result = session.add_upload("bad.pdf", b"%PDF-garbage".to_vec(), None);
        match result {
            Err(Error::DocumentDecode { name, .. }) => assert_eq!(name, "bad.pdf"),
            other => panic!("expected decode error, got {:?}", other),
        }
        assert_eq!(session.len(), 1);
    }

    #[test]
    fn test_docx_goes_through_converter() {
        let mut session = PreviewSession::new();
        let upload = b"PK fake docx".to_vec();
        let upload_len = upload.len() as u64;

        let missing = session.add_upload("unit.docx", upload.clone(), None);
        assert!(matches!(missing, Err(Error::DocumentDecode { .. })));

        let key = session
            .add_upload("unit.docx", upload, Some(&FakeConverter as &dyn DocumentConverter))
            .unwrap();
        let entry = session.entry(&key).unwrap();
        assert_eq!(entry.page_count(), 2);
        assert_eq!(entry.document().original_size(), upload_len);
    }

    #[test]
    fn test_apply_to_all_replaces_selections() {
        let mut session = PreviewSession::new();
        let a = session.add_upload("a.pdf", pdf_with_pages(5), None).unwrap();
        let b = session.add_upload("b.pdf", pdf_with_pages(2), None).unwrap();

        session
            .entry_mut(&a)
            .unwrap()
            .selection_mut()
            .apply_text("4-5");
        session.apply_to_all(&Directive::FirstN(3));

        assert_eq!(session.entry(&a).unwrap().selection().pages(), vec![1, 2, 3]);
        assert_eq!(session.entry(&b).unwrap().selection().pages(), vec![1, 2]);

        session.apply_to_all(&Directive::None);
        assert!(session.entries().iter().all(|e| e.selection().is_empty()));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut session = PreviewSession::new();
        let a = session.add_upload("a.pdf", pdf_with_pages(1), None).unwrap();
        session.add_upload("b.pdf", pdf_with_pages(1), None).unwrap();

        assert!(session.remove(&a));
        assert!(!session.remove(&a));
        assert_eq!(session.len(), 1);

        session.clear();
        assert!(session.is_empty());
    }

    #[test]
    fn test_generate_skips_empty_and_merges() {
        let mut session = PreviewSession::new();
        let b = session.add_upload("b.pdf", pdf_with_pages(3), None).unwrap();
        let a = session.add_upload("a.pdf", pdf_with_pages(2), None).unwrap();
        session.add_upload("empty.pdf", pdf_with_pages(4), None).unwrap();

        session.entry_mut(&b).unwrap().selection_mut().apply_text("1,3");
        session.entry_mut(&a).unwrap().selection_mut().apply_text("2");

        let report = session
            .generate(&BlankRenderer, &settings(), &StampFont::embedded())
            .unwrap();

        let names: Vec<&str> = report.outputs.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["b_preview.pdf", "a_preview.pdf"]);
        assert_eq!(report.skipped, vec!["empty.pdf".to_string()]);
        assert!(report.failures.is_empty());

        let merged = report.merged.as_ref().unwrap();
        assert_eq!(merged.name, "merged_previews.pdf");
        assert_eq!(merged.page_count, 3);
        let doc = Document::load_mem(&merged.bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_generate_without_merge() {
        let mut session = PreviewSession::new();
        let key = session.add_upload("a.pdf", pdf_with_pages(2), None).unwrap();
        session.entry_mut(&key).unwrap().selection_mut().apply(&Directive::All);

        let mut settings = settings();
        settings.merge = false;
        let report = session
            .generate(&BlankRenderer, &settings, &StampFont::embedded())
            .unwrap();

        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.outputs[0].page_count, 2);
        assert!(report.merged.is_none());
    }

    #[test]
    fn test_generate_with_nothing_selected_produces_nothing() {
        let mut session = PreviewSession::new();
        session.add_upload("a.pdf", pdf_with_pages(2), None).unwrap();

        let mut settings = settings();
        settings.skip_empty = false;
        let report = session
            .generate(&BlankRenderer, &settings, &StampFont::embedded())
            .unwrap();

        assert!(report.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_claim_file_name_numbers_duplicates() {
        let mut used = BTreeSet::new();
        used.insert("merged_previews.pdf".to_string());

        let mut claim = |name: &str| claim_file_name(name.to_string(), &mut used);

        assert_eq!(claim("unit_preview.pdf"), "unit_preview.pdf");
        assert_eq!(claim("unit_preview.pdf"), "unit_preview-2.pdf");
        assert_eq!(claim("Unit_preview.pdf"), "Unit_preview-3.pdf");
        assert_eq!(claim("merged_previews.pdf"), "merged_previews-2.pdf");
    }

    #[test]
    fn test_same_stem_uploads_get_distinct_outputs() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let mut session = PreviewSession::new();
        session.add_upload("unit.pdf", pdf_with_pages(1), None).unwrap();
        session.add_upload("unit.pdf", pdf_with_pages(3), None).unwrap();
        let converter: &dyn DocumentConverter = &FakeConverter;
        session
            .add_upload("unit.docx", b"PK docx".to_vec(), Some(converter))
            .unwrap();
        session.apply_to_all(&Directive::All);

        let report = session
            .generate(&BlankRenderer, &settings(), &StampFont::embedded())
            .unwrap();

        let outputs: Vec<(&str, usize)> = report
            .outputs
            .iter()
            .map(|f| (f.name.as_str(), f.page_count))
            .collect();
        assert_eq!(
            outputs,
            vec![
                ("unit_preview.pdf", 1),
                ("unit_preview-2.pdf", 3),
                ("unit_preview-3.pdf", 2),
            ]
        );

        let written = report.write_all(temp_dir.path()).unwrap();
        let on_disk = std::fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(written.len(), on_disk);
        assert_eq!(on_disk, 5);
    }

    #[test]
    fn test_generate_bundles_outputs_in_session_order() {
        let mut session = PreviewSession::new();
        session.add_upload("b.pdf", pdf_with_pages(2), None).unwrap();
        session.add_upload("a.pdf", pdf_with_pages(1), None).unwrap();
        session.apply_to_all(&Directive::All);

        let report = session
            .generate(&BlankRenderer, &settings(), &StampFont::embedded())
            .unwrap();
        let archive = report.archive.as_ref().unwrap();
        assert_eq!(archive.name, "previews.zip");
        assert_eq!(archive.page_count, 3);

        let mut zip = zip::ZipArchive::new(std::io::Cursor::new(archive.bytes.clone())).unwrap();
        let names: Vec<String> = (0..zip.len())
            .map(|i| zip.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["b_preview.pdf", "a_preview.pdf"]);

        let mut settings = settings();
        settings.zip = false;
        let report = session
            .generate(&BlankRenderer, &settings, &StampFont::embedded())
            .unwrap();
        assert!(report.archive.is_none());
    }

    #[test]
    fn test_generate_rejects_invalid_settings() {
        let session = PreviewSession::new();
        let mut settings = settings();
        settings.dpi = 0;
        let result = session.generate(&BlankRenderer, &settings, &StampFont::embedded());
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
