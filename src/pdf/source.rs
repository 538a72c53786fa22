//! Source document loading
//!
//! Reads page count, native page sizes and basic metadata from PDF bytes.
//! Pixel rendering is left to a [`PageRenderer`](super::render::PageRenderer).

use std::collections::BTreeSet;
use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use crate::layout::PageDimensions;

/// An immutable, fully loaded source document
#[derive(Debug, Clone)]
pub struct SourceDocument {
    name: String,
    original_size: u64,
    bytes: Vec<u8>,
    pages: Vec<PageDimensions>,
    title: Option<String>,
    author: Option<String>,
}

impl SourceDocument {
    /// Decode PDF bytes
    ///
    /// Any failure is reported as [`Error::DocumentDecode`] carrying `name`.
    /// The original size defaults to the length of `bytes`.
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let name = name.into();
        let decode_error = |reason: String| Error::DocumentDecode {
            name: name.clone(),
            reason,
        };

        let doc = Document::load_mem(&bytes).map_err(|e| decode_error(e.to_string()))?;

        let pages: Vec<PageDimensions> = doc
            .get_pages()
            .values()
            .map(|&page_id| page_dimensions(&doc, page_id))
            .collect();

        if pages.is_empty() {
            return Err(decode_error("document has no pages".to_string()));
        }

        let info = info_dictionary(&doc);
        let title = info.and_then(|dict| info_string(dict, b"Title"));
        let author = info.and_then(|dict| info_string(dict, b"Author"));

        Ok(Self {
            name,
            original_size: bytes.len() as u64,
            bytes,
            pages,
            title,
            author,
        })
    }

    /// Load and decode a PDF file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::from_bytes(name, bytes)
    }

    /// Record the size of the upload this document came from
    ///
    /// Converted documents (e.g. Word files) keep the size of the original
    /// upload, which is what "by size" merge ordering keys on.
    pub fn with_original_size(mut self, size: u64) -> Self {
        self.original_size = size;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    /// Raw PDF bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Size of a 1-based page
    pub fn page(&self, page: u32) -> Option<PageDimensions> {
        let index = usize::try_from(page).ok()?.checked_sub(1)?;
        self.pages.get(index).copied()
    }

    pub fn pages(&self) -> &[PageDimensions] {
        &self.pages
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
}

/// Find a page's displayed size
///
/// MediaBox and Rotate are both inherited, so the page tree is walked up
/// until each is found. A node seen twice ends the walk.
fn page_dimensions(doc: &Document, page_id: ObjectId) -> PageDimensions {
    let mut visited = BTreeSet::new();
    let mut size = None;
    let mut rotate = None;
    let mut current = Some(page_id);

    while let Some(id) = current {
        if !visited.insert(id) {
            break;
        }
        let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        if size.is_none() {
            size = media_box(doc, dict);
        }
        if rotate.is_none() {
            rotate = dict.get(b"Rotate").ok().and_then(number);
        }
        if size.is_some() && rotate.is_some() {
            break;
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }

    let Some((width, height)) = size else {
        return PageDimensions::letter();
    };
    let quarter_turns = (rotate.unwrap_or(0.0) / 90.0).round() as i64;
    if quarter_turns.rem_euclid(2) == 1 {
        PageDimensions::from_pt(height, width)
    } else {
        PageDimensions::from_pt(width, height)
    }
}

fn media_box(doc: &Document, dict: &Dictionary) -> Option<(f64, f64)> {
    let raw = dict.get(b"MediaBox").ok()?;
    let resolved = match raw {
        Object::Reference(id) => doc.get_object(*id).ok()?,
        other => other,
    };
    let arr = resolved.as_array().ok()?;
    if arr.len() != 4 {
        return None;
    }
    let llx = number(&arr[0])?;
    let lly = number(&arr[1])?;
    let urx = number(&arr[2])?;
    let ury = number(&arr[3])?;
    let (width, height) = ((urx - llx).abs(), (ury - lly).abs());
    if width > 0.0 && height > 0.0 {
        Some((width, height))
    } else {
        None
    }
}

fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(f) => Some(f64::from(*f)),
        _ => None,
    }
}

fn info_dictionary(doc: &Document) -> Option<&Dictionary> {
    match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

/// Text string from the Info dictionary: UTF-16BE with a BOM, or UTF-8
fn info_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    let bytes = dict.get(key).ok()?.as_str().ok()?;
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => String::from_utf8(bytes.to_vec()).ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    /// Build a small PDF whose pages have the given sizes
    fn sample_pdf(sizes: &[(i64, i64)], title: Option<&str>) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = sizes
            .iter()
            .map(|&(w, h)| {
                let mut page = Dictionary::new();
                page.set("Type", Object::Name(b"Page".to_vec()));
                page.set("Parent", Object::Reference(pages_id));
                page.set(
                    "MediaBox",
                    Object::Array(vec![
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(w),
                        Object::Integer(h),
                    ]),
                );
                Object::Reference(doc.add_object(Object::Dictionary(page)))
            })
            .collect();

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(sizes.len() as i64));
        pages.set("Kids", Object::Array(kids));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        if let Some(title) = title {
            let mut info = Dictionary::new();
            info.set(
                "Title",
                Object::String(title.as_bytes().to_vec(), StringFormat::Literal),
            );
            let info_id = doc.add_object(Object::Dictionary(info));
            doc.trailer.set("Info", Object::Reference(info_id));
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_reads_page_sizes() {
        let bytes = sample_pdf(&[(612, 792), (842, 595)], Some("Fractions Unit"));
        let doc = SourceDocument::from_bytes("fractions.pdf", bytes.clone()).unwrap();

        assert_eq!(doc.name(), "fractions.pdf");
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.page(1), Some(PageDimensions::from_pt(612.0, 792.0)));
        assert_eq!(doc.page(2), Some(PageDimensions::from_pt(842.0, 595.0)));
        assert_eq!(doc.page(0), None);
        assert_eq!(doc.page(3), None);
        assert_eq!(doc.title(), Some("Fractions Unit"));
        assert_eq!(doc.original_size(), bytes.len() as u64);
    }

    #[test]
    fn test_inherited_media_box() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(1));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(300),
                Object::Integer(400),
            ]),
        );
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        assert_eq!(
            page_dimensions(&doc, page_id),
            PageDimensions::from_pt(300.0, 400.0)
        );
    }

    #[test]
    fn test_missing_media_box_falls_back_to_letter() {
        let mut doc = Document::with_version("1.5");
        let page_id = doc.add_object(Object::Dictionary(Dictionary::new()));
        assert_eq!(page_dimensions(&doc, page_id), PageDimensions::letter());
    }

    #[test]
    fn test_parent_cycle_falls_back_to_letter() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        let page_id = doc.add_object(Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Count", Object::Integer(1));
        pages.set("Kids", Object::Array(vec![Object::Reference(page_id)]));
        pages.set("Parent", Object::Reference(page_id));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        assert_eq!(page_dimensions(&doc, page_id), PageDimensions::letter());

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(pages_id));
        let catalog_id = doc.add_object(Object::Dictionary(catalog));
        doc.trailer.set("Root", Object::Reference(catalog_id));
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let handle = std::thread::spawn(move || SourceDocument::from_bytes("cycle.pdf", bytes));
        let start = std::time::Instant::now();
        while !handle.is_finished() {
            assert!(
                start.elapsed() < std::time::Duration::from_secs(10),
                "decoding a cyclic page tree did not finish"
            );
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let doc = handle.join().unwrap().unwrap();
        assert_eq!(doc.page(1), Some(PageDimensions::letter()));
    }

    #[test]
    fn test_rotated_page_swaps_sides() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ]),
        );
        let page_id = doc.add_object(Object::Dictionary(page));

        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Rotate", Object::Integer(270));
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        assert_eq!(
            page_dimensions(&doc, page_id),
            PageDimensions::from_pt(792.0, 612.0)
        );

        if let Ok(Object::Dictionary(pages)) = doc.get_object_mut(pages_id) {
            pages.set("Rotate", Object::Integer(180));
        }
        assert_eq!(
            page_dimensions(&doc, page_id),
            PageDimensions::from_pt(612.0, 792.0)
        );
    }

    #[test]
    fn test_utf16_info_strings() {
        let mut title = vec![0xFE, 0xFF];
        for unit in "Fracciones ½".encode_utf16() {
            title.extend_from_slice(&unit.to_be_bytes());
        }
        let mut info = Dictionary::new();
        info.set("Title", Object::String(title, StringFormat::Hexadecimal));
        info.set(
            "Author",
            Object::String(b"Ms. Rivera".to_vec(), StringFormat::Literal),
        );

        assert_eq!(info_string(&info, b"Title").as_deref(), Some("Fracciones ½"));
        assert_eq!(info_string(&info, b"Author").as_deref(), Some("Ms. Rivera"));
        assert_eq!(info_string(&info, b"Subject"), None);
    }

    #[test]
    fn test_garbage_is_decode_error_with_name() {
        let result = SourceDocument::from_bytes("broken.pdf", b"not a pdf at all".to_vec());
        match result {
            Err(Error::DocumentDecode { name, .. }) => assert_eq!(name, "broken.pdf"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_original_size_override() {
        let bytes = sample_pdf(&[(612, 792)], None);
        let doc = SourceDocument::from_bytes("lesson.docx", bytes)
            .unwrap()
            .with_original_size(12_345);
        assert_eq!(doc.original_size(), 12_345);
        assert_eq!(doc.title(), None);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = SourceDocument::load(Path::new("nonexistent.pdf"));
        assert!(matches!(result.unwrap_err(), Error::FileNotFound(_)));
    }
}
