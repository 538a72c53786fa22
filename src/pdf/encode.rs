//! Encoding raster pages as a PDF using lopdf
//!
//! Every image becomes one page holding a single JPEG image XObject drawn over
//! the full MediaBox. Image pixels are embedded as-is; the page size in points
//! is derived from the pixel size and the dpi the pages were rendered at.

use chrono::NaiveDateTime;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use lopdf::{Dictionary, Document, Object, Stream, StringFormat};

use crate::error::{Error, Result};
use crate::layout::RasterSpec;

/// Options for encoding raster pages
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    /// Resolution the images were rendered at
    pub raster: RasterSpec,
    /// JPEG quality, 1-100
    pub jpeg_quality: u8,
    /// Stamped into the document Info dictionary when set
    pub creation_date: Option<NaiveDateTime>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            raster: RasterSpec::default(),
            jpeg_quality: 90,
            creation_date: None,
        }
    }
}

/// Encode images, in order, as the pages of one PDF
///
/// Page 1 of the output is the first image. An empty image list is
/// [`Error::EmptyOutput`].
pub fn encode_pages<'a, I>(images: I, options: &EncodeOptions) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'a RgbImage>,
{
    if options.raster.dpi == 0 {
        return Err(Error::Config("dpi must be positive".to_string()));
    }

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::new();
    for image in images {
        let page_id = add_image_page(&mut doc, image, pages_id, options)?;
        kids.push(Object::Reference(page_id));
    }

    if kids.is_empty() {
        return Err(Error::EmptyOutput);
    }

    let mut pages_object = Dictionary::new();
    pages_object.set("Type", Object::Name(b"Pages".to_vec()));
    pages_object.set("Count", Object::Integer(kids.len() as i64));
    pages_object.set("Kids", Object::Array(kids));
    doc.objects.insert(pages_id, Object::Dictionary(pages_object));

    let mut catalog = Dictionary::new();
    catalog.set("Type", Object::Name(b"Catalog".to_vec()));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut info = Dictionary::new();
    info.set(
        "Producer",
        Object::String(
            format!("pdf-previews {}", env!("CARGO_PKG_VERSION")).into_bytes(),
            StringFormat::Literal,
        ),
    );
    if let Some(date) = options.creation_date {
        info.set(
            "CreationDate",
            Object::String(
                date.format("D:%Y%m%d%H%M%S").to_string().into_bytes(),
                StringFormat::Literal,
            ),
        );
    }
    let info_id = doc.add_object(Object::Dictionary(info));
    doc.trailer.set("Info", Object::Reference(info_id));

    // Only content streams get compressed; JPEG streams opt out
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

fn add_image_page(
    doc: &mut Document,
    image: &RgbImage,
    pages_id: lopdf::ObjectId,
    options: &EncodeOptions,
) -> Result<lopdf::ObjectId> {
    let (width_px, height_px) = image.dimensions();
    let image_id = doc.add_object(jpeg_stream(image, options.jpeg_quality)?);

    let width = options.raster.to_length(width_px).pt() as f32;
    let height = options.raster.to_length(height_px).pt() as f32;

    let content = format!("q\n{} 0 0 {} 0 0 cm\n/Im0 Do\nQ\n", width, height);
    let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));

    let mut page = Dictionary::new();
    page.set("Type", Object::Name(b"Page".to_vec()));
    page.set("Parent", Object::Reference(pages_id));
    page.set(
        "MediaBox",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width),
            Object::Real(height),
        ]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));

    Ok(doc.add_object(Object::Dictionary(page)))
}

/// JPEG-encode an image into a DCTDecode image XObject
fn jpeg_stream(image: &RgbImage, quality: u8) -> Result<Stream> {
    let (width, height) = image.dimensions();

    let mut jpeg_bytes = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_bytes, quality.clamp(1, 100));
    encoder.encode_image(image)?;

    let mut dict = Dictionary::new();
    dict.set("Type", Object::Name(b"XObject".to_vec()));
    dict.set("Subtype", Object::Name(b"Image".to_vec()));
    dict.set("Width", Object::Integer(i64::from(width)));
    dict.set("Height", Object::Integer(i64::from(height)));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));

    Ok(Stream::new(dict, jpeg_bytes).with_compression(false))
}
