//! Image-to-document conversion: one PDF page per image.

use crate::options::{Orientation, PageOptions, PageSize, DEFAULT_QUALITY};
use crate::{
    images, ConversionAdapter, ConversionOptions, ConvertedBlob, Error, Result, SourceFile,
};
use convertforge_common::TargetFormat;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

/// Screen resolution assumed when converting image pixels to page points.
pub const PX_PER_INCH: f32 = 96.0;

/// PDF user-space units per inch.
pub const PT_PER_INCH: f32 = 72.0;

/// Page used for placeholders when pages size themselves to their image.
const PLACEHOLDER_PAGE: PageSize = PageSize::A4;

/// Where an image lands on its page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub page_width: f32,
    pub page_height: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Lay out an image of `width_px` x `height_px` on a page.
///
/// With [`PageSize::FitToImage`] the page takes the image's size and the
/// image fills it. Fixed page sizes scale the image uniformly to fit inside
/// the margins and center it.
pub fn place_image(width_px: u32, height_px: u32, page: &PageOptions) -> Placement {
    let width = px_to_pt(width_px);
    let height = px_to_pt(height_px);

    let Some((page_width, page_height)) = page_dimensions(page, width_px > height_px) else {
        return Placement {
            page_width: width,
            page_height: height,
            x: 0.0,
            y: 0.0,
            width,
            height,
        };
    };

    let avail_width = (page_width - 2.0 * page.margin_pt).max(1.0);
    let avail_height = (page_height - 2.0 * page.margin_pt).max(1.0);
    let scale = if width > 0.0 && height > 0.0 {
        (avail_width / width).min(avail_height / height)
    } else {
        1.0
    };

    let (draw_width, draw_height) = (width * scale, height * scale);
    Placement {
        page_width,
        page_height,
        x: (page_width - draw_width) / 2.0,
        y: (page_height - draw_height) / 2.0,
        width: draw_width,
        height: draw_height,
    }
}

fn px_to_pt(px: u32) -> f32 {
    px as f32 * PT_PER_INCH / PX_PER_INCH
}

fn page_dimensions(page: &PageOptions, wide: bool) -> Option<(f32, f32)> {
    let (short, long) = page.size.dimensions_pt()?;
    let landscape = match page.orientation {
        Orientation::Auto => wide,
        Orientation::Portrait => false,
        Orientation::Landscape => true,
    };
    Some(if landscape { (long, short) } else { (short, long) })
}

enum PageContent {
    Image(DynamicImage),
    Placeholder(String),
}

/// Builds PDF documents from images.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentAdapter;

impl DocumentAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Build a PDF with one page per source, in order.
    ///
    /// Sources that cannot be decoded get a placeholder page naming the
    /// file; the document is still produced.
    pub fn build(sources: &[SourceFile], page: &PageOptions) -> Result<Vec<u8>> {
        if sources.is_empty() {
            return Err(Error::InvalidInput(
                "a document needs at least one image".to_string(),
            ));
        }

        let pages = sources
            .iter()
            .map(|source| match images::decode(source.bytes()) {
                Ok(img) => PageContent::Image(img),
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Placeholder page for {}: {}", source.name(), _e);
                    PageContent::Placeholder(source.name().to_string())
                }
            })
            .collect::<Vec<_>>();

        write_document(&pages, page, DEFAULT_QUALITY)
    }
}

impl ConversionAdapter for DocumentAdapter {
    fn name(&self) -> &'static str {
        "document"
    }

    fn accepts(&self, target: TargetFormat) -> bool {
        target == TargetFormat::Pdf
    }

    fn convert(
        &self,
        source: &SourceFile,
        target: TargetFormat,
        options: &ConversionOptions,
        progress: &mut dyn FnMut(u8),
    ) -> Result<ConvertedBlob> {
        if !self.accepts(target) {
            return Err(Error::unsupported(format!(
                "document adapter cannot produce {}",
                target
            )));
        }

        // A lone undecodable image is a failed conversion, not a placeholder
        let img = images::decode(source.bytes())?;
        progress(50);

        let pdf = write_document(&[PageContent::Image(img)], &options.page, options.quality)?;
        progress(90);

        Ok(ConvertedBlob::real(pdf, target))
    }
}

fn write_document(pages: &[PageContent], page: &PageOptions, quality: u8) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut kids = Vec::with_capacity(pages.len());
    for content in pages {
        let page_id = match content {
            PageContent::Image(img) => add_image_page(&mut doc, pages_id, img, page, quality)?,
            PageContent::Placeholder(name) => {
                add_placeholder_page(&mut doc, pages_id, font_id, name, page)?
            }
        };
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| Error::encode(format!("PDF write failed: {}", e)))?;
    Ok(out)
}

fn add_image_page(
    doc: &mut Document,
    pages_id: ObjectId,
    img: &DynamicImage,
    page: &PageOptions,
    quality: u8,
) -> Result<ObjectId> {
    let placement = place_image(img.width(), img.height(), page);

    // JPEG bytes embed directly with DCTDecode
    let jpeg = images::encode(img, TargetFormat::Jpeg, quality)?;
    let image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => Object::Integer(img.width() as i64),
            "Height" => Object::Integer(img.height() as i64),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
            "Filter" => "DCTDecode",
        },
        jpeg,
    )
    .with_compression(false);
    let image_id = doc.add_object(image_stream);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(placement.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(placement.height),
                    Object::Real(placement.x),
                    Object::Real(placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };

    let resources = dictionary! {
        "XObject" => dictionary! { "Im0" => image_id },
    };
    add_page(doc, pages_id, content, resources, placement.page_width, placement.page_height)
}

fn add_placeholder_page(
    doc: &mut Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    name: &str,
    page: &PageOptions,
) -> Result<ObjectId> {
    let size = match page.size {
        PageSize::FitToImage => PLACEHOLDER_PAGE,
        other => other,
    };
    let options = PageOptions { size, ..*page };
    let (width, height) = page_dimensions(&options, false).unwrap_or((595.28, 841.89));

    let margin = page.margin_pt.max(0.0);
    let label = format!("Image could not be decoded: {}", printable(name));

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("RG", vec![Object::Real(0.6), Object::Real(0.6), Object::Real(0.6)]),
            Operation::new(
                "re",
                vec![
                    Object::Real(margin),
                    Object::Real(margin),
                    Object::Real((width - 2.0 * margin).max(1.0)),
                    Object::Real((height - 2.0 * margin).max(1.0)),
                ],
            ),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), Object::Integer(14)]),
            Operation::new(
                "Td",
                vec![Object::Real(margin + 20.0), Object::Real(height / 2.0)],
            ),
            Operation::new("Tj", vec![Object::string_literal(label)]),
            Operation::new("ET", vec![]),
        ],
    };

    let resources = dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    };
    add_page(doc, pages_id, content, resources, width, height)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    content: Content,
    resources: Dictionary,
    width: f32,
    height: f32,
) -> Result<ObjectId> {
    let encoded = content
        .encode()
        .map_err(|e| Error::encode(format!("PDF content stream: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded).with_compression(false));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(width),
            Object::Real(height),
        ],
        "Contents" => content_id,
        "Resources" => resources,
    }))
}

/// Standard fonts only cover ASCII reliably.
fn printable(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '?' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> SourceFile {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        SourceFile::new(format!("{width}x{height}.png"), "image/png", buf.into_inner())
    }

    fn page_count(pdf: &[u8]) -> usize {
        Document::load_mem(pdf).unwrap().get_pages().len()
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn test_build_one_page_per_image() {
        let pdf = DocumentAdapter::build(&[png(40, 20), png(20, 40)], &PageOptions::default())
            .unwrap();
        assert!(pdf.starts_with(b"%PDF-"));
        assert_eq!(page_count(&pdf), 2);
    }

    #[test]
    fn test_build_without_inputs_is_invalid() {
        assert_matches!(
            DocumentAdapter::build(&[], &PageOptions::default()),
            Err(Error::InvalidInput(_))
        );
    }

    #[test]
    fn test_undecodable_image_gets_placeholder_page() {
        let broken = SourceFile::new("broken.png", "image/png", b"nope".to_vec());
        let pdf = DocumentAdapter::build(&[png(8, 8), broken], &PageOptions::default()).unwrap();
        assert_eq!(page_count(&pdf), 2);
        assert!(contains(&pdf, b"Image could not be decoded: broken.png"));
    }

    #[test]
    fn test_fit_to_image_uses_96_dpi() {
        let page = PageOptions {
            size: PageSize::FitToImage,
            ..Default::default()
        };
        let placement = place_image(96, 192, &page);
        assert_eq!((placement.page_width, placement.page_height), (72.0, 144.0));
        assert_eq!((placement.x, placement.y), (0.0, 0.0));
        assert_eq!((placement.width, placement.height), (72.0, 144.0));
    }

    #[test]
    fn test_fixed_page_scales_and_centers() {
        let page = PageOptions {
            size: PageSize::Letter,
            orientation: Orientation::Portrait,
            margin_pt: 36.0,
        };
        let placement = place_image(1000, 500, &page);
        assert_eq!((placement.page_width, placement.page_height), (612.0, 792.0));

        // Width-bound: 540pt available
        assert!((placement.width - 540.0).abs() < 0.01);
        assert!((placement.height - 270.0).abs() < 0.01);
        assert!((placement.x - 36.0).abs() < 0.01);
        assert!((placement.y - (792.0 - 270.0) / 2.0).abs() < 0.01);
    }

    #[test]
    fn test_auto_orientation_turns_wide_images_landscape() {
        let placement = place_image(400, 100, &PageOptions::default());
        assert!(placement.page_width > placement.page_height);

        let placement = place_image(100, 400, &PageOptions::default());
        assert!(placement.page_width < placement.page_height);
    }

    #[test]
    fn test_convert_single_image() {
        let blob = DocumentAdapter::new()
            .convert(
                &png(16, 16),
                TargetFormat::Pdf,
                &ConversionOptions::default(),
                &mut |_| {},
            )
            .unwrap();
        assert!(blob.kind.is_real());
        assert_eq!(blob.mime(), "application/pdf");
        assert_eq!(page_count(&blob.bytes), 1);
    }

    #[test]
    fn test_convert_undecodable_single_image_fails() {
        let broken = SourceFile::new("broken.png", "image/png", b"nope".to_vec());
        let result = DocumentAdapter::new().convert(
            &broken,
            TargetFormat::Pdf,
            &ConversionOptions::default(),
            &mut |_| {},
        );
        assert_matches!(result, Err(Error::Decode(_)));
    }

    #[test]
    fn test_printable_replaces_non_ascii() {
        assert_eq!(printable("café.png"), "caf?.png");
    }
}
