//! Image conversion: decode to a pixel surface, re-encode in the target format.

use crate::{
    ConversionAdapter, ConversionOptions, ConvertedBlob, Error, PassthroughReason, Result,
    SourceFile,
};
use convertforge_common::{normalize_mime, MediaKind, TargetFormat};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;

/// Width of generated preview thumbnails.
pub const THUMBNAIL_WIDTH: u32 = 150;

/// Quality used for preview thumbnails.
const THUMBNAIL_QUALITY: u8 = 80;

/// Adapter for still images.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageAdapter;

impl ImageAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ConversionAdapter for ImageAdapter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn accepts(&self, target: TargetFormat) -> bool {
        target.kind() == MediaKind::Image && target != TargetFormat::Pdf
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
                "image adapter cannot produce {}",
                target
            )));
        }

        if normalize_mime(source.mime()) == target.mime() {
            return Ok(ConvertedBlob::passthrough(
                source.bytes().clone(),
                target,
                PassthroughReason::AlreadyTargetFormat,
            ));
        }

        let img = decode(source.bytes())?;
        progress(50);

        let encoded = encode(&img, target, options.quality)?;
        progress(90);

        Ok(ConvertedBlob::real(encoded, target))
    }
}

/// Decode image bytes, guessing the format from the content.
pub fn decode(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data).map_err(|e| Error::decode(format!("unreadable image: {}", e)))
}

/// Encode a pixel surface in `target`'s format.
///
/// `quality` (1-100) applies to JPEG only. Formats without alpha support get
/// a flattened RGB surface.
pub fn encode(img: &DynamicImage, target: TargetFormat, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());

    let result = match target {
        TargetFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            rgb.write_with_encoder(encoder)
        }
        TargetFormat::Png => img.write_to(&mut buf, ImageFormat::Png),
        TargetFormat::Tiff => img.write_to(&mut buf, ImageFormat::Tiff),
        TargetFormat::Webp | TargetFormat::Gif | TargetFormat::Bmp | TargetFormat::Ico => {
            let format = match target {
                TargetFormat::Webp => ImageFormat::WebP,
                TargetFormat::Gif => ImageFormat::Gif,
                TargetFormat::Bmp => ImageFormat::Bmp,
                _ => ImageFormat::Ico,
            };
            DynamicImage::ImageRgba8(img.to_rgba8()).write_to(&mut buf, format)
        }
        other => {
            return Err(Error::unsupported(format!(
                "{} is not an image encoding",
                other
            )))
        }
    };

    result.map_err(|e| Error::encode(format!("{} encoder rejected image: {}", target, e)))?;
    Ok(buf.into_inner())
}

/// Build a JPEG preview thumbnail, or `None` if the bytes are not a decodable image.
///
/// Images narrower than [`THUMBNAIL_WIDTH`] are kept at their size.
pub fn thumbnail(data: &[u8]) -> Option<Vec<u8>> {
    let img = decode(data).ok()?;
    let img = if img.width() > THUMBNAIL_WIDTH {
        img.resize(THUMBNAIL_WIDTH, u32::MAX, FilterType::Lanczos3)
    } else {
        img
    };
    encode(&img, TargetFormat::Jpeg, THUMBNAIL_QUALITY).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConversionKind;
    use assert_matches::assert_matches;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut img = image::RgbaImage::new(width, height);
        for pixel in img.pixels_mut() {
            *pixel = image::Rgba([255, 0, 0, 128]);
        }
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn convert(source: &SourceFile, target: TargetFormat) -> Result<ConvertedBlob> {
        ImageAdapter::new().convert(source, target, &ConversionOptions::default(), &mut |_| {})
    }

    #[test]
    fn test_same_mime_returns_identical_bytes() {
        let data = png_bytes(4, 4);
        let source = SourceFile::new("a.png", "image/png", data.clone());
        let blob = convert(&source, TargetFormat::Png).unwrap();
        assert_eq!(blob.bytes.as_ref(), data.as_slice());
        assert_eq!(
            blob.kind,
            ConversionKind::Passthrough(PassthroughReason::AlreadyTargetFormat)
        );
    }

    #[test]
    fn test_mime_alias_counts_as_same_format() {
        let source = SourceFile::new("a.jpg", "image/jpg", vec![1, 2, 3]);
        let blob = convert(&source, TargetFormat::Jpeg).unwrap();
        assert_eq!(blob.bytes.as_ref(), &[1, 2, 3]);
    }

    #[test]
    fn test_png_to_jpeg_is_real() {
        let source = SourceFile::new("a.png", "image/png", png_bytes(8, 6));
        let blob = convert(&source, TargetFormat::Jpeg).unwrap();
        assert_eq!(blob.kind, ConversionKind::Real);
        assert_eq!(blob.mime(), "image/jpeg");
        assert_eq!(image::guess_format(&blob.bytes).unwrap(), ImageFormat::Jpeg);

        let decoded = decode(&blob.bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    #[test]
    fn test_each_image_target_encodes() {
        let source = SourceFile::new("a.png", "image/png", png_bytes(16, 16));
        for target in [
            TargetFormat::Webp,
            TargetFormat::Gif,
            TargetFormat::Bmp,
            TargetFormat::Ico,
            TargetFormat::Tiff,
        ] {
            let blob = convert(&source, target).unwrap();
            assert!(!blob.is_empty(), "{target} produced no bytes");
            assert!(decode(&blob.bytes).is_ok(), "{target} output not decodable");
        }
    }

    #[test]
    fn test_quality_changes_jpeg_size() {
        let mut img = image::RgbImage::new(64, 64);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8]);
        }
        let img = DynamicImage::ImageRgb8(img);
        let low = encode(&img, TargetFormat::Jpeg, 10).unwrap();
        let high = encode(&img, TargetFormat::Jpeg, 100).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_undecodable_source_is_decode_error() {
        let source = SourceFile::new("photo.cr2", "image/x-canon-cr2", b"not an image".to_vec());
        assert_matches!(convert(&source, TargetFormat::Png), Err(Error::Decode(_)));
    }

    #[test]
    fn test_oversized_icon_is_encode_error() {
        let source = SourceFile::new("big.png", "image/png", png_bytes(300, 300));
        assert_matches!(convert(&source, TargetFormat::Ico), Err(Error::Encode(_)));
    }

    #[test]
    fn test_non_image_target_unsupported() {
        let source = SourceFile::new("a.png", "image/png", png_bytes(2, 2));
        assert_matches!(convert(&source, TargetFormat::Mp3), Err(Error::Unsupported(_)));
        assert_matches!(convert(&source, TargetFormat::Pdf), Err(Error::Unsupported(_)));
    }

    #[test]
    fn test_progress_reported() {
        let source = SourceFile::new("a.png", "image/png", png_bytes(2, 2));
        let mut seen = Vec::new();
        ImageAdapter::new()
            .convert(
                &source,
                TargetFormat::Bmp,
                &ConversionOptions::default(),
                &mut |p| seen.push(p),
            )
            .unwrap();
        assert_eq!(seen, vec![50, 90]);
    }

    #[test]
    fn test_thumbnail_width() {
        let thumb = thumbnail(&png_bytes(600, 300)).unwrap();
        let decoded = decode(&thumb).unwrap();
        assert_eq!(decoded.width(), THUMBNAIL_WIDTH);
        assert_eq!(decoded.height(), 75);

        let small = thumbnail(&png_bytes(20, 10)).unwrap();
        assert_eq!(decode(&small).unwrap().width(), 20);

        assert!(thumbnail(b"garbage").is_none());
    }
}
