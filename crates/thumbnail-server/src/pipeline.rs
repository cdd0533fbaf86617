//! Image decoding, resampling and encoding
//!
//! | Step | Crate / function |
//! |---|---|
//! | Probe | `ImageReader::into_dimensions` (header only) |
//! | Crop | `DynamicImage::crop_imm` |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Encode | `JpegEncoder` with quality, `write_to` for the rest |
//!
//! Everything here is blocking; the server runs it on the blocking pool.

use crate::error::{Result, ThumbnailError};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use thumb_geometry::{Dimensions, Geometry};

/// Default size of the error placeholder
pub const ERROR_IMAGE_SIZE: (u32, u32) = (640, 16);

/// Largest placeholder we will allocate
const ERROR_IMAGE_MAX: u32 = 2048;

/// Formats we can both decode and re-encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    WebP,
}

impl ImageKind {
    pub fn from_format(format: ImageFormat) -> Option<Self> {
        match format {
            ImageFormat::Jpeg => Some(Self::Jpeg),
            ImageFormat::Png => Some(Self::Png),
            ImageFormat::Gif => Some(Self::Gif),
            ImageFormat::Bmp => Some(Self::Bmp),
            ImageFormat::WebP => Some(Self::WebP),
            _ => None,
        }
    }

    pub fn format(self) -> ImageFormat {
        match self {
            Self::Jpeg => ImageFormat::Jpeg,
            Self::Png => ImageFormat::Png,
            Self::Gif => ImageFormat::Gif,
            Self::Bmp => ImageFormat::Bmp,
            Self::WebP => ImageFormat::WebP,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::WebP => "image/webp",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::WebP => "webp",
        }
    }
}

/// Header-level facts about a source image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub dimensions: Dimensions,
    pub kind: ImageKind,
}

fn open(path: &Path) -> Result<ImageReader<std::io::BufReader<std::fs::File>>> {
    Ok(ImageReader::open(path)?.with_guessed_format()?)
}

/// Read format and dimensions without decoding pixel data.
///
/// The format is sniffed from content, falling back to the extension.
pub fn probe(path: &Path) -> Result<Probe> {
    let reader = open(path)?;
    let kind = reader
        .format()
        .and_then(ImageKind::from_format)
        .ok_or_else(|| ThumbnailError::Unsupported(path.display().to_string()))?;

    let (width, height) = reader.into_dimensions()?;
    Ok(Probe {
        dimensions: Dimensions::new(width, height),
        kind,
    })
}

/// Decode, crop, resample and re-encode a source image
pub fn render(path: &Path, geometry: &Geometry, kind: ImageKind, quality: u8) -> Result<Vec<u8>> {
    let source = open(path)?.decode()?;
    let thumbnail = transform(&source, geometry);
    encode(&thumbnail, kind, quality)
}

fn transform(source: &DynamicImage, geometry: &Geometry) -> DynamicImage {
    let region = if geometry.crop_x == 0
        && geometry.crop_y == 0
        && geometry.source_width == source.width()
        && geometry.source_height == source.height()
    {
        source.clone()
    } else {
        source.crop_imm(
            geometry.crop_x,
            geometry.crop_y,
            geometry.source_width,
            geometry.source_height,
        )
    };

    region.resize_exact(geometry.width, geometry.height, FilterType::Lanczos3)
}

/// Encode in the source's own format. JPEG honours `quality`; PNG keeps alpha.
pub fn encode(image: &DynamicImage, kind: ImageKind, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();

    match kind {
        ImageKind::Jpeg => {
            let rgb = image.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).encode_image(&rgb)?;
        }
        ImageKind::Png => {
            image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
        }
        ImageKind::Gif | ImageKind::Bmp | ImageKind::WebP => {
            // These encoders only take 8-bit RGB(A)
            let normalized = if image.color().has_alpha() {
                DynamicImage::ImageRgba8(image.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(image.to_rgb8())
            };
            normalized.write_to(&mut Cursor::new(&mut buf), kind.format())?;
        }
    }

    Ok(buf)
}

/// Size of the placeholder for a request, honouring the requested box when given
pub fn error_image_size(max_width: u32, max_height: u32) -> (u32, u32) {
    let width = if max_width > 0 { max_width } else { ERROR_IMAGE_SIZE.0 };
    let height = if max_height > 0 { max_height } else { ERROR_IMAGE_SIZE.1 };
    (width.min(ERROR_IMAGE_MAX), height.min(ERROR_IMAGE_MAX))
}

/// Black PNG placeholder served in place of a thumbnail that can't be produced.
///
/// The reason travels in a response header; the image only keeps page layouts intact.
pub fn error_image(width: u32, height: u32) -> Result<Vec<u8>> {
    let canvas = RgbImage::from_pixel(width.max(1), height.max(1), Rgb([0, 0, 0]));
    let mut buf = Vec::new();
    DynamicImage::ImageRgb8(canvas).write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgba, RgbaImage};
    use tempfile::tempdir;
    use thumb_geometry::{resolve, Constraints};

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    fn bounded(max_width: u32, max_height: u32) -> Constraints {
        Constraints {
            max_width,
            max_height,
            square: false,
        }
    }

    #[test]
    fn test_kind_from_format() {
        assert_eq!(ImageKind::from_format(ImageFormat::Jpeg), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_format(ImageFormat::WebP), Some(ImageKind::WebP));
        assert_eq!(ImageKind::from_format(ImageFormat::Tiff), None);
    }

    #[test]
    fn test_kind_mime_and_extension() {
        assert_eq!(ImageKind::Jpeg.mime(), "image/jpeg");
        assert_eq!(ImageKind::Jpeg.extension(), "jpg");
        assert_eq!(ImageKind::Bmp.mime(), "image/bmp");
        assert_eq!(ImageKind::Gif.extension(), "gif");
    }

    #[test]
    fn test_probe_png() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.png");
        gradient(320, 200).save(&path).unwrap();

        let probed = probe(&path).unwrap();
        assert_eq!(probed.kind, ImageKind::Png);
        assert_eq!(probed.dimensions, Dimensions::new(320, 200));
    }

    #[test]
    fn test_probe_sniffs_content_over_extension() {
        let dir = tempdir().unwrap();
        let png = dir.path().join("real.png");
        gradient(10, 10).save(&png).unwrap();
        let misnamed = dir.path().join("misnamed.jpg");
        std::fs::copy(&png, &misnamed).unwrap();

        assert_eq!(probe(&misnamed).unwrap().kind, ImageKind::Png);
    }

    #[test]
    fn test_probe_rejects_non_image() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not an image").unwrap();

        assert!(probe(&path).is_err());
    }

    #[test]
    fn test_render_jpeg_to_geometry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        gradient(400, 240).save(&path).unwrap();

        let geometry = resolve(Dimensions::new(400, 240), bounded(100, 100));
        let bytes = render(&path, &geometry, ImageKind::Jpeg, 75).unwrap();

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (100, 60));
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_jpeg_quality_changes_size() {
        let image = DynamicImage::ImageRgb8(gradient(200, 200));
        let low = encode(&image, ImageKind::Jpeg, 10).unwrap();
        let high = encode(&image, ImageKind::Jpeg, 95).unwrap();
        assert!(low.len() < high.len());
    }

    #[test]
    fn test_render_square_crop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wide.png");
        // Left and right thirds red, centre green
        let img = RgbImage::from_fn(300, 100, |x, _| {
            if (100..200).contains(&x) {
                Rgb([0, 255, 0])
            } else {
                Rgb([255, 0, 0])
            }
        });
        img.save(&path).unwrap();

        let geometry = resolve(
            Dimensions::new(300, 100),
            Constraints {
                max_width: 50,
                max_height: 0,
                square: true,
            },
        );
        let bytes = render(&path, &geometry, ImageKind::Png, 80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();

        assert_eq!(decoded.dimensions(), (50, 50));
        // The square comes from the centre of the source
        assert_eq!(decoded.get_pixel(25, 25), &Rgb([0, 255, 0]));
    }

    #[test]
    fn test_png_keeps_alpha() {
        let image = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 0])));
        let bytes = encode(&image, ImageKind::Png, 80).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_encode_other_formats() {
        let image = DynamicImage::ImageRgb8(gradient(16, 16));
        for kind in [ImageKind::Gif, ImageKind::Bmp, ImageKind::WebP] {
            let bytes = encode(&image, kind, 80).unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), kind.format());
        }
    }

    #[test]
    fn test_error_image() {
        let (w, h) = error_image_size(0, 0);
        assert_eq!((w, h), ERROR_IMAGE_SIZE);

        let bytes = error_image(w, h).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (640, 16));
    }

    #[test]
    fn test_error_image_size_follows_request() {
        assert_eq!(error_image_size(200, 0), (200, 16));
        assert_eq!(error_image_size(0, 90), (640, 90));
        assert_eq!(error_image_size(9000, 9000), (2048, 2048));
    }
}
