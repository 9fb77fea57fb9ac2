/// Image decode and normalize
///
/// Two passes over the source bytes:
/// 1. header only (dimensions + orientation), no pixel buffer
/// 2. full decode, power-of-two downsample to the working cap, orientation
///
/// Decoding is CPU-bound, so the async entry points hop onto tokio's
/// blocking pool and never run on the event loop or the render thread.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;
use tokio::task;
use tracing::{debug, warn};

use super::orientation::read_orientation;
use super::source::{read_all, ImageSource};
use crate::error::{EditorError, Result};
use crate::geometry::Rect;
use crate::state::data::{ImageInfo, ImageRef};

/// A decoded, oriented raster plus its dimensions
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub pixels: RgbaImage,
    pub info: ImageInfo,
}

impl DecodedImage {
    /// Natural-pixel rect -> working-raster pixel rect
    pub fn natural_to_working(&self, rect: &Rect) -> Rect {
        rect.scale(1.0 / self.info.sample_factor.max(1) as f32)
    }
}

/// Smallest power of two that brings both dimensions within `max_dimension`
pub fn sample_factor(width: u32, height: u32, max_dimension: u32) -> u32 {
    let max_dimension = max_dimension.max(1);
    let mut factor = 1u32;
    while width / factor > max_dimension || height / factor > max_dimension {
        factor *= 2;
    }
    factor
}

/// First pass: read dimensions and orientation without decoding pixels
pub fn probe(bytes: &[u8], max_dimension: Option<u32>) -> Result<ImageInfo> {
    let (source_width, source_height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EditorError::Decode(e.to_string()))?
        .into_dimensions()?;

    if source_width == 0 || source_height == 0 {
        return Err(EditorError::Decode("image has zero size".into()));
    }

    let sample_factor = match max_dimension {
        Some(cap) => sample_factor(source_width, source_height, cap),
        None => 1,
    };

    Ok(ImageInfo {
        source_width,
        source_height,
        orientation: read_orientation(bytes),
        sample_factor,
    })
}

/// Both passes over in-memory bytes.
/// `max_dimension = None` decodes at full resolution (export).
pub fn decode(bytes: &[u8], max_dimension: Option<u32>) -> Result<DecodedImage> {
    let info = probe(bytes, max_dimension)?;

    let decoded = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| EditorError::Decode(e.to_string()))?
        .decode()?;

    let sampled = downsample(decoded, info.sample_factor);
    let oriented = info.orientation.apply(sampled);
    let pixels = oriented.to_rgba8();

    debug!(
        source = ?(info.source_width, info.source_height),
        natural = ?info.natural_size(),
        working = ?pixels.dimensions(),
        factor = info.sample_factor,
        orientation = ?info.orientation,
        "decoded image"
    );

    Ok(DecodedImage { pixels, info })
}

fn downsample(img: DynamicImage, factor: u32) -> DynamicImage {
    if factor <= 1 {
        return img;
    }
    let w = (img.width() / factor).max(1);
    let h = (img.height() / factor).max(1);
    img.resize_exact(w, h, FilterType::Triangle)
}

/// Blocking decode from a source
pub fn load_image_blocking(
    source: &dyn ImageSource,
    image: &ImageRef,
    max_dimension: Option<u32>,
) -> Result<DecodedImage> {
    let bytes = read_all(source, image)?;
    decode(&bytes, max_dimension)
}

/// Decode on the blocking pool
pub async fn load_image(
    source: Arc<dyn ImageSource>,
    image: ImageRef,
    max_dimension: Option<u32>,
) -> Result<DecodedImage> {
    task::spawn_blocking(move || load_image_blocking(source.as_ref(), &image, max_dimension))
        .await
        .map_err(|e| EditorError::Decode(format!("task join error: {}", e)))?
}

/// Decode for display: failures are logged and become the "no image" state
pub async fn load_or_none(
    source: Arc<dyn ImageSource>,
    image: ImageRef,
    max_dimension: u32,
) -> Option<DecodedImage> {
    match load_image(source, image.clone(), Some(max_dimension)).await {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(image = %image, error = %e, "decode failed, showing empty state");
            None
        }
    }
}

/// Only the header: natural size and orientation for the crop screen
pub fn probe_source(source: &dyn ImageSource, image: &ImageRef) -> Result<ImageInfo> {
    let bytes = read_all(source, image)?;
    probe(&bytes, None)
}

/// Slice `rect` (raster pixel space) out of a raster.
///
/// The origin is clamped into the image and the size trimmed to fit. An
/// empty result falls back to the whole raster.
pub fn crop_pixels(pixels: &RgbaImage, rect: &Rect) -> RgbaImage {
    let (w, h) = pixels.dimensions();
    let x = (rect.left.max(0.0) as u32).min(w);
    let y = (rect.top.max(0.0) as u32).min(h);
    let crop_w = (rect.width().max(0.0) as u32).min(w - x);
    let crop_h = (rect.height().max(0.0) as u32).min(h - y);

    if crop_w == 0 || crop_h == 0 {
        warn!(rect = %rect, size = ?(w, h), "crop outside image, keeping full frame");
        return pixels.clone();
    }

    image::imageops::crop_imm(pixels, x, y, crop_w, crop_h).to_image()
}

/// Decode the image (full decode, then slice) and cut out a natural-space crop
pub fn crop_image_blocking(
    source: &dyn ImageSource,
    image: &ImageRef,
    crop: &Rect,
    max_dimension: Option<u32>,
) -> Result<RgbaImage> {
    let decoded = load_image_blocking(source, image, max_dimension)?;
    let rect = decoded.natural_to_working(crop);
    Ok(crop_pixels(&decoded.pixels, &rect))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::decode::source::MemoryImageSource;
    use crate::decode::Orientation;
    use image::{ImageFormat, Rgba};

    /// Encode a gradient PNG of the given size
    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128, 255])
        });
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    /// Encode a JPEG carrying an EXIF block with the given Orientation tag
    pub(crate) fn jpeg_with_orientation(width: u32, height: u32, orientation: u16) -> Vec<u8> {
        use image::codecs::jpeg::JpegEncoder;
        use image::{ExtendedColorType, ImageEncoder};

        // Big-endian TIFF header with a single IFD0 entry: 0x0112 SHORT x1
        let mut tiff = vec![b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08, 0x00, 0x01];
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&orientation.to_be_bytes());
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x00]);

        let rgb = DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba([200, 80, 40, 255])))
            .to_rgb8();
        let mut out = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut out, 90);
        encoder.set_exif_metadata(tiff).unwrap();
        encoder
            .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn test_decode_applies_exif_rotation() {
        let bytes = jpeg_with_orientation(40, 30, 6);

        let info = probe(&bytes, None).unwrap();
        assert_eq!(info.orientation, Orientation::Rotate90);
        assert_eq!((info.source_width, info.source_height), (40, 30));

        let decoded = decode(&bytes, None).unwrap();
        assert_eq!(decoded.info.natural_size(), (30, 40));
        assert_eq!(decoded.pixels.dimensions(), (30, 40));

        let capped = decode(&bytes, Some(20)).unwrap();
        assert_eq!(capped.info.natural_size(), (30, 40));
        assert_eq!(capped.pixels.dimensions(), (15, 20));
    }

    #[test]
    fn test_sample_factor() {
        assert_eq!(sample_factor(1000, 800, 1920), 1);
        assert_eq!(sample_factor(1920, 1920, 1920), 1);
        assert_eq!(sample_factor(4000, 3000, 1920), 4);
        assert_eq!(sample_factor(3000, 4000, 1920), 4);
        assert_eq!(sample_factor(3840, 100, 1920), 2);
    }

    #[test]
    fn test_probe_reads_header_only() {
        let bytes = png_bytes(64, 48);
        let info = probe(&bytes, Some(16)).unwrap();
        assert_eq!((info.source_width, info.source_height), (64, 48));
        assert_eq!(info.sample_factor, 4);
        assert_eq!(info.orientation, Orientation::Normal);
    }

    #[test]
    fn test_decode_downsamples_to_cap() {
        let decoded = decode(&png_bytes(64, 48), Some(16)).unwrap();
        assert_eq!(decoded.pixels.dimensions(), (16, 12));
        assert_eq!(decoded.info.natural_size(), (64, 48));
        assert_eq!(decoded.info.working_size(), (16, 12));
    }

    #[test]
    fn test_decode_full_resolution() {
        let decoded = decode(&png_bytes(64, 48), None).unwrap();
        assert_eq!(decoded.pixels.dimensions(), (64, 48));
        assert_eq!(decoded.info.sample_factor, 1);
    }

    #[test]
    fn test_reload_reproduces_dimensions() {
        let bytes = png_bytes(50, 30);
        let a = decode(&bytes, Some(20)).unwrap();
        let b = decode(&bytes, Some(20)).unwrap();
        assert_eq!(a.info, b.info);
        assert_eq!(a.pixels.dimensions(), b.pixels.dimensions());
    }

    #[test]
    fn test_corrupt_data_is_decode_error() {
        let result = decode(b"\x89PNG\r\n\x1a\n garbage", Some(1920));
        assert!(matches!(result, Err(EditorError::Decode(_))));
    }

    #[test]
    fn test_crop_pixels_clamps() {
        let img = RgbaImage::from_fn(10, 10, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let inside = crop_pixels(&img, &Rect::new(2.0, 3.0, 6.0, 8.0));
        assert_eq!(inside.dimensions(), (4, 5));
        assert_eq!(inside.get_pixel(0, 0).0, [2, 3, 0, 255]);

        let overflow = crop_pixels(&img, &Rect::new(8.0, 8.0, 20.0, 20.0));
        assert_eq!(overflow.dimensions(), (2, 2));

        let outside = crop_pixels(&img, &Rect::new(50.0, 50.0, 60.0, 60.0));
        assert_eq!(outside.dimensions(), (10, 10));
    }

    #[test]
    fn test_crop_image_scales_natural_rect_to_working() {
        let source = MemoryImageSource::new();
        source.insert(ImageRef::from("img"), png_bytes(64, 48));

        let full = crop_image_blocking(&source, &ImageRef::from("img"), &Rect::new(0.0, 0.0, 32.0, 24.0), None)
            .unwrap();
        assert_eq!(full.dimensions(), (32, 24));

        let working = crop_image_blocking(
            &source,
            &ImageRef::from("img"),
            &Rect::new(0.0, 0.0, 32.0, 24.0),
            Some(16),
        )
        .unwrap();
        assert_eq!(working.dimensions(), (8, 6));
    }

    #[tokio::test]
    async fn test_load_or_none_on_missing_image() {
        let source: Arc<dyn ImageSource> = Arc::new(MemoryImageSource::new());
        let result = load_or_none(source, ImageRef::from("/nonexistent/path.jpg"), 1920).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_load_image_on_blocking_pool() {
        let source = MemoryImageSource::new();
        source.insert(ImageRef::from("img"), png_bytes(40, 20));
        let source: Arc<dyn ImageSource> = Arc::new(source);

        let decoded = load_image(source, ImageRef::from("img"), Some(1920)).await.unwrap();
        assert_eq!(decoded.pixels.dimensions(), (40, 20));
    }
}
