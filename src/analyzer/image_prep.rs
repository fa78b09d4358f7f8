//! Image compression, thumbnailing, and base64 encoding for vision APIs.
//!
//! Upload payloads are JPEG, bounded by two ceilings: a soft `target`
//! the compressor aims for, and a hard `max` above which the image is
//! downscaled before any quality search begins.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};

/// Fallback quality when the binary search never reaches the target.
pub const DEFAULT_QUALITY: f32 = 0.7;

/// Upper bound on quality-search iterations.
pub const MAX_ITERATIONS: u32 = 10;

/// Stop the search once the quality interval is narrower than this.
pub const QUALITY_TOLERANCE: f32 = 0.05;

/// Default longest-edge size for stored preview thumbnails.
pub const THUMBNAIL_MAX_DIMENSION: u32 = 200;

/// Compress an image to JPEG bytes at or near `target_size`.
///
/// The full-quality encoding is returned unchanged when it already fits
/// the target. Images whose full-quality encoding exceeds `max_size` are
/// downscaled by `sqrt(max_size / encoded_len)` first, then a bounded
/// binary search over JPEG quality finds the best encoding under the
/// target. If no quality reaches the target, falls back to a fixed
/// default-quality encoding.
///
/// Returns `None` only if the image cannot be encoded at all; callers
/// treat that as terminal for this image.
pub fn compress_image(
    img: &DynamicImage,
    target_size: usize,
    max_size: usize,
) -> Option<Vec<u8>> {
    let naive = encode_jpeg(img, 1.0)?;
    if naive.len() <= target_size {
        debug!("Image already under target ({} bytes)", naive.len());
        return Some(naive);
    }

    // Over the hard ceiling: scale down before searching quality.
    let resized;
    let current: &DynamicImage = if naive.len() > max_size {
        let scale = (max_size as f64 / naive.len() as f64).sqrt();
        let new_width = ((img.width() as f64) * scale).round().max(1.0) as u32;
        let new_height = ((img.height() as f64) * scale).round().max(1.0) as u32;
        info!(
            "Downscaling {}x{} -> {}x{} ({} bytes over {} max)",
            img.width(),
            img.height(),
            new_width,
            new_height,
            naive.len(),
            max_size
        );
        resized = img.resize_exact(new_width, new_height, FilterType::Lanczos3);
        &resized
    } else {
        img
    };

    find_optimal_compression(current, target_size)
        .or_else(|| encode_jpeg(current, DEFAULT_QUALITY))
}

/// Binary search over JPEG quality for the best encoding under `target_size`.
fn find_optimal_compression(img: &DynamicImage, target_size: usize) -> Option<Vec<u8>> {
    let mut low: f32 = 0.0;
    let mut high: f32 = 1.0;
    let mut best: Option<Vec<u8>> = None;

    for _ in 0..MAX_ITERATIONS {
        let quality = (low + high) / 2.0;
        let Some(data) = encode_jpeg(img, quality) else {
            break;
        };

        if data.len() <= target_size {
            best = Some(data);
            high = quality;
        } else {
            low = quality;
        }

        if (high - low).abs() < QUALITY_TOLERANCE {
            break;
        }
    }

    best
}

/// Create a JPEG thumbnail whose longer side equals `max_dimension`.
///
/// Used for locally stored previews; independent of the upload ceilings.
pub fn create_thumbnail(image_bytes: &[u8], max_dimension: u32) -> Option<Vec<u8>> {
    let img = image::load_from_memory(image_bytes).ok()?;
    let (width, height) = thumbnail_size(img.width(), img.height(), max_dimension);
    let thumb = img.resize_exact(width, height, FilterType::Lanczos3);
    encode_jpeg(&thumb, DEFAULT_QUALITY)
}

/// Proportional thumbnail dimensions, longer side pinned to `max_dimension`.
fn thumbnail_size(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let aspect = width as f64 / height as f64;
    if width > height {
        let h = ((max_dimension as f64) / aspect).round().max(1.0) as u32;
        (max_dimension, h)
    } else {
        let w = ((max_dimension as f64) * aspect).round().max(1.0) as u32;
        (w, max_dimension)
    }
}

/// Compress and encode an image as a base64 transport string.
///
/// Returns `None` when compression failed.
pub fn image_to_base64(img: &DynamicImage) -> Option<String> {
    let data = compress_image(
        img,
        crate::config::TARGET_IMAGE_SIZE,
        crate::config::MAX_IMAGE_SIZE,
    )?;
    Some(STANDARD.encode(data))
}

/// Encode to JPEG at a quality in [0.0, 1.0].
fn encode_jpeg(img: &DynamicImage, quality: f32) -> Option<Vec<u8>> {
    // JPEG has no alpha channel; encode from RGB.
    let rgb = img.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality_percent(quality));
    encoder
        .encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .ok()?;
    Some(buffer)
}

fn quality_percent(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    /// Deterministic noise image; noise resists JPEG compression, which
    /// keeps the encoded sizes large enough to exercise the ceilings.
    fn noisy_image(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x9e3779b9;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };
        let mut img = RgbImage::new(width, height);
        for pixel in img.pixels_mut() {
            let n = next();
            *pixel = image::Rgb([n as u8, (n >> 8) as u8, (n >> 16) as u8]);
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_compress_returns_naive_encoding_when_under_target() {
        let img = noisy_image(64, 64);
        let naive = encode_jpeg(&img, 1.0).unwrap();

        let out = compress_image(&img, naive.len(), naive.len() * 4).unwrap();
        assert_eq!(out, naive, "under-target input must come back unchanged");
    }

    #[test]
    fn test_compress_reaches_achievable_target() {
        let img = noisy_image(512, 512);
        let naive = encode_jpeg(&img, 1.0).unwrap();
        let target = naive.len() / 2;

        let out = compress_image(&img, target, naive.len() * 2).unwrap();
        assert!(
            out.len() <= target,
            "expected <= {} bytes, got {}",
            target,
            out.len()
        );

        // Quality search alone never changes dimensions.
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 512);
        assert_eq!(decoded.height(), 512);
    }

    #[test]
    fn test_compress_downscales_when_over_max() {
        let img = noisy_image(512, 512);
        let naive = encode_jpeg(&img, 1.0).unwrap();
        let max = naive.len() / 4;
        let target = naive.len() / 8;

        let out = compress_image(&img, target, max).unwrap();
        assert!(
            out.len() <= max,
            "expected <= {} bytes after downscale, got {}",
            max,
            out.len()
        );

        // sqrt(1/4) scale halves both dimensions.
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.width(), 256);
        assert_eq!(decoded.height(), 256);
    }

    #[test]
    fn test_compress_output_is_jpeg() {
        let img = noisy_image(128, 128);
        let out = compress_image(&img, 1024 * 1024, 4 * 1024 * 1024).unwrap();
        assert!(out.len() > 2);
        assert_eq!(out[0], 0xFF);
        assert_eq!(out[1], 0xD8);
    }

    #[test]
    fn test_thumbnail_size_landscape() {
        assert_eq!(thumbnail_size(400, 200, 100), (100, 50));
    }

    #[test]
    fn test_thumbnail_size_portrait() {
        assert_eq!(thumbnail_size(200, 400, 100), (50, 100));
    }

    #[test]
    fn test_create_thumbnail_dimensions() {
        let img = noisy_image(400, 200);
        let bytes = encode_jpeg(&img, 1.0).unwrap();

        let thumb = create_thumbnail(&bytes, 100).unwrap();
        let decoded = image::load_from_memory(&thumb).unwrap();
        assert_eq!(decoded.width(), 100);
        assert_eq!(decoded.height(), 50);
    }

    #[test]
    fn test_create_thumbnail_rejects_corrupt_input() {
        assert!(create_thumbnail(b"not an image", 100).is_none());
    }

    #[test]
    fn test_image_to_base64_round_trips_to_jpeg() {
        let img = noisy_image(64, 64);
        let encoded = image_to_base64(&img).unwrap();

        let decoded = STANDARD.decode(&encoded).unwrap();
        assert_eq!(decoded[0], 0xFF);
        assert_eq!(decoded[1], 0xD8);
    }

    #[test]
    fn test_quality_percent_bounds() {
        assert_eq!(quality_percent(0.0), 1);
        assert_eq!(quality_percent(0.5), 50);
        assert_eq!(quality_percent(1.0), 100);
    }
}
