//! services/api/src/adapters/imaging.rs
//!
//! The `ImageProcessor` port over the `image` crate. Decoding and encoding are
//! CPU-bound, so each call runs on the blocking pool.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use trip_mate_core::ports::{EncodedImage, ImageProcessor, PortError, PortResult};

/// Longest edge of a compressed original.
pub const MAX_DIMENSION: u32 = 1920;
/// Longest edge of a grid thumbnail.
pub const THUMBNAIL_SIZE: u32 = 400;
/// Longest edge of the inline blur placeholder.
pub const BLUR_SIZE: u32 = 16;
const JPEG_QUALITY: u8 = 80;

#[derive(Clone, Default)]
pub struct ImageCrateProcessor;

impl ImageCrateProcessor {
    pub fn new() -> Self {
        Self
    }
}

fn decode(data: &[u8]) -> PortResult<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|e| PortError::Validation(format!("Unreadable image: {}", e)))
}

/// Shrinks `img` to fit a `max`×`max` box. Smaller images are left alone.
fn bounded(img: DynamicImage, max: u32, filter: FilterType) -> DynamicImage {
    if img.width() <= max && img.height() <= max {
        img
    } else {
        img.resize(max, max, filter)
    }
}

fn encode_webp(img: &DynamicImage) -> PortResult<Vec<u8>> {
    let mut out = Vec::new();
    img.to_rgba8()
        .write_with_encoder(WebPEncoder::new_lossless(&mut out))
        .map_err(|e| PortError::Unexpected(format!("WebP encoding failed: {}", e)))?;
    Ok(out)
}

fn compress_sync(data: Bytes, content_type: String) -> PortResult<EncodedImage> {
    let original = decode(&data)?;
    let resized = original.width() > MAX_DIMENSION || original.height() > MAX_DIMENSION;
    let img = bounded(original, MAX_DIMENSION, FilterType::Triangle);
    let mut out = Vec::new();
    img.to_rgb8()
        .write_with_encoder(JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY))
        .map_err(|e| PortError::Unexpected(format!("JPEG encoding failed: {}", e)))?;
    if !resized && out.len() >= data.len() {
        // Already within bounds and re-encoding did not help; keep what the user sent.
        return Ok(EncodedImage { data, content_type });
    }
    Ok(EncodedImage {
        data: Bytes::from(out),
        content_type: "image/jpeg".to_string(),
    })
}

fn thumbnail_sync(data: Bytes) -> PortResult<EncodedImage> {
    let img = bounded(decode(&data)?, THUMBNAIL_SIZE, FilterType::Lanczos3);
    Ok(EncodedImage {
        data: Bytes::from(encode_webp(&img)?),
        content_type: "image/webp".to_string(),
    })
}

fn blur_sync(data: Bytes) -> PortResult<String> {
    let img = decode(&data)?.thumbnail(BLUR_SIZE, BLUR_SIZE);
    let encoded = encode_webp(&img)?;
    Ok(format!("data:image/webp;base64,{}", STANDARD.encode(encoded)))
}

async fn blocking<T, F>(job: F) -> PortResult<T>
where
    F: FnOnce() -> PortResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| PortError::Unexpected(format!("Image task failed: {}", e)))?
}

#[async_trait]
impl ImageProcessor for ImageCrateProcessor {
    async fn compress(&self, data: Bytes, content_type: &str) -> PortResult<EncodedImage> {
        let content_type = content_type.to_string();
        blocking(move || compress_sync(data, content_type)).await
    }

    async fn thumbnail(&self, data: Bytes) -> PortResult<EncodedImage> {
        blocking(move || thumbnail_sync(data)).await
    }

    async fn blur_placeholder(&self, data: Bytes) -> PortResult<String> {
        blocking(move || blur_sync(data)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Bytes {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[tokio::test]
    async fn thumbnail_keeps_aspect_ratio() {
        let thumb = ImageCrateProcessor::new().thumbnail(png(800, 600)).await.unwrap();
        assert_eq!(thumb.content_type, "image/webp");
        let decoded = image::load_from_memory(&thumb.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (400, 300));
    }

    #[tokio::test]
    async fn compress_bounds_the_longest_edge() {
        let out = ImageCrateProcessor::new()
            .compress(png(3000, 1000), "image/png")
            .await
            .unwrap();
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert!(decoded.width() <= MAX_DIMENSION);
        assert!(decoded.height() <= MAX_DIMENSION);
    }

    fn flat_png(width: u32, height: u32) -> Bytes {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 200, 200]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut out, ImageFormat::Png)
            .unwrap();
        Bytes::from(out.into_inner())
    }

    #[tokio::test]
    async fn oversized_image_is_resized_even_when_the_jpeg_is_larger() {
        // A flat PNG deflates far better than any JPEG of the same picture.
        let out = ImageCrateProcessor::new()
            .compress(flat_png(4000, 3000), "image/png")
            .await
            .unwrap();
        assert_eq!(out.content_type, "image/jpeg");
        let decoded = image::load_from_memory(&out.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (1920, 1440));
    }

    #[tokio::test]
    async fn small_compact_image_is_kept_as_sent() {
        let original = flat_png(8, 8);
        let out = ImageCrateProcessor::new()
            .compress(original.clone(), "image/png")
            .await
            .unwrap();
        assert_eq!(out.content_type, "image/png");
        assert_eq!(out.data, original);
    }

    #[tokio::test]
    async fn blur_is_an_inline_data_url() {
        let url = ImageCrateProcessor::new().blur_placeholder(png(64, 64)).await.unwrap();
        assert!(url.starts_with("data:image/webp;base64,"));
    }

    #[tokio::test]
    async fn garbage_is_rejected() {
        let result = ImageCrateProcessor::new()
            .thumbnail(Bytes::from_static(b"not an image"))
            .await;
        assert!(result.is_err());
    }
}
