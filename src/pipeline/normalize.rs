//! Image normalisation: arbitrary upload → bounded base64 JPEG.
//!
//! Phone cameras produce 4000 px, 5 MB photos; the inference API only needs a
//! fraction of that. The policy is deliberately simple and bounded:
//!
//! 1. decode the upload once;
//! 2. encode at [`ImageBudget::initial_quality`] and estimate the payload size
//!    from the base64 length;
//! 3. if the estimate is over [`ImageBudget::max_bytes`] or either side is over
//!    [`ImageBudget::max_dimension`], encode once more *from the decoded
//!    pixels* (never from the first JPEG) at
//!    [`ImageBudget::reduced_quality`], with the longer side capped.
//!
//! No quality search: two passes at most, and the result may still exceed
//! the byte budget.

use crate::config::ImageBudget;
use crate::error::BotanError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::io::Cursor;
use serde::Serialize;
use tracing::debug;

/// Media type of every normalised payload.
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

/// A JPEG ready for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedImage {
    /// Always [`JPEG_MEDIA_TYPE`].
    pub media_type: String,
    /// Base64 body, no data-URL header.
    pub data: String,
    pub width: u32,
    pub height: u32,
    /// JPEG quality of the pass that produced `data`.
    pub quality: u8,
    /// 1 when the first encode fit the budget, 2 otherwise.
    pub passes: u8,
}

impl NormalizedImage {
    /// Estimated size of the decoded JPEG in bytes.
    pub fn estimated_bytes(&self) -> usize {
        estimate_decoded_len(self.data.len())
    }

    /// `data:image/jpeg;base64,...` form, as retained in history.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

/// Byte size behind a base64 string of `len` characters: `ceil(len * 3 / 4)`.
///
/// Exact without padding, off by at most two bytes with it.
pub fn estimate_decoded_len(len: usize) -> usize {
    (len * 3).div_ceil(4)
}

/// Dimensions with the longer side capped at `max_dimension`.
///
/// Aspect ratio is kept to within rounding; images already inside the bound
/// are returned unchanged, never upscaled.
pub fn fit_within(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longer = width.max(height);
    if longer <= max_dimension {
        return (width, height);
    }
    let scale = |side: u32| -> u32 {
        let scaled = (u64::from(side) * u64::from(max_dimension) + u64::from(longer) / 2) / u64::from(longer);
        (scaled as u32).max(1)
    };
    if width >= height {
        (max_dimension, scale(height))
    } else {
        (scale(width), max_dimension)
    }
}

/// Decode raw file bytes into pixels, upright.
///
/// EXIF orientation is applied here; the re-encoded JPEG carries no EXIF.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, BotanError> {
    let failed = |e: image::ImageError| BotanError::DecodeFailed {
        detail: e.to_string(),
    };
    let mut decoder = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| BotanError::DecodeFailed {
            detail: e.to_string(),
        })?
        .into_decoder()
        .map_err(failed)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut img = DynamicImage::from_decoder(decoder).map_err(failed)?;
    if orientation != Orientation::NoTransforms {
        debug!("Applying EXIF orientation {:?}", orientation);
        img.apply_orientation(orientation);
    }
    Ok(img)
}

/// Encode pixels as base64 JPEG at `quality` (1–100).
///
/// Alpha is dropped: JPEG has no transparency.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<String, BotanError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buf = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buf, quality))
        .map_err(|e| BotanError::EncodeFailed {
            detail: e.to_string(),
        })?;
    Ok(STANDARD.encode(&buf))
}

/// Apply the budget to already-decoded pixels.
pub fn normalize_image(img: &DynamicImage, budget: &ImageBudget) -> Result<NormalizedImage, BotanError> {
    let (width, height) = img.dimensions();

    let first = encode_jpeg(img, budget.initial_quality)?;
    let estimated = estimate_decoded_len(first.len());
    debug!(
        "First pass: {}x{} q{} → ~{} bytes",
        width, height, budget.initial_quality, estimated
    );

    if !budget.exceeded_by(estimated, width, height) {
        return Ok(NormalizedImage {
            media_type: JPEG_MEDIA_TYPE.to_string(),
            data: first,
            width,
            height,
            quality: budget.initial_quality,
            passes: 1,
        });
    }

    let (new_width, new_height) = fit_within(width, height, budget.max_dimension);
    let data = if (new_width, new_height) == (width, height) {
        encode_jpeg(img, budget.reduced_quality)?
    } else {
        let resized = img.resize_exact(new_width, new_height, FilterType::Triangle);
        encode_jpeg(&resized, budget.reduced_quality)?
    };
    debug!(
        "Second pass: {}x{} q{} → ~{} bytes",
        new_width,
        new_height,
        budget.reduced_quality,
        estimate_decoded_len(data.len())
    );

    Ok(NormalizedImage {
        media_type: JPEG_MEDIA_TYPE.to_string(),
        data,
        width: new_width,
        height: new_height,
        quality: budget.reduced_quality,
        passes: 2,
    })
}

/// Decode `bytes` and apply the budget.
pub fn normalize_bytes(bytes: &[u8], budget: &ImageBudget) -> Result<NormalizedImage, BotanError> {
    let img = decode(bytes)?;
    normalize_image(&img, budget)
}

/// [`normalize_bytes`] on the blocking pool; decode and encode are CPU-bound.
pub async fn normalize(bytes: Vec<u8>, budget: ImageBudget) -> Result<NormalizedImage, BotanError> {
    tokio::task::spawn_blocking(move || normalize_bytes(&bytes, &budget))
        .await
        .map_err(|e| BotanError::Internal(format!("normalise task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        }))
    }

    fn noise(width: u32, height: u32) -> DynamicImage {
        let mut state: u32 = 0x2545_f491;
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |_, _| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            let [a, b, c, _] = state.to_le_bytes();
            Rgb([a, b, c])
        }))
    }

    #[test]
    fn estimator_is_ceil_three_quarters() {
        assert_eq!(estimate_decoded_len(0), 0);
        assert_eq!(estimate_decoded_len(4), 3);
        assert_eq!(estimate_decoded_len(5), 4);
        assert_eq!(estimate_decoded_len(7), 6);
        assert_eq!(estimate_decoded_len(8), 6);
        assert_eq!(estimate_decoded_len(1_000_001), 750_001);
    }

    #[test]
    fn estimator_matches_unpadded_payload() {
        let raw = vec![7u8; 300];
        let b64 = STANDARD.encode(&raw);
        assert!(!b64.ends_with('='));
        assert_eq!(estimate_decoded_len(b64.len()), raw.len());
    }

    #[test]
    fn fit_within_keeps_small_images() {
        assert_eq!(fit_within(400, 300, 1600), (400, 300));
        assert_eq!(fit_within(1600, 1600, 1600), (1600, 1600));
    }

    #[test]
    fn fit_within_caps_longer_side() {
        assert_eq!(fit_within(4000, 3000, 1600), (1600, 1200));
        assert_eq!(fit_within(3000, 4000, 1600), (1200, 1600));
        assert_eq!(fit_within(1601, 1, 1600), (1600, 1));
        assert_eq!(fit_within(3333, 1000, 1600), (1600, 480));
    }

    #[test]
    fn small_image_is_single_pass_encode() {
        let img = gradient(400, 300);
        let out = normalize_image(&img, &ImageBudget::default()).unwrap();
        assert_eq!(out.passes, 1);
        assert_eq!(out.quality, 80);
        assert_eq!((out.width, out.height), (400, 300));
        assert_eq!(out.data, encode_jpeg(&img, 80).unwrap());
        assert_eq!(out.media_type, "image/jpeg");
    }

    #[test]
    fn oversized_image_is_resized_preserving_aspect() {
        let img = gradient(2000, 1000);
        let out = normalize_image(&img, &ImageBudget::default()).unwrap();
        assert_eq!(out.passes, 2);
        assert_eq!(out.quality, 70);
        assert_eq!((out.width, out.height), (1600, 800));

        let decoded = decode(&STANDARD.decode(&out.data).unwrap()).unwrap();
        assert_eq!(decoded.dimensions(), (1600, 800));
    }

    #[test]
    fn tall_image_caps_height() {
        let img = gradient(900, 3200);
        let out = normalize_image(&img, &ImageBudget::default()).unwrap();
        assert_eq!(out.passes, 2);
        assert!(out.width.max(out.height) <= 1600);
        assert_eq!(out.height, 1600);
        assert_eq!(out.width, 450);
    }

    #[test]
    fn over_byte_budget_reencodes_without_upscaling() {
        let img = noise(400, 300);
        let budget = ImageBudget {
            max_bytes: 1_000,
            ..ImageBudget::default()
        };
        let out = normalize_image(&img, &budget).unwrap();
        assert_eq!(out.passes, 2);
        assert_eq!((out.width, out.height), (400, 300));
        assert_eq!(out.data, encode_jpeg(&img, 70).unwrap());
    }

    #[test]
    fn transparent_png_is_flattened() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 128, 0, 64])));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let out = normalize_bytes(&png, &ImageBudget::default()).unwrap();
        assert_eq!(out.passes, 1);
        assert!(out.to_data_url().starts_with("data:image/jpeg;base64,/9j/"));
    }

    /// JPEG of `img` with an EXIF APP1 segment carrying `orientation`.
    fn jpeg_with_orientation(img: &DynamicImage, orientation: u8) -> Vec<u8> {
        let plain = STANDARD.decode(encode_jpeg(img, 90).unwrap()).unwrap();
        let mut tiff = b"MM\0\x2a\0\0\0\x08".to_vec();
        tiff.extend_from_slice(&[0, 1]);
        tiff.extend_from_slice(&[0x01, 0x12, 0, 3, 0, 0, 0, 1, 0, orientation, 0, 0]);
        tiff.extend_from_slice(&[0, 0, 0, 0]);
        let mut app1 = b"Exif\0\0".to_vec();
        app1.extend_from_slice(&tiff);
        let len = (app1.len() + 2) as u16;

        let mut out = plain[..2].to_vec();
        out.extend_from_slice(&[0xff, 0xe1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&app1);
        out.extend_from_slice(&plain[2..]);
        out
    }

    #[test]
    fn exif_rotation_is_applied_before_encoding() {
        let jpeg = jpeg_with_orientation(&gradient(400, 300), 6);
        let out = normalize_bytes(&jpeg, &ImageBudget::default()).unwrap();
        assert_eq!((out.width, out.height), (300, 400));

        let uploaded = decode(&STANDARD.decode(&out.data).unwrap()).unwrap();
        assert_eq!(uploaded.dimensions(), (300, 400));
    }

    #[test]
    fn upright_exif_leaves_dimensions() {
        let jpeg = jpeg_with_orientation(&gradient(400, 300), 1);
        assert_eq!(decode(&jpeg).unwrap().dimensions(), (400, 300));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = normalize_bytes(b"definitely not an image", &ImageBudget::default()).unwrap_err();
        assert!(matches!(err, BotanError::DecodeFailed { .. }));
    }

    #[tokio::test]
    async fn async_normalize_runs_off_thread() {
        let mut png = Vec::new();
        gradient(32, 16)
            .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let out = normalize(png, ImageBudget::default()).await.unwrap();
        assert_eq!((out.width, out.height), (32, 16));
    }
}
