// image_utils.rs
//! Resize-and-re-encode step applied to every uploaded picture before it is
//! stored: longest side capped at [`MAX_DIMENSION`], output always WebP.

use actix_web::web;
use image::{GenericImageView, imageops::FilterType};
use thiserror::Error;
use webp::Encoder;

use crate::error::AppError;

pub const MAX_DIMENSION: u32 = 800;
pub const DEFAULT_QUALITY: f32 = 0.8;
pub const OUTPUT_CONTENT_TYPE: &str = "image/webp";

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Berkas tidak valid: {0}")]
    InvalidInput(String),

    #[error("Gagal membaca gambar: {0}")]
    DecodeFailed(String),

    #[error("Gagal memproses gambar: {0}")]
    EncodingFailed(String),
}

/// Raw upload as received: declared media type, client file name, bytes.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

/// Target size for a `width` x `height` picture.
///
/// Pictures already inside the `max` square are left alone. Otherwise the
/// longer side (width wins only when strictly wider) becomes `max` and the
/// other side follows the aspect ratio, rounded to the nearest pixel.
pub fn target_dimensions(width: u32, height: u32, max: u32) -> (u32, u32) {
    if width <= max && height <= max {
        return (width, height);
    }

    let aspect = width as f64 / height as f64;
    if width > height {
        let h = (max as f64 / aspect).round() as u32;
        (max, h.max(1))
    } else {
        let w = (max as f64 * aspect).round() as u32;
        (w.max(1), max)
    }
}

/// `foto.profil.PNG` -> `foto.webp`
pub fn webp_file_name(original: &str) -> String {
    let stem = original.split('.').next().unwrap_or_default();
    let stem = sanitize_filename::sanitize(stem);
    if stem.trim().is_empty() {
        "image.webp".to_string()
    } else {
        format!("{}.webp", stem)
    }
}

pub fn normalize_image(upload: &ImageUpload, quality: f32) -> Result<NormalizedImage, ImageError> {
    if !upload.content_type.starts_with("image/") {
        return Err(ImageError::InvalidInput(format!(
            "tipe {} bukan gambar",
            upload.content_type
        )));
    }
    if !(0.0..=1.0).contains(&quality) {
        return Err(ImageError::InvalidInput(format!(
            "kualitas harus antara 0 dan 1, diterima {}",
            quality
        )));
    }

    let decoded = image::load_from_memory(&upload.bytes)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))?;

    let (width, height) = decoded.dimensions();
    let (new_width, new_height) = target_dimensions(width, height, MAX_DIMENSION);
    let resized = if (new_width, new_height) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(new_width, new_height, FilterType::Lanczos3)
    };

    let rgba = resized.to_rgba8();
    let encoded = Encoder::from_rgba(rgba.as_raw(), new_width, new_height)
        .encode_simple(false, quality * 100.0)
        .map_err(|e| ImageError::EncodingFailed(format!("{:?}", e)))?;

    log::debug!(
        "normalized {} {}x{} -> {}x{} ({} -> {} bytes)",
        upload.file_name,
        width,
        height,
        new_width,
        new_height,
        upload.bytes.len(),
        encoded.len()
    );

    Ok(NormalizedImage {
        file_name: webp_file_name(&upload.file_name),
        width: new_width,
        height: new_height,
        bytes: encoded.to_vec(),
    })
}

/// Runs [`normalize_image`] on the blocking pool so request workers keep serving.
pub async fn normalize_in_background(
    upload: ImageUpload,
    quality: f32,
) -> Result<NormalizedImage, AppError> {
    let normalized = web::block(move || normalize_image(&upload, quality)).await??;
    Ok(normalized)
}
