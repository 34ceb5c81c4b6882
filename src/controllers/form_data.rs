// form_data.rs
use actix_multipart::Field;
use bytes::BytesMut;
use futures::TryStreamExt;

use crate::{error::AppError, image_utils::ImageUpload};

/// Per-file upload ceiling.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Ceiling for a single text part.
pub const MAX_TEXT_BYTES: usize = 64 * 1024;

pub fn bad_form(e: impl std::fmt::Display) -> AppError {
    AppError::validation(format!("Data formulir tidak valid: {}", e))
}

pub fn field_name(field: &Field) -> String {
    field.name().unwrap_or_default().to_string()
}

/// True for file parts that actually carry a file name.
pub fn has_file(field: &Field) -> bool {
    field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .is_some_and(|name| !name.trim().is_empty())
}

pub async fn read_text(field: &mut Field) -> Result<String, AppError> {
    let name = field_name(field);
    let mut data = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(bad_form)? {
        if data.len() + chunk.len() > MAX_TEXT_BYTES {
            return Err(AppError::validation(format!("{} terlalu panjang", name)));
        }
        data.extend_from_slice(&chunk);
    }
    String::from_utf8(data.to_vec())
        .map(|v| v.trim().to_string())
        .map_err(|_| AppError::validation(format!("{} bukan UTF-8 valid", name)))
}

/// Buffers a file part, refusing anything above [`MAX_UPLOAD_BYTES`].
/// The declared type falls back to a guess from the file name.
pub async fn read_image(field: &mut Field) -> Result<ImageUpload, AppError> {
    let file_name = field
        .content_disposition()
        .and_then(|cd| cd.get_filename())
        .unwrap_or("image")
        .to_string();
    let content_type = field
        .content_type()
        .map(|m| m.essence_str().to_string())
        .filter(|m| m != "application/octet-stream")
        .unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    let mut data = BytesMut::new();
    while let Some(chunk) = field.try_next().await.map_err(bad_form)? {
        if data.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::validation("Ukuran gambar maks 5MB."));
        }
        data.extend_from_slice(&chunk);
    }

    Ok(ImageUpload {
        file_name,
        content_type,
        bytes: data.to_vec(),
    })
}

/// Reads and discards the rest of a part.
pub async fn drain(field: &mut Field) -> Result<(), AppError> {
    while field.try_next().await.map_err(bad_form)?.is_some() {}
    Ok(())
}
