use actix_multipart::Multipart;
use actix_web::{HttpResponse, Responder, post, web};
use futures::TryStreamExt;
use serde_json::json;

use crate::{
    auth::AdminSession,
    controllers::form_data::{bad_form, drain, has_file, read_image},
    error::AppError,
    image_utils::{ImageUpload, normalize_in_background},
    storage::{Storage, UploadPurpose},
};

pub const MAX_FILES: usize = 3;

/// Admin image upload: every file part is normalized to WebP and stored under
/// the purpose's folder. All files are read and checked before anything is
/// written.
#[post("/api/admin/uploads/{purpose}")]
pub async fn upload_images(
    session: AdminSession,
    storage: web::Data<Storage>,
    path: web::Path<String>,
    mut payload: Multipart,
) -> Result<impl Responder, AppError> {
    let purpose: UploadPurpose = path.into_inner().parse()?;

    let mut uploads: Vec<ImageUpload> = Vec::new();
    while let Some(mut field) = payload.try_next().await.map_err(bad_form)? {
        if !has_file(&field) {
            drain(&mut field).await?;
            continue;
        }
        if uploads.len() == MAX_FILES {
            return Err(AppError::validation("Maksimal 3 gambar."));
        }
        uploads.push(read_image(&mut field).await?);
    }
    if uploads.is_empty() {
        return Err(AppError::validation("Tidak ada gambar yang diunggah."));
    }

    let mut normalized = Vec::with_capacity(uploads.len());
    for upload in uploads {
        normalized.push(normalize_in_background(upload, purpose.quality()).await?);
    }

    let mut urls = Vec::with_capacity(normalized.len());
    for image in &normalized {
        match storage.put(purpose, image).await {
            Ok(url) => urls.push(url),
            Err(e) => {
                for url in &urls {
                    storage.remove_by_url(url).await;
                }
                return Err(e);
            }
        }
    }

    log::info!("{} gambar {} diunggah oleh {}", urls.len(), purpose, session.0.sub);
    Ok(HttpResponse::Created().json(json!({ "urls": urls })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        auth::{SESSION_COOKIE, generate_jwt},
        config::AppConfig,
        models::user::AdminUser,
    };
    use actix_web::{App, cookie::Cookie, http::StatusCode, test};
    use chrono::Utc;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    const BOUNDARY: &str = "----genre-upload";

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 40, 90])))
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn multipart_body(files: usize) -> Vec<u8> {
        let mut body = Vec::new();
        for i in 0..files {
            body.extend_from_slice(
                format!(
                    "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"foto{}.png\"\r\n\
                     Content-Type: image/png\r\n\r\n",
                    BOUNDARY, i
                )
                .as_bytes(),
            );
            body.extend_from_slice(&png(20, 10));
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("mysql://localhost/test".into()),
            "JWT_SECRET" => Some("rahasia-uji".into()),
            _ => None,
        })
        .unwrap()
    }

    fn session_cookie(config: &AppConfig) -> Cookie<'static> {
        let admin = AdminUser {
            id: 1,
            name: "Admin".into(),
            email: "admin@genre.id".into(),
            password_hash: String::new(),
            created_at: Utc::now(),
        };
        let token = generate_jwt(&admin, &config.jwt_secret, 1).unwrap();
        Cookie::new(SESSION_COOKIE, token)
    }

    #[actix_web::test]
    async fn stores_each_file_and_limits_count() {
        let root = std::env::temp_dir().join(format!("genre-upload-{}", uuid::Uuid::new_v4()));
        let config = config();
        let cookie = session_cookie(&config);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config))
                .app_data(web::Data::new(Storage::new(&root, "http://localhost:8000")))
                .service(upload_images),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/admin/uploads/kegiatan")
            .cookie(cookie.clone())
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(2))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(resp).await;
        let urls = body["urls"].as_array().unwrap();
        assert_eq!(urls.len(), 2);
        assert!(urls[0].as_str().unwrap().contains("/uploads/kegiatan/"));

        let req = test::TestRequest::post()
            .uri("/api/admin/uploads/kegiatan")
            .cookie(cookie.clone())
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(4))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/api/admin/uploads/lainnya")
            .cookie(cookie)
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart_body(1))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let _ = std::fs::remove_dir_all(&root);
    }
}
