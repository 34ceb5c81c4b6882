use actix_multipart::Multipart;
use actix_web::{HttpResponse, Responder, get, post, web};
use chrono::Utc;
use futures::TryStreamExt;
use serde_json::json;

use crate::{
    auth::AdminSession,
    controllers::form_data::{bad_form, drain, field_name, has_file, read_image, read_text},
    error::AppError,
    export::{self, ExportFormat},
    image_utils::{ImageUpload, normalize_in_background},
    models::{
        IdsPayload,
        submission::{
            NewSubmission, SubmissionPayload, SubmissionQuery, filter_submissions,
            submissions_table,
        },
    },
    repository::SubmissionStore,
    storage::{Storage, UploadPurpose},
};

const SUBMIT_FAILED: &str = "Failed to submit form";

async fn insert_submission(
    store: &dyn SubmissionStore,
    new: NewSubmission,
) -> Result<HttpResponse, AppError> {
    let row = store
        .insert(new)
        .await
        .map_err(|e| AppError::backend(SUBMIT_FAILED, e))?;

    log::info!("Pendaftaran PIK-R baru #{} dari {}", row.id, row.asal_pikr);
    Ok(HttpResponse::Created().json(json!({
        "message": "Form submitted successfully",
        "data": [row],
    })))
}

#[post("/api/submit-pikr")]
pub async fn submit_pikr(
    store: web::Data<dyn SubmissionStore>,
    payload: web::Json<SubmissionPayload>,
) -> Result<impl Responder, AppError> {
    let new = payload.into_inner().into_new()?;
    insert_submission(store.get_ref(), new).await
}

/// Same form as multipart, with the proof screenshot as an optional
/// `bukti_ss` file. The picture is stored before the row is written; any
/// failure on the picture aborts the whole submission.
#[post("/api/submit-pikr/form")]
pub async fn submit_pikr_form(
    store: web::Data<dyn SubmissionStore>,
    storage: web::Data<Storage>,
    mut multipart: Multipart,
) -> Result<impl Responder, AppError> {
    let mut payload = SubmissionPayload::default();
    let mut bukti: Option<ImageUpload> = None;

    while let Some(mut field) = multipart.try_next().await.map_err(bad_form)? {
        let name = field_name(&field);
        if name == "bukti_ss" {
            if has_file(&field) {
                bukti = Some(read_image(&mut field).await?);
            } else {
                drain(&mut field).await?;
            }
            continue;
        }
        let value = read_text(&mut field).await?;
        payload.set(&name, value);
    }

    let mut new = payload.into_new()?;

    let Some(upload) = bukti else {
        return insert_submission(store.get_ref(), new).await;
    };

    let purpose = UploadPurpose::Bukti;
    let image = normalize_in_background(upload, purpose.quality()).await?;
    let url = storage.put(purpose, &image).await?;
    new.bukti_ss = Some(url.clone());

    let result = insert_submission(store.get_ref(), new).await;
    if result.is_err() {
        storage.remove_by_url(&url).await;
    }
    result
}

#[get("/api/admin/submissions")]
pub async fn list_submissions(
    _session: AdminSession,
    store: web::Data<dyn SubmissionStore>,
    query: web::Query<SubmissionQuery>,
) -> Result<impl Responder, AppError> {
    let rows = store
        .list()
        .await
        .map_err(|e| AppError::backend("Gagal memuat data pendaftar", e))?;
    Ok(HttpResponse::Ok().json(filter_submissions(rows, query.q.as_deref())))
}

#[post("/api/admin/submissions/bulk-delete")]
pub async fn bulk_delete_submissions(
    session: AdminSession,
    store: web::Data<dyn SubmissionStore>,
    storage: web::Data<Storage>,
    payload: web::Json<IdsPayload>,
) -> Result<impl Responder, AppError> {
    let ids = payload.into_inner().checked()?;

    let proofs: Vec<String> = store
        .list()
        .await
        .map_err(|e| AppError::backend("Gagal memuat data pendaftar", e))?
        .into_iter()
        .filter(|s| ids.contains(&s.id))
        .filter_map(|s| s.bukti_ss)
        .collect();

    let deleted = store
        .delete_many(&ids)
        .await
        .map_err(|e| AppError::backend("Gagal menghapus data pendaftar", e))?;

    for url in &proofs {
        storage.remove_by_url(url).await;
    }

    log::info!("{} pendaftar dihapus oleh {}", deleted, session.0.sub);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} data berhasil dihapus", deleted),
        "deleted": deleted,
    })))
}

#[get("/api/admin/submissions/export")]
pub async fn export_submissions(
    _session: AdminSession,
    store: web::Data<dyn SubmissionStore>,
    query: web::Query<SubmissionQuery>,
) -> Result<impl Responder, AppError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let rows = store
        .list()
        .await
        .map_err(|e| AppError::backend("Gagal memuat data pendaftar", e))?;
    let rows = filter_submissions(rows, query.q.as_deref());

    let name = format!("pendaftar_pik-r_{}", Utc::now().format("%Y-%m-%d"));
    export::download(&submissions_table(&rows), format, &name)
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, sync::Arc};

    use actix_web::{App, http::StatusCode, test};
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use uuid::Uuid;

    use super::*;
    use crate::repository::memory::MemoryStore;

    const BOUNDARY: &str = "----genreboundary";

    fn storage() -> Storage {
        let root = std::env::temp_dir().join(format!("genre-submit-{}", Uuid::new_v4()));
        Storage::new(root, "http://localhost:8000")
    }

    fn complete() -> serde_json::Value {
        json!({
            "nama": "Siti Aminah",
            "ttl": "Bengkulu, 1 Januari 2007",
            "asal_pikr": "PIK-R Harapan Bangsa",
            "alamat_lengkap": "Jl. Merdeka No. 1",
            "tlpn": "081234567890",
            "email": "siti@mail.id",
            "jabatan_pikr": "Ketua",
        })
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([200, 10, 10])))
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, Vec<u8>)>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((file_name, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"bukti_ss\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(&bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn form_fields() -> Vec<(&'static str, &'static str)> {
        vec![
            ("nama", "Budi"),
            ("asal_pikr", "PIK-R Sahabat"),
            ("alamat_lengkap", "Jl. Sudirman 5"),
            ("jabatan_pikr", "Anggota"),
        ]
    }

    macro_rules! app {
        ($store:expr, $storage:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::from($store.clone() as Arc<dyn SubmissionStore>))
                    .app_data(web::Data::new($storage.clone()))
                    .service(submit_pikr)
                    .service(submit_pikr_form)
                    .service(list_submissions),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn complete_form_is_stored_without_proof() {
        let store = Arc::new(MemoryStore::default());
        let storage = storage();
        let app = app!(store, storage);

        let req = test::TestRequest::post()
            .uri("/api/submit-pikr")
            .set_json(complete())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Form submitted successfully");
        assert_eq!(body["data"][0]["nama"], "Siti Aminah");
        assert_eq!(body["data"][0]["tlpn"], "+6281234567890");

        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].bukti_ss, None);
    }

    #[actix_web::test]
    async fn missing_required_field_stores_nothing() {
        let store = Arc::new(MemoryStore::default());
        let storage = storage();
        let app = app!(store, storage);

        for field in ["nama", "asal_pikr", "alamat_lengkap", "jabatan_pikr"] {
            let mut body = complete();
            body.as_object_mut().unwrap().remove(field);
            let req = test::TestRequest::post()
                .uri("/api/submit-pikr")
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{field}");
            let body: serde_json::Value = test::read_body_json(resp).await;
            assert_eq!(body["error"], "Missing required fields");
        }
        assert!(store.rows().is_empty());
    }

    #[actix_web::test]
    async fn malformed_email_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let storage = storage();
        let app = app!(store, storage);

        let mut body = complete();
        body["email"] = json!("a b@c.com");
        let req = test::TestRequest::post()
            .uri("/api/submit-pikr")
            .set_json(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(store.rows().is_empty());
    }

    #[actix_web::test]
    async fn backend_failure_is_reported_generically() {
        let store = Arc::new(MemoryStore::failing());
        let storage = storage();
        let app = app!(store, storage);

        let req = test::TestRequest::post()
            .uri("/api/submit-pikr")
            .set_json(complete())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body, json!({ "error": "Failed to submit form" }));
    }

    #[actix_web::test]
    async fn multipart_proof_is_normalized_and_linked() {
        let store = Arc::new(MemoryStore::default());
        let storage = storage();
        let app = app!(store, storage);

        let body = multipart_body(
            &form_fields(),
            Some(("bukti.png", "image/png", png_bytes(1200, 600))),
        );
        let req = test::TestRequest::post()
            .uri("/api/submit-pikr/form")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let rows = store.rows();
        let url = rows[0].bukti_ss.clone().unwrap();
        assert!(url.starts_with("http://localhost:8000/uploads/bukti/"));
        assert!(url.ends_with(".webp"));

        let key = storage.key_from_url(&url).unwrap();
        let stored = std::fs::read(storage.root().join(key)).unwrap();
        let decoded = image::load_from_memory(&stored).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (800, 400));
        let _ = std::fs::remove_dir_all(storage.root());
    }

    #[actix_web::test]
    async fn non_image_proof_aborts_submission() {
        let store = Arc::new(MemoryStore::default());
        let storage = storage();
        let app = app!(store, storage);

        let body = multipart_body(
            &form_fields(),
            Some(("surat.pdf", "application/pdf", b"%PDF-1.4".to_vec())),
        );
        let req = test::TestRequest::post()
            .uri("/api/submit-pikr/form")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(store.rows().is_empty());
    }

    #[actix_web::test]
    async fn oversized_text_field_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let storage = storage();
        let app = app!(store, storage);

        let long_name = "a".repeat(crate::controllers::form_data::MAX_TEXT_BYTES + 1);
        let fields: Vec<(&str, &str)> = form_fields()
            .into_iter()
            .map(|(k, v)| if k == "nama" { (k, long_name.as_str()) } else { (k, v) })
            .collect();
        let req = test::TestRequest::post()
            .uri("/api/submit-pikr/form")
            .insert_header((
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(&fields, None))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "nama terlalu panjang");
        assert!(store.rows().is_empty());
    }

    #[actix_web::test]
    async fn admin_listing_requires_session() {
        let store = Arc::new(MemoryStore::default());
        let storage = storage();
        let app = app!(store, storage);

        let req = test::TestRequest::get().uri("/api/admin/submissions").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
