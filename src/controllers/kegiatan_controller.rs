use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use serde_json::json;
use sqlx::MySqlPool;

use crate::{
    auth::AdminSession,
    db,
    error::AppError,
    models::kegiatan::{Kegiatan, KegiatanInput, KegiatanPayload, KegiatanQuery, filter_kegiatan},
    realtime::{ChangeAction, ChangeEvent, ChangeHub},
    storage::Storage,
};

pub const KEGIATAN_TABLE: &str = "kegiatan";

const KEGIATAN_COLUMNS: &str =
    "id, judul, deskripsi, tanggal, image_url_1, image_url_2, image_url_3, card_ratio, created_at";

pub async fn fetch_kegiatan(pool: &MySqlPool) -> Result<Vec<Kegiatan>, sqlx::Error> {
    sqlx::query_as::<_, Kegiatan>(&format!(
        "SELECT {} FROM kegiatan ORDER BY created_at DESC, id DESC",
        KEGIATAN_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

async fn find_kegiatan(pool: &MySqlPool, id: i64) -> Result<Kegiatan, AppError> {
    sqlx::query_as::<_, Kegiatan>(&format!("SELECT {} FROM kegiatan WHERE id = ?", KEGIATAN_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Kegiatan tidak ditemukan"))
}

#[get("/api/kegiatan")]
pub async fn list_kegiatan(
    pool: web::Data<MySqlPool>,
    query: web::Query<KegiatanQuery>,
) -> Result<impl Responder, AppError> {
    let rows = fetch_kegiatan(pool.get_ref())
        .await
        .map_err(|e| AppError::backend("Gagal memuat kegiatan", e))?;
    Ok(HttpResponse::Ok().json(filter_kegiatan(rows, query.q.as_deref())))
}

/// Must be registered before `/api/kegiatan/{id}`.
#[get("/api/kegiatan/changes")]
pub async fn kegiatan_changes(hub: web::Data<ChangeHub>) -> impl Responder {
    hub.sse_response(KEGIATAN_TABLE)
}

#[get("/api/kegiatan/{id}")]
pub async fn get_kegiatan(
    pool: web::Data<MySqlPool>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let row = find_kegiatan(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(row))
}

#[post("/api/admin/kegiatan")]
pub async fn create_kegiatan(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChangeHub>,
    payload: web::Json<KegiatanPayload>,
) -> Result<impl Responder, AppError> {
    let input = payload.into_inner().validate()?;
    let [img1, img2, img3] = &input.images;

    let result = sqlx::query(
        "INSERT INTO kegiatan (judul, deskripsi, tanggal, image_url_1, image_url_2, image_url_3, card_ratio) \
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&input.judul)
    .bind(&input.deskripsi)
    .bind(&input.tanggal)
    .bind(img1)
    .bind(img2)
    .bind(img3)
    .bind(input.card_ratio.as_str())
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::backend("Gagal menyimpan kegiatan", e))?;

    let id = result.last_insert_id() as i64;
    hub.publish(ChangeEvent::new(KEGIATAN_TABLE, ChangeAction::Insert, id));

    let row = find_kegiatan(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Kegiatan berhasil ditambahkan",
        "data": row,
    })))
}

/// URLs present before an edit but gone after it.
fn dropped_images(old: &Kegiatan, new: &KegiatanInput) -> Vec<String> {
    old.image_urls()
        .filter(|url| !new.images.iter().flatten().any(|n| n.as_str() == *url))
        .map(str::to_string)
        .collect()
}

#[put("/api/admin/kegiatan/{id}")]
pub async fn update_kegiatan(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChangeHub>,
    storage: web::Data<Storage>,
    path: web::Path<i64>,
    payload: web::Json<KegiatanPayload>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let input = payload.into_inner().validate()?;
    let old = find_kegiatan(pool.get_ref(), id).await?;
    let [img1, img2, img3] = &input.images;

    sqlx::query(
        "UPDATE kegiatan SET judul = ?, deskripsi = ?, tanggal = ?, image_url_1 = ?, \
         image_url_2 = ?, image_url_3 = ?, card_ratio = ? WHERE id = ?",
    )
    .bind(&input.judul)
    .bind(&input.deskripsi)
    .bind(&input.tanggal)
    .bind(img1)
    .bind(img2)
    .bind(img3)
    .bind(input.card_ratio.as_str())
    .bind(id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| AppError::backend("Gagal memperbarui kegiatan", e))?;

    for url in dropped_images(&old, &input) {
        storage.remove_by_url(&url).await;
    }
    hub.publish(ChangeEvent::new(KEGIATAN_TABLE, ChangeAction::Update, id));

    let row = find_kegiatan(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Kegiatan berhasil diperbarui",
        "data": row,
    })))
}

#[delete("/api/admin/kegiatan/{id}")]
pub async fn delete_kegiatan(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
    hub: web::Data<ChangeHub>,
    storage: web::Data<Storage>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let old = find_kegiatan(pool.get_ref(), id).await?;

    db::delete_by_ids(pool.get_ref(), KEGIATAN_TABLE, &[id])
        .await
        .map_err(|e| AppError::backend("Gagal menghapus kegiatan", e))?;

    for url in old.image_urls() {
        storage.remove_by_url(url).await;
    }
    hub.publish(ChangeEvent::new(KEGIATAN_TABLE, ChangeAction::Delete, id));

    log::info!("Kegiatan #{} dihapus oleh {}", id, session.0.sub);
    Ok(HttpResponse::Ok().json(json!({ "message": "Kegiatan dihapus" })))
}
