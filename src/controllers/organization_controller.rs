use std::collections::HashSet;

use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use chrono::{Datelike, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;

use crate::{
    auth::AdminSession,
    db::{self, constraint_message},
    error::AppError,
    export::{self, ExportFormat},
    models::{
        IdsPayload,
        pengurus::{
            PENGURUS_SELECT, Pengurus, PengurusInput, PengurusPayload, PengurusQuery,
            StrukturJabatan, StrukturJabatanPayload, filter_jabatan, filter_pengurus,
            partition_deletable_jabatan, pengurus_table, structure_view,
        },
    },
    storage::Storage,
};

const JABATAN_TABLE: &str = "struktur_jabatan";
const PENGURUS_TABLE: &str = "pengurus";
const JABATAN_IN_USE: &str = "Jabatan masih digunakan oleh pengurus";

async fn fetch_jabatan(pool: &MySqlPool) -> Result<Vec<StrukturJabatan>, sqlx::Error> {
    sqlx::query_as::<_, StrukturJabatan>(
        "SELECT id, nama_jabatan, urutan FROM struktur_jabatan ORDER BY urutan ASC, id ASC",
    )
    .fetch_all(pool)
    .await
}

async fn find_jabatan(pool: &MySqlPool, id: i64) -> Result<StrukturJabatan, AppError> {
    sqlx::query_as::<_, StrukturJabatan>(
        "SELECT id, nama_jabatan, urutan FROM struktur_jabatan WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Jabatan tidak ditemukan"))
}

async fn fetch_pengurus(pool: &MySqlPool) -> Result<Vec<Pengurus>, sqlx::Error> {
    sqlx::query_as::<_, Pengurus>(&format!(
        "{} ORDER BY p.periode DESC, p.id ASC",
        PENGURUS_SELECT
    ))
    .fetch_all(pool)
    .await
}

async fn find_pengurus(pool: &MySqlPool, id: i64) -> Result<Pengurus, AppError> {
    sqlx::query_as::<_, Pengurus>(&format!("{} WHERE p.id = ?", PENGURUS_SELECT))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::not_found("Pengurus tidak ditemukan"))
}

fn pengurus_write_error(e: sqlx::Error) -> AppError {
    match constraint_message(&e, "Data pengurus sudah ada", "Jabatan tidak ditemukan") {
        Some(msg) => AppError::validation(msg),
        None => AppError::backend("Gagal menyimpan data pengurus", e),
    }
}

// ================== PUBLIC ==================

#[derive(Debug, Deserialize)]
pub struct StructureQuery {
    pub periode: Option<String>,
    pub q: Option<String>,
}

#[get("/api/struktur")]
pub async fn get_structure(
    pool: web::Data<MySqlPool>,
    query: web::Query<StructureQuery>,
) -> Result<impl Responder, AppError> {
    let rows = fetch_pengurus(pool.get_ref())
        .await
        .map_err(|e| AppError::backend("Gagal memuat struktur organisasi", e))?;
    let view = structure_view(
        rows,
        query.periode.as_deref(),
        query.q.as_deref(),
        Utc::now().year(),
    );
    Ok(HttpResponse::Ok().json(view))
}

// ================== STRUKTUR JABATAN ==================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[get("/api/admin/struktur-jabatan")]
pub async fn list_jabatan(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    query: web::Query<SearchQuery>,
) -> Result<impl Responder, AppError> {
    let rows = fetch_jabatan(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(filter_jabatan(rows, query.q.as_deref())))
}

#[post("/api/admin/struktur-jabatan")]
pub async fn create_jabatan(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    payload: web::Json<StrukturJabatanPayload>,
) -> Result<impl Responder, AppError> {
    let (nama_jabatan, urutan) = payload.into_inner().validate()?;
    let result = sqlx::query("INSERT INTO struktur_jabatan (nama_jabatan, urutan) VALUES (?, ?)")
        .bind(&nama_jabatan)
        .bind(urutan)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AppError::backend("Gagal menambahkan jabatan", e))?;

    let row = StrukturJabatan {
        id: result.last_insert_id() as i64,
        nama_jabatan,
        urutan,
    };
    Ok(HttpResponse::Created().json(json!({
        "message": "Data berhasil ditambahkan!",
        "data": row,
    })))
}

#[put("/api/admin/struktur-jabatan/{id}")]
pub async fn update_jabatan(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    path: web::Path<i64>,
    payload: web::Json<StrukturJabatanPayload>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let (nama_jabatan, urutan) = payload.into_inner().validate()?;
    find_jabatan(pool.get_ref(), id).await?;

    sqlx::query("UPDATE struktur_jabatan SET nama_jabatan = ?, urutan = ? WHERE id = ?")
        .bind(&nama_jabatan)
        .bind(urutan)
        .bind(id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| AppError::backend("Gagal memperbarui jabatan", e))?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Data berhasil diperbarui!",
        "data": StrukturJabatan { id, nama_jabatan, urutan },
    })))
}

async fn jabatan_in_use(pool: &MySqlPool) -> Result<HashSet<i64>, sqlx::Error> {
    let ids: Vec<(i64,)> = sqlx::query_as("SELECT DISTINCT jabatan_id FROM pengurus")
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().map(|(id,)| id).collect())
}

#[delete("/api/admin/struktur-jabatan/{id}")]
pub async fn delete_jabatan(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    find_jabatan(pool.get_ref(), id).await?;

    if jabatan_in_use(pool.get_ref()).await?.contains(&id) {
        return Err(AppError::validation(JABATAN_IN_USE));
    }

    db::delete_by_ids(pool.get_ref(), JABATAN_TABLE, &[id])
        .await
        .map_err(|e| match constraint_message(&e, JABATAN_IN_USE, JABATAN_IN_USE) {
            Some(msg) => AppError::validation(msg),
            None => AppError::backend("Gagal menghapus jabatan", e),
        })?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Item berhasil dihapus!" })))
}

/// Deletes the positions nobody holds and reports the rest as skipped.
#[post("/api/admin/struktur-jabatan/bulk-delete")]
pub async fn bulk_delete_jabatan(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
    payload: web::Json<IdsPayload>,
) -> Result<impl Responder, AppError> {
    let ids = payload.into_inner().checked()?;
    let in_use = jabatan_in_use(pool.get_ref()).await?;
    let (deletable, skipped) = partition_deletable_jabatan(&ids, &in_use);

    let deleted = db::delete_by_ids(pool.get_ref(), JABATAN_TABLE, &deletable)
        .await
        .map_err(|e| AppError::backend("Gagal menghapus jabatan", e))?;

    log::info!(
        "{} jabatan dihapus oleh {}, {} dilewati",
        deleted,
        session.0.sub,
        skipped.len()
    );
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} jabatan dihapus", deleted),
        "deleted": deleted,
        "skipped": skipped,
    })))
}

// ================== PENGURUS ==================

#[get("/api/admin/pengurus")]
pub async fn list_pengurus(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    query: web::Query<PengurusQuery>,
) -> Result<impl Responder, AppError> {
    let rows = fetch_pengurus(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(filter_pengurus(rows, &query)))
}

async fn write_pengurus(
    pool: &MySqlPool,
    input: &PengurusInput,
    id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let sql = match id {
        Some(_) => {
            "UPDATE pengurus SET nama = ?, ttl = ?, jabatan_pengurus = ?, asal_pikr = ?, \
             tlpn = ?, email = ?, instagram = ?, image_url = ?, jabatan_id = ?, periode = ?, \
             role_type = ? WHERE id = ?"
        }
        None => {
            "INSERT INTO pengurus (nama, ttl, jabatan_pengurus, asal_pikr, tlpn, email, \
             instagram, image_url, jabatan_id, periode, role_type) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        }
    };

    let mut query = sqlx::query(sql)
        .bind(&input.nama)
        .bind(&input.ttl)
        .bind(&input.jabatan_pengurus)
        .bind(&input.asal_pikr)
        .bind(&input.tlpn)
        .bind(&input.email)
        .bind(&input.instagram)
        .bind(&input.image_url)
        .bind(input.jabatan_id)
        .bind(&input.periode)
        .bind(input.role_type.as_str());
    if let Some(id) = id {
        query = query.bind(id);
    }

    let result = query.execute(pool).await?;
    Ok(id.unwrap_or(result.last_insert_id() as i64))
}

#[post("/api/admin/pengurus")]
pub async fn create_pengurus(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    payload: web::Json<PengurusPayload>,
) -> Result<impl Responder, AppError> {
    let input = payload.into_inner().validate()?;
    let id = write_pengurus(pool.get_ref(), &input, None)
        .await
        .map_err(pengurus_write_error)?;
    let row = find_pengurus(pool.get_ref(), id).await?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Data berhasil ditambahkan!",
        "data": row,
    })))
}

#[put("/api/admin/pengurus/{id}")]
pub async fn update_pengurus(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    path: web::Path<i64>,
    payload: web::Json<PengurusPayload>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let input = payload.into_inner().validate()?;
    let old = find_pengurus(pool.get_ref(), id).await?;

    write_pengurus(pool.get_ref(), &input, Some(id))
        .await
        .map_err(pengurus_write_error)?;

    if let Some(old_url) = old.image_url.filter(|u| Some(u) != input.image_url.as_ref()) {
        storage.remove_by_url(&old_url).await;
    }

    let row = find_pengurus(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Data berhasil diperbarui!",
        "data": row,
    })))
}

#[delete("/api/admin/pengurus/{id}")]
pub async fn delete_pengurus(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let old = find_pengurus(pool.get_ref(), id).await?;

    db::delete_by_ids(pool.get_ref(), PENGURUS_TABLE, &[id])
        .await
        .map_err(|e| AppError::backend("Gagal menghapus pengurus", e))?;
    if let Some(url) = old.image_url {
        storage.remove_by_url(&url).await;
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Item berhasil dihapus!" })))
}

#[post("/api/admin/pengurus/bulk-delete")]
pub async fn bulk_delete_pengurus(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    payload: web::Json<IdsPayload>,
) -> Result<impl Responder, AppError> {
    let ids = payload.into_inner().checked()?;
    let photos: Vec<String> = fetch_pengurus(pool.get_ref())
        .await?
        .into_iter()
        .filter(|p| ids.contains(&p.id))
        .filter_map(|p| p.image_url)
        .collect();

    let deleted = db::delete_by_ids(pool.get_ref(), PENGURUS_TABLE, &ids)
        .await
        .map_err(|e| AppError::backend("Gagal menghapus pengurus", e))?;
    for url in &photos {
        storage.remove_by_url(url).await;
    }

    log::info!("{} pengurus dihapus oleh {}", deleted, session.0.sub);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} pengurus dihapus", deleted),
        "deleted": deleted,
    })))
}

#[get("/api/admin/pengurus/export")]
pub async fn export_pengurus(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    query: web::Query<PengurusQuery>,
) -> Result<impl Responder, AppError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let rows = filter_pengurus(fetch_pengurus(pool.get_ref()).await?, &query);

    let periode = query
        .periode
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or("semua");
    export::download(&pengurus_table(&rows), format, &format!("pengurus_{}", periode))
}
