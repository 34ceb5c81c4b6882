use actix_web::{HttpResponse, Responder, delete, get, post, put, web};
use chrono::{Datelike, Utc};
use serde_json::json;
use sqlx::MySqlPool;

use crate::{
    auth::AdminSession,
    db::{self, constraint_message},
    error::AppError,
    export::{self, ExportFormat},
    models::{
        IdsPayload,
        duta_genre::{
            CategoryInput, CategoryPayload, CategoryQuery, DutaGenreCategory, DutaGenreWinner,
            WinnerInput, WinnerPayload, WinnerQuery, categories_table, filter_categories,
            filter_winners, showcase, winners_table,
        },
    },
    storage::Storage,
};

const CATEGORY_TABLE: &str = "duta_genre_categories";
const WINNER_TABLE: &str = "duta_genre_winners";
const DUPLICATE_KEY: &str = "Key kategori sudah digunakan";

const WINNER_COLUMNS: &str =
    "id, category_id, nama, gender, asal, instagram, image_url, periode, created_at";

async fn fetch_categories(pool: &MySqlPool) -> Result<Vec<DutaGenreCategory>, sqlx::Error> {
    sqlx::query_as::<_, DutaGenreCategory>(
        "SELECT id, category_key, title, display_order, desired_count \
         FROM duta_genre_categories ORDER BY display_order ASC, id ASC",
    )
    .fetch_all(pool)
    .await
}

async fn fetch_category(
    pool: &MySqlPool,
    id: i64,
) -> Result<Option<DutaGenreCategory>, sqlx::Error> {
    sqlx::query_as::<_, DutaGenreCategory>(
        "SELECT id, category_key, title, display_order, desired_count \
         FROM duta_genre_categories WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
}

async fn find_category(pool: &MySqlPool, id: i64) -> Result<DutaGenreCategory, AppError> {
    fetch_category(pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Kategori tidak ditemukan"))
}

/// A winner body naming a category that does not exist is bad input, not a
/// missing resource.
fn winner_category(found: Option<DutaGenreCategory>) -> Result<DutaGenreCategory, AppError> {
    found.ok_or_else(|| AppError::validation("Kategori tidak ditemukan"))
}

async fn fetch_winners(pool: &MySqlPool) -> Result<Vec<DutaGenreWinner>, sqlx::Error> {
    sqlx::query_as::<_, DutaGenreWinner>(&format!(
        "SELECT {} FROM duta_genre_winners ORDER BY created_at DESC, id DESC",
        WINNER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

async fn find_winner(pool: &MySqlPool, id: i64) -> Result<DutaGenreWinner, AppError> {
    sqlx::query_as::<_, DutaGenreWinner>(&format!(
        "SELECT {} FROM duta_genre_winners WHERE id = ?",
        WINNER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("Pemenang tidak ditemukan"))
}

fn current_periode() -> String {
    let year = Utc::now().year();
    format!("{}-{}", year, year + 1)
}

// ================== PUBLIC ==================

#[get("/api/duta-genre")]
pub async fn get_showcase(
    pool: web::Data<MySqlPool>,
    query: web::Query<WinnerQuery>,
) -> Result<impl Responder, AppError> {
    let (categories, winners) = futures::try_join!(
        fetch_categories(pool.get_ref()),
        fetch_winners(pool.get_ref())
    )
    .map_err(|e| AppError::backend("Gagal memuat data Duta GenRe", e))?;

    let view = showcase(categories, winners, &query, &current_periode());
    Ok(HttpResponse::Ok().json(view))
}

// ================== CATEGORIES ==================

fn category_write_error(e: sqlx::Error) -> AppError {
    match constraint_message(&e, DUPLICATE_KEY, "Kategori masih digunakan") {
        Some(msg) => AppError::validation(msg),
        None => AppError::backend("Gagal menyimpan kategori", e),
    }
}

#[get("/api/admin/duta-genre/categories")]
pub async fn list_categories(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    query: web::Query<CategoryQuery>,
) -> Result<impl Responder, AppError> {
    let rows = fetch_categories(pool.get_ref()).await?;
    Ok(HttpResponse::Ok().json(filter_categories(rows, query.q.as_deref())))
}

async fn write_category(
    pool: &MySqlPool,
    input: &CategoryInput,
    id: Option<i64>,
) -> Result<i64, sqlx::Error> {
    let query = match id {
        Some(id) => sqlx::query(
            "UPDATE duta_genre_categories SET category_key = ?, title = ?, display_order = ?, \
             desired_count = ? WHERE id = ?",
        )
        .bind(&input.key)
        .bind(&input.title)
        .bind(input.order)
        .bind(input.desired_count)
        .bind(id),
        None => sqlx::query(
            "INSERT INTO duta_genre_categories (category_key, title, display_order, desired_count) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(&input.key)
        .bind(&input.title)
        .bind(input.order)
        .bind(input.desired_count),
    };
    let result = query.execute(pool).await?;
    Ok(id.unwrap_or(result.last_insert_id() as i64))
}

#[post("/api/admin/duta-genre/categories")]
pub async fn create_category(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CategoryPayload>,
) -> Result<impl Responder, AppError> {
    let input = payload.into_inner().validate()?;
    let id = write_category(pool.get_ref(), &input, None)
        .await
        .map_err(category_write_error)?;
    let row = find_category(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Kategori ditambahkan.",
        "data": row,
    })))
}

#[put("/api/admin/duta-genre/categories/{id}")]
pub async fn update_category(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    path: web::Path<i64>,
    payload: web::Json<CategoryPayload>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let input = payload.into_inner().validate()?;
    find_category(pool.get_ref(), id).await?;
    write_category(pool.get_ref(), &input, Some(id))
        .await
        .map_err(category_write_error)?;
    let row = find_category(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Kategori diperbarui.",
        "data": row,
    })))
}

/// Winner rows go with their category (ON DELETE CASCADE); their photos are
/// removed here.
async fn delete_categories(
    pool: &MySqlPool,
    storage: &Storage,
    ids: &[i64],
) -> Result<u64, AppError> {
    let photos: Vec<String> = fetch_winners(pool)
        .await?
        .into_iter()
        .filter(|w| ids.contains(&w.category_id))
        .filter_map(|w| w.image_url)
        .collect();

    let deleted = db::delete_by_ids(pool, CATEGORY_TABLE, ids)
        .await
        .map_err(|e| AppError::backend("Gagal menghapus kategori", e))?;
    for url in &photos {
        storage.remove_by_url(url).await;
    }
    Ok(deleted)
}

#[delete("/api/admin/duta-genre/categories/{id}")]
pub async fn delete_category(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    find_category(pool.get_ref(), id).await?;
    delete_categories(pool.get_ref(), &storage, &[id]).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "Kategori dihapus." })))
}

#[post("/api/admin/duta-genre/categories/bulk-delete")]
pub async fn bulk_delete_categories(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    payload: web::Json<IdsPayload>,
) -> Result<impl Responder, AppError> {
    let ids = payload.into_inner().checked()?;
    let deleted = delete_categories(pool.get_ref(), &storage, &ids).await?;
    log::info!("{} kategori Duta GenRe dihapus oleh {}", deleted, session.0.sub);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} kategori dihapus", deleted),
        "deleted": deleted,
    })))
}

#[get("/api/admin/duta-genre/categories/export")]
pub async fn export_categories(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    query: web::Query<CategoryQuery>,
) -> Result<impl Responder, AppError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let rows = filter_categories(fetch_categories(pool.get_ref()).await?, query.q.as_deref());
    export::download(&categories_table(&rows), format, "duta_categories")
}

// ================== WINNERS ==================

#[get("/api/admin/duta-genre/winners")]
pub async fn list_winners(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    query: web::Query<WinnerQuery>,
) -> Result<impl Responder, AppError> {
    let (categories, winners) = futures::try_join!(
        fetch_categories(pool.get_ref()),
        fetch_winners(pool.get_ref())
    )?;
    Ok(HttpResponse::Ok().json(filter_winners(winners, &categories, &query)))
}

async fn write_winner(
    pool: &MySqlPool,
    input: &WinnerInput,
    id: Option<i64>,
) -> Result<i64, AppError> {
    let category = winner_category(fetch_category(pool, input.category_id).await?)?;
    input.check_category(&category)?;

    let gender = input.gender.map(|g| g.as_str());
    let query = match id {
        Some(id) => sqlx::query(
            "UPDATE duta_genre_winners SET category_id = ?, nama = ?, gender = ?, asal = ?, \
             instagram = ?, image_url = ?, periode = ? WHERE id = ?",
        )
        .bind(input.category_id)
        .bind(&input.nama)
        .bind(gender)
        .bind(&input.asal)
        .bind(&input.instagram)
        .bind(&input.image_url)
        .bind(&input.periode)
        .bind(id),
        None => sqlx::query(
            "INSERT INTO duta_genre_winners (category_id, nama, gender, asal, instagram, image_url, periode) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(input.category_id)
        .bind(&input.nama)
        .bind(gender)
        .bind(&input.asal)
        .bind(&input.instagram)
        .bind(&input.image_url)
        .bind(&input.periode),
    };
    let result = query
        .execute(pool)
        .await
        .map_err(|e| AppError::backend("Gagal menyimpan pemenang", e))?;
    Ok(id.unwrap_or(result.last_insert_id() as i64))
}

#[post("/api/admin/duta-genre/winners")]
pub async fn create_winner(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    payload: web::Json<WinnerPayload>,
) -> Result<impl Responder, AppError> {
    let input = payload.into_inner().validate()?;
    let id = write_winner(pool.get_ref(), &input, None).await?;
    let row = find_winner(pool.get_ref(), id).await?;
    Ok(HttpResponse::Created().json(json!({
        "message": "Pemenang ditambahkan.",
        "data": row,
    })))
}

#[put("/api/admin/duta-genre/winners/{id}")]
pub async fn update_winner(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    path: web::Path<i64>,
    payload: web::Json<WinnerPayload>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let input = payload.into_inner().validate()?;
    let old = find_winner(pool.get_ref(), id).await?;

    write_winner(pool.get_ref(), &input, Some(id)).await?;
    if let Some(old_url) = old.image_url.filter(|u| Some(u) != input.image_url.as_ref()) {
        storage.remove_by_url(&old_url).await;
    }

    let row = find_winner(pool.get_ref(), id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "Pemenang diperbarui.",
        "data": row,
    })))
}

#[delete("/api/admin/duta-genre/winners/{id}")]
pub async fn delete_winner(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    path: web::Path<i64>,
) -> Result<impl Responder, AppError> {
    let id = path.into_inner();
    let old = find_winner(pool.get_ref(), id).await?;
    db::delete_by_ids(pool.get_ref(), WINNER_TABLE, &[id])
        .await
        .map_err(|e| AppError::backend("Gagal menghapus pemenang", e))?;
    if let Some(url) = old.image_url {
        storage.remove_by_url(&url).await;
    }
    Ok(HttpResponse::Ok().json(json!({ "message": "Pemenang dihapus." })))
}

#[post("/api/admin/duta-genre/winners/bulk-delete")]
pub async fn bulk_delete_winners(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
    storage: web::Data<Storage>,
    payload: web::Json<IdsPayload>,
) -> Result<impl Responder, AppError> {
    let ids = payload.into_inner().checked()?;
    let photos: Vec<String> = fetch_winners(pool.get_ref())
        .await?
        .into_iter()
        .filter(|w| ids.contains(&w.id))
        .filter_map(|w| w.image_url)
        .collect();

    let deleted = db::delete_by_ids(pool.get_ref(), WINNER_TABLE, &ids)
        .await
        .map_err(|e| AppError::backend("Gagal menghapus pemenang", e))?;
    for url in &photos {
        storage.remove_by_url(url).await;
    }

    log::info!("{} pemenang Duta GenRe dihapus oleh {}", deleted, session.0.sub);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("{} pemenang dihapus", deleted),
        "deleted": deleted,
    })))
}

#[get("/api/admin/duta-genre/winners/export")]
pub async fn export_winners(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    query: web::Query<WinnerQuery>,
) -> Result<impl Responder, AppError> {
    let format = ExportFormat::parse(query.format.as_deref())?;
    let (categories, winners) = futures::try_join!(
        fetch_categories(pool.get_ref()),
        fetch_winners(pool.get_ref())
    )?;
    let rows = filter_winners(winners, &categories, &query);

    let periode = query
        .periode
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or("all");
    export::download(
        &winners_table(&rows, &categories),
        format,
        &format!("duta_winners_{}", periode),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{ResponseError, http::StatusCode};

    #[test]
    fn unknown_winner_category_is_bad_input() {
        let err = winner_category(None).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Kategori tidak ditemukan");

        let category = DutaGenreCategory {
            id: 4,
            key: "kota".into(),
            title: "Duta GenRe Kota".into(),
            order: 1,
            desired_count: 2,
        };
        assert_eq!(winner_category(Some(category.clone())).unwrap(), category);
    }
}
