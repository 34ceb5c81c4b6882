use actix_web::{HttpResponse, Responder, get, post, put, web};
use chrono::Utc;
use sqlx::MySqlPool;

use crate::{
    auth::AdminSession,
    error::AppError,
    models::form_control::{
        FormControl, FormStatus, FormWindowPayload, QuickOpenPayload, SINGLETON_ID,
    },
};

/// Current window, `None` when the row is missing.
pub async fn load_window(pool: &MySqlPool) -> Result<Option<FormControl>, sqlx::Error> {
    sqlx::query_as::<_, FormControl>("SELECT buka, tutup FROM form_control WHERE id = ?")
        .bind(SINGLETON_ID)
        .fetch_optional(pool)
        .await
}

async fn save_window(pool: &MySqlPool, window: &FormControl) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO form_control (id, buka, tutup) VALUES (?, ?, ?) \
         ON DUPLICATE KEY UPDATE buka = VALUES(buka), tutup = VALUES(tutup)",
    )
    .bind(SINGLETON_ID)
    .bind(window.buka)
    .bind(window.tutup)
    .execute(pool)
    .await?;
    Ok(())
}

async fn store_and_respond(
    pool: &MySqlPool,
    window: FormControl,
    session: &AdminSession,
) -> Result<HttpResponse, AppError> {
    save_window(pool, &window)
        .await
        .map_err(|e| AppError::backend("Gagal menyimpan jadwal formulir", e))?;
    log::info!(
        "Jadwal formulir diubah oleh {}: buka={:?} tutup={:?}",
        session.0.sub,
        window.buka,
        window.tutup
    );
    Ok(HttpResponse::Ok().json(FormStatus::at(Some(window), Utc::now())))
}

#[get("/api/form-control")]
pub async fn get_form_control(pool: web::Data<MySqlPool>) -> Result<impl Responder, AppError> {
    let window = load_window(pool.get_ref())
        .await
        .map_err(|e| AppError::backend("Gagal memuat jadwal formulir", e))?;
    Ok(HttpResponse::Ok().json(FormStatus::at(window, Utc::now())))
}

#[put("/api/admin/form-control")]
pub async fn set_form_window(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
    payload: web::Json<FormWindowPayload>,
) -> Result<impl Responder, AppError> {
    let window = payload.into_inner().into_window()?;
    store_and_respond(pool.get_ref(), window, &session).await
}

#[post("/api/admin/form-control/quick")]
pub async fn quick_open(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
    payload: web::Json<QuickOpenPayload>,
) -> Result<impl Responder, AppError> {
    let window = FormControl::opened_for(Utc::now(), payload.duration);
    store_and_respond(pool.get_ref(), window, &session).await
}

#[post("/api/admin/form-control/close")]
pub async fn close_form(
    session: AdminSession,
    pool: web::Data<MySqlPool>,
) -> Result<impl Responder, AppError> {
    store_and_respond(pool.get_ref(), FormControl::closed_at(Utc::now()), &session).await
}
