use actix_web::{HttpResponse, Responder, get, web};
use chrono::Utc;
use serde::Serialize;
use sqlx::MySqlPool;

use crate::{
    auth::AdminSession,
    controllers::form_control_controller::load_window,
    db::count_rows,
    error::AppError,
    models::form_control::FormStatus,
    repository::SubmissionStore,
};

#[derive(Debug, Serialize)]
struct DashboardCounts {
    submissions: i64,
    pengurus: i64,
    struktur_jabatan: i64,
    kegiatan: i64,
    duta_genre_categories: i64,
    duta_genre_winners: i64,
}

#[derive(Debug, Serialize)]
struct Dashboard {
    counts: DashboardCounts,
    form: FormStatus,
}

#[get("/api/admin/dashboard")]
pub async fn get_dashboard(
    _session: AdminSession,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn SubmissionStore>,
) -> Result<impl Responder, AppError> {
    let pool = pool.get_ref();
    let (submissions, pengurus, struktur_jabatan, kegiatan, categories, winners, window) =
        futures::try_join!(
            store.count(),
            count_rows(pool, "pengurus"),
            count_rows(pool, "struktur_jabatan"),
            count_rows(pool, "kegiatan"),
            count_rows(pool, "duta_genre_categories"),
            count_rows(pool, "duta_genre_winners"),
            load_window(pool),
        )
        .map_err(|e| AppError::backend("Gagal memuat ringkasan dashboard", e))?;

    Ok(HttpResponse::Ok().json(Dashboard {
        counts: DashboardCounts {
            submissions,
            pengurus,
            struktur_jabatan,
            kegiatan,
            duta_genre_categories: categories,
            duta_genre_winners: winners,
        },
        form: FormStatus::at(window, Utc::now()),
    }))
}
