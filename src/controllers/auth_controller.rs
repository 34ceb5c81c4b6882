//auth_controller.rs
use actix_web::{
    HttpResponse, Responder,
    cookie::{Cookie, SameSite, time::Duration},
    get, post, web,
};
use bcrypt::verify;
use serde_json::json;
use sqlx::MySqlPool;

use crate::{
    auth::{self, AdminSession, SESSION_COOKIE},
    config::AppConfig,
    error::AppError,
    models::user::{AdminUser, LoginRequest},
};

fn session_cookie(config: &AppConfig, value: String, max_age: Duration) -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE, value)
        .path("/")
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(max_age)
        .finish()
}

#[post("/api/admin/login")]
pub async fn login(
    pool: web::Data<MySqlPool>,
    config: web::Data<AppConfig>,
    payload: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let email = payload.email.trim();
    let password = payload.password.trim();
    if email.is_empty() || password.is_empty() {
        return Err(AppError::validation("Email atau password kosong"));
    }

    let user = sqlx::query_as::<_, AdminUser>(
        "SELECT id, name, email, password_hash, created_at FROM admin_users WHERE email = ? LIMIT 1",
    )
    .bind(email)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| AppError::Unauthorized("Kredensial tidak valid".into()))?;

    let ok = verify(password, &user.password_hash).map_err(|e| {
        log::error!("bcrypt verify: {:?}", e);
        AppError::Internal("Gagal memverifikasi password".into())
    })?;
    if !ok {
        log::warn!("Login gagal untuk {}", email);
        return Err(AppError::Unauthorized("Kredensial tidak valid".into()));
    }

    let token = auth::generate_jwt(&user, &config.jwt_secret, config.token_ttl_days).map_err(|e| {
        log::error!("Gagal menghasilkan JWT: {:?}", e);
        AppError::Internal("Gagal menghasilkan token".into())
    })?;

    log::info!("Admin {} masuk", user.email);
    let cookie = session_cookie(&config, token, Duration::days(config.token_ttl_days));
    Ok(HttpResponse::Ok().cookie(cookie).json(json!({
        "message": "Login berhasil",
        "user": user,
    })))
}

#[post("/api/admin/logout")]
pub async fn logout(config: web::Data<AppConfig>) -> impl Responder {
    let cookie = session_cookie(&config, String::new(), Duration::seconds(0));
    HttpResponse::Ok()
        .cookie(cookie)
        .json(json!({ "message": "Logout berhasil" }))
}

#[get("/api/admin/me")]
pub async fn me(session: AdminSession) -> impl Responder {
    let claims = session.0;
    HttpResponse::Ok().json(json!({
        "id": claims.user_id,
        "email": claims.sub,
        "name": claims.name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test};

    fn config() -> AppConfig {
        AppConfig::from_lookup(|key| match key {
            "DATABASE_URL" => Some("mysql://localhost/genre".into()),
            "JWT_SECRET" => Some("rahasia".into()),
            _ => None,
        })
        .unwrap()
    }

    #[actix_web::test]
    async fn me_requires_a_session_cookie() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .service(me)
                .service(logout),
        )
        .await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/admin/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let user = AdminUser {
            id: 3,
            name: "Admin".into(),
            email: "admin@genre.id".into(),
            password_hash: String::new(),
            created_at: chrono::Utc::now(),
        };
        let token = auth::generate_jwt(&user, "rahasia", 1).unwrap();
        let req = test::TestRequest::get()
            .uri("/api/admin/me")
            .cookie(Cookie::new(SESSION_COOKIE, token))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["email"], "admin@genre.id");
        assert_eq!(body["id"], 3);
    }

    #[actix_web::test]
    async fn logout_expires_the_cookie() {
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(config()))
                .service(logout),
        )
        .await;
        let resp = test::call_service(
            &app,
            test::TestRequest::post().uri("/api/admin/logout").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let cookie = resp
            .response()
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE)
            .unwrap();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(Duration::seconds(0)));
    }
}
