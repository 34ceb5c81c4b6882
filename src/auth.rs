use std::future::{Ready, ready};

use actix_web::{FromRequest, HttpRequest, dev::Payload, web};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, error::AppError, models::user::AdminUser};

pub const SESSION_COOKIE: &str = "access_token";

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub user_id: i64,
    pub name: String,
    pub exp: usize,
}

pub fn generate_jwt(
    user: &AdminUser,
    secret: &str,
    ttl_days: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: user.email.clone(),
        user_id: user.id,
        name: user.name.clone(),
        exp: (now + chrono::Duration::days(ttl_days)).timestamp() as usize,
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
}

pub fn verify_jwt(req: &HttpRequest) -> Result<Claims, AppError> {
    let cookie = req.cookie(SESSION_COOKIE).ok_or_else(|| {
        log::warn!("No access_token cookie found in request to {}", req.path());
        AppError::Unauthorized("Token tidak ditemukan".into())
    })?;

    let config = req
        .app_data::<web::Data<AppConfig>>()
        .ok_or_else(|| AppError::Internal("Konfigurasi aplikasi tidak tersedia".into()))?;

    decode_jwt(cookie.value(), &config.jwt_secret).map_err(|e| {
        log::warn!("JWT verification failed for {}: {:?}", req.path(), e);
        AppError::Unauthorized("Token tidak valid atau kedaluwarsa".into())
    })
}

/// Logged-in admin, handed to every back-office handler as an argument.
#[derive(Debug, Clone)]
pub struct AdminSession(pub Claims);

impl FromRequest for AdminSession {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(verify_jwt(req).map(AdminSession))
    }
}
