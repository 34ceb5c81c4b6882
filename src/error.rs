// error.rs
use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

use crate::image_utils::ImageError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("{context}")]
    Backend {
        context: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Gagal menyimpan berkas")]
    Storage(#[from] std::io::Error),

    #[error("Gagal membuat berkas ekspor")]
    Export(#[from] rust_xlsxwriter::XlsxError),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    /// Backend failure with the message shown to the user.
    pub fn backend(context: impl Into<String>, source: sqlx::Error) -> Self {
        AppError::Backend {
            context: context.into(),
            source,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(source: sqlx::Error) -> Self {
        AppError::backend("Gagal mengakses database", source)
    }
}

impl From<actix_web::error::BlockingError> for AppError {
    fn from(e: actix_web::error::BlockingError) -> Self {
        AppError::Internal(format!("Pemrosesan dibatalkan: {}", e))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Image(ImageError::EncodingFailed(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Image(_) => StatusCode::BAD_REQUEST,
            AppError::Backend { .. }
            | AppError::Storage(_)
            | AppError::Export(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            AppError::Backend { context, source } => {
                log::error!("{}: {:?}", context, source);
            }
            AppError::Storage(e) => log::error!("Storage error: {}", e),
            AppError::Export(e) => log::error!("Export error: {}", e),
            other if status.is_server_error() => log::error!("{}", other),
            other => log::warn!("{}", other),
        }

        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}
