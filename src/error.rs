use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::models::ErrorKind;

#[derive(Debug)]
pub enum AppError {
    RateLimited { retry_after_secs: u64 },
    InvalidUpload(String),
    InternalServerError,
}

#[derive(Serialize)]
struct ErrorResponse {
    code: i32,
    error_type: ErrorKind,
    error_message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, error_message) = match self {
            AppError::RateLimited { retry_after_secs } => (
                StatusCode::TOO_MANY_REQUESTS,
                ErrorKind::RateLimited,
                format!("Too many requests. Please retry in {retry_after_secs} seconds."),
            ),
            AppError::InvalidUpload(reason) => (
                StatusCode::BAD_REQUEST,
                ErrorKind::ValidationError,
                reason,
            ),
            AppError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::SystemError,
                "A problem occurred while analysing the image. Please try again later.".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16() as i32,
            error_type,
            error_message,
        });

        (status, body).into_response()
    }
}
