use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    InvalidPayload(String),

    #[error("storage unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::InvalidPayload(message) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: message,
                    message: None,
                },
            ),
            AppError::StoreUnavailable(err) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorBody {
                    error: "Storage unavailable".to_string(),
                    message: Some(err.to_string()),
                },
            ),
        };

        (status, Json(body)).into_response()
    }
}
