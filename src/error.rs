use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::types::ApiResponse;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("Bus not found")]
    BusNotFound(String),
    #[error("Stop not found")]
    StopNotFound(String),
    #[error("invalid observation: {0}")]
    InvalidObservation(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BusNotFound(_) | ApiError::StopNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidObservation(_) | ApiError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::BusNotFound(id) => tracing::warn!(bus = %id, "unknown bus"),
            ApiError::StopNotFound(id) => tracing::warn!(stop = %id, "unknown stop"),
            other => tracing::warn!("rejected request: {}", other),
        }
        (self.status(), Json(ApiResponse::failure(self.to_string()))).into_response()
    }
}
