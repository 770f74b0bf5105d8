//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use keyward_core::{EmptyResponse, ServerResponse};
use thiserror::Error;

use crate::core::RelayError;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidSignature(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // clients decode every reply as a `ServerResponse` envelope
        let body: ServerResponse<EmptyResponse> = ServerResponse::Error(self.to_string());
        (self.status(), Json(body)).into_response()
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::Invalid(msg) => ApiError::BadRequest(msg),
            RelayError::Signature(msg) => ApiError::InvalidSignature(msg),
            RelayError::NotFound(msg) => ApiError::NotFound(msg),
            RelayError::Conflict(msg) => ApiError::Conflict(msg),
            RelayError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}
