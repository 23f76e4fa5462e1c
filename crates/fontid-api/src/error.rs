use axum::{Json, extract::rejection::JsonRejection, http::StatusCode, response::IntoResponse};
use fontid_db::StoreError;
use fontid_model::ModelError;
use fontid_types::api::ErrorBody;
use thiserror::Error;
use tracing::error;

use crate::billing::PaymentError;

/// Everything a handler can fail with. The display text is what the client
/// sees; internal causes are logged and replaced by a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Invalid username or password.")]
    InvalidCredentials,

    #[error("Missing or invalid bearer token.")]
    Unauthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("Username already exists.")]
    Conflict,

    #[error("Prediction error: {0}")]
    Prediction(String),

    #[error("An internal server error occurred.")]
    Internal,
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Prediction(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Log `cause` and hide it behind [`ApiError::Internal`].
    pub fn internal(context: &str, cause: impl std::fmt::Display) -> Self {
        error!("{}: {}", context, cause);
        ApiError::Internal
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Validation(msg) => ApiError::BadRequest(msg),
            StoreError::DuplicateUser(_) => ApiError::Conflict,
            StoreError::Storage(e) => ApiError::internal("Credential store error", e),
        }
    }
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Image(e) => ApiError::BadRequest(format!("Could not decode image: {}", e)),
            ModelError::Inference(msg) => ApiError::Prediction(msg),
            other => ApiError::internal("Model load failed", other),
        }
    }
}

/// Malformed, incomplete or over-specified JSON bodies get the same
/// `{"error": ...}` shape as every other failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PaymentError> for ApiError {
    fn from(e: PaymentError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}
