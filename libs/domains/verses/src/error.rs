use axum::response::{IntoResponse, Response};
use axum_helpers::AppError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum VerseError {
    #[error("Verse not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type VerseResult<T> = Result<T, VerseError>;

impl From<reqwest::Error> for VerseError {
    fn from(err: reqwest::Error) -> Self {
        VerseError::Embedding(err.to_string())
    }
}

impl From<serde_json::Error> for VerseError {
    fn from(err: serde_json::Error) -> Self {
        VerseError::Internal(format!("JSON error: {}", err))
    }
}

/// Convert VerseError to AppError for standardized error responses
impl From<VerseError> for AppError {
    fn from(err: VerseError) -> Self {
        match err {
            VerseError::NotFound(id) => AppError::NotFound(format!("Verse {} not found", id)),
            VerseError::Validation(msg) => AppError::BadRequest(msg),
            VerseError::DimensionMismatch { expected, actual } => AppError::BadRequest(format!(
                "Vector dimension mismatch: expected {}, got {}",
                expected, actual
            )),
            VerseError::Embedding(msg) => {
                AppError::InternalServerError(format!("Embedding error: {}", msg))
            }
            VerseError::Config(msg) => {
                AppError::InternalServerError(format!("Config error: {}", msg))
            }
            VerseError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl IntoResponse for VerseError {
    fn into_response(self) -> Response {
        let app_error: AppError = self.into();
        app_error.into_response()
    }
}
