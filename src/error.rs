use std::path::PathBuf;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Invalid document {}: {reason}", .path.display())]
    DocumentFormat { path: PathBuf, reason: String },

    #[error("Recommendation computation failed: {0}")]
    Execution(String),

    #[error("Recommendation contract violated: {0}")]
    ContractViolation(String),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a document error on `path`
    pub fn document(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        AppError::DocumentFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            AppError::DocumentFormat { .. }
            | AppError::Execution(_)
            | AppError::ContractViolation(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_error_names_file() {
        let err = AppError::document("data/ratings.csv", "file not found");
        assert_eq!(
            err.to_string(),
            "Invalid document data/ratings.csv: file not found"
        );
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("user 7".into()), StatusCode::NOT_FOUND),
            (AppError::InvalidInput("bad".into()), StatusCode::BAD_REQUEST),
            (
                AppError::Unavailable("loading".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Execution("diverged".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AppError::ContractViolation("no top_n".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
