use axum::{
    extract::multipart::MultipartError,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

// --- Domain/Infrastructure Errors ---

/// Field-level validation failures for a submitted photo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Copyright missing")]
    CopyrightMissing,
    #[error("Colors missing")]
    ColorsMissing,
    #[error("invalid URL")]
    InvalidUrl,
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("File upload failed: {0}")]
    UploadFailed(String),

    #[error("File not found with key: {0}")]
    NotFound(String),

    #[error("Storage backend error: {0}")]
    BackendError(#[from] anyhow::Error), // Wrap Anyhow errors from Storage layer
}

// --- Web Layer Error ---

#[derive(Error, Debug)]
pub enum AppError {
    // Input validation / request parsing errors
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Image not found")]
    MissingFile,
    #[error("Upload exceeds the maximum size")]
    RequestTooLarge,
    #[error("Only JPEG and PNG images are accepted")]
    UnsupportedImage,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Error processing multipart form data: {0}")]
    MultipartError(#[source] MultipartError),
    #[error("Not found: {0}")]
    NotFound(String),

    // Stored data / storage failures
    #[error("Could not decode stored metadata {key}")]
    DecodeError {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Could not perform file storage operation")]
    StorageError(#[source] StorageError),

    // Configuration / Startup errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Initialization error: {0}")]
    InitError(String),

    // Generic Internal Server Error
    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

// --- Conversions from Domain Errors to AppError ---

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(key),
            e => AppError::StorageError(e),
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        // axum reports a body over DefaultBodyLimit as 413 on the multipart error
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::RequestTooLarge
        } else {
            AppError::MultipartError(err)
        }
    }
}

impl From<crate::config::ConfigError> for AppError {
    fn from(err: crate::config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InitError(err.to_string())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_)
            | AppError::MissingFile
            | AppError::UnsupportedImage
            | AppError::InvalidInput(_)
            | AppError::MultipartError(_) => StatusCode::BAD_REQUEST,
            AppError::RequestTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DecodeError { .. }
            | AppError::StorageError(_)
            | AppError::ConfigError(_)
            | AppError::InitError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// --- Axum Response Implementation ---

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // 4xx Client Errors carry their own message
            AppError::MultipartError(e) => format!("Invalid multipart form data: {}", e.body_text()),
            AppError::NotFound(key) => {
                tracing::debug!(%key, "Responding with not found");
                "404 page not found".to_string()
            }
            e if status.is_client_error() => e.to_string(),

            // 5xx Server Errors never leak detail to the browser
            e => {
                tracing::error!(error.source = ?e, error.detail = %e, "Responding with server error");
                "Internal Server Error".to_string()
            }
        };

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}
