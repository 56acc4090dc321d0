use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

/// Why a dataset download was not accepted. The reconciler treats any of these
/// as "no update this cycle" and falls back to the cached dataset.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("response body too short ({len} bytes)")]
    TooShort { len: usize },

    #[error("response body is missing the dataset header signature")]
    MissingSignature,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Dataset fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("No valid draw data could be obtained")]
    NoValidData,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    Invalid(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::NoValidData | AppError::Fetch(_) | AppError::Http(_) => StatusCode::BAD_GATEWAY,
            AppError::Invalid(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
