use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub const NO_IMAGE: &str = "No image provided";
pub const NOT_AN_IMAGE: &str = "File must be an image";
pub const TOO_SMALL: &str = "Image too small (minimum 50x50)";
pub const AMBIGUOUS_SOURCE: &str = "Provide either cid or image_url, not both";
pub const BAD_BODY: &str = "Invalid request body";

/// Everything that can go wrong while serving a classification.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to fetch image: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(detail: &str) -> Self {
        AppError::InvalidInput(detail.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::Fetch(_) | AppError::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to hand back to the client.
    pub fn detail(&self) -> &str {
        match self {
            AppError::InvalidInput(detail) => detail,
            AppError::Fetch(_) => "Failed to fetch image from URL/IPFS",
            AppError::Decode(_) => "Could not decode image",
            AppError::Internal(_) => "Classification failed",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Classification error: {}", self);
        } else {
            warn!("Rejected request: {}", self);
        }

        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}
