use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, Multipart, State},
    http::{header::CONTENT_TYPE, Request},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, warn};

use crate::acquire::{ImageFetcher, ImageSource};
use crate::catalog::{Catalog, Category, CategoryPreview};
use crate::error::{AppError, BAD_BODY, NO_IMAGE};
use crate::model::{Classification, Classifier};

pub const SERVICE_NAME: &str = "EcoCommerce AI Classifier";

/// Predictions below this are reported as `mixed`.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// Name of the multipart field that carries an upload.
const UPLOAD_FIELD: &str = "file";

pub struct AppState {
    pub catalog: Catalog,
    pub classifier: Arc<dyn Classifier>,
    pub fetcher: ImageFetcher,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ClassificationRequest {
    pub cid: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ClassificationResponse {
    pub label: Category,
    pub confidence: f64,
    pub secondary: Vec<Category>,
    pub explanation_md: &'static str,
    pub tips_md: &'static str,
}

impl ClassificationResponse {
    pub fn new(catalog: &Catalog, prediction: Classification) -> Self {
        let label = if prediction.confidence < LOW_CONFIDENCE_THRESHOLD {
            Category::Mixed
        } else {
            prediction.label
        };
        let info = catalog.get(label);

        ClassificationResponse {
            label,
            confidence: prediction.confidence,
            secondary: prediction.secondary,
            explanation_md: info.explanation,
            tips_md: info.tips,
        }
    }
}

pub fn app(state: Arc<AppState>, body_limit_bytes: usize) -> Router {
    Router::new()
        .route("/classify", post(classify_handler))
        .route("/categories", get(categories_handler))
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn classify_handler(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
) -> Result<Json<ClassificationResponse>, AppError> {
    let source = read_source(request).await?;
    let image = state.fetcher.acquire(source).await?;

    let classifier = Arc::clone(&state.classifier);
    let prediction = tokio::task::spawn_blocking(move || classifier.predict(&image))
        .await
        .map_err(|err| AppError::Internal(format!("classifier task failed: {}", err)))?;

    debug!(
        "Predicted {} ({}) secondary {:?}",
        prediction.label, prediction.confidence, prediction.secondary
    );

    Ok(Json(ClassificationResponse::new(&state.catalog, prediction)))
}

/// Works out which of the three input modes the request uses.
async fn read_source(request: Request<Body>) -> Result<ImageSource, AppError> {
    let is_multipart = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, &()).await.map_err(|err| {
            warn!("Unreadable multipart request: {}", err);
            AppError::invalid(BAD_BODY)
        })?;
        return read_upload(multipart).await;
    }

    let body = Bytes::from_request(request, &()).await.map_err(|err| {
        warn!("Unreadable request body: {}", err);
        AppError::invalid(BAD_BODY)
    })?;

    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::invalid(NO_IMAGE));
    }

    let payload: ClassificationRequest = serde_json::from_slice(&body).map_err(|err| {
        warn!("Malformed JSON body: {}", err);
        AppError::invalid(BAD_BODY)
    })?;

    ImageSource::from_request(payload.cid, payload.image_url)
}

async fn read_upload(mut multipart: Multipart) -> Result<ImageSource, AppError> {
    let bad_multipart = |err: axum::extract::multipart::MultipartError| {
        warn!("Failed to read multipart field: {}", err);
        AppError::invalid(BAD_BODY)
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        if field.name() == Some(UPLOAD_FIELD) {
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            return Ok(ImageSource::Upload {
                bytes,
                content_type,
            });
        }
    }

    Err(AppError::invalid(NO_IMAGE))
}

async fn categories_handler(
    State(state): State<Arc<AppState>>,
) -> Json<std::collections::BTreeMap<Category, CategoryPreview>> {
    Json(state.catalog.previews())
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}
