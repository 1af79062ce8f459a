use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::{
    gemini::{GeminiError, ImageGenerator},
    models::{FetchSampleRequest, GenerateRequest, GeneratedArtifact, ImageAsset, RefineRequest, Session},
    webhook::WebhookNotifier,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RwLock<HashMap<Uuid, Session>>>,
    pub generator: Arc<dyn ImageGenerator>,
    pub webhook: Arc<WebhookNotifier>,
    pub http: reqwest::Client,
}

pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/session/:id", get(get_session))
        .route("/api/session/:id/generate", post(generate))
        .route("/api/session/:id/refine", post(refine))
        .route("/api/samples", get(list_samples))
        .route("/api/samples/fetch", post(fetch_sample))
        .with_state(state)
}

/// Display-only error surface: every failure reaches the form as a single
/// message string plus a status code.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: &str) -> Self {
        Self { status: StatusCode::NOT_FOUND, message: message.to_string() }
    }

    fn bad_request(message: &str) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.to_string() }
    }

    fn bad_gateway(message: String) -> Self {
        Self { status: StatusCode::BAD_GATEWAY, message }
    }

    fn internal(message: &str) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, message: message.to_string() }
    }

    fn generation(err: GeminiError) -> Self {
        Self::from_task("image generation", err)
    }

    fn refinement(err: GeminiError) -> Self {
        Self::from_task("image refinement", err)
    }

    fn from_task(task: &str, err: GeminiError) -> Self {
        let status = match &err {
            GeminiError::SafetyBlocked(_) | GeminiError::NoImageProduced(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GeminiError::Http(_) | GeminiError::Network(_) => StatusCode::BAD_GATEWAY,
            GeminiError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, message: format!("failed to complete {}: {}", task, err) }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

pub async fn create_session(State(state): State<AppState>) -> Json<Session> {
    let session = Session::new();
    tracing::info!("🚀 Created session {}", session.id);
    state.store.write().insert(session.id, session.clone());
    Json(session)
}

pub async fn get_session(Path(id): Path<Uuid>, State(state): State<AppState>) -> Response {
    if let Some(s) = state.store.read().get(&id).cloned() { Json(s).into_response() } else { StatusCode::NOT_FOUND.into_response() }
}

#[axum::debug_handler]
pub async fn generate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<GeneratedArtifact>, ApiError> {
    if !state.store.read().contains_key(&id) {
        return Err(ApiError::not_found("unknown session"));
    }

    // Remote call runs outside the store lock
    let artifact = state.generator.generate(&body).await.map_err(ApiError::generation)?;

    {
        let mut guard = state.store.write();
        let session = guard.get_mut(&id).ok_or_else(|| ApiError::not_found("unknown session"))?;
        session.push_artifact(artifact.clone());
        tracing::info!("✅ Session {} now holds {} result(s)", id, session.history.len());
    }

    state.webhook.notify(artifact.image.clone());
    Ok(Json(artifact))
}

#[axum::debug_handler]
pub async fn refine(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(body): Json<RefineRequest>,
) -> Result<Json<GeneratedArtifact>, ApiError> {
    let base_uri = {
        let guard = state.store.read();
        let session = guard.get(&id).ok_or_else(|| ApiError::not_found("unknown session"))?;
        session
            .latest()
            .map(|a| a.image.clone())
            .ok_or_else(|| ApiError::bad_request("no generated image to refine yet"))?
    };

    let base = ImageAsset::from_data_uri(&base_uri)
        .ok_or_else(|| ApiError::internal("stored artifact is not a data URI"))?;

    let artifact = state.generator.refine(&base, &body.instruction).await.map_err(ApiError::refinement)?;

    {
        let mut guard = state.store.write();
        let session = guard.get_mut(&id).ok_or_else(|| ApiError::not_found("unknown session"))?;
        session.push_artifact(artifact.clone());
        tracing::info!("✅ Session {} refined, {} result(s) in history", id, session.history.len());
    }

    state.webhook.notify(artifact.image.clone());
    Ok(Json(artifact))
}

// --- Sample Catalog ---

#[derive(Debug, Clone, Serialize)]
pub struct SampleImage {
    pub label: &'static str,
    pub url: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SampleCatalog {
    pub garments: Vec<SampleImage>,
    pub models: Vec<SampleImage>,
}

pub fn sample_catalog() -> SampleCatalog {
    SampleCatalog {
        garments: vec![
            SampleImage {
                label: "Sparkle competition leotard",
                url: "https://storage.googleapis.com/garment-studio-samples/garments/sparkle-competition.png",
            },
            SampleImage {
                label: "Velvet long-sleeve leotard",
                url: "https://storage.googleapis.com/garment-studio-samples/garments/velvet-long-sleeve.png",
            },
            SampleImage {
                label: "Training camisole leotard",
                url: "https://storage.googleapis.com/garment-studio-samples/garments/training-camisole.png",
            },
        ],
        models: vec![
            SampleImage {
                label: "Model A",
                url: "https://storage.googleapis.com/garment-studio-samples/models/model-a.jpg",
            },
            SampleImage {
                label: "Model B",
                url: "https://storage.googleapis.com/garment-studio-samples/models/model-b.jpg",
            },
        ],
    }
}

pub async fn list_samples() -> Json<SampleCatalog> {
    Json(sample_catalog())
}

/// Server-side fetch of a catalog image, returned as an ImageAsset so the
/// form can drop it straight into an uploader slot.
pub async fn fetch_sample(
    State(state): State<AppState>,
    Json(body): Json<FetchSampleRequest>,
) -> Result<Json<ImageAsset>, ApiError> {
    tracing::info!("📷 Fetching sample image: {}", body.url);

    let response = state
        .http
        .get(&body.url)
        .send()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("failed to load sample image: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::bad_gateway(format!("failed to load sample image: status={}", status)));
    }

    let mime_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(';').next().unwrap_or(s).trim().to_string())
        .unwrap_or_else(|| "image/png".to_string());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| ApiError::bad_gateway(format!("failed to load sample image: {}", e)))?;

    let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
    Ok(Json(ImageAsset::new(data, mime_type)))
}
