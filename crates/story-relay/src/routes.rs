use std::convert::Infallible;
use std::path::Path;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt as _;
use story_harness::{GeneratedImage, Harness, HarnessError, SessionConfig};
use story_protocol::{ImageRequest, ImageResponse};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::relay::relay_stream;

/// Shared per-process state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub harness: Harness,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(harness: Harness, config: RelayConfig) -> Self {
        Self {
            harness,
            config: Arc::new(config),
        }
    }
}

/// Body of `POST /api/openai/message`.
#[derive(Debug, serde::Deserialize)]
pub struct MessageRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct HelloParams {
    pub name: Option<String>,
}

/// Route prefix under which saved images are served.
pub const IMAGE_ROUTE: &str = "/images";

pub fn router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/api/openai/message", post(stream_message))
        .route("/api/gemini/image", post(generate_image))
        .route("/api/hello", get(hello));
    if let Some(dir) = &state.config.image_dir {
        router = router.nest_service(IMAGE_ROUTE, ServeDir::new(dir));
    }
    router.with_state(state)
}

async fn stream_message(
    State(state): State<AppState>,
    payload: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Response, RelayError> {
    let Some(assistant_id) = state.config.assistant_id.clone() else {
        return Err(RelayError::NotConfigured(
            "Assistant ID is not configured".into(),
        ));
    };
    if !state.harness.has_text_provider() {
        return Err(RelayError::NotConfigured(
            "OpenAI API key is not configured".into(),
        ));
    }
    let Json(request) =
        payload.map_err(|rejection| RelayError::InvalidRequest(rejection.body_text()))?;
    if request.content.trim().is_empty() {
        return Err(RelayError::InvalidRequest(
            "Message content is required".into(),
        ));
    }

    let run = state
        .harness
        .session(SessionConfig::assistant(assistant_id))
        .run()
        .user_text(request.content)
        .stream_buffer_capacity(state.config.stream_buffer)
        .start_stream()
        .await
        .map_err(|e| {
            error!(error = %e, "failed to start upstream run");
            RelayError::SessionSetup(e)
        })?;
    info!(thread_id = %run.thread_id(), run_id = %run.run_id(), "relay stream opened");

    let frames = relay_stream(run).filter_map(|message| async move {
        match message.to_frame() {
            Ok(frame) => Some(Ok::<_, Infallible>(frame)),
            Err(e) => {
                error!(error = %e, "failed to encode relay message");
                None
            }
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(frames))
        .map_err(|e| {
            error!(error = %e, "failed to build stream response");
            RelayError::SessionSetup(HarnessError::Protocol(e.to_string()))
        })
}

async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageRequest>, JsonRejection>,
) -> Result<Json<ImageResponse>, RelayError> {
    let Json(request) =
        payload.map_err(|rejection| RelayError::InvalidRequest(rejection.body_text()))?;
    let prompt = request.image_prompt.trim();
    if prompt.is_empty() {
        return Err(RelayError::InvalidRequest(
            "Message imagePrompt is required".into(),
        ));
    }
    if !state.harness.has_image_provider() {
        return Err(RelayError::NotConfigured(
            "Gemini API key is not configured".into(),
        ));
    }

    let image = state.harness.generate_image(prompt).await.map_err(|e| {
        warn!(error = %e, "image generation failed");
        RelayError::ImageGeneration(image_error_message(&e))
    })?;
    info!(mime_type = %image.mime_type, "image generated");

    match &state.config.image_dir {
        Some(dir) => {
            let path = save_image(dir, &image).await?;
            Ok(Json(ImageResponse::saved(image.mime_type, path)))
        }
        None => Ok(Json(ImageResponse::inline(image.mime_type, image.data))),
    }
}

fn image_error_message(err: &HarnessError) -> String {
    match err {
        HarnessError::Provider(provider) => provider.message().to_string(),
        other => other.to_string(),
    }
}

/// Decodes the image and writes it under `dir`, returning its URL path on this relay.
async fn save_image(dir: &Path, image: &GeneratedImage) -> Result<String, RelayError> {
    let bytes = BASE64
        .decode(image.data.as_bytes())
        .map_err(|e| RelayError::ImageGeneration(format!("invalid image data: {e}")))?;
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        error!(dir = %dir.display(), error = %e, "failed to create image directory");
        RelayError::ImageGeneration(format!("failed to save image: {e}"))
    })?;
    let file_name = format!("{}.{}", uuid::Uuid::new_v4(), image.extension());
    let path = dir.join(&file_name);
    tokio::fs::write(&path, &bytes).await.map_err(|e| {
        error!(path = %path.display(), error = %e, "failed to write image");
        RelayError::ImageGeneration(format!("failed to save image: {e}"))
    })?;
    info!(path = %path.display(), bytes = bytes.len(), "image saved");
    Ok(format!("{IMAGE_ROUTE}/{file_name}"))
}

async fn hello(Query(params): Query<HelloParams>) -> impl IntoResponse {
    let name = params
        .name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| "World".to_string());
    format!("Hello, {name}!")
}
