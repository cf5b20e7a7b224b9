use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use story_protocol::ImageResponse;

/// Failures a relay route reports before (or instead of) a stream.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Missing, blank or malformed request field.
    #[error("{0}")]
    InvalidRequest(String),
    /// A collaborator credential or id is not configured.
    #[error("{0}")]
    NotConfigured(String),
    /// Thread creation, message submission or run start failed.
    #[error("Failed to set up streaming response")]
    SessionSetup(#[source] story_harness::HarnessError),
    /// The image provider failed or returned unusable data.
    #[error("Error generating image")]
    ImageGeneration(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotConfigured(_) | Self::SessionSetup(_) | Self::ImageGeneration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Self::ImageGeneration(error) => (
                status,
                Json(ImageResponse::failure("Error generating image", Some(error))),
            )
                .into_response(),
            other => (status, Json(serde_json::json!({ "error": other.to_string() })))
                .into_response(),
        }
    }
}
