use futures::StreamExt as _;
use story_protocol::{SseDecoder, SseFrame};
use tracing::debug;

use crate::ProviderId;
use crate::errors::{HarnessError, ProviderError};
use crate::image::{GeneratedImage, ImageProvider};

use super::config::GeminiClientConfig;

const GEMINI_PROVIDER: &str = "gemini";
const DEFAULT_MIME_TYPE: &str = "image/png";

/// Image provider backed by Gemini's streaming `generateContent` endpoint.
pub struct GeminiImageProvider {
    client: reqwest::Client,
    config: GeminiClientConfig,
}

impl GeminiImageProvider {
    pub fn new(config: GeminiClientConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "Gemini client config api_key must not be empty".into(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build Gemini client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a provider using `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(GeminiClientConfig::from_env()?)
    }
}

#[async_trait::async_trait]
impl ImageProvider for GeminiImageProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(GEMINI_PROVIDER)
    }

    async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, ProviderError> {
        let provider_id = self.id();
        let response = self
            .client
            .post(self.config.stream_url())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&build_image_body(prompt))
            .send()
            .await
            .map_err(|e| {
                ProviderError::transport(provider_id.clone(), format!("Gemini request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                provider_id,
                format!("Gemini request failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }

        let mut bytes_stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();
        let mut latest: Option<GeneratedImage> = None;
        let mut chunks = 0usize;
        while let Some(chunk) = bytes_stream.next().await {
            let chunk = chunk.map_err(|e| {
                ProviderError::transport(
                    provider_id.clone(),
                    format!("Gemini streaming read failed: {e}"),
                )
            })?;
            for frame in decoder.push_chunk(&chunk) {
                chunks += 1;
                if let Some(image) = image_from_frame(&provider_id, &frame)? {
                    latest = Some(image);
                }
            }
        }
        if let Some(frame) = decoder.finish()
            && let Some(image) = image_from_frame(&provider_id, &frame)?
        {
            latest = Some(image);
        }

        debug!(
            provider = %provider_id,
            chunks,
            found = latest.is_some(),
            "Gemini image stream finished"
        );
        latest.ok_or_else(|| ProviderError::protocol(provider_id, "failed to generate image"))
    }
}

pub(crate) fn build_image_body(prompt: &str) -> serde_json::Value {
    serde_json::json!({
        "contents": [{
            "role": "user",
            "parts": [{ "text": prompt }]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"]
        }
    })
}

/// Returns the last inline image carried by one streamed response chunk.
fn image_from_frame(
    provider: &ProviderId,
    frame: &SseFrame,
) -> Result<Option<GeneratedImage>, ProviderError> {
    let data = frame.data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }
    let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
        ProviderError::protocol(provider.clone(), format!("invalid Gemini chunk: {e}"))
    })?;
    if let Some(message) = value
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
    {
        return Err(ProviderError::provider(provider.clone(), message, None));
    }

    let mut latest = None;
    let candidates = value
        .get("candidates")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten();
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten();
        for part in parts {
            let Some(inline) = part.get("inlineData").or_else(|| part.get("inline_data")) else {
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    debug!(provider = %provider, text, "Gemini text part");
                }
                continue;
            };
            let Some(data) = inline
                .get("data")
                .and_then(|v| v.as_str())
                .filter(|d| !d.is_empty())
            else {
                continue;
            };
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(|v| v.as_str())
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_MIME_TYPE);
            latest = Some(GeneratedImage {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            });
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::routing::post;

    fn frame(data: serde_json::Value) -> SseFrame {
        SseFrame {
            event: None,
            data: data.to_string(),
        }
    }

    #[test]
    fn body_requests_image_and_text_modalities() {
        let body = build_image_body("un dragón amable");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "un dragón amable");
        assert_eq!(
            body["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn inline_data_without_mime_defaults_to_png() {
        let provider = ProviderId::new(GEMINI_PROVIDER);
        let image = image_from_frame(
            &provider,
            &frame(serde_json::json!({
                "candidates": [{"content": {"parts": [
                    {"text": "here you go"},
                    {"inlineData": {"data": "AAAA"}}
                ]}}]
            })),
        )
        .expect("parse")
        .expect("image");
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data, "AAAA");
    }

    #[test]
    fn text_only_chunk_has_no_image() {
        let provider = ProviderId::new(GEMINI_PROVIDER);
        let image = image_from_frame(
            &provider,
            &frame(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "no image today"}]}}]
            })),
        )
        .expect("parse");
        assert!(image.is_none());
    }

    async fn spawn_fake_gemini(body: &'static str) -> String {
        let app = Router::new().route(
            "/v1beta/models/:model",
            post(move || async move {
                axum::response::Response::builder()
                    .status(axum::http::StatusCode::OK)
                    .header("content-type", "text/event-stream")
                    .body(axum::body::Body::from(body))
                    .unwrap()
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn last_inline_image_in_stream_wins() {
        let base_url = spawn_fake_gemini(concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"inlineData\":{\"mimeType\":\"image/jpeg\",\"data\":\"Zmlyc3Q=\"}}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"caption\"}]}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"inlineData\":{\"mimeType\":\"image/png\",\"data\":\"bGFzdA==\"}}]}}]}\r\n\r\n",
        ))
        .await;
        let provider =
            GeminiImageProvider::new(GeminiClientConfig::new("key").base_url(base_url))
                .expect("provider");

        let image = provider.generate_image("a turtle").await.expect("image");
        assert_eq!(
            image,
            GeneratedImage {
                mime_type: "image/png".into(),
                data: "bGFzdA==".into(),
            }
        );
    }

    #[tokio::test]
    async fn stream_without_image_is_protocol_error() {
        let base_url = spawn_fake_gemini(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"sorry\"}]}}]}\n\n",
        )
        .await;
        let provider =
            GeminiImageProvider::new(GeminiClientConfig::new("key").base_url(base_url))
                .expect("provider");

        let err = provider.generate_image("a turtle").await.expect_err("no image");
        assert!(matches!(err, ProviderError::Protocol { .. }));
        assert_eq!(err.message(), "failed to generate image");
    }
}
