use std::time::Duration;

use futures::StreamExt as _;
use story_protocol::{
    ImageRequest, ImageResponse, ImageSource, OutboundMessage, SseDecoder, SseFrame,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::extractor::{ExtractError, Extractor, ExtractorState, ExtractorUpdate};
use crate::story::StoryResult;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid relay url: {0}")]
    InvalidUrl(String),
    #[error("request to relay failed: {0}")]
    Transport(String),
    /// The relay answered with a non-success status before streaming.
    #[error("relay rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error("image unavailable: {0}")]
    Image(String),
}

/// Outcome of one story submission.
#[derive(Clone, Debug)]
pub struct StorySession {
    pub thread_id: Option<String>,
    pub story: StoryResult,
    /// `None` when no image was requested or the request failed.
    pub image: Option<ImageSource>,
}

/// HTTP client for a running story relay.
#[derive(Clone, Debug)]
pub struct StoryClient {
    http: reqwest::Client,
    base_url: String,
}

impl StoryClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::InvalidUrl(base_url));
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Submits `prompt`, follows the stream and returns the finished story.
    ///
    /// `on_update` sees every extractor update in order. The illustration is
    /// requested in the background as soon as the story completes; its failure
    /// only leaves `image` empty.
    pub async fn stream_story<F>(
        &self,
        prompt: &str,
        mut on_update: F,
    ) -> Result<StorySession, ClientError>
    where
        F: FnMut(&ExtractorUpdate),
    {
        let response = self
            .http
            .post(format!("{}/api/openai/message", self.base_url))
            .json(&serde_json::json!({ "content": prompt }))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(ToOwned::to_owned))
                .unwrap_or_else(|| status.to_string());
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let mut extractor = Extractor::new();
        let mut image_task: Option<JoinHandle<Result<ImageSource, ClientError>>> = None;
        let mut decoder = SseDecoder::default();
        let mut bytes_stream = response.bytes_stream();

        let mut dispatch = |frame: &SseFrame, extractor: &mut Extractor| {
            let message = match OutboundMessage::from_frame(frame) {
                Ok(Some(message)) => message,
                Ok(None) => return,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable relay frame");
                    return;
                }
            };
            for update in extractor.handle(message) {
                if let ExtractorUpdate::ImageRequested(image_prompt) = &update
                    && image_task.is_none()
                {
                    let client = self.clone();
                    let image_prompt = image_prompt.clone();
                    image_task = Some(tokio::spawn(async move {
                        client.request_image(&image_prompt).await
                    }));
                }
                on_update(&update);
            }
        };

        while !extractor.state().is_terminal() {
            let Some(chunk) = bytes_stream.next().await else {
                break;
            };
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(error = %e, "relay stream read failed");
                    break;
                }
            };
            for frame in decoder.push_chunk(&chunk) {
                dispatch(&frame, &mut extractor);
            }
        }
        if !extractor.state().is_terminal()
            && let Some(frame) = decoder.finish()
        {
            dispatch(&frame, &mut extractor);
        }
        drop(dispatch);
        for update in extractor.close() {
            on_update(&update);
        }

        match extractor.state() {
            ExtractorState::Completed => {}
            _ => {
                let error = extractor
                    .error()
                    .cloned()
                    .unwrap_or(ExtractError::Interrupted);
                return Err(ClientError::Extract(error));
            }
        }
        let story = extractor
            .story()
            .cloned()
            .ok_or(ClientError::Extract(ExtractError::Interrupted))?;

        let image = match image_task {
            Some(task) => match task.await {
                Ok(Ok(source)) => Some(source),
                Ok(Err(e)) => {
                    warn!(error = %e, "illustration request failed");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "illustration task did not finish");
                    None
                }
            },
            None => None,
        };
        info!(
            thread_id = ?extractor.thread_id(),
            title = %story.title,
            has_image = image.is_some(),
            "story session finished"
        );

        Ok(StorySession {
            thread_id: extractor.thread_id().map(ToOwned::to_owned),
            story,
            image,
        })
    }

    /// Requests one illustration and converts either reply shape to a source.
    pub async fn request_image(&self, prompt: &str) -> Result<ImageSource, ClientError> {
        debug!(prompt, "requesting illustration");
        let response = self
            .http
            .post(format!("{}/api/gemini/image", self.base_url))
            .json(&ImageRequest::new(prompt))
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let reply: ImageResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Image(format!("unreadable reply ({status}): {e}")))?;
        let source = reply
            .into_source()
            .map_err(|e| ClientError::Image(e.to_string()))?;
        Ok(match source {
            ImageSource::Path(path) if path.starts_with('/') => {
                ImageSource::Path(format!("{}{path}", self.base_url))
            }
            other => other,
        })
    }
}
