use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt as _;
use futures::stream;
use story_protocol::SseDecoder;
use tracing::debug;

use crate::ProviderId;
use crate::errors::{HarnessError, ProviderError};
use crate::provider::{
    ProviderAdapter, ProviderEvent, ProviderEventStream, ProviderSessionHandle, SessionRequest,
};

use super::config::OpenAiClientConfig;
use super::transport::AssistantsEventMapper;

const OPENAI_PROVIDER: &str = "openai";

type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static>>;

/// Provider adapter for OpenAI's Assistants API (threads and streaming runs).
pub struct OpenAiAssistantsProvider {
    client: reqwest::Client,
    config: OpenAiClientConfig,
}

impl OpenAiAssistantsProvider {
    /// Creates a provider from explicit client configuration.
    pub fn new(config: OpenAiClientConfig) -> Result<Self, HarnessError> {
        if config.api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "OpenAI client config api_key must not be empty".into(),
            ));
        }
        // Total time is bounded per setup call and per streamed chunk, never client-wide.
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| HarnessError::Config(format!("failed to build OpenAI client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a provider using `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        Self::new(OpenAiClientConfig::from_env()?)
    }

    async fn post(
        &self,
        url: String,
        body: serde_json::Value,
        timeout: Option<Duration>,
        step: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let provider_id = ProviderId::new(OPENAI_PROVIDER);
        let mut http_req = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(&body);
        if let Some(timeout) = timeout {
            http_req = http_req.timeout(timeout);
        }

        let response = http_req.send().await.map_err(|e| {
            ProviderError::transport(provider_id.clone(), format!("OpenAI {step} failed: {e}"))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ProviderError::provider(
                provider_id,
                format!("OpenAI {step} failed with status {status}: {body}"),
                Some(status.as_u16()),
            ));
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for OpenAiAssistantsProvider {
    fn id(&self) -> ProviderId {
        ProviderId::new(OPENAI_PROVIDER)
    }

    async fn open_session(
        &self,
        req: SessionRequest,
    ) -> Result<ProviderSessionHandle, ProviderError> {
        let provider_id = ProviderId::new(OPENAI_PROVIDER);
        let timeout = req.options.timeout.unwrap_or(self.config.timeout);

        let thread: serde_json::Value = self
            .post(
                self.config.threads_url(),
                serde_json::json!({}),
                Some(timeout),
                "thread create",
            )
            .await?
            .json()
            .await
            .map_err(|e| {
                ProviderError::protocol(provider_id.clone(), format!("invalid thread object: {e}"))
            })?;
        let thread_id = thread
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::protocol(provider_id.clone(), "thread object has no id"))?
            .to_string();
        debug!(run_id = %req.run_id, thread_id = %thread_id, "OpenAI thread created");

        self.post(
            self.config.messages_url(&thread_id),
            build_message_body(&req),
            Some(timeout),
            "message create",
        )
        .await?;

        // Only the response headers are bounded here; the body is bounded per chunk.
        let response = tokio::time::timeout(
            timeout,
            self.post(
                self.config.runs_url(&thread_id),
                build_run_body(&req),
                None,
                "run stream",
            ),
        )
        .await
        .map_err(|_| {
            ProviderError::transport(
                provider_id.clone(),
                format!("OpenAI run stream did not start within {timeout:?}"),
            )
        })??;
        debug!(run_id = %req.run_id, thread_id = %thread_id, "OpenAI run stream started");

        let bytes_stream: ByteStream = Box::pin(response.bytes_stream());
        Ok(ProviderSessionHandle {
            thread_id,
            stream: assistants_event_stream(
                provider_id,
                bytes_stream,
                self.config.stream_idle_timeout,
            ),
        })
    }
}

pub(crate) fn build_message_body(req: &SessionRequest) -> serde_json::Value {
    serde_json::json!({
        "role": "user",
        "content": req.prompt,
    })
}

pub(crate) fn build_run_body(req: &SessionRequest) -> serde_json::Value {
    serde_json::json!({
        "assistant_id": req.assistant_id,
        "stream": true,
    })
}

fn assistants_event_stream(
    provider_id: ProviderId,
    bytes_stream: ByteStream,
    idle_timeout: Duration,
) -> ProviderEventStream {
    struct State {
        provider_id: ProviderId,
        bytes_stream: ByteStream,
        idle_timeout: Duration,
        decoder: SseDecoder,
        mapper: AssistantsEventMapper,
        pending: VecDeque<ProviderEvent>,
        done: bool,
    }

    Box::pin(stream::try_unfold(
        State {
            provider_id,
            bytes_stream,
            idle_timeout,
            decoder: SseDecoder::default(),
            mapper: AssistantsEventMapper::default(),
            pending: VecDeque::new(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.pending.pop_front() {
                    return Ok(Some((event, state)));
                }
                if state.done {
                    return Ok(None);
                }

                let next = tokio::time::timeout(state.idle_timeout, state.bytes_stream.next())
                    .await
                    .map_err(|_| {
                        ProviderError::transport(
                            state.provider_id.clone(),
                            format!("OpenAI stream idle for {:?}", state.idle_timeout),
                        )
                    })?;
                match next {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push_chunk(&chunk) {
                            let events = state.mapper.map_frame(&state.provider_id, &frame)?;
                            state.pending.extend(events);
                        }
                    }
                    Some(Err(e)) => {
                        return Err(ProviderError::transport(
                            state.provider_id,
                            format!("OpenAI streaming read failed: {e}"),
                        ));
                    }
                    None => {
                        state.done = true;
                    }
                }
            }
        },
    ))
}
