use std::time::Duration;

use crate::errors::HarnessError;

/// Configuration for the OpenAI Assistants client.
#[derive(Clone, Debug)]
pub struct OpenAiClientConfig {
    /// API key used for bearer auth.
    pub api_key: String,
    /// Base URL for the OpenAI-compatible endpoint.
    ///
    /// Useful for proxies or local test servers.
    pub base_url: String,
    /// Timeout for connecting and for each setup call (thread, message, run headers).
    pub timeout: Duration,
    /// Longest gap allowed between two chunks of a streamed run.
    pub stream_idle_timeout: Duration,
}

impl OpenAiClientConfig {
    /// Creates a config with sensible defaults and a provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".to_string(),
            timeout: Duration::from_secs(120),
            stream_idle_timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, HarnessError> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "missing OPENAI_API_KEY for OpenAI provider".into(),
            ));
        }
        Ok(Self::new(api_key))
    }

    /// Overrides the API base URL (for proxies or test servers).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the setup timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the idle timeout of a streamed run.
    pub fn stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    fn api_root(&self) -> String {
        format!("{}/v1", self.base_url.trim_end_matches('/'))
    }

    pub(crate) fn threads_url(&self) -> String {
        format!("{}/threads", self.api_root())
    }

    pub(crate) fn messages_url(&self, thread_id: &str) -> String {
        format!("{}/threads/{thread_id}/messages", self.api_root())
    }

    pub(crate) fn runs_url(&self, thread_id: &str) -> String {
        format!("{}/threads/{thread_id}/runs", self.api_root())
    }
}
