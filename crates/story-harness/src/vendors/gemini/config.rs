use std::time::Duration;

use crate::errors::HarnessError;

/// Image-capable model used when `GEMINI_MODEL` is unset.
pub const DEFAULT_GEMINI_IMAGE_MODEL: &str = "gemini-2.0-flash-exp-image-generation";

/// Configuration for the Gemini image client.
#[derive(Clone, Debug)]
pub struct GeminiClientConfig {
    /// API key sent as `x-goog-api-key`.
    pub api_key: String,
    pub model: String,
    /// Base URL for the Generative Language API.
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_IMAGE_MODEL.to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Builds a config from `GEMINI_API_KEY`, with optional `GEMINI_MODEL`
    /// and `GEMINI_BASE_URL` overrides.
    pub fn from_env() -> Result<Self, HarnessError> {
        let api_key = std::env::var("GEMINI_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(HarnessError::Config(
                "missing GEMINI_API_KEY for Gemini provider".into(),
            ));
        }
        let mut config = Self::new(api_key);
        if let Some(model) = non_empty_env("GEMINI_MODEL") {
            config.model = model;
        }
        if let Some(base_url) = non_empty_env("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub(crate) fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_targets_model_with_sse() {
        let config = GeminiClientConfig::new("key").base_url("http://127.0.0.1:8080/");
        assert_eq!(
            config.stream_url(),
            "http://127.0.0.1:8080/v1beta/models/gemini-2.0-flash-exp-image-generation:streamGenerateContent?alt=sse"
        );
    }
}
