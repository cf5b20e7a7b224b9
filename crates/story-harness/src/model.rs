use std::fmt;
use std::time::Duration;

/// Stable identifier for a provider implementation (for example `openai`).
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ProviderId(pub String);

impl ProviderId {
    /// Creates a provider id from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the provider id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ProviderId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Generic run behavior options.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RunOptions {
    /// Optional per-request timeout applied to the upstream calls.
    pub timeout: Option<Duration>,
    /// Bounded event buffer size used by the streaming channel.
    pub stream_buffer_capacity: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            stream_buffer_capacity: 128,
        }
    }
}
