use crate::model::ProviderId;

/// Failure reported by a vendor adapter, either while opening a session or
/// as an `Err` item of its event stream.
///
/// Only [`ProviderError::message`] crosses into the public run stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The vendor answered, but with a failure (non-2xx status, failed run).
    #[error("{provider} rejected the request: {message}")]
    Provider {
        provider: ProviderId,
        message: String,
        status_code: Option<u16>,
    },
    /// The connection or the streamed body broke.
    #[error("{provider} connection failed: {message}")]
    Transport {
        provider: ProviderId,
        message: String,
    },
    /// The vendor sent something this adapter cannot interpret.
    #[error("{provider} sent an unexpected response: {message}")]
    Protocol {
        provider: ProviderId,
        message: String,
    },
}

impl ProviderError {
    pub fn provider(
        provider: impl Into<ProviderId>,
        message: impl Into<String>,
        status_code: Option<u16>,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
        }
    }

    pub fn transport(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Transport {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn protocol(provider: impl Into<ProviderId>, message: impl Into<String>) -> Self {
        Self::Protocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Provider { provider, .. }
            | Self::Transport { provider, .. }
            | Self::Protocol { provider, .. } => provider,
        }
    }

    /// HTTP status of a rejected request, when there was one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Provider { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// The bare message, without the provider prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Provider { message, .. }
            | Self::Transport { message, .. }
            | Self::Protocol { message, .. } => message,
        }
    }
}

/// Errors returned by the harness API before a run stream exists.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HarnessError {
    /// Invalid harness/provider configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Invalid user input to the builder API.
    #[error("validation error: {0}")]
    Validation(String),
    /// No provider of the requested kind was registered.
    #[error("{0} provider not configured")]
    ProviderNotConfigured(&'static str),
    /// Provider failed before the run stream was established.
    #[error(transparent)]
    Provider(ProviderError),
    /// A started run ended with an `Error` event.
    #[error("run failed: {0}")]
    RunFailed(String),
    /// Internal protocol misuse or invariant violation.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<ProviderError> for HarnessError {
    fn from(value: ProviderError) -> Self {
        HarnessError::Provider(value)
    }
}
