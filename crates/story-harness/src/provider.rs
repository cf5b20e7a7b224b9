use std::pin::Pin;

use crate::errors::ProviderError;
use crate::model::{ProviderId, RunOptions};
use crate::stream::ToolDelta;

/// Boxed provider event stream.
pub type ProviderEventStream =
    Pin<Box<dyn futures::Stream<Item = Result<ProviderEvent, ProviderError>> + Send + 'static>>;

/// Events a provider adapter yields after the session is open.
///
/// Failures travel as `Err` items; `Completed` is the only success terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProviderEvent {
    TextCreated,
    TextDelta { text: String },
    ToolCallCreated { tool: String },
    ToolCallDelta { delta: ToolDelta },
    Completed,
}

/// Everything an adapter needs to open one upstream session.
#[derive(Clone, Debug)]
pub struct SessionRequest {
    /// Local correlation id used in logs.
    pub run_id: uuid::Uuid,
    /// Upstream assistant that runs on the new thread.
    pub assistant_id: String,
    /// The single user message posted to the thread.
    pub prompt: String,
    pub options: RunOptions,
}

/// Open upstream session returned by `ProviderAdapter::open_session`.
pub struct ProviderSessionHandle {
    /// Upstream thread id. Immutable for the life of the session.
    pub thread_id: String,
    /// Run events in upstream emission order. Dropping it releases the
    /// upstream connection.
    pub stream: ProviderEventStream,
}

/// Contract implemented by streaming text vendors.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider id used in logs and errors.
    fn id(&self) -> ProviderId;

    /// Creates a thread, posts the user message and starts a streaming run.
    ///
    /// Any failure before the event stream exists is returned here.
    async fn open_session(
        &self,
        req: SessionRequest,
    ) -> Result<ProviderSessionHandle, ProviderError>;
}
