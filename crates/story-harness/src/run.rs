use std::sync::Arc;

use futures::StreamExt as _;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::errors::HarnessError;
use crate::harness::HarnessInner;
use crate::model::{ProviderId, RunOptions};
use crate::provider::{ProviderEvent, ProviderSessionHandle, SessionRequest};
use crate::stream::UpstreamEvent;

const CANCELLED_MESSAGE: &str = "run cancelled";

/// Handle used to request cancellation of a running stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The run task stops reading upstream and drops the provider stream. A
    /// consumer still listening sees one terminal `UpstreamEvent::Error`.
    pub fn abort(&self) {
        let _ = self.tx.send(true);
    }
}

/// Builder for configuring and starting a single upstream run.
pub struct RunBuilder {
    harness: Arc<HarnessInner>,
    assistant_id: String,
    prompt: Option<String>,
    options: RunOptions,
}

impl RunBuilder {
    pub(crate) fn new(harness: Arc<HarnessInner>, assistant_id: String) -> Self {
        Self {
            harness,
            assistant_id,
            prompt: None,
            options: RunOptions::default(),
        }
    }

    /// Sets the user message posted to the new thread.
    ///
    /// A run carries exactly one user message; calling this again replaces it.
    pub fn user_text(mut self, text: impl Into<String>) -> Self {
        self.prompt = Some(text.into());
        self
    }

    /// Sets an optional per-request timeout for the upstream calls.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Sets the bounded stream buffer size used between the runtime task and
    /// the consumer.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.options.stream_buffer_capacity = capacity;
        self
    }

    /// Opens the upstream session and starts streaming.
    ///
    /// Thread creation, message submission and run start all complete before
    /// this returns; a failure in any of them is returned as
    /// `HarnessError::Provider` and no stream is created.
    pub async fn start_stream(self) -> Result<RunStream, HarnessError> {
        let harness = self.harness.clone();
        let request = self.validate_and_build_request()?;
        let provider = harness
            .text_provider()
            .ok_or(HarnessError::ProviderNotConfigured("text"))?;

        let run_id = request.run_id;
        let capacity = request.options.stream_buffer_capacity;
        let provider_id = provider.id();
        debug!(
            run_id = %run_id,
            provider = %provider_id,
            assistant_id = %request.assistant_id,
            "opening upstream session"
        );

        let handle = provider.open_session(request).await?;
        let thread_id = handle.thread_id.clone();
        debug!(run_id = %run_id, thread_id = %thread_id, "upstream session open");

        let (tx, rx) = mpsc::channel(capacity);
        let (abort_tx, abort_rx) = watch::channel(false);
        tokio::spawn(run_task(provider_id.clone(), run_id, handle, tx, abort_rx));

        Ok(RunStream {
            run_id,
            thread_id,
            provider: provider_id,
            rx,
            abort_handle: AbortHandle {
                tx: Arc::new(abort_tx),
            },
            saw_terminal: false,
        })
    }

    fn validate_and_build_request(self) -> Result<SessionRequest, HarnessError> {
        if self.assistant_id.trim().is_empty() {
            return Err(HarnessError::Validation(
                "assistant id must not be empty".into(),
            ));
        }
        if self.options.stream_buffer_capacity == 0 {
            return Err(HarnessError::Validation(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        let Some(prompt) = self.prompt else {
            return Err(HarnessError::Validation("a user message is required".into()));
        };
        if prompt.trim().is_empty() {
            return Err(HarnessError::Validation(
                "user message must not be empty".into(),
            ));
        }

        Ok(SessionRequest {
            run_id: uuid::Uuid::new_v4(),
            assistant_id: self.assistant_id,
            prompt,
            options: self.options,
        })
    }
}

/// Streaming handle returned by `RunBuilder::start_stream`.
///
/// Dropping the handle before the terminal event aborts the run and releases
/// the upstream connection.
pub struct RunStream {
    run_id: uuid::Uuid,
    thread_id: String,
    provider: ProviderId,
    rx: mpsc::Receiver<UpstreamEvent>,
    abort_handle: AbortHandle,
    saw_terminal: bool,
}

impl RunStream {
    /// Returns the local run id for this stream.
    pub fn run_id(&self) -> uuid::Uuid {
        self.run_id
    }

    /// Returns the upstream thread id.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Returns the provider serving this run.
    pub fn provider(&self) -> &ProviderId {
        &self.provider
    }

    /// Returns a handle that can cancel the run.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for and returns the next event.
    ///
    /// Returns `None` once the terminal event has been returned.
    pub async fn next_event(&mut self) -> Option<UpstreamEvent> {
        if self.saw_terminal {
            return None;
        }
        let event = self.rx.recv().await;
        match &event {
            Some(event) if event.is_terminal() => self.saw_terminal = true,
            Some(_) => {}
            None => self.saw_terminal = true,
        }
        event
    }

    /// Drains the run and returns the concatenated text output.
    pub async fn collect_text(mut self) -> Result<String, HarnessError> {
        let mut text = String::new();
        while let Some(event) = self.next_event().await {
            match event {
                UpstreamEvent::TextDelta { text: delta } => text.push_str(&delta),
                UpstreamEvent::End => return Ok(text),
                UpstreamEvent::Error { message } => return Err(HarnessError::RunFailed(message)),
                _ => {}
            }
        }
        Err(HarnessError::Protocol(format!(
            "run task ended without a terminal event (provider={}, thread={})",
            self.provider, self.thread_id
        )))
    }
}

impl Drop for RunStream {
    fn drop(&mut self) {
        if !self.saw_terminal {
            self.abort_handle.abort();
        }
    }
}

async fn run_task(
    provider_id: ProviderId,
    run_id: uuid::Uuid,
    mut handle: ProviderSessionHandle,
    tx: mpsc::Sender<UpstreamEvent>,
    mut abort_rx: watch::Receiver<bool>,
) {
    let thread_id = handle.thread_id.clone();
    let mut seq = 0_u64;
    loop {
        let next = tokio::select! {
            changed = abort_rx.changed() => {
                match changed {
                    Ok(()) if *abort_rx.borrow() => {
                        debug!(
                            run_id = %run_id,
                            thread_id = %thread_id,
                            "run aborted; releasing upstream session"
                        );
                        let _ = tx.try_send(UpstreamEvent::Error {
                            message: CANCELLED_MESSAGE.into(),
                        });
                        return;
                    }
                    Ok(()) => continue,
                    Err(_) => return,
                }
            }
            _ = tx.closed() => {
                debug!(
                    run_id = %run_id,
                    thread_id = %thread_id,
                    "run consumer dropped; releasing upstream session"
                );
                return;
            }
            next = handle.stream.next() => next,
        };

        let event = match next {
            Some(Ok(event)) => normalize_event(event),
            Some(Err(err)) => {
                debug!(
                    run_id = %run_id,
                    thread_id = %thread_id,
                    error = %err,
                    "provider stream failed"
                );
                UpstreamEvent::Error {
                    message: err.message().to_string(),
                }
            }
            None => UpstreamEvent::Error {
                message: format!("provider stream ended without completion ({provider_id})"),
            },
        };
        if let UpstreamEvent::TextDelta { .. } = &event {
            debug!(run_id = %run_id, thread_id = %thread_id, seq, "provider text delta");
            seq = seq.saturating_add(1);
        }

        let terminal = event.is_terminal();
        if tx.send(event).await.is_err() {
            debug!(run_id = %run_id, thread_id = %thread_id, "run consumer dropped during output");
            return;
        }
        if terminal {
            return;
        }
    }
}

fn normalize_event(event: ProviderEvent) -> UpstreamEvent {
    match event {
        ProviderEvent::TextCreated => UpstreamEvent::TextCreated,
        ProviderEvent::TextDelta { text } => UpstreamEvent::TextDelta { text },
        ProviderEvent::ToolCallCreated { tool } => UpstreamEvent::ToolCallCreated { tool },
        ProviderEvent::ToolCallDelta { delta } => UpstreamEvent::ToolCallDelta { delta },
        ProviderEvent::Completed => UpstreamEvent::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ProviderError;
    use crate::provider::ProviderAdapter;
    use crate::stream::ToolDelta;
    use futures::stream;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::task::Poll;
    use std::time::Duration;

    struct FakeProvider {
        calls: Arc<AtomicUsize>,
        behavior: FakeProviderBehavior,
    }

    enum FakeProviderBehavior {
        ImmediateError(ProviderError),
        Events(Vec<Result<ProviderEvent, ProviderError>>),
        Pending(Arc<AtomicBool>),
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl ProviderAdapter for FakeProvider {
        fn id(&self) -> ProviderId {
            ProviderId::new("fake")
        }

        async fn open_session(
            &self,
            _req: SessionRequest,
        ) -> Result<ProviderSessionHandle, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                FakeProviderBehavior::ImmediateError(err) => Err(err.clone()),
                FakeProviderBehavior::Events(events) => Ok(ProviderSessionHandle {
                    thread_id: "thread_fake".into(),
                    stream: Box::pin(stream::iter(events.clone())),
                }),
                FakeProviderBehavior::Pending(released) => {
                    let guard = DropFlag(released.clone());
                    Ok(ProviderSessionHandle {
                        thread_id: "thread_pending".into(),
                        stream: Box::pin(stream::poll_fn(move |_| {
                            let _held = &guard;
                            Poll::<Option<Result<ProviderEvent, ProviderError>>>::Pending
                        })),
                    })
                }
            }
        }
    }

    fn harness_with(behavior: FakeProviderBehavior) -> crate::Harness {
        crate::Harness::builder()
            .text_provider(Arc::new(FakeProvider {
                calls: Arc::new(AtomicUsize::new(0)),
                behavior,
            }))
            .build()
            .expect("build harness")
    }

    fn builder_with_fake_events(events: Vec<Result<ProviderEvent, ProviderError>>) -> RunBuilder {
        harness_with(FakeProviderBehavior::Events(events))
            .session(crate::SessionConfig::assistant("asst_test"))
            .run()
            .user_text("hello")
    }

    async fn wait_for(flag: &AtomicBool) -> bool {
        for _ in 0..100 {
            if flag.load(Ordering::SeqCst) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn validation_rejects_missing_and_blank_messages() {
        let harness = harness_with(FakeProviderBehavior::Events(vec![]));
        let session = harness.session(crate::SessionConfig::assistant("asst"));

        let missing = session.run().start_stream().await;
        assert!(matches!(missing, Err(HarnessError::Validation(msg)) if msg.contains("required")));

        let blank = session.run().user_text("   ").start_stream().await;
        assert!(matches!(blank, Err(HarnessError::Validation(msg)) if msg.contains("empty")));
    }

    #[tokio::test]
    async fn missing_text_provider_is_start_time_error() {
        let harness = crate::Harness::builder().build().expect("harness");
        let result = harness
            .session(crate::SessionConfig::assistant("asst"))
            .run()
            .user_text("hello")
            .start_stream()
            .await;
        assert!(matches!(
            result,
            Err(HarnessError::ProviderNotConfigured("text"))
        ));
    }

    #[tokio::test]
    async fn session_setup_failure_returns_error_without_stream() {
        let calls = Arc::new(AtomicUsize::new(0));
        let harness = crate::Harness::builder()
            .text_provider(Arc::new(FakeProvider {
                calls: calls.clone(),
                behavior: FakeProviderBehavior::ImmediateError(ProviderError::provider(
                    "fake",
                    "thread create failed",
                    Some(401),
                )),
            }))
            .build()
            .expect("harness");
        let result = harness
            .session(crate::SessionConfig::assistant("asst"))
            .run()
            .user_text("hello")
            .start_stream()
            .await;
        assert!(matches!(result, Err(HarnessError::Provider(ProviderError::Provider { .. }))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn forwards_events_in_order_and_stops_after_end() {
        let mut run = builder_with_fake_events(vec![
            Ok(ProviderEvent::TextCreated),
            Ok(ProviderEvent::TextDelta { text: "a".into() }),
            Ok(ProviderEvent::ToolCallCreated {
                tool: "code_interpreter".into(),
            }),
            Ok(ProviderEvent::ToolCallDelta {
                delta: ToolDelta::Logs("42".into()),
            }),
            Ok(ProviderEvent::TextDelta { text: "b".into() }),
            Ok(ProviderEvent::Completed),
            Ok(ProviderEvent::TextDelta {
                text: "after end".into(),
            }),
        ])
        .start_stream()
        .await
        .expect("start");
        assert_eq!(run.thread_id(), "thread_fake");

        let mut events = Vec::new();
        while let Some(event) = run.next_event().await {
            events.push(event);
        }
        assert_eq!(
            events,
            vec![
                UpstreamEvent::TextCreated,
                UpstreamEvent::TextDelta { text: "a".into() },
                UpstreamEvent::ToolCallCreated {
                    tool: "code_interpreter".into()
                },
                UpstreamEvent::ToolCallDelta {
                    delta: ToolDelta::Logs("42".into())
                },
                UpstreamEvent::TextDelta { text: "b".into() },
                UpstreamEvent::End,
            ]
        );
        assert_eq!(run.next_event().await, None);
    }

    #[tokio::test]
    async fn collect_text_concatenates_deltas() {
        let text = builder_with_fake_events(vec![
            Ok(ProviderEvent::TextDelta { text: "Ho".into() }),
            Ok(ProviderEvent::TextDelta { text: "la".into() }),
            Ok(ProviderEvent::Completed),
        ])
        .start_stream()
        .await
        .expect("start")
        .collect_text()
        .await
        .expect("text");
        assert_eq!(text, "Hola");
    }

    #[tokio::test]
    async fn provider_stream_error_becomes_single_terminal_error() {
        let mut run = builder_with_fake_events(vec![
            Ok(ProviderEvent::TextDelta { text: "a".into() }),
            Err(ProviderError::provider("fake", "boom", Some(500))),
            Ok(ProviderEvent::Completed),
        ])
        .start_stream()
        .await
        .expect("start");

        assert!(matches!(
            run.next_event().await,
            Some(UpstreamEvent::TextDelta { .. })
        ));
        assert_eq!(
            run.next_event().await,
            Some(UpstreamEvent::Error {
                message: "boom".into()
            })
        );
        assert_eq!(run.next_event().await, None);
    }

    #[tokio::test]
    async fn stream_ending_without_completion_is_an_error() {
        let result = builder_with_fake_events(vec![Ok(ProviderEvent::TextDelta {
            text: "a".into(),
        })])
        .start_stream()
        .await
        .expect("start")
        .collect_text()
        .await;
        assert!(matches!(
            result,
            Err(HarnessError::RunFailed(msg)) if msg.contains("without completion")
        ));
    }

    #[tokio::test]
    async fn abort_emits_cancelled_error_and_releases_upstream() {
        let released = Arc::new(AtomicBool::new(false));
        let mut run = harness_with(FakeProviderBehavior::Pending(released.clone()))
            .session(crate::SessionConfig::assistant("asst"))
            .run()
            .user_text("hello")
            .start_stream()
            .await
            .expect("start");

        run.abort_handle().abort();
        assert_eq!(
            run.next_event().await,
            Some(UpstreamEvent::Error {
                message: CANCELLED_MESSAGE.into()
            })
        );
        assert!(wait_for(&released).await, "upstream stream was not dropped");
    }

    #[tokio::test]
    async fn dropping_run_stream_releases_upstream() {
        let released = Arc::new(AtomicBool::new(false));
        let run = harness_with(FakeProviderBehavior::Pending(released.clone()))
            .session(crate::SessionConfig::assistant("asst"))
            .run()
            .user_text("hello")
            .start_stream()
            .await
            .expect("start");
        assert!(!released.load(Ordering::SeqCst));

        drop(run);
        assert!(wait_for(&released).await, "upstream stream was not dropped");
    }
}
