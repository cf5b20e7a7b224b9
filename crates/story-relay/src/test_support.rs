use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;
use std::time::Duration;

use futures::stream;
use story_harness::{
    GeneratedImage, Harness, ImageProvider, ProviderAdapter, ProviderError, ProviderEvent,
    ProviderId, ProviderSessionHandle, SessionRequest, ToolDelta,
};

pub(crate) enum FakeText {
    Events(Vec<Result<ProviderEvent, ProviderError>>),
    SetupFails,
    Pending(Arc<AtomicBool>),
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for FakeText {
    fn id(&self) -> ProviderId {
        ProviderId::new("fake")
    }

    async fn open_session(
        &self,
        _req: SessionRequest,
    ) -> Result<ProviderSessionHandle, ProviderError> {
        match self {
            FakeText::Events(events) => Ok(ProviderSessionHandle {
                thread_id: "thread_fake".into(),
                stream: Box::pin(stream::iter(events.clone())),
            }),
            FakeText::SetupFails => Err(ProviderError::provider(
                "fake",
                "thread create failed with status 401",
                Some(401),
            )),
            FakeText::Pending(released) => {
                let guard = DropFlag(released.clone());
                let mut announced = false;
                Ok(ProviderSessionHandle {
                    thread_id: "thread_pending".into(),
                    stream: Box::pin(stream::poll_fn(move |_| {
                        let _held = &guard;
                        if announced {
                            Poll::<Option<Result<ProviderEvent, ProviderError>>>::Pending
                        } else {
                            announced = true;
                            Poll::Ready(Some(Ok(ProviderEvent::TextCreated)))
                        }
                    })),
                })
            }
        }
    }
}

pub(crate) enum FakeImage {
    Returns(GeneratedImage),
    Fails,
}

#[async_trait::async_trait]
impl ImageProvider for FakeImage {
    fn id(&self) -> ProviderId {
        ProviderId::new("fake-image")
    }

    async fn generate_image(&self, _prompt: &str) -> Result<GeneratedImage, ProviderError> {
        match self {
            FakeImage::Returns(image) => Ok(image.clone()),
            FakeImage::Fails => Err(ProviderError::protocol(
                "fake-image",
                "failed to generate image",
            )),
        }
    }
}

/// Events of a short story run with one code interpreter call.
pub(crate) fn story_events() -> Vec<Result<ProviderEvent, ProviderError>> {
    vec![
        Ok(ProviderEvent::TextCreated),
        Ok(ProviderEvent::TextDelta {
            text: "{\"title\":\"T\",".into(),
        }),
        Ok(ProviderEvent::ToolCallCreated {
            tool: "code_interpreter".into(),
        }),
        Ok(ProviderEvent::ToolCallDelta {
            delta: ToolDelta::Input("print(1)".into()),
        }),
        Ok(ProviderEvent::ToolCallDelta {
            delta: ToolDelta::Logs("1\n".into()),
        }),
        Ok(ProviderEvent::TextDelta {
            text: "\"history\": \"Hola\"}".into(),
        }),
        Ok(ProviderEvent::Completed),
    ]
}

pub(crate) fn harness(text: Option<FakeText>, image: Option<FakeImage>) -> Harness {
    let mut builder = Harness::builder();
    if let Some(text) = text {
        builder = builder.text_provider(Arc::new(text));
    }
    if let Some(image) = image {
        builder = builder.image_provider(Arc::new(image));
    }
    builder.build().expect("build harness")
}

pub(crate) async fn wait_for(flag: &AtomicBool) -> bool {
    for _ in 0..100 {
        if flag.load(Ordering::SeqCst) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
