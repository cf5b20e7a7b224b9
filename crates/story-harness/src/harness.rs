use std::sync::Arc;

use tracing::debug;

use crate::errors::HarnessError;
use crate::image::{GeneratedImage, ImageProvider};
use crate::provider::ProviderAdapter;
use crate::session::{Session, SessionConfig};

pub(crate) struct HarnessInner {
    text: Option<Arc<dyn ProviderAdapter>>,
    image: Option<Arc<dyn ImageProvider>>,
}

impl HarnessInner {
    pub(crate) fn text_provider(&self) -> Option<Arc<dyn ProviderAdapter>> {
        self.text.clone()
    }
}

/// Entry point for creating sessions and generating images.
///
/// Cloning is cheap; every clone shares the same provider clients, which are
/// safe to use from concurrent requests.
#[derive(Clone)]
pub struct Harness {
    pub(crate) inner: Arc<HarnessInner>,
}

impl Harness {
    /// Starts a builder for registering providers and creating a `Harness`.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Creates a session handle bound to one upstream assistant.
    pub fn session(&self, config: SessionConfig) -> Session {
        Session::new(self.inner.clone(), config)
    }

    /// Returns true when a text provider was registered.
    pub fn has_text_provider(&self) -> bool {
        self.inner.text.is_some()
    }

    /// Returns true when an image provider was registered.
    pub fn has_image_provider(&self) -> bool {
        self.inner.image.is_some()
    }

    /// Generates one image for `prompt`.
    pub async fn generate_image(&self, prompt: &str) -> Result<GeneratedImage, HarnessError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(HarnessError::Validation(
                "image prompt must not be empty".into(),
            ));
        }
        let provider = self
            .inner
            .image
            .clone()
            .ok_or(HarnessError::ProviderNotConfigured("image"))?;
        debug!(provider = %provider.id(), "generating image");
        Ok(provider.generate_image(prompt).await?)
    }
}

/// Builder used to register provider adapters before creating a `Harness`.
#[derive(Default)]
pub struct HarnessBuilder {
    text: Vec<Arc<dyn ProviderAdapter>>,
    image: Vec<Arc<dyn ImageProvider>>,
}

impl HarnessBuilder {
    /// Registers the streaming text provider.
    pub fn text_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.text.push(provider);
        self
    }

    /// Registers the image provider.
    pub fn image_provider(mut self, provider: Arc<dyn ImageProvider>) -> Self {
        self.image.push(provider);
        self
    }

    /// Builds the harness, rejecting more than one provider of a kind.
    pub fn build(mut self) -> Result<Harness, HarnessError> {
        if self.text.len() > 1 {
            return Err(HarnessError::Config(format!(
                "duplicate text provider registration: {}",
                self.text[1].id()
            )));
        }
        if self.image.len() > 1 {
            return Err(HarnessError::Config(format!(
                "duplicate image provider registration: {}",
                self.image[1].id()
            )));
        }
        Ok(Harness {
            inner: Arc::new(HarnessInner {
                text: self.text.pop(),
                image: self.image.pop(),
            }),
        })
    }
}
