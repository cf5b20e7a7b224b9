use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use story_harness::vendors::gemini::{GeminiClientConfig, GeminiImageProvider};
use story_harness::vendors::openai::{OpenAiAssistantsProvider, OpenAiClientConfig};
use story_harness::{Harness, HarnessError};
use tracing::{error, warn};

const DEFAULT_STREAM_BUFFER: usize = 128;

/// Load `.env` files into the process environment.
///
/// The crate-local file is read first so it wins over the working directory's.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

/// Relay settings, read once at startup.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub bind_addr: SocketAddr,
    /// Assistant that runs on every new thread.
    pub assistant_id: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: Option<String>,
    pub gemini_base_url: Option<String>,
    /// When set, generated images are written here and replies carry a path.
    pub image_dir: Option<PathBuf>,
    /// Capacity of the per-run event channel.
    pub stream_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            assistant_id: None,
            openai_api_key: None,
            openai_base_url: None,
            gemini_api_key: None,
            gemini_model: None,
            gemini_base_url: None,
            image_dir: None,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }
}

impl RelayConfig {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            bind_addr: parse_or(
                "STORY_BIND_ADDR",
                get("STORY_BIND_ADDR"),
                default_bind_addr(),
            ),
            assistant_id: get("OPENAI_ASSISTANT_ID"),
            openai_api_key: get("OPENAI_API_KEY"),
            openai_base_url: get("OPENAI_BASE_URL"),
            gemini_api_key: get("GEMINI_API_KEY"),
            gemini_model: get("GEMINI_MODEL"),
            gemini_base_url: get("GEMINI_BASE_URL"),
            image_dir: get("STORY_IMAGE_DIR").map(PathBuf::from),
            stream_buffer: parse_or(
                "STORY_STREAM_BUFFER",
                get("STORY_STREAM_BUFFER"),
                DEFAULT_STREAM_BUFFER,
            )
            .max(1),
        }
    }

    /// Builds the shared harness from the configured credentials.
    ///
    /// A missing key leaves that provider unregistered; the matching route then
    /// answers with a configuration error instead of failing startup.
    pub fn build_harness(&self) -> Result<Harness, HarnessError> {
        let mut builder = Harness::builder();

        match &self.openai_api_key {
            Some(key) => {
                let mut config = OpenAiClientConfig::new(key.clone());
                if let Some(base_url) = &self.openai_base_url {
                    config = config.base_url(base_url.clone());
                }
                builder = builder.text_provider(Arc::new(OpenAiAssistantsProvider::new(config)?));
            }
            None => warn!("OPENAI_API_KEY is not set; story streaming is disabled"),
        }

        match &self.gemini_api_key {
            Some(key) => {
                let mut config = GeminiClientConfig::new(key.clone());
                if let Some(model) = &self.gemini_model {
                    config = config.model(model.clone());
                }
                if let Some(base_url) = &self.gemini_base_url {
                    config = config.base_url(base_url.clone());
                }
                builder = builder.image_provider(Arc::new(GeminiImageProvider::new(config)?));
            }
            None => warn!("GEMINI_API_KEY is not set; image generation is disabled"),
        }

        builder.build()
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3000))
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => match value.parse() {
            Ok(parsed) => parsed,
            Err(_) => {
                error!("Error parsing {}", key);
                default
            }
        },
        None => default,
    }
}
