//! Google Gemini image generation over the streaming `generateContent` API.
mod adapter;
mod config;

pub use adapter::GeminiImageProvider;
pub use config::GeminiClientConfig;
