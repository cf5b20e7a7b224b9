//! OpenAI Assistants integration.
//!
//! A session is one thread with a single user message and one streaming
//! run against a preconfigured assistant.
mod adapter;
mod config;
pub(crate) mod transport;

pub use adapter::OpenAiAssistantsProvider;
pub use config::OpenAiClientConfig;
