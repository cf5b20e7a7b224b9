//! Upstream generation sessions behind a builder-first async API.
//!
//! A [`Harness`] is built once per process and cloned into every request. It
//! owns at most one text provider (an assistant that streams a story for a
//! thread) and one image provider. Vendor-specific APIs are namespaced under
//! `vendors::*`.
//!
//! # Streaming a story (OpenAI Assistants)
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use story_harness::prelude::*;
//! use story_harness::vendors::openai::OpenAiAssistantsProvider;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), HarnessError> {
//! let harness = Harness::builder()
//!     .text_provider(Arc::new(OpenAiAssistantsProvider::from_env()?))
//!     .build()?;
//!
//! let mut run = harness
//!     .session(SessionConfig::assistant("asst_123"))
//!     .run()
//!     .user_text("Tell a short story about a brave turtle")
//!     .start_stream()
//!     .await?;
//!
//! while let Some(event) = run.next_event().await {
//!     if let UpstreamEvent::TextDelta { text } = event {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Public error types used by the harness API.
pub mod errors;
/// Harness entry point and builder.
pub mod harness;
/// Image provider contract and generated image payloads.
pub mod image;
/// Provider identifiers and generic run options.
pub mod model;
/// Common imports for typical usage.
pub mod prelude;
/// Provider adapter contracts used by vendor integrations.
pub mod provider;
/// Run builder, streaming handle, and cancellation handle.
pub mod run;
/// Session configuration and session handle.
pub mod session;
/// Normalized public stream events.
pub mod stream;
/// Vendor-specific integrations.
pub mod vendors;

pub use errors::{HarnessError, ProviderError};
pub use harness::{Harness, HarnessBuilder};
pub use image::{GeneratedImage, ImageProvider};
pub use model::{ProviderId, RunOptions};
pub use provider::{ProviderAdapter, ProviderEvent, ProviderSessionHandle, SessionRequest};
pub use run::{AbortHandle, RunBuilder, RunStream};
pub use session::{Session, SessionConfig};
pub use stream::{ToolDelta, UpstreamEvent};
