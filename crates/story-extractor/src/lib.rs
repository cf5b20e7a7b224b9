//! Client side of the story relay.
//!
//! [`Extractor`] turns the relay's message sequence into a live partial view
//! of the story text and, once the stream is done, one parsed [`StoryResult`].
//! [`StoryClient`] drives it over HTTP and requests the illustration.

/// HTTP client for the relay.
pub mod client;
/// Stream state machine and its updates.
pub mod extractor;
/// Best-effort view of the story text while it is still streaming.
pub mod projection;
/// Story prompt construction.
pub mod prompt;
/// The finished story.
pub mod story;

pub use client::{ClientError, StoryClient, StorySession};
pub use extractor::{
    ExtractError, Extractor, ExtractorState, ExtractorUpdate, ImageTrigger, ToolActivity,
};
pub use projection::{HISTORY_MARKER, display_partial, project_history};
pub use prompt::{Theme, ThemeError, story_prompt};
pub use story::StoryResult;
