use story_protocol::OutboundMessage;
use tracing::{debug, warn};

use crate::projection::project_history;
use crate::story::StoryResult;

/// Shown to the reader when a stream cannot be turned into a story.
pub const RETRY_MESSAGE: &str = "Hubo un error al generar tu cuento. Por favor, intenta de nuevo.";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    /// The relay reported an upstream failure.
    #[error("story stream failed: {0}")]
    Stream(String),
    /// The stream ended without `done` or `error`.
    #[error("story stream ended before completion")]
    Interrupted,
    /// The finished text was not a valid story document.
    #[error("finished story is not valid JSON: {0}")]
    TerminalParse(String),
}

impl ExtractError {
    /// Message suitable for the reader, without upstream detail.
    pub fn user_message(&self) -> &'static str {
        RETRY_MESSAGE
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractorState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

impl ExtractorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Tool activity relayed for display only.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolActivity {
    Invoked(String),
    Input(String),
    Output(String),
}

/// What changed after handling one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExtractorUpdate {
    Started { thread_id: Option<String> },
    Partial(String),
    Tool(ToolActivity),
    Completed(StoryResult),
    /// Issue the illustration request with this prompt.
    ImageRequested(String),
    Failed(ExtractError),
}

/// Fires at most once, and never for a blank prompt.
#[derive(Debug, Default)]
pub struct ImageTrigger {
    fired: bool,
}

impl ImageTrigger {
    pub fn fire(&mut self, prompt: &str) -> Option<String> {
        if self.fired || prompt.trim().is_empty() {
            return None;
        }
        self.fired = true;
        Some(prompt.to_string())
    }

    pub fn has_fired(&self) -> bool {
        self.fired
    }
}

/// Follows one relay stream.
///
/// Messages must be handed over in arrival order. Once `Completed` or
/// `Failed` is reached every further message is ignored; a new submission
/// needs a new `Extractor`.
#[derive(Debug)]
pub struct Extractor {
    state: ExtractorState,
    thread_id: Option<String>,
    buffer: String,
    partial: String,
    story: Option<StoryResult>,
    error: Option<ExtractError>,
    image_trigger: ImageTrigger,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            state: ExtractorState::Idle,
            thread_id: None,
            buffer: String::new(),
            partial: String::new(),
            story: None,
            error: None,
            image_trigger: ImageTrigger::default(),
        }
    }

    pub fn state(&self) -> ExtractorState {
        self.state
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Concatenation of every text fragment received so far.
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Current display projection. Cleared on completion.
    pub fn partial(&self) -> &str {
        &self.partial
    }

    pub fn story(&self) -> Option<&StoryResult> {
        self.story.as_ref()
    }

    pub fn error(&self) -> Option<&ExtractError> {
        self.error.as_ref()
    }

    pub fn handle(&mut self, message: OutboundMessage) -> Vec<ExtractorUpdate> {
        if self.state.is_terminal() {
            debug!(
                kind = ?message.kind(),
                state = ?self.state,
                "ignoring message after terminal state"
            );
            return Vec::new();
        }

        let mut updates = Vec::new();
        match message {
            OutboundMessage::Thread { thread_id } => {
                self.thread_id = Some(thread_id.clone());
                self.begin(Some(thread_id), &mut updates);
            }
            OutboundMessage::Start => {
                let thread_id = self.thread_id.clone();
                self.begin(thread_id, &mut updates);
            }
            OutboundMessage::Text { content } => {
                self.begin(None, &mut updates);
                self.buffer.push_str(&content);
                let partial = project_history(&self.buffer);
                if partial != self.partial {
                    self.partial = partial;
                    updates.push(ExtractorUpdate::Partial(self.partial.clone()));
                }
            }
            OutboundMessage::Tool { tool } => {
                updates.push(ExtractorUpdate::Tool(ToolActivity::Invoked(tool)));
            }
            OutboundMessage::CodeInput { content } => {
                updates.push(ExtractorUpdate::Tool(ToolActivity::Input(content)));
            }
            OutboundMessage::CodeOutput { content } => {
                updates.push(ExtractorUpdate::Tool(ToolActivity::Output(content)));
            }
            OutboundMessage::Done => self.complete(&mut updates),
            OutboundMessage::Error { error } => {
                warn!(
                    thread_id = ?self.thread_id,
                    error = %error,
                    "story stream reported an error"
                );
                self.fail(ExtractError::Stream(error), &mut updates);
            }
        }
        updates
    }

    /// Marks a stream that closed without a terminal message as failed.
    pub fn close(&mut self) -> Vec<ExtractorUpdate> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        warn!(
            thread_id = ?self.thread_id,
            buffered = self.buffer.len(),
            "story stream closed early"
        );
        let mut updates = Vec::new();
        self.fail(ExtractError::Interrupted, &mut updates);
        updates
    }

    fn begin(&mut self, thread_id: Option<String>, updates: &mut Vec<ExtractorUpdate>) {
        if self.state != ExtractorState::Idle {
            return;
        }
        self.state = ExtractorState::Streaming;
        self.buffer.clear();
        self.partial.clear();
        updates.push(ExtractorUpdate::Started { thread_id });
    }

    fn complete(&mut self, updates: &mut Vec<ExtractorUpdate>) {
        let story = match StoryResult::parse(&self.buffer) {
            Ok(story) => story,
            Err(e) => {
                warn!(
                    thread_id = ?self.thread_id,
                    buffered = self.buffer.len(),
                    error = %e,
                    "finished story text did not parse"
                );
                self.fail(ExtractError::TerminalParse(e.to_string()), updates);
                return;
            }
        };

        self.state = ExtractorState::Completed;
        self.partial.clear();
        debug!(
            thread_id = ?self.thread_id,
            title = %story.title,
            paragraphs = story.history.len(),
            "story completed"
        );
        let image_prompt = self.image_trigger.fire(&story.image_prompt);
        self.story = Some(story.clone());
        updates.push(ExtractorUpdate::Completed(story));
        if let Some(prompt) = image_prompt {
            updates.push(ExtractorUpdate::ImageRequested(prompt));
        }
    }

    fn fail(&mut self, error: ExtractError, updates: &mut Vec<ExtractorUpdate>) {
        self.state = ExtractorState::Failed;
        self.error = Some(error.clone());
        updates.push(ExtractorUpdate::Failed(error));
    }
}
