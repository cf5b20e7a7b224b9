use futures::Stream;
use futures::stream;
use story_harness::{RunStream, ToolDelta, UpstreamEvent};
use story_protocol::OutboundMessage;
use tracing::{debug, info, warn};

/// Sent when the upstream channel closes without `done` or `error`.
pub const GENERIC_ERROR_MESSAGE: &str = "An error occurred while processing your request";

/// Terminal flag of a relayed session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Terminal {
    Open,
    Completed,
    Errored,
}

/// Per-request relay state for one upstream run.
#[derive(Debug)]
pub struct Session {
    thread_id: String,
    events_seen: u64,
    terminal: Terminal,
}

impl Session {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            events_seen: 0,
            terminal: Terminal::Open,
        }
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn events_seen(&self) -> u64 {
        self.events_seen
    }

    pub fn terminal(&self) -> Terminal {
        self.terminal
    }

    pub fn is_open(&self) -> bool {
        self.terminal == Terminal::Open
    }

    /// First message of every stream.
    pub fn started(&self) -> OutboundMessage {
        OutboundMessage::Thread {
            thread_id: self.thread_id.clone(),
        }
    }

    /// Translates the next upstream event, or the closed channel (`None`).
    ///
    /// Returns `None` once the session is terminal.
    pub fn translate(&mut self, event: Option<UpstreamEvent>) -> Option<OutboundMessage> {
        if !self.is_open() {
            return None;
        }
        let Some(event) = event else {
            warn!(
                thread_id = %self.thread_id,
                events_seen = self.events_seen,
                "upstream channel closed without a terminal event"
            );
            self.terminal = Terminal::Errored;
            return Some(OutboundMessage::Error {
                error: GENERIC_ERROR_MESSAGE.into(),
            });
        };

        self.events_seen += 1;
        let message = match event {
            UpstreamEvent::TextCreated => OutboundMessage::Start,
            UpstreamEvent::TextDelta { text } => OutboundMessage::Text { content: text },
            UpstreamEvent::ToolCallCreated { tool } => OutboundMessage::Tool { tool },
            UpstreamEvent::ToolCallDelta {
                delta: ToolDelta::Input(content),
            } => OutboundMessage::CodeInput { content },
            UpstreamEvent::ToolCallDelta {
                delta: ToolDelta::Logs(content),
            } => OutboundMessage::CodeOutput { content },
            UpstreamEvent::Error { message } => {
                self.terminal = Terminal::Errored;
                OutboundMessage::Error { error: message }
            }
            UpstreamEvent::End => {
                self.terminal = Terminal::Completed;
                OutboundMessage::Done
            }
        };
        debug!(
            thread_id = %self.thread_id,
            seq = self.events_seen,
            kind = ?message.kind(),
            "relay message"
        );
        if !self.is_open() {
            info!(
                thread_id = %self.thread_id,
                events_seen = self.events_seen,
                terminal = ?self.terminal,
                "relay session finished"
            );
        }
        Some(message)
    }
}

struct RelayState {
    run: RunStream,
    session: Session,
    announced: bool,
}

impl Drop for RelayState {
    fn drop(&mut self) {
        if self.session.is_open() {
            info!(
                thread_id = %self.session.thread_id,
                events_seen = self.session.events_seen,
                "client went away; releasing upstream run"
            );
        }
    }
}

/// Turns a started run into the outbound message sequence.
///
/// Yields `thread` first, then one message per upstream event, then exactly
/// one of `done`/`error`, then ends. Dropping the stream drops the run, which
/// cancels it and releases the upstream connection.
pub fn relay_stream(run: RunStream) -> impl Stream<Item = OutboundMessage> + Send + 'static {
    let session = Session::new(run.thread_id());
    stream::unfold(
        RelayState {
            run,
            session,
            announced: false,
        },
        |mut state| async move {
            if !state.announced {
                state.announced = true;
                let message = state.session.started();
                return Some((message, state));
            }
            if !state.session.is_open() {
                return None;
            }
            let event = state.run.next_event().await;
            let message = state.session.translate(event)?;
            Some((message, state))
        },
    )
}
