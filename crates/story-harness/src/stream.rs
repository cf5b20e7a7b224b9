/// Incremental tool-call payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolDelta {
    /// Code sent to the tool.
    Input(String),
    /// Log output the tool produced.
    Logs(String),
}

/// Normalized stream events exposed by `RunStream`.
///
/// A run yields any number of non-terminal events followed by exactly one
/// `Error` or `End`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamEvent {
    /// The assistant started a new text block.
    TextCreated,
    /// Incremental text output chunk.
    TextDelta { text: String },
    /// The assistant invoked a tool of the given kind.
    ToolCallCreated { tool: String },
    /// Incremental tool-call input or output.
    ToolCallDelta { delta: ToolDelta },
    /// Terminal failure event.
    Error { message: String },
    /// Terminal success event.
    End,
}

impl UpstreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::End)
    }
}
