use bytes::Bytes;

use crate::errors::ProtocolError;
use crate::sse::SseFrame;

/// One relay-to-client stream message.
///
/// Serialized with a `type` discriminator; field names match what browser
/// clients of the relay already read (`threadId`, `content`, `tool`, `error`).
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// The upstream thread was created.
    Thread {
        #[serde(rename = "threadId")]
        thread_id: String,
    },
    /// The assistant started producing text.
    Start,
    /// One text fragment, in upstream order.
    Text { content: String },
    /// The assistant invoked a tool.
    Tool { tool: String },
    /// Code sent to the code interpreter tool.
    CodeInput { content: String },
    /// Log output produced by the code interpreter tool.
    CodeOutput { content: String },
    /// Terminal failure. Nothing follows it.
    Error { error: String },
    /// Terminal success. Nothing follows it.
    Done,
}

/// Logical message kinds, independent of their wire spelling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    SessionStarted,
    GenerationStarted,
    TextFragment,
    ToolInvoked,
    ToolOutputFragment,
    Error,
    Done,
}

impl OutboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Thread { .. } => MessageKind::SessionStarted,
            Self::Start => MessageKind::GenerationStarted,
            Self::Text { .. } => MessageKind::TextFragment,
            Self::Tool { .. } => MessageKind::ToolInvoked,
            Self::CodeInput { .. } | Self::CodeOutput { .. } => MessageKind::ToolOutputFragment,
            Self::Error { .. } => MessageKind::Error,
            Self::Done => MessageKind::Done,
        }
    }

    /// Returns true for `error` and `done`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Done)
    }

    /// Encodes the message as one SSE frame: `data: <json>\n\n`.
    pub fn to_frame(&self) -> Result<Bytes, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(Bytes::from(format!("data: {json}\n\n")))
    }

    /// Decodes a message from a frame's data.
    ///
    /// Frames without data yield `Ok(None)`.
    pub fn from_frame(frame: &SseFrame) -> Result<Option<Self>, ProtocolError> {
        let data = frame.data.trim();
        if data.is_empty() {
            return Ok(None);
        }
        serde_json::from_str(data)
            .map(Some)
            .map_err(|e| ProtocolError::InvalidPayload(format!("{e}: {data}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sse::SseDecoder;

    #[test]
    fn wire_shapes_match_browser_contract() {
        let cases = [
            (
                OutboundMessage::Thread {
                    thread_id: "thread_1".into(),
                },
                serde_json::json!({"type":"thread","threadId":"thread_1"}),
            ),
            (OutboundMessage::Start, serde_json::json!({"type":"start"})),
            (
                OutboundMessage::Text {
                    content: "Hola".into(),
                },
                serde_json::json!({"type":"text","content":"Hola"}),
            ),
            (
                OutboundMessage::Tool {
                    tool: "code_interpreter".into(),
                },
                serde_json::json!({"type":"tool","tool":"code_interpreter"}),
            ),
            (
                OutboundMessage::CodeOutput {
                    content: "42".into(),
                },
                serde_json::json!({"type":"code_output","content":"42"}),
            ),
            (
                OutboundMessage::Error {
                    error: "boom".into(),
                },
                serde_json::json!({"type":"error","error":"boom"}),
            ),
            (OutboundMessage::Done, serde_json::json!({"type":"done"})),
        ];
        for (message, expected) in cases {
            assert_eq!(serde_json::to_value(&message).expect("serialize"), expected);
        }
    }

    #[test]
    fn frame_encoding_decodes_back_through_sse_decoder() {
        let message = OutboundMessage::Text {
            content: "line one\n\nline two".into(),
        };
        let frame = message.to_frame().expect("frame");
        assert!(frame.starts_with(b"data: "));
        assert!(frame.ends_with(b"\n\n"));

        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(&frame);
        assert_eq!(frames.len(), 1);
        let decoded = OutboundMessage::from_frame(&frames[0]).expect("decode");
        assert_eq!(decoded, Some(message));
    }

    #[test]
    fn unknown_type_is_an_invalid_payload() {
        let frame = SseFrame {
            event: None,
            data: r#"{"type":"mystery"}"#.into(),
        };
        assert!(matches!(
            OutboundMessage::from_frame(&frame),
            Err(ProtocolError::InvalidPayload(_))
        ));
    }

    #[test]
    fn kinds_and_terminal_flags() {
        assert_eq!(
            OutboundMessage::CodeInput {
                content: "print(1)".into()
            }
            .kind(),
            MessageKind::ToolOutputFragment
        );
        assert!(OutboundMessage::Done.is_terminal());
        assert!(!OutboundMessage::Start.is_terminal());
    }
}
