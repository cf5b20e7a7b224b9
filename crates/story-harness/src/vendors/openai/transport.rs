use std::collections::HashSet;

use story_protocol::SseFrame;

use crate::errors::ProviderError;
use crate::model::ProviderId;
use crate::provider::ProviderEvent;
use crate::stream::ToolDelta;

/// Maps Assistants run-stream frames to provider events.
///
/// Stateful because `TextCreated` and `ToolCallCreated` fire only for the
/// first delta of each text part and tool call.
#[derive(Default)]
pub(crate) struct AssistantsEventMapper {
    seen_text_parts: HashSet<(String, u64)>,
    seen_tool_calls: HashSet<(String, u64)>,
}

impl AssistantsEventMapper {
    pub fn map_frame(
        &mut self,
        provider: &ProviderId,
        frame: &SseFrame,
    ) -> Result<Vec<ProviderEvent>, ProviderError> {
        let event = frame.event.as_deref().unwrap_or_default();
        let data = frame.data.trim();
        if event == "done" || data == "[DONE]" {
            return Ok(vec![ProviderEvent::Completed]);
        }
        if data.is_empty() {
            return Ok(Vec::new());
        }
        let value: serde_json::Value = serde_json::from_str(data).map_err(|e| {
            ProviderError::protocol(provider.clone(), format!("invalid SSE JSON frame: {e}"))
        })?;
        self.map_json(provider, event, &value)
    }

    pub fn map_json(
        &mut self,
        provider: &ProviderId,
        event: &str,
        value: &serde_json::Value,
    ) -> Result<Vec<ProviderEvent>, ProviderError> {
        match event {
            "thread.message.delta" => Ok(self.map_message_delta(value)),
            "thread.run.step.delta" => Ok(self.map_step_delta(value)),
            "thread.run.failed" | "thread.run.cancelled" | "thread.run.expired" => {
                let message = value
                    .get("last_error")
                    .and_then(|e| e.get("message"))
                    .and_then(|v| v.as_str())
                    .map(ToOwned::to_owned)
                    .unwrap_or_else(|| format!("assistant run ended with {event}"));
                Err(ProviderError::provider(provider.clone(), message, None))
            }
            "error" => {
                let message = value
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .or_else(|| value.get("message"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("OpenAI stream error");
                Err(ProviderError::provider(provider.clone(), message, None))
            }
            _ => Ok(Vec::new()),
        }
    }

    fn map_message_delta(&mut self, value: &serde_json::Value) -> Vec<ProviderEvent> {
        let message_id = value
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let Some(parts) = value
            .get("delta")
            .and_then(|d| d.get("content"))
            .and_then(|c| c.as_array())
        else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for part in parts {
            if part.get("type").and_then(|v| v.as_str()) != Some("text") {
                continue;
            }
            let index = part.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if self.seen_text_parts.insert((message_id.clone(), index)) {
                events.push(ProviderEvent::TextCreated);
            }
            if let Some(text) = part
                .get("text")
                .and_then(|t| t.get("value"))
                .and_then(|v| v.as_str())
                .filter(|t| !t.is_empty())
            {
                events.push(ProviderEvent::TextDelta {
                    text: text.to_string(),
                });
            }
        }
        events
    }

    fn map_step_delta(&mut self, value: &serde_json::Value) -> Vec<ProviderEvent> {
        let step_id = value
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let Some(details) = value.get("delta").and_then(|d| d.get("step_details")) else {
            return Vec::new();
        };
        if details.get("type").and_then(|v| v.as_str()) != Some("tool_calls") {
            return Vec::new();
        }
        let Some(calls) = details.get("tool_calls").and_then(|v| v.as_array()) else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for call in calls {
            let index = call.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            let kind = call
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            if self.seen_tool_calls.insert((step_id.clone(), index)) {
                events.push(ProviderEvent::ToolCallCreated {
                    tool: kind.to_string(),
                });
            }
            let Some(code) = call.get("code_interpreter") else {
                continue;
            };
            if let Some(input) = code
                .get("input")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
            {
                events.push(ProviderEvent::ToolCallDelta {
                    delta: ToolDelta::Input(input.to_string()),
                });
            }
            for output in code
                .get("outputs")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
            {
                if output.get("type").and_then(|v| v.as_str()) != Some("logs") {
                    continue;
                }
                if let Some(logs) = output.get("logs").and_then(|v| v.as_str()) {
                    events.push(ProviderEvent::ToolCallDelta {
                        delta: ToolDelta::Logs(logs.to_string()),
                    });
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_protocol::SseDecoder;

    fn provider() -> ProviderId {
        ProviderId::new("openai")
    }

    fn text_delta(message_id: &str, index: u64, text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": message_id,
            "object": "thread.message.delta",
            "delta": {"content": [{"index": index, "type": "text", "text": {"value": text}}]}
        })
    }

    #[test]
    fn first_text_delta_of_a_part_announces_text_created() {
        let mut mapper = AssistantsEventMapper::default();
        let first = mapper
            .map_json(&provider(), "thread.message.delta", &text_delta("msg_1", 0, "{\"ti"))
            .expect("map");
        assert_eq!(
            first,
            vec![
                ProviderEvent::TextCreated,
                ProviderEvent::TextDelta {
                    text: "{\"ti".into()
                }
            ]
        );
        let second = mapper
            .map_json(&provider(), "thread.message.delta", &text_delta("msg_1", 0, "tle"))
            .expect("map");
        assert_eq!(
            second,
            vec![ProviderEvent::TextDelta { text: "tle".into() }]
        );
    }

    #[test]
    fn code_interpreter_steps_map_to_tool_events() {
        let mut mapper = AssistantsEventMapper::default();
        let step = serde_json::json!({
            "id": "step_1",
            "delta": {"step_details": {"type": "tool_calls", "tool_calls": [{
                "index": 0,
                "id": "call_1",
                "type": "code_interpreter",
                "code_interpreter": {"input": "print(6*7)", "outputs": []}
            }]}}
        });
        let events = mapper
            .map_json(&provider(), "thread.run.step.delta", &step)
            .expect("map");
        assert_eq!(
            events,
            vec![
                ProviderEvent::ToolCallCreated {
                    tool: "code_interpreter".into()
                },
                ProviderEvent::ToolCallDelta {
                    delta: ToolDelta::Input("print(6*7)".into())
                },
            ]
        );

        let logs = serde_json::json!({
            "id": "step_1",
            "delta": {"step_details": {"type": "tool_calls", "tool_calls": [{
                "index": 0,
                "type": "code_interpreter",
                "code_interpreter": {"outputs": [{"index": 0, "type": "logs", "logs": "42\n"}]}
            }]}}
        });
        let events = mapper
            .map_json(&provider(), "thread.run.step.delta", &logs)
            .expect("map");
        assert_eq!(
            events,
            vec![ProviderEvent::ToolCallDelta {
                delta: ToolDelta::Logs("42\n".into())
            }]
        );
    }

    #[test]
    fn failed_run_and_error_events_become_provider_errors() {
        let mut mapper = AssistantsEventMapper::default();
        let failed = serde_json::json!({
            "id": "run_1",
            "last_error": {"code": "rate_limit_exceeded", "message": "quota exceeded"}
        });
        let err = mapper
            .map_json(&provider(), "thread.run.failed", &failed)
            .expect_err("should fail");
        assert_eq!(err.message(), "quota exceeded");

        let err = mapper
            .map_json(&provider(), "error", &serde_json::json!({"message": "server_error"}))
            .expect_err("should fail");
        assert!(matches!(err, ProviderError::Provider { .. }));
    }

    #[test]
    fn done_frame_completes_and_unknown_events_are_ignored() {
        let mut decoder = SseDecoder::default();
        let frames = decoder.push_chunk(
            b"event: thread.run.created\ndata: {\"id\":\"run_1\"}\n\nevent: done\ndata: [DONE]\n\n",
        );
        let mut mapper = AssistantsEventMapper::default();
        let events: Vec<_> = frames
            .iter()
            .map(|f| mapper.map_frame(&provider(), f).expect("map"))
            .collect();
        assert_eq!(events, vec![vec![], vec![ProviderEvent::Completed]]);
    }
}
