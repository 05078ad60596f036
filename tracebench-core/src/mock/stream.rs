//! Streaming view of mock responses
//!
//! A resolved [`MockResponse`] is replayed as ordered stream events: text
//! deltas first, then tool calls, then usage, then `Done`. Collectors guard
//! each chunk with a timeout so a stalled stream fails instead of hanging.

use futures::stream::{self, BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::message::{ChatMessage, ToolDefinition};
use super::resolver::MockModel;
use super::response::{FinishReason, MockResponse, MockToolCall};
use crate::error::{EvalError, Result};
use crate::trace::TokenUsage;

/// One event of a streamed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    TextDelta { text: String },
    ToolCall { tool_call: MockToolCall },
    Usage { usage: TokenUsage },
    Done { finish_reason: Option<FinishReason> },
    Error { message: String },
}

/// Split a response into stream events, one text delta per word
pub fn response_events(response: &MockResponse) -> Vec<StreamEvent> {
    let mut events = Vec::new();

    if let Some(text) = response.text.as_deref() {
        events.extend(
            text.split_inclusive(' ')
                .map(|chunk| StreamEvent::TextDelta { text: chunk.to_string() }),
        );
    }

    events.extend(
        response
            .requested_tool_calls()
            .iter()
            .cloned()
            .map(|tool_call| StreamEvent::ToolCall { tool_call }),
    );

    if let Some(usage) = response.usage {
        events.push(StreamEvent::Usage { usage });
    }

    events.push(StreamEvent::Done {
        finish_reason: response.finish_reason,
    });
    events
}

impl MockModel {
    /// Resolve a response and stream it
    pub fn stream_response(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> BoxStream<'static, StreamEvent> {
        let response = self.get_response(messages, tools);
        stream::iter(response_events(&response)).boxed()
    }

    /// Resolve a response and stream it with a delay before every event
    pub fn stream_response_with_delay(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        chunk_delay: Duration,
    ) -> BoxStream<'static, StreamEvent> {
        let response = self.get_response(messages, tools);
        stream::iter(response_events(&response))
            .then(move |event| async move {
                tokio::time::sleep(chunk_delay).await;
                event
            })
            .boxed()
    }
}

/// Everything gathered from a stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectedStream {
    pub text: String,
    pub tool_calls: Vec<MockToolCall>,
    pub usage: Option<TokenUsage>,
    pub finish_reason: Option<FinishReason>,
    pub delta_count: usize,
}

/// Drain a stream, concatenating text deltas
///
/// `chunk_timeout` bounds the wait for each event, not the whole stream.
/// An `Error` event or an expired wait ends collection with an error.
pub async fn collect_stream_text<S>(
    mut stream: S,
    chunk_timeout: Option<Duration>,
) -> Result<CollectedStream>
where
    S: Stream<Item = StreamEvent> + Unpin,
{
    let mut collected = CollectedStream::default();

    loop {
        let next = match chunk_timeout {
            Some(limit) => tokio::time::timeout(limit, stream.next())
                .await
                .map_err(|_| {
                    EvalError::Other(format!(
                        "stream timed out after {}ms waiting for next chunk",
                        limit.as_millis()
                    ))
                })?,
            None => stream.next().await,
        };

        let Some(event) = next else {
            break;
        };

        match event {
            StreamEvent::TextDelta { text } => {
                collected.text.push_str(&text);
                collected.delta_count += 1;
            }
            StreamEvent::ToolCall { tool_call } => collected.tool_calls.push(tool_call),
            StreamEvent::Usage { usage } => collected.usage = Some(usage),
            StreamEvent::Done { finish_reason } => {
                collected.finish_reason = finish_reason;
                break;
            }
            StreamEvent::Error { message } => {
                return Err(EvalError::Other(format!("stream error: {}", message)));
            }
        }
    }

    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_are_ordered() {
        let response = MockResponse::tool_call("grep", json!({"pattern": "TODO"}))
            .with_text("Searching now")
            .with_usage(TokenUsage::new(3, 2));

        let kinds: Vec<_> = response_events(&response)
            .into_iter()
            .map(|e| match e {
                StreamEvent::TextDelta { .. } => "delta",
                StreamEvent::ToolCall { .. } => "tool",
                StreamEvent::Usage { .. } => "usage",
                StreamEvent::Done { .. } => "done",
                StreamEvent::Error { .. } => "error",
            })
            .collect();

        assert_eq!(kinds, vec!["delta", "delta", "tool", "usage", "done"]);
    }

    #[tokio::test]
    async fn collects_full_text() {
        let model = MockModel::new();
        model.queue_response(MockResponse::text("Found 3 files with TODO"));

        let stream = model.stream_response(&[ChatMessage::user("find")], None);
        let collected = collect_stream_text(stream, Some(Duration::from_secs(1)))
            .await
            .unwrap();

        assert_eq!(collected.text, "Found 3 files with TODO");
        assert_eq!(collected.delta_count, 5);
        assert_eq!(collected.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn stalled_stream_times_out() {
        let model = MockModel::new();
        let stream = model.stream_response_with_delay(
            &[ChatMessage::user("slow")],
            None,
            Duration::from_millis(200),
        );

        let err = collect_stream_text(stream, Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn error_event_fails_collection() {
        let events = vec![
            StreamEvent::TextDelta { text: "partial".to_string() },
            StreamEvent::Error { message: "provider overloaded".to_string() },
        ];

        let err = collect_stream_text(stream::iter(events), None).await.unwrap_err();
        assert!(err.to_string().contains("provider overloaded"));
    }
}
