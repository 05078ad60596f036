//! Predetermined model responses

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::trace::TokenUsage;

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Error,
}

/// A tool call requested by the mock model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockToolCall {
    /// Call identifier; an empty id is replaced with `tc-mock-<n>` on resolution
    #[serde(default)]
    pub tool_call_id: String,

    pub tool_name: String,

    #[serde(default)]
    pub args: Value,
}

impl MockToolCall {
    /// Create a call whose id is assigned when the response is resolved
    pub fn new(tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_call_id: String::new(),
            tool_name: tool_name.into(),
            args,
        }
    }

    /// Create a call with a fixed id
    pub fn with_id(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        args: Value,
    ) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// Response returned by the mock model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<MockToolCall>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl MockResponse {
    /// Factory default returned when neither queue nor rules produce a response
    pub fn factory_default() -> Self {
        Self::text("Mock response")
    }

    /// Plain text response
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            finish_reason: Some(FinishReason::Stop),
            ..Default::default()
        }
    }

    /// Response requesting a single tool call
    pub fn tool_call(tool_name: impl Into<String>, args: Value) -> Self {
        Self::tool_calls(vec![MockToolCall::new(tool_name, args)])
    }

    /// Response requesting several tool calls
    pub fn tool_calls(calls: Vec<MockToolCall>) -> Self {
        Self {
            tool_calls: Some(calls),
            finish_reason: Some(FinishReason::ToolCalls),
            ..Default::default()
        }
    }

    /// Attach text to the response
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Attach token usage
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Override the finish reason
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = Some(reason);
        self
    }

    /// Requested tool calls, empty if none
    pub fn requested_tool_calls(&self) -> &[MockToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }

    /// Whether the response requests any tool call
    pub fn has_tool_calls(&self) -> bool {
        !self.requested_tool_calls().is_empty()
    }
}
