//! Sealed trace records
//!
//! A [`Trace`] is the immutable record of one agent run. It is produced by
//! [`TraceRecorder::end_trace`](super::TraceRecorder::end_trace) and is safe to
//! share once sealed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::step::{ErrorPayload, Step, StepData, StepKind};

/// Token usage reported by a model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl TokenUsage {
    /// Create usage from prompt and completion counts
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// Metrics derived when a trace is sealed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceMetrics {
    /// Number of recorded steps of any kind
    pub total_steps: usize,

    /// Number of tool-call steps
    pub tool_call_count: usize,

    /// Wall-clock duration between start and end
    pub duration_ms: u64,

    /// Token usage, if the agent reported it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// A normalized tool call extracted from tool-call steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    /// Create a tool call
    pub fn new(tool_call_id: impl Into<String>, tool_name: impl Into<String>, args: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            args,
        }
    }
}

/// Sealed record of one agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Unique trace identifier
    pub id: Uuid,

    /// Input given to the agent
    pub input: String,

    /// Recorded steps in order
    pub steps: Vec<Step>,

    /// Final agent output
    pub output: String,

    /// When the trace was started
    pub start_time: DateTime<Utc>,

    /// When the trace was sealed
    pub end_time: DateTime<Utc>,

    /// Derived metrics
    pub metrics: TraceMetrics,

    /// Opaque caller metadata
    #[serde(default)]
    pub metadata: Value,
}

impl Trace {
    /// Extract normalized tool calls
    ///
    /// Missing call ids are synthesized as `tc-<stepIndex>`.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        extract_tool_calls(&self.steps)
    }

    /// Steps of a single kind
    pub fn steps_of_kind(&self, kind: StepKind) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(move |s| s.kind() == kind)
    }

    /// Error payloads recorded during the run
    pub fn errors(&self) -> Vec<&ErrorPayload> {
        self.steps
            .iter()
            .filter_map(|s| match &s.data {
                StepData::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    /// Text of the last text step, if any
    pub fn final_text(&self) -> Option<&str> {
        self.steps.iter().rev().find_map(|s| match &s.data {
            StepData::Text(t) => Some(t.text.as_str()),
            _ => None,
        })
    }
}

/// Extract normalized tool calls from a step sequence
pub fn extract_tool_calls(steps: &[Step]) -> Vec<ToolCall> {
    steps
        .iter()
        .enumerate()
        .filter_map(|(index, step)| {
            step.as_tool_call().map(|payload| {
                let tool_call_id = match payload.tool_call_id.as_deref() {
                    Some(id) if !id.is_empty() => id.to_string(),
                    _ => format!("tc-{}", index),
                };
                ToolCall {
                    tool_call_id,
                    tool_name: payload.tool_name.clone(),
                    args: payload.args.clone(),
                }
            })
        })
        .collect()
}
