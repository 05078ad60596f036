//! Step types recorded during an agent run
//!
//! Each step carries a timestamp and a typed payload. The payload is a tagged
//! union so consumers get exhaustive handling per step kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One timestamped event within a trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// When the step was recorded
    pub timestamp: DateTime<Utc>,

    /// Step payload, tagged by kind
    #[serde(flatten)]
    pub data: StepData,
}

impl Step {
    /// Create a step stamped with the current time
    pub fn now(data: StepData) -> Self {
        Self {
            timestamp: Utc::now(),
            data,
        }
    }

    /// Kind of this step
    pub fn kind(&self) -> StepKind {
        self.data.kind()
    }

    /// Tool-call payload, if this is a tool-call step
    pub fn as_tool_call(&self) -> Option<&ToolCallPayload> {
        match &self.data {
            StepData::ToolCall(payload) => Some(payload),
            _ => None,
        }
    }

    /// Whether this is a tool-call step
    pub fn is_tool_call(&self) -> bool {
        matches!(self.data, StepData::ToolCall(_))
    }
}

/// Step payloads, one variant per step kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "kebab-case")]
pub enum StepData {
    /// Text emitted by the agent
    Text(TextPayload),

    /// Tool invocation requested by the agent
    ToolCall(ToolCallPayload),

    /// Result returned by a tool
    ToolResult(ToolResultPayload),

    /// Reasoning emitted by the agent
    Reasoning(TextPayload),

    /// Error raised during the run
    Error(ErrorPayload),

    /// Free-form status change
    Status(Map<String, Value>),
}

impl StepData {
    /// Kind of this payload
    pub fn kind(&self) -> StepKind {
        match self {
            StepData::Text(_) => StepKind::Text,
            StepData::ToolCall(_) => StepKind::ToolCall,
            StepData::ToolResult(_) => StepKind::ToolResult,
            StepData::Reasoning(_) => StepKind::Reasoning,
            StepData::Error(_) => StepKind::Error,
            StepData::Status(_) => StepKind::Status,
        }
    }
}

/// Step kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    Text,
    ToolCall,
    ToolResult,
    Reasoning,
    Error,
    Status,
}

impl StepKind {
    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::Text => "text",
            StepKind::ToolCall => "tool-call",
            StepKind::ToolResult => "tool-result",
            StepKind::Reasoning => "reasoning",
            StepKind::Error => "error",
            StepKind::Status => "status",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text or reasoning payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextPayload {
    pub text: String,
}

/// Tool invocation payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    /// Tool name
    pub tool_name: String,

    /// Arguments passed to the tool
    #[serde(default)]
    pub args: Value,

    /// Call identifier; synthesized at extraction time when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

/// Tool result payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    /// Identifier of the call this result answers
    pub tool_call_id: String,

    /// Result value
    #[serde(default)]
    pub result: Value,

    /// Whether the tool reported an error
    #[serde(default)]
    pub is_error: bool,
}

/// Error payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_step_uses_kebab_case_tag() {
        let step = Step::now(StepData::ToolCall(ToolCallPayload {
            tool_name: "grep".to_string(),
            args: json!({"pattern": "TODO"}),
            tool_call_id: None,
        }));

        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["type"], "tool-call");
        assert_eq!(value["data"]["tool_name"], "grep");
        assert!(value["data"].get("tool_call_id").is_none());
    }

    #[test]
    fn status_step_round_trips() {
        let mut status = Map::new();
        status.insert("phase".to_string(), json!("planning"));
        let step = Step::now(StepData::Status(status));

        let json = serde_json::to_string(&step).unwrap();
        let parsed: Step = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, step);
        assert_eq!(parsed.kind(), StepKind::Status);
    }

    #[test]
    fn kind_names_match_wire_tags() {
        let step = Step::now(StepData::ToolResult(ToolResultPayload {
            tool_call_id: "tc-1".to_string(),
            result: json!("ok"),
            is_error: false,
        }));
        let value = serde_json::to_value(&step).unwrap();
        assert_eq!(value["type"], step.kind().as_str());
    }
}
