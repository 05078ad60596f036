//! Trace recording for agent runs
//!
//! This module records one agent execution as an ordered, append-only step
//! sequence and seals it into an immutable [`Trace`]:
//! - Typed step payloads (text, tool calls, tool results, reasoning, errors, status)
//! - A recorder state machine that rejects out-of-sequence use
//! - Derived metrics and history statistics
//! - JSON and JSON-lines persistence for failing runs
//!
//! # Example
//!
//! ```rust
//! use tracebench_core::trace::TraceRecorder;
//! use serde_json::json;
//!
//! let mut recorder = TraceRecorder::new();
//! recorder.start_trace("Find all files containing TODO", None)?;
//! recorder.record_tool_call("grep", json!({"pattern": "TODO"}), None)?;
//! let trace = recorder.end_trace("Found 3 files", None)?;
//!
//! assert_eq!(trace.metrics.tool_call_count, 1);
//! # Ok::<(), tracebench_core::error::EvalError>(())
//! ```

pub mod codec;
mod record;
mod recorder;
mod step;

pub use codec::{TraceFormat, TRACE_SCHEMA_VERSION};
pub use record::{extract_tool_calls, TokenUsage, ToolCall, Trace, TraceMetrics};
pub use recorder::{SharedRecorder, TraceRecorder, TraceStats};
pub use step::{
    ErrorPayload, Step, StepData, StepKind, TextPayload, ToolCallPayload, ToolResultPayload,
};
