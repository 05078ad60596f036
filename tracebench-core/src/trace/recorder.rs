//! Trace recorder state machine
//!
//! A recorder is either idle or tracing exactly one run:
//!
//! ```text
//! Idle --start_trace--> Tracing --end_trace/cancel_trace--> Idle
//! ```
//!
//! Recording while idle, or starting while already tracing, is a programmer
//! error and returns [`EvalError::InvalidState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

use super::record::{TokenUsage, Trace, TraceMetrics};
use super::step::{
    ErrorPayload, Step, StepData, TextPayload, ToolCallPayload, ToolResultPayload,
};
use crate::error::{EvalError, Result};

/// Recorder shared between an agent adapter and its callers
pub type SharedRecorder = Arc<Mutex<TraceRecorder>>;

/// Aggregate statistics over sealed traces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TraceStats {
    /// Number of sealed traces in history
    pub total_traces: usize,

    /// Mean duration in milliseconds
    pub average_duration_ms: f64,

    /// Mean tool-call count
    pub average_tool_calls: f64,

    /// Mean step count
    pub average_steps: f64,
}

/// The trace currently being recorded
#[derive(Debug)]
struct OpenTrace {
    id: Uuid,
    input: String,
    metadata: Value,
    steps: Vec<Step>,
    start_time: DateTime<Utc>,
}

impl OpenTrace {
    /// Next timestamp, never earlier than the previous step
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.steps.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now.max(self.start_time),
        }
    }
}

/// Records one agent execution at a time as an ordered step sequence
#[derive(Debug, Default)]
pub struct TraceRecorder {
    current: Option<OpenTrace>,
    history: Vec<Trace>,
}

impl TraceRecorder {
    /// Create an idle recorder with empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an idle recorder wrapped for sharing with an agent adapter
    pub fn shared() -> SharedRecorder {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Whether a trace is currently open
    pub fn is_tracing(&self) -> bool {
        self.current.is_some()
    }

    /// Number of steps in the open trace (0 when idle)
    pub fn current_step_count(&self) -> usize {
        self.current.as_ref().map(|t| t.steps.len()).unwrap_or(0)
    }

    /// Open a new trace
    ///
    /// Fails if a trace is already open; nested tracing is not supported.
    pub fn start_trace(
        &mut self,
        input: impl Into<String>,
        metadata: Option<Value>,
    ) -> Result<Uuid> {
        if let Some(open) = &self.current {
            return Err(EvalError::InvalidState(format!(
                "trace {} is already in progress",
                open.id
            )));
        }

        let id = Uuid::new_v4();
        let input = input.into();
        debug!(trace_id = %id, input_len = input.len(), "trace started");

        self.current = Some(OpenTrace {
            id,
            input,
            metadata: metadata.unwrap_or(Value::Null),
            steps: Vec::new(),
            start_time: Utc::now(),
        });
        Ok(id)
    }

    /// Append a step to the open trace
    pub fn record(&mut self, data: StepData) -> Result<()> {
        let open = self.current.as_mut().ok_or_else(|| {
            EvalError::InvalidState(format!(
                "cannot record {} step: no trace in progress",
                data.kind()
            ))
        })?;

        let timestamp = open.next_timestamp();
        open.steps.push(Step { timestamp, data });
        Ok(())
    }

    /// Record text emitted by the agent
    pub fn record_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.record(StepData::Text(TextPayload { text: text.into() }))
    }

    /// Record a tool invocation
    pub fn record_tool_call(
        &mut self,
        tool_name: impl Into<String>,
        args: Value,
        tool_call_id: Option<String>,
    ) -> Result<()> {
        self.record(StepData::ToolCall(ToolCallPayload {
            tool_name: tool_name.into(),
            args,
            tool_call_id,
        }))
    }

    /// Record a tool result
    pub fn record_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        result: Value,
        is_error: bool,
    ) -> Result<()> {
        self.record(StepData::ToolResult(ToolResultPayload {
            tool_call_id: tool_call_id.into(),
            result,
            is_error,
        }))
    }

    /// Record agent reasoning
    pub fn record_reasoning(&mut self, text: impl Into<String>) -> Result<()> {
        self.record(StepData::Reasoning(TextPayload { text: text.into() }))
    }

    /// Record an error raised during the run
    pub fn record_error(
        &mut self,
        message: impl Into<String>,
        stack: Option<String>,
    ) -> Result<()> {
        self.record(StepData::Error(ErrorPayload {
            message: message.into(),
            stack,
        }))
    }

    /// Record a free-form status change
    pub fn record_status(&mut self, status: Map<String, Value>) -> Result<()> {
        self.record(StepData::Status(status))
    }

    /// Seal the open trace, append it to history and return it
    pub fn end_trace(
        &mut self,
        output: impl Into<String>,
        token_usage: Option<TokenUsage>,
    ) -> Result<Trace> {
        let open = self.current.take().ok_or_else(|| {
            EvalError::InvalidState("cannot end trace: no trace in progress".to_string())
        })?;

        let end_time = open
            .steps
            .last()
            .map(|s| s.timestamp.max(Utc::now()))
            .unwrap_or_else(Utc::now)
            .max(open.start_time);
        let duration_ms = (end_time - open.start_time).num_milliseconds().max(0) as u64;

        let metrics = TraceMetrics {
            total_steps: open.steps.len(),
            tool_call_count: open.steps.iter().filter(|s| s.is_tool_call()).count(),
            duration_ms,
            token_usage,
        };

        let trace = Trace {
            id: open.id,
            input: open.input,
            steps: open.steps,
            output: output.into(),
            start_time: open.start_time,
            end_time,
            metrics,
            metadata: open.metadata,
        };

        debug!(
            trace_id = %trace.id,
            total_steps = trace.metrics.total_steps,
            tool_calls = trace.metrics.tool_call_count,
            duration_ms = trace.metrics.duration_ms,
            "trace sealed"
        );

        self.history.push(trace.clone());
        Ok(trace)
    }

    /// Discard the open trace, if any
    ///
    /// Returns whether a trace was discarded. Calling this while idle is a no-op.
    pub fn cancel_trace(&mut self) -> bool {
        match self.current.take() {
            Some(open) => {
                debug!(trace_id = %open.id, steps = open.steps.len(), "trace cancelled");
                true
            }
            None => false,
        }
    }

    /// Sealed traces in completion order
    pub fn history(&self) -> &[Trace] {
        &self.history
    }

    /// Drop all sealed traces
    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Averages over sealed traces; all zeros when history is empty
    pub fn get_stats(&self) -> TraceStats {
        if self.history.is_empty() {
            return TraceStats::default();
        }

        let count = self.history.len() as f64;
        let (duration, tool_calls, steps) =
            self.history
                .iter()
                .fold((0u64, 0usize, 0usize), |(d, tc, s), trace| {
                    (
                        d + trace.metrics.duration_ms,
                        tc + trace.metrics.tool_call_count,
                        s + trace.metrics.total_steps,
                    )
                });

        TraceStats {
            total_traces: self.history.len(),
            average_duration_ms: duration as f64 / count,
            average_tool_calls: tool_calls as f64 / count,
            average_steps: steps as f64 / count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn start_while_tracing_is_rejected() {
        let mut recorder = TraceRecorder::new();
        recorder.start_trace("first", None).unwrap();

        let err = recorder.start_trace("second", None).unwrap_err();
        assert!(matches!(err, EvalError::InvalidState(_)));
        assert!(recorder.is_tracing());
    }

    #[test]
    fn record_while_idle_is_rejected() {
        let mut recorder = TraceRecorder::new();
        let err = recorder.record_text("hello").unwrap_err();
        assert!(matches!(err, EvalError::InvalidState(_)));
        assert!(recorder.end_trace("out", None).is_err());
    }

    #[test]
    fn end_trace_computes_metrics_and_appends_history() {
        let mut recorder = TraceRecorder::new();
        recorder
            .start_trace("Find TODOs", Some(json!({"suite": "smoke"})))
            .unwrap();
        recorder.record_reasoning("search the tree").unwrap();
        recorder
            .record_tool_call("grep", json!({"pattern": "TODO"}), Some("call-1".to_string()))
            .unwrap();
        recorder
            .record_tool_result("call-1", json!(["src/lib.rs"]), false)
            .unwrap();
        recorder.record_text("Found one file").unwrap();

        let usage = TokenUsage::new(10, 5);
        let trace = recorder.end_trace("Found one file", Some(usage)).unwrap();

        assert!(!recorder.is_tracing());
        assert_eq!(trace.input, "Find TODOs");
        assert_eq!(trace.metrics.total_steps, 4);
        assert_eq!(trace.metrics.tool_call_count, 1);
        assert_eq!(trace.metrics.token_usage, Some(usage));
        assert_eq!(trace.metadata["suite"], "smoke");
        assert!(trace.end_time >= trace.start_time);
        assert_eq!(recorder.history().len(), 1);
        assert_eq!(recorder.history()[0].id, trace.id);
    }

    #[test]
    fn timestamps_never_decrease() {
        let mut recorder = TraceRecorder::new();
        recorder.start_trace("input", None).unwrap();
        for i in 0..20 {
            recorder.record_text(format!("chunk {}", i)).unwrap();
        }
        let trace = recorder.end_trace("done", None).unwrap();

        for pair in trace.steps.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
        assert!(trace.steps[0].timestamp >= trace.start_time);
    }

    #[test]
    fn cancel_is_idempotent() {
        let mut recorder = TraceRecorder::new();
        recorder.start_trace("input", None).unwrap();
        recorder.record_text("partial").unwrap();

        assert!(recorder.cancel_trace());
        assert!(!recorder.cancel_trace());
        assert!(!recorder.is_tracing());
        assert!(recorder.history().is_empty());

        // Idle again, so a new trace may start
        recorder.start_trace("again", None).unwrap();
    }

    #[test]
    fn stats_are_zero_without_history() {
        let recorder = TraceRecorder::new();
        assert_eq!(recorder.get_stats(), TraceStats::default());
    }

    #[test]
    fn stats_average_over_history() {
        let mut recorder = TraceRecorder::new();

        recorder.start_trace("a", None).unwrap();
        recorder.record_tool_call("readFile", json!({"path": "/a"}), None).unwrap();
        recorder.record_tool_call("readFile", json!({"path": "/b"}), None).unwrap();
        recorder.end_trace("a", None).unwrap();

        recorder.start_trace("b", None).unwrap();
        recorder.record_text("no tools").unwrap();
        recorder.end_trace("b", None).unwrap();

        let stats = recorder.get_stats();
        assert_eq!(stats.total_traces, 2);
        assert_eq!(stats.average_tool_calls, 1.0);
        assert_eq!(stats.average_steps, 1.5);

        recorder.clear_history();
        assert_eq!(recorder.get_stats().total_traces, 0);
    }

    #[test]
    fn current_step_count_tracks_open_trace() {
        let mut recorder = TraceRecorder::new();
        assert_eq!(recorder.current_step_count(), 0);

        recorder.start_trace("count", None).unwrap();
        recorder.record_text("one").unwrap();
        recorder.record_error("two", Some("at main".to_string())).unwrap();
        assert_eq!(recorder.current_step_count(), 2);

        recorder.end_trace("done", None).unwrap();
        assert_eq!(recorder.current_step_count(), 0);
    }

    #[test]
    fn shared_recorder_is_usable_across_threads() {
        let shared = TraceRecorder::shared();
        let writer = Arc::clone(&shared);

        std::thread::spawn(move || {
            let mut recorder = writer.lock().unwrap();
            recorder.start_trace("threaded", None).unwrap();
            recorder.record_text("hello").unwrap();
            recorder.end_trace("hello", None).unwrap();
        })
        .join()
        .unwrap();

        let recorder = shared.lock().unwrap();
        assert!(!recorder.is_tracing());
        assert_eq!(recorder.history().len(), 1);
        assert_eq!(recorder.history()[0].final_text(), Some("hello"));
    }
}
