//! A minimal agent loop driven by the mock model
//!
//! Each run asks the model, records any requested tool calls with results
//! from the configured tool handler, feeds the results back and repeats until
//! the model stops asking for tools.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::message::{ChatMessage, ToolDefinition};
use super::resolver::MockModel;
use super::response::MockToolCall;
use crate::eval::AgentRunner;
use crate::trace::{TokenUsage, Trace, TraceRecorder};

/// Produces the result of a tool call: `Ok` for success, `Err` for a tool error
pub type ToolHandler =
    Arc<dyn Fn(&MockToolCall) -> std::result::Result<Value, String> + Send + Sync>;

/// Upper bound on model calls per run
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Agent whose "model" is a [`MockModel`]
#[derive(Clone)]
pub struct MockAgent {
    model: Arc<MockModel>,
    tools: Vec<ToolDefinition>,
    handler: ToolHandler,
    max_turns: usize,
}

impl fmt::Debug for MockAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockAgent")
            .field("tools", &self.tools)
            .field("max_turns", &self.max_turns)
            .finish_non_exhaustive()
    }
}

impl MockAgent {
    /// Every tool call succeeds with `{"ok": true}`
    pub fn new(model: Arc<MockModel>) -> Self {
        Self {
            model,
            tools: Vec::new(),
            handler: Arc::new(|_| Ok(json!({"ok": true}))),
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_tool_handler(
        mut self,
        handler: impl Fn(&MockToolCall) -> std::result::Result<Value, String>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.handler = Arc::new(handler);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn model(&self) -> &Arc<MockModel> {
        &self.model
    }

    fn run_loop(&self, input: &str) -> crate::error::Result<Trace> {
        let mut recorder = TraceRecorder::new();
        recorder.start_trace(input, Some(json!({"agent": "mock"})))?;

        let tools = (!self.tools.is_empty()).then_some(self.tools.as_slice());
        let mut messages = vec![ChatMessage::user(input)];
        let mut usage: Option<TokenUsage> = None;
        let mut output = String::new();

        for turn in 0..self.max_turns {
            let response = self.model.get_response(&messages, tools);

            if let Some(u) = response.usage {
                let total = usage.get_or_insert_with(TokenUsage::default);
                *total = TokenUsage::new(
                    total.prompt_tokens + u.prompt_tokens,
                    total.completion_tokens + u.completion_tokens,
                );
            }

            if let Some(text) = response.text.as_deref().filter(|t| !t.is_empty()) {
                recorder.record_text(text)?;
                messages.push(ChatMessage::assistant(text));
                output = text.to_string();
            }

            if !response.has_tool_calls() {
                debug!(turn, "mock agent finished");
                break;
            }

            for call in response.requested_tool_calls() {
                recorder.record_tool_call(
                    call.tool_name.clone(),
                    call.args.clone(),
                    Some(call.tool_call_id.clone()),
                )?;

                let (result, is_error) = match (self.handler)(call) {
                    Ok(value) => (value, false),
                    Err(message) => (json!({"error": message}), true),
                };
                messages.push(ChatMessage::tool(result.to_string()));
                recorder.record_tool_result(call.tool_call_id.clone(), result, is_error)?;
            }
        }

        recorder.end_trace(output, usage)
    }
}

#[async_trait]
impl AgentRunner for MockAgent {
    async fn run_agent(&self, input: &str) -> anyhow::Result<Trace> {
        Ok(self.run_loop(input)?)
    }
}
