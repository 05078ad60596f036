//! # Tracebench - Deterministic Evaluation for Coding Agents
//!
//! Tracebench scores an autonomous coding agent numerically and reproducibly,
//! without another model acting as judge:
//! - Trace recording of every step an agent takes
//! - A scripted mock model to drive agents in isolation
//! - Tool correctness, argument correctness and step efficiency metrics
//! - Multi-turn scenarios with assertions
//! - Golden case batches with timeouts, tags and reports
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracebench_core::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     // Script the model: call grep, then answer
//!     let model = Arc::new(MockModel::new());
//!     model.queue_responses(vec![
//!         MockResponse::tool_call("grep", json!({"pattern": "TODO"})),
//!         MockResponse::text("Found 3 files containing TODO"),
//!     ]);
//!
//!     let cases = vec![GoldenCase::new("find-todo", "Find all files containing TODO")
//!         .expect_tools(["grep"])
//!         .expect_output_contains("TODO")];
//!
//!     let options = EvalConfig::load()?.to_options();
//!     let report = run_golden_cases(&cases, Arc::new(MockAgent::new(model)), options).await;
//!     println!("{}", report.render_summary());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! A [`scenario::Scenario`] or [`eval::GoldenCase`] drives an
//! [`eval::AgentRunner`], backed by [`mock::MockModel`] in unit tests or a real
//! agent in integration runs. The resulting [`trace::Trace`] is scored by the
//! functions in [`scoring`] and aggregated into an [`eval::EvaluationReport`].

pub mod config;
pub mod error;
pub mod eval;
pub mod mock;
pub mod scenario;
pub mod scoring;
pub mod trace;

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EvalConfig;
    pub use crate::error::{EvalError, Result};
    pub use crate::eval::{
        load_cases, run_golden_cases, AgentFn, AgentRunner, EvaluationReport, EvaluationResult,
        GoldenCase, GoldenRunOptions, Orchestrator,
    };
    pub use crate::mock::{
        ChatMessage, FinishReason, MockAgent, MockModel, MockResponse, MockToolCall, ResponseRule,
        ToolDefinition,
    };
    pub use crate::scenario::{
        AgentReply, Scenario, ScenarioAgent, ScenarioAgentConfig, ScenarioResult, TraceAgent,
    };
    pub use crate::scoring::{
        score_argument_batch, score_arguments, score_step_efficiency, score_tool_correctness,
        ArgumentCorrectnessOptions, MetricKind, StepEfficiencyOptions, ToolCorrectnessOptions,
    };
    pub use crate::trace::{Step, StepData, StepKind, TokenUsage, ToolCall, Trace, TraceRecorder};
}
