//! Golden case evaluation for agent runs
//!
//! This module runs declarative golden cases against an agent and scores them:
//! - [`AgentRunner`], the contract the agent under test implements
//! - Golden cases loaded from JSON or YAML
//! - A sequential orchestrator with per-case timeouts and tag filtering
//! - Aggregated reports with a deterministic text summary
//!
//! # Architecture
//!
//! Cases run one at a time so progress callbacks and `stop_on_failure` see a
//! deterministic order. Each agent call races a timer; a call that loses the
//! race is not cancelled, the orchestrator just stops waiting for it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tracebench_core::eval::{run_golden_cases, GoldenCase, GoldenRunOptions};
//! use tracebench_core::mock::{MockAgent, MockModel, MockResponse};
//! use serde_json::json;
//!
//! # async fn demo() {
//! let model = Arc::new(MockModel::new());
//! model.queue_response(MockResponse::tool_call("grep", json!({"pattern": "TODO"})));
//!
//! let cases = vec![GoldenCase::new("find-todo", "Find all files containing TODO")
//!     .expect_tools(["grep"])];
//!
//! let agent = Arc::new(MockAgent::new(model));
//! let report = run_golden_cases(&cases, agent, GoldenRunOptions::default()).await;
//! println!("{}", report.render_summary());
//! # }
//! ```

mod golden;
mod orchestrator;
mod report;
pub(crate) mod runner;

pub use golden::{load_cases, save_cases, validate_cases, GoldenCase};
pub use orchestrator::{
    overall_score, run_golden_cases, score_trace, EvaluationResult, GoldenRunOptions,
    Orchestrator, ProgressCallback, MAX_STEPS_PENALTY,
};
pub use report::{EvaluationReport, TagStats};
pub use runner::{AgentFn, AgentRunner};
