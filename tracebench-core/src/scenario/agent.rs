//! Agent adapters for scenarios

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::eval::AgentRunner;
use crate::trace::ToolCall;

/// What an agent produced for one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub output: String,

    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

impl AgentReply {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_call(mut self, call: ToolCall) -> Self {
        self.tool_calls.push(call);
        self
    }
}

/// An agent driven turn by turn by a scenario
#[async_trait]
pub trait ScenarioAgent: Send + Sync {
    /// Run the agent on the conversation so far
    async fn run_agent(&self, input: &str) -> anyhow::Result<AgentReply>;
}

/// Scenario adapter over any trace-producing [`AgentRunner`]
pub struct TraceAgent {
    runner: Arc<dyn AgentRunner>,
}

impl TraceAgent {
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl ScenarioAgent for TraceAgent {
    async fn run_agent(&self, input: &str) -> anyhow::Result<AgentReply> {
        let trace = self.runner.run_agent(input).await?;
        Ok(AgentReply {
            tool_calls: trace.tool_calls(),
            output: trace.output,
        })
    }
}

/// Default budget for one agent turn
pub const DEFAULT_TURN_TIMEOUT: Duration = Duration::from_secs(30);

/// The agent a scenario runs against, with its per-turn budget
#[derive(Clone)]
pub struct ScenarioAgentConfig {
    pub agent: Arc<dyn ScenarioAgent>,
    pub timeout: Duration,
}

impl ScenarioAgentConfig {
    pub fn new(agent: Arc<dyn ScenarioAgent>) -> Self {
        Self {
            agent,
            timeout: DEFAULT_TURN_TIMEOUT,
        }
    }

    /// Adapt a trace-producing runner
    pub fn from_runner(runner: Arc<dyn AgentRunner>) -> Self {
        Self::new(Arc::new(TraceAgent::new(runner)))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
