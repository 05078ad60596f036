//! Scripted multi-turn scenarios with assertions
//!
//! A scenario is an ordered list of user and agent turns. Each agent turn runs
//! the agent once on every user message so far and checks the assertions
//! chained after `.agent()`.
//!
//! # Example
//!
//! ```rust,no_run
//! use tracebench_core::scenario::{Scenario, ScenarioAgentConfig};
//! use serde_json::json;
//! # async fn demo(config: ScenarioAgentConfig) {
//! let result = Scenario::named("find todos")
//!     .user("Find all files containing TODO")
//!     .agent()
//!     .assert_tool_called("grep", Some(json!({"pattern": "TODO"})))
//!     .assert_output_not_empty()
//!     .run(&config)
//!     .await;
//!
//! assert!(result.success, "{:?}", result.failures());
//! # }
//! ```

mod agent;
mod assertion;

pub use agent::{AgentReply, ScenarioAgent, ScenarioAgentConfig, TraceAgent, DEFAULT_TURN_TIMEOUT};
pub use assertion::Assertion;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::eval::runner::{race_with_timeout, RaceOutcome};
use crate::trace::ToolCall;

/// One turn of a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    User { text: String },
    Agent { assertions: Vec<Assertion> },
}

/// A scripted exchange
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub turns: Vec<Turn>,
}

/// Result of one assertion (or of a turn that could not run)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Index of the agent turn, counting from 0
    pub turn: usize,
    pub assertion: String,
    pub passed: bool,
    pub message: String,
}

/// A tool call observed during a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub turn: usize,

    #[serde(flatten)]
    pub call: ToolCall,
}

/// Outcome of running a scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,

    /// True when every assertion of every turn passed
    pub success: bool,

    pub step_results: Vec<StepResult>,

    pub tool_calls: Vec<ToolCallRecord>,
}

impl ScenarioResult {
    /// Step results that did not pass
    pub fn failures(&self) -> Vec<&StepResult> {
        self.step_results.iter().filter(|s| !s.passed).collect()
    }
}

impl Scenario {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            turns: Vec::new(),
        }
    }

    /// Append a user message
    pub fn user(mut self, text: impl Into<String>) -> Self {
        self.turns.push(Turn::User { text: text.into() });
        self
    }

    /// Open an agent turn; following assertions attach to it
    pub fn agent(mut self) -> Self {
        self.turns.push(Turn::Agent {
            assertions: Vec::new(),
        });
        self
    }

    /// Attach an assertion to the last agent turn, opening one if needed
    pub fn assert(mut self, assertion: Assertion) -> Self {
        match self.turns.last_mut() {
            Some(Turn::Agent { assertions }) => assertions.push(assertion),
            _ => self.turns.push(Turn::Agent {
                assertions: vec![assertion],
            }),
        }
        self
    }

    pub fn assert_output_not_empty(self) -> Self {
        self.assert(Assertion::OutputNotEmpty)
    }

    pub fn assert_output_contains(self, text: impl Into<String>) -> Self {
        self.assert(Assertion::OutputContains { text: text.into() })
    }

    pub fn assert_output_matches(self, pattern: impl Into<String>) -> Self {
        self.assert(Assertion::OutputMatches {
            pattern: pattern.into(),
        })
    }

    /// Require a call to `name`; `args` must be a subset of the call's arguments
    pub fn assert_tool_called(self, name: impl Into<String>, args: Option<Value>) -> Self {
        self.assert(Assertion::ToolCalled {
            name: name.into(),
            args,
        })
    }

    pub fn assert_tool_not_called(self, name: impl Into<String>) -> Self {
        self.assert(Assertion::ToolNotCalled { name: name.into() })
    }

    /// Require the first call of `first` to precede the first call of `then`
    pub fn assert_tool_order(self, first: impl Into<String>, then: impl Into<String>) -> Self {
        self.assert(Assertion::ToolOrder {
            first: first.into(),
            then: then.into(),
        })
    }

    /// Run every agent turn against the configured agent
    ///
    /// A turn that errors or times out fails each of its assertions (or a
    /// synthetic "agent turn completes" check when it has none); later turns
    /// still run.
    pub async fn run(&self, config: &ScenarioAgentConfig) -> ScenarioResult {
        let mut user_messages: Vec<&str> = Vec::new();
        let mut step_results = Vec::new();
        let mut tool_calls = Vec::new();
        let mut agent_turn = 0;

        for turn in &self.turns {
            let assertions = match turn {
                Turn::User { text } => {
                    user_messages.push(text);
                    continue;
                }
                Turn::Agent { assertions } => assertions,
            };

            let input = user_messages.join("\n");
            let agent = config.agent.clone();
            debug!(scenario = %self.name, turn = agent_turn, "running agent turn");

            let outcome = race_with_timeout(
                async move { agent.run_agent(&input).await },
                config.timeout,
            )
            .await;

            match outcome {
                RaceOutcome::Completed(reply) => {
                    for assertion in assertions {
                        let verdict = assertion.check(&reply.output, &reply.tool_calls);
                        step_results.push(StepResult {
                            turn: agent_turn,
                            assertion: assertion.to_string(),
                            passed: verdict.passed,
                            message: verdict.message,
                        });
                    }
                    tool_calls.extend(reply.tool_calls.into_iter().map(|call| ToolCallRecord {
                        turn: agent_turn,
                        call,
                    }));
                }
                RaceOutcome::Failed(message) => {
                    warn!(
                        scenario = %self.name,
                        turn = agent_turn,
                        error = %message,
                        "agent turn failed"
                    );
                    push_turn_failure(&mut step_results, agent_turn, assertions, &message);
                }
                RaceOutcome::TimedOut => {
                    let message = format!(
                        "Agent turn {} timed out after {}ms",
                        agent_turn,
                        config.timeout.as_millis()
                    );
                    warn!(scenario = %self.name, turn = agent_turn, "{}", message);
                    push_turn_failure(&mut step_results, agent_turn, assertions, &message);
                }
            }

            agent_turn += 1;
        }

        let success = step_results.iter().all(|s| s.passed);
        info!(
            scenario = %self.name,
            success,
            assertions = step_results.len(),
            failed = step_results.iter().filter(|s| !s.passed).count(),
            "scenario finished"
        );

        ScenarioResult {
            name: self.name.clone(),
            success,
            step_results,
            tool_calls,
        }
    }
}

fn push_turn_failure(
    step_results: &mut Vec<StepResult>,
    turn: usize,
    assertions: &[Assertion],
    message: &str,
) {
    if assertions.is_empty() {
        step_results.push(StepResult {
            turn,
            assertion: "agent turn completes".to_string(),
            passed: false,
            message: message.to_string(),
        });
    }
    for assertion in assertions {
        step_results.push(StepResult {
            turn,
            assertion: assertion.to_string(),
            passed: false,
            message: message.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Records every input it sees and replies with a grep call
    #[derive(Default)]
    struct GrepAgent {
        inputs: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ScenarioAgent for GrepAgent {
        async fn run_agent(&self, input: &str) -> anyhow::Result<AgentReply> {
            self.inputs.lock().unwrap().push(input.to_string());
            Ok(AgentReply::new("Found 2 files")
                .with_tool_call(ToolCall::new("tc-0", "glob", json!({"pattern": "**/*"})))
                .with_tool_call(ToolCall::new("tc-1", "grep", json!({"pattern": "TODO"}))))
        }
    }

    struct SlowAgent;

    #[async_trait]
    impl ScenarioAgent for SlowAgent {
        async fn run_agent(&self, _input: &str) -> anyhow::Result<AgentReply> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AgentReply::new("late"))
        }
    }

    struct FailingAgent;

    #[async_trait]
    impl ScenarioAgent for FailingAgent {
        async fn run_agent(&self, _input: &str) -> anyhow::Result<AgentReply> {
            anyhow::bail!("model unavailable")
        }
    }

    #[tokio::test]
    async fn passing_scenario_accumulates_input() {
        let agent = Arc::new(GrepAgent::default());
        let config = ScenarioAgentConfig::new(agent.clone());

        let result = Scenario::named("two turns")
            .user("Find TODOs")
            .agent()
            .assert_tool_called("grep", Some(json!({"pattern": "TODO"})))
            .assert_tool_order("glob", "grep")
            .user("Only in src")
            .agent()
            .assert_output_contains("2 files")
            .assert_tool_not_called("bash")
            .run(&config)
            .await;

        assert!(result.success, "{:?}", result.failures());
        assert_eq!(result.step_results.len(), 4);
        assert_eq!(result.tool_calls.len(), 4);
        assert_eq!(result.tool_calls[2].turn, 1);

        let inputs = agent.inputs.lock().unwrap().clone();
        assert_eq!(inputs, vec!["Find TODOs", "Find TODOs\nOnly in src"]);
    }

    #[tokio::test]
    async fn one_failed_assertion_fails_scenario() {
        let config = ScenarioAgentConfig::new(Arc::new(GrepAgent::default()));

        let result = Scenario::named("wrong order")
            .user("Find TODOs")
            .agent()
            .assert_output_not_empty()
            .assert_tool_order("grep", "glob")
            .run(&config)
            .await;

        assert!(!result.success);
        assert_eq!(result.failures().len(), 1);
        assert!(result.failures()[0].assertion.contains("before"));
    }

    #[tokio::test]
    async fn timed_out_turn_fails_its_assertions() {
        let config =
            ScenarioAgentConfig::new(Arc::new(SlowAgent)).with_timeout(Duration::from_millis(20));

        let result = Scenario::named("slow")
            .user("hello")
            .agent()
            .assert_output_not_empty()
            .run(&config)
            .await;

        assert!(!result.success);
        assert!(result.step_results[0].message.contains("timed out"));
    }

    #[tokio::test]
    async fn erroring_turn_without_assertions_still_fails() {
        let config = ScenarioAgentConfig::new(Arc::new(FailingAgent));

        let result = Scenario::named("broken").user("hello").agent().run(&config).await;

        assert!(!result.success);
        assert_eq!(result.step_results.len(), 1);
        assert!(result.step_results[0].message.contains("model unavailable"));
    }

    #[test]
    fn assertion_without_agent_turn_opens_one() {
        let scenario = Scenario::named("implicit").user("hi").assert_output_not_empty();
        assert!(matches!(
            scenario.turns.last(),
            Some(Turn::Agent { assertions }) if assertions.len() == 1
        ));
    }
}
