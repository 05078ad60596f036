//! Assertions checked against one agent turn

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::scoring::is_subset;
use crate::trace::ToolCall;

/// A check attached to an agent turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Assertion {
    OutputNotEmpty,
    OutputContains { text: String },
    OutputMatches { pattern: String },
    ToolCalled {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },
    ToolNotCalled { name: String },
    /// First call of `first` precedes first call of `then`
    ToolOrder { first: String, then: String },
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::OutputNotEmpty => write!(f, "output not empty"),
            Assertion::OutputContains { text } => write!(f, "output contains '{}'", text),
            Assertion::OutputMatches { pattern } => write!(f, "output matches /{}/", pattern),
            Assertion::ToolCalled { name, args: None } => write!(f, "tool '{}' called", name),
            Assertion::ToolCalled {
                name,
                args: Some(args),
            } => write!(f, "tool '{}' called with {}", name, args),
            Assertion::ToolNotCalled { name } => write!(f, "tool '{}' not called", name),
            Assertion::ToolOrder { first, then } => {
                write!(f, "tool '{}' called before '{}'", first, then)
            }
        }
    }
}

/// Outcome of one assertion
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Verdict {
    pub passed: bool,
    pub message: String,
}

impl Verdict {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

fn first_index(calls: &[ToolCall], name: &str) -> Option<usize> {
    calls.iter().position(|c| c.tool_name == name)
}

impl Assertion {
    /// Check this assertion against a turn's output and tool calls
    pub(crate) fn check(&self, output: &str, tool_calls: &[ToolCall]) -> Verdict {
        match self {
            Assertion::OutputNotEmpty => {
                if output.trim().is_empty() {
                    Verdict::fail("Output is empty")
                } else {
                    Verdict::pass(format!("Output has {} characters", output.len()))
                }
            }
            Assertion::OutputContains { text } => {
                if output.contains(text.as_str()) {
                    Verdict::pass(format!("Output contains '{}'", text))
                } else {
                    Verdict::fail(format!("Output does not contain '{}'", text))
                }
            }
            Assertion::OutputMatches { pattern } => match Regex::new(pattern) {
                Ok(re) if re.is_match(output) => {
                    Verdict::pass(format!("Output matches /{}/", pattern))
                }
                Ok(_) => Verdict::fail(format!("Output does not match /{}/", pattern)),
                Err(e) => Verdict::fail(format!("Invalid pattern '{}': {}", pattern, e)),
            },
            Assertion::ToolCalled { name, args } => {
                let named: Vec<&ToolCall> =
                    tool_calls.iter().filter(|c| &c.tool_name == name).collect();
                match (named.is_empty(), args) {
                    (true, _) => Verdict::fail(format!("Tool '{}' was not called", name)),
                    (false, None) => {
                        Verdict::pass(format!("Tool '{}' called {} time(s)", name, named.len()))
                    }
                    (false, Some(expected)) => {
                        if named.iter().any(|c| is_subset(expected, &c.args)) {
                            Verdict::pass(format!("Tool '{}' called with {}", name, expected))
                        } else {
                            let seen: Vec<String> =
                                named.iter().map(|c| c.args.to_string()).collect();
                            Verdict::fail(format!(
                                "Tool '{}' never called with {} (saw {})",
                                name,
                                expected,
                                seen.join(", ")
                            ))
                        }
                    }
                }
            }
            Assertion::ToolNotCalled { name } => match first_index(tool_calls, name) {
                Some(index) => {
                    Verdict::fail(format!("Tool '{}' was called (call #{})", name, index + 1))
                }
                None => Verdict::pass(format!("Tool '{}' was not called", name)),
            },
            Assertion::ToolOrder { first, then } => {
                match (first_index(tool_calls, first), first_index(tool_calls, then)) {
                    (Some(a), Some(b)) if a < b => {
                        Verdict::pass(format!(
                            "'{}' (#{}) before '{}' (#{})",
                            first,
                            a + 1,
                            then,
                            b + 1
                        ))
                    }
                    (Some(a), Some(b)) => Verdict::fail(format!(
                        "'{}' (#{}) was not called before '{}' (#{})",
                        first,
                        a + 1,
                        then,
                        b + 1
                    )),
                    (None, _) => Verdict::fail(format!("Tool '{}' was not called", first)),
                    (_, None) => Verdict::fail(format!("Tool '{}' was not called", then)),
                }
            }
        }
    }
}
