//! Tool correctness: were the expected tools called, and in order?

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::trace::ToolCall;

/// Multiplier applied when expected tools were called out of order
pub const ORDER_PENALTY_FACTOR: f64 = 0.8;

/// Tool correctness options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCorrectnessOptions {
    /// Penalize expected tools observed in a different relative order
    #[serde(default)]
    pub consider_ordering: bool,

    /// Penalize tools outside the expected and allowed sets
    #[serde(default)]
    pub exact_match: bool,

    /// Tools that may appear without being expected
    #[serde(default)]
    pub allowed_extra_tools: Vec<String>,
}

/// Tool correctness score and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCorrectnessResult {
    pub score: f64,

    /// Expected tools never called
    pub missing_tools: Vec<String>,

    /// Called tools that were neither expected nor allowed
    pub extra_tools: Vec<String>,

    /// False when ordering was checked and did not match
    pub order_correct: bool,

    pub details: Vec<String>,
}

/// Names in first-occurrence order, without duplicates
fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    names.into_iter().filter(|n| seen.insert(*n)).collect()
}

/// Score observed tool calls against an expected tool list
pub fn score_tool_correctness<S: AsRef<str>>(
    observed: &[ToolCall],
    expected_tools: &[S],
    options: &ToolCorrectnessOptions,
) -> ToolCorrectnessResult {
    let observed_names = unique_names(observed.iter().map(|c| c.tool_name.as_str()));
    let expected_names = unique_names(expected_tools.iter().map(AsRef::as_ref));
    let allowed: HashSet<&str> = options.allowed_extra_tools.iter().map(String::as_str).collect();

    let missing_tools: Vec<String> = expected_names
        .iter()
        .filter(|name| !observed_names.contains(name))
        .map(|name| name.to_string())
        .collect();
    let extra_tools: Vec<String> = observed_names
        .iter()
        .filter(|name| !expected_names.contains(name) && !allowed.contains(*name))
        .map(|name| name.to_string())
        .collect();

    let mut details = Vec::new();

    if expected_names.is_empty() {
        let score = if extra_tools.is_empty() { 1.0 } else { 0.0 };
        if extra_tools.is_empty() {
            details.push("No tools expected and none disallowed were called".to_string());
        } else {
            details.push(format!(
                "No tools expected but called: {}",
                extra_tools.join(", ")
            ));
        }
        return ToolCorrectnessResult {
            score,
            missing_tools,
            extra_tools,
            order_correct: true,
            details,
        };
    }

    let expected_count = expected_names.len();
    let found = expected_count - missing_tools.len();
    let mut score = found as f64 / expected_count as f64;
    details.push(format!("Called {}/{} expected tools", found, expected_count));
    if !missing_tools.is_empty() {
        details.push(format!("Missing tools: {}", missing_tools.join(", ")));
    }

    if options.exact_match && !extra_tools.is_empty() {
        let extra_count = extra_tools.len() as f64;
        let penalty = extra_count / (expected_count as f64 + extra_count);
        score = (score - penalty).max(0.0);
        details.push(format!(
            "Unexpected tools: {} (penalty {:.2})",
            extra_tools.join(", "),
            penalty
        ));
    }

    let mut order_correct = true;
    if options.consider_ordering && score > 0.0 {
        let observed_order: Vec<&str> = observed_names
            .iter()
            .copied()
            .filter(|name| expected_names.contains(name))
            .collect();
        let expected_order: Vec<&str> = expected_names
            .iter()
            .copied()
            .filter(|name| observed_names.contains(name))
            .collect();

        if observed_order != expected_order {
            order_correct = false;
            score *= ORDER_PENALTY_FACTOR;
            details.push(format!(
                "Tool order mismatch: expected [{}], got [{}]",
                expected_order.join(", "),
                observed_order.join(", ")
            ));
        }
    }

    ToolCorrectnessResult {
        score: score.clamp(0.0, 1.0),
        missing_tools,
        extra_tools,
        order_correct,
        details,
    }
}
