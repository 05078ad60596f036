//! Step efficiency: did the agent reach its goal without wasted tool calls?
//!
//! Only tool-call steps count as steps. The base score compares the observed
//! count with the minimum expected; every detected redundant pattern then
//! subtracts `redundancy_penalty * severity multiplier`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::trace::{Step, ToolCallPayload};

/// How wasteful a redundant pattern is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn multiplier(&self) -> f64 {
        match self {
            Severity::Low => 0.5,
            Severity::Medium => 1.0,
            Severity::High => 1.5,
        }
    }
}

/// Detector over a trace's steps
pub type PatternDetector = Arc<dyn Fn(&[Step]) -> bool + Send + Sync>;

/// A heuristic signature of wasted or looping tool usage
#[derive(Clone)]
pub struct RedundantPattern {
    pub name: String,
    pub severity: Severity,
    pub detect: PatternDetector,
}

impl RedundantPattern {
    pub fn new(
        name: impl Into<String>,
        severity: Severity,
        detect: impl Fn(&[Step]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            severity,
            detect: Arc::new(detect),
        }
    }
}

impl fmt::Debug for RedundantPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedundantPattern")
            .field("name", &self.name)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

/// Tool-call count above which `excessive-tool-calls` fires
pub const EXCESSIVE_TOOL_CALLS: usize = 10;

fn tool_calls(steps: &[Step]) -> Vec<&ToolCallPayload> {
    steps.iter().filter_map(Step::as_tool_call).collect()
}

fn path_arg(call: &ToolCallPayload) -> Option<&str> {
    call.args
        .get("path")
        .or_else(|| call.args.get("file_path"))
        .and_then(|v| v.as_str())
}

fn detect_duplicate_read(steps: &[Step]) -> bool {
    let mut seen = HashSet::new();
    tool_calls(steps)
        .into_iter()
        .filter(|c| c.tool_name == "readFile")
        .filter_map(path_arg)
        .any(|path| !seen.insert(path))
}

fn detect_glob_before_grep(steps: &[Step]) -> bool {
    tool_calls(steps)
        .windows(2)
        .any(|w| w[0].tool_name == "glob" && w[1].tool_name == "grep")
}

fn detect_repeated_tool_call(steps: &[Step]) -> bool {
    tool_calls(steps)
        .windows(3)
        .any(|w| w[0].tool_name == w[1].tool_name && w[1].tool_name == w[2].tool_name)
}

fn detect_write_then_read(steps: &[Step]) -> bool {
    tool_calls(steps).windows(2).any(|w| {
        matches!(w[0].tool_name.as_str(), "writeFile" | "editFile")
            && w[1].tool_name == "readFile"
            && path_arg(w[0]).is_some()
            && path_arg(w[0]) == path_arg(w[1])
    })
}

fn detect_excessive_tool_calls(steps: &[Step]) -> bool {
    tool_calls(steps).len() > EXCESSIVE_TOOL_CALLS
}

/// The built-in redundant patterns
pub fn default_patterns() -> Vec<RedundantPattern> {
    vec![
        RedundantPattern::new("duplicate-read", Severity::Medium, detect_duplicate_read),
        RedundantPattern::new(
            "unnecessary-glob-before-grep",
            Severity::Low,
            detect_glob_before_grep,
        ),
        RedundantPattern::new("repeated-tool-call", Severity::Medium, detect_repeated_tool_call),
        RedundantPattern::new("write-then-read-same-file", Severity::Low, detect_write_then_read),
        RedundantPattern::new("excessive-tool-calls", Severity::High, detect_excessive_tool_calls),
    ]
}

/// Step efficiency options
#[derive(Debug, Clone)]
pub struct StepEfficiencyOptions {
    /// Minimum number of tool calls the task needs
    pub expected_min_steps: Option<usize>,

    /// Patterns checked in addition to (or instead of) the defaults
    pub redundant_patterns: Vec<RedundantPattern>,

    pub use_default_patterns: bool,

    /// Base penalty per detected pattern, scaled by severity
    pub redundancy_penalty: f64,
}

impl Default for StepEfficiencyOptions {
    fn default() -> Self {
        Self {
            expected_min_steps: None,
            redundant_patterns: Vec::new(),
            use_default_patterns: true,
            redundancy_penalty: 0.15,
        }
    }
}

impl StepEfficiencyOptions {
    pub fn with_min_steps(mut self, steps: usize) -> Self {
        self.expected_min_steps = Some(steps);
        self
    }

    pub fn with_pattern(mut self, pattern: RedundantPattern) -> Self {
        self.redundant_patterns.push(pattern);
        self
    }
}

/// A pattern found in the trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub name: String,
    pub severity: Severity,
    pub penalty: f64,
}

/// Step efficiency score and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEfficiencyResult {
    pub score: f64,

    /// Number of tool-call steps
    pub actual_steps: usize,

    pub expected_min_steps: Option<usize>,

    /// Score before redundancy penalties
    pub base_score: f64,

    pub detected_patterns: Vec<DetectedPattern>,

    pub total_penalty: f64,

    pub details: Vec<String>,
}

/// Score a step sequence for efficiency
pub fn score_step_efficiency(
    steps: &[Step],
    options: &StepEfficiencyOptions,
) -> StepEfficiencyResult {
    let actual_steps = steps.iter().filter(|s| s.is_tool_call()).count();
    let mut details = vec![format!("{} tool-call steps", actual_steps)];

    let base_score = match options.expected_min_steps {
        Some(expected) => {
            details.push(format!("Expected at least {} steps", expected));
            match (expected, actual_steps) {
                (0, 0) => 1.0,
                (_, 0) => 0.0,
                (expected, actual) => (expected as f64 / actual as f64).min(1.0),
            }
        }
        None => 1.0,
    };

    let defaults = if options.use_default_patterns {
        default_patterns()
    } else {
        Vec::new()
    };

    let detected_patterns: Vec<DetectedPattern> = defaults
        .iter()
        .chain(options.redundant_patterns.iter())
        .filter(|pattern| (pattern.detect)(steps))
        .map(|pattern| DetectedPattern {
            name: pattern.name.clone(),
            severity: pattern.severity,
            penalty: options.redundancy_penalty * pattern.severity.multiplier(),
        })
        .collect();

    for pattern in &detected_patterns {
        details.push(format!(
            "Redundant pattern '{}' ({:?}, -{:.3})",
            pattern.name, pattern.severity, pattern.penalty
        ));
    }

    let total_penalty: f64 = detected_patterns.iter().map(|p| p.penalty).sum();

    StepEfficiencyResult {
        score: (base_score - total_penalty).clamp(0.0, 1.0),
        actual_steps,
        expected_min_steps: options.expected_min_steps,
        base_score,
        detected_patterns,
        total_penalty,
        details,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{StepData, TextPayload};
    use serde_json::{json, Value};

    fn call(name: &str, args: Value) -> Step {
        Step::now(StepData::ToolCall(ToolCallPayload {
            tool_name: name.to_string(),
            args,
            tool_call_id: None,
        }))
    }

    fn names(result: &StepEfficiencyResult) -> Vec<&str> {
        result.detected_patterns.iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn three_consecutive_reads_are_repeated() {
        let steps = vec![
            call("readFile", json!({"path": "/a"})),
            call("readFile", json!({"path": "/b"})),
            call("readFile", json!({"path": "/c"})),
        ];
        let result = score_step_efficiency(&steps, &StepEfficiencyOptions::default());

        assert_eq!(names(&result), vec!["repeated-tool-call"]);
        assert!(result.score < 1.0);
        assert!((result.score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn same_path_read_twice_is_duplicate() {
        let steps = vec![
            call("readFile", json!({"path": "/a"})),
            call("grep", json!({"pattern": "x"})),
            call("readFile", json!({"path": "/a"})),
        ];
        let result = score_step_efficiency(&steps, &StepEfficiencyOptions::default());
        assert_eq!(names(&result), vec!["duplicate-read"]);
    }

    #[test]
    fn glob_then_grep_and_write_then_read() {
        let steps = vec![
            call("glob", json!({"pattern": "**/*.rs"})),
            call("grep", json!({"pattern": "TODO"})),
            call("writeFile", json!({"path": "/out.txt", "content": "x"})),
            call("readFile", json!({"path": "/out.txt"})),
        ];
        let result = score_step_efficiency(&steps, &StepEfficiencyOptions::default());

        assert_eq!(
            names(&result),
            vec!["unnecessary-glob-before-grep", "write-then-read-same-file"]
        );
        // two low-severity hits: 2 * 0.15 * 0.5
        assert!((result.score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn excessive_calls_floor_at_zero() {
        let steps: Vec<Step> = (0..12)
            .map(|i| call("readFile", json!({"path": format!("/f{}", i % 2)})))
            .collect();
        let options = StepEfficiencyOptions {
            redundancy_penalty: 0.5,
            ..Default::default()
        };
        let result = score_step_efficiency(&steps, &options);

        assert!(names(&result).contains(&"excessive-tool-calls"));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn base_score_from_min_steps() {
        let text = Step::now(StepData::Text(TextPayload { text: "thinking".to_string() }));
        let steps = vec![
            text,
            call("readFile", json!({"path": "/a"})),
            call("grep", json!({"pattern": "x"})),
            call("editFile", json!({"path": "/a"})),
            call("bash", json!({"cmd": "cargo fmt"})),
        ];
        let options = StepEfficiencyOptions::default().with_min_steps(2);
        let result = score_step_efficiency(&steps, &options);

        assert_eq!(result.actual_steps, 4);
        assert_eq!(result.score, 0.5);

        assert_eq!(
            score_step_efficiency(&[], &StepEfficiencyOptions::default().with_min_steps(0)).score,
            1.0
        );
        assert_eq!(
            score_step_efficiency(&[], &StepEfficiencyOptions::default().with_min_steps(3)).score,
            0.0
        );
    }

    #[test]
    fn custom_patterns_without_defaults() {
        let steps = vec![
            call("bash", json!({"cmd": "rm -rf /tmp/x"})),
            call("readFile", json!({"path": "/a"})),
            call("readFile", json!({"path": "/a"})),
        ];
        let options = StepEfficiencyOptions {
            use_default_patterns: false,
            ..Default::default()
        }
        .with_pattern(RedundantPattern::new("shell-usage", Severity::High, |steps| {
            steps
                .iter()
                .filter_map(Step::as_tool_call)
                .any(|c| c.tool_name == "bash")
        }));

        let result = score_step_efficiency(&steps, &options);
        assert_eq!(names(&result), vec!["shell-usage"]);
        assert!((result.score - 0.775).abs() < 1e-9);
    }
}
