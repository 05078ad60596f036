//! Metric functions
//!
//! Pure, deterministic scorers returning a score in `[0, 1]` plus diagnostics.
//! None of them panic or error on odd input; malformed arguments simply fail
//! to match.

mod argument_correctness;
mod step_efficiency;
mod tool_correctness;
mod value;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use argument_correctness::{
    score_argument_batch, score_arguments, ArgComparator, ArgumentBatchResult,
    ArgumentCorrectnessOptions, ArgumentCorrectnessResult, ArgumentMismatch, CallArgumentScore,
};
pub use step_efficiency::{
    default_patterns, score_step_efficiency, DetectedPattern, PatternDetector, RedundantPattern,
    Severity, StepEfficiencyOptions, StepEfficiencyResult, EXCESSIVE_TOOL_CALLS,
};
pub use tool_correctness::{
    score_tool_correctness, ToolCorrectnessOptions, ToolCorrectnessResult, ORDER_PENALTY_FACTOR,
};
pub use value::{deep_equal, is_subset};

/// Metrics a golden case can be scored on
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    ToolCorrectness,
    ArgumentCorrectness,
    StepEfficiency,
    OutputMatch,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::ToolCorrectness => "tool_correctness",
            MetricKind::ArgumentCorrectness => "argument_correctness",
            MetricKind::StepEfficiency => "step_efficiency",
            MetricKind::OutputMatch => "output_match",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
