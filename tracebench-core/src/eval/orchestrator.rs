//! Golden case orchestration
//!
//! The orchestrator coordinates:
//! - Filtering cases by `skip` and tags
//! - Running each case against the agent under a timeout, one at a time
//! - Scoring the resulting trace against the case's expectations
//! - Aggregating results into an [`EvaluationReport`]

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::golden::GoldenCase;
use super::report::EvaluationReport;
use super::runner::{race_with_timeout, AgentRunner, RaceOutcome};
use crate::error::EvalError;
use crate::scoring::{
    score_argument_batch, score_step_efficiency, score_tool_correctness,
    ArgumentCorrectnessOptions, MetricKind, StepEfficiencyOptions, ToolCorrectnessOptions,
};
use crate::trace::Trace;

/// Flat penalty when a run exceeds `expected_max_steps`
pub const MAX_STEPS_PENALTY: f64 = 0.3;

/// Called after each case with `(completed, total, result)`
pub type ProgressCallback = Arc<dyn Fn(usize, usize, &EvaluationResult) + Send + Sync>;

/// Options for a golden run
#[derive(Clone)]
pub struct GoldenRunOptions {
    /// Minimum overall score for a case to pass
    pub pass_threshold: f64,

    /// Stop after the first failed case
    pub stop_on_failure: bool,

    /// Budget for each case
    pub timeout: Duration,

    /// Keep the trace on each result
    pub include_trace: bool,

    /// Only run cases carrying one of these tags
    pub filter_tags: Option<Vec<String>>,

    /// Drop cases carrying one of these tags
    pub skip_tags: Option<Vec<String>>,

    pub tool_correctness: ToolCorrectnessOptions,

    pub argument_correctness: ArgumentCorrectnessOptions,

    /// Base options for step efficiency; min steps come from each case
    pub step_efficiency: StepEfficiencyOptions,

    pub on_progress: Option<ProgressCallback>,
}

impl Default for GoldenRunOptions {
    fn default() -> Self {
        Self {
            pass_threshold: 0.7,
            stop_on_failure: false,
            timeout: Duration::from_secs(30),
            include_trace: false,
            filter_tags: None,
            skip_tags: None,
            tool_correctness: ToolCorrectnessOptions::default(),
            argument_correctness: ArgumentCorrectnessOptions::default(),
            step_efficiency: StepEfficiencyOptions::default(),
            on_progress: None,
        }
    }
}

impl fmt::Debug for GoldenRunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoldenRunOptions")
            .field("pass_threshold", &self.pass_threshold)
            .field("stop_on_failure", &self.stop_on_failure)
            .field("timeout", &self.timeout)
            .field("include_trace", &self.include_trace)
            .field("filter_tags", &self.filter_tags)
            .field("skip_tags", &self.skip_tags)
            .field("tool_correctness", &self.tool_correctness)
            .field("argument_correctness", &self.argument_correctness)
            .field("step_efficiency", &self.step_efficiency)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl GoldenRunOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_progress(
        mut self,
        callback: impl Fn(usize, usize, &EvaluationResult) + Send + Sync + 'static,
    ) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Whether an overall score meets the pass threshold
    pub fn passes(&self, score: f64) -> bool {
        score >= self.pass_threshold
    }

    /// Whether a case survives `skip` and tag filtering
    pub fn selects(&self, case: &GoldenCase) -> bool {
        if case.skip {
            return false;
        }
        if let Some(filter) = self.filter_tags.as_ref().filter(|t| !t.is_empty()) {
            if !case.has_any_tag(filter) {
                return false;
            }
        }
        if let Some(skip) = &self.skip_tags {
            if case.has_any_tag(skip) {
                return false;
            }
        }
        true
    }
}

/// Outcome of one golden case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub case_id: String,

    pub input: String,

    pub passed: bool,

    /// Scores for the metrics this case had expectations for
    pub scores: BTreeMap<MetricKind, f64>,

    /// Mean of `scores`, 1 when none applied, 0 on error
    pub score: f64,

    pub details: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,

    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResult {
    fn errored(case: &GoldenCase, error: String, duration: Duration) -> Self {
        Self {
            case_id: case.id.clone(),
            input: case.input.clone(),
            passed: false,
            scores: BTreeMap::new(),
            score: 0.0,
            details: vec![error.clone()],
            trace: None,
            duration_ms: duration.as_millis() as u64,
            error: Some(error),
        }
    }

    /// Why the case failed, if it did
    pub fn failure_reason(&self) -> Option<String> {
        if self.passed {
            return None;
        }
        Some(match &self.error {
            Some(error) => error.clone(),
            None => format!("score below threshold ({:.2})", self.score),
        })
    }
}

/// Fraction of output sub-checks that pass
fn score_output(case: &GoldenCase, output: &str, details: &mut Vec<String>) -> f64 {
    let mut total = 0usize;
    let mut passed = 0usize;

    for text in case.expected_output_contains.iter().flatten() {
        total += 1;
        if output.contains(text.as_str()) {
            passed += 1;
        } else {
            details.push(format!("Output does not contain '{}'", text));
        }
    }

    for text in case.expected_output_not_contains.iter().flatten() {
        total += 1;
        if output.contains(text.as_str()) {
            details.push(format!("Output unexpectedly contains '{}'", text));
        } else {
            passed += 1;
        }
    }

    for pattern in case.expected_output_matches.iter().flatten() {
        total += 1;
        match Regex::new(pattern) {
            Ok(re) if re.is_match(output) => passed += 1,
            Ok(_) => details.push(format!("Output does not match /{}/", pattern)),
            Err(e) => details.push(format!("Invalid pattern '{}': {}", pattern, e)),
        }
    }

    if total == 0 {
        1.0
    } else {
        passed as f64 / total as f64
    }
}

/// Score a finished trace against a golden case
///
/// Only metrics whose expectation fields are set are computed.
pub fn score_trace(
    case: &GoldenCase,
    trace: &Trace,
    options: &GoldenRunOptions,
) -> (BTreeMap<MetricKind, f64>, Vec<String>) {
    let mut scores = BTreeMap::new();
    let mut details = Vec::new();
    let tool_calls = trace.tool_calls();

    if let Some(expected) = &case.expected_tools {
        let result = score_tool_correctness(&tool_calls, expected, &options.tool_correctness);
        details.extend(result.details);
        scores.insert(MetricKind::ToolCorrectness, result.score);
    }

    if let Some(expected) = &case.expected_tool_args {
        let result = score_argument_batch(&tool_calls, expected, &options.argument_correctness);
        details.extend(result.calls.into_iter().flat_map(|c| c.result.details));
        scores.insert(MetricKind::ArgumentCorrectness, result.score);
    }

    if case.expected_min_steps.is_some() || case.expected_max_steps.is_some() {
        let step_options = StepEfficiencyOptions {
            expected_min_steps: case.expected_min_steps,
            ..options.step_efficiency.clone()
        };
        let result = score_step_efficiency(&trace.steps, &step_options);
        let mut score = result.score;
        details.extend(result.details);

        if let Some(max) = case.expected_max_steps {
            if result.actual_steps > max {
                score = (score - MAX_STEPS_PENALTY).max(0.0);
                details.push(format!(
                    "Exceeded max steps: {} > {}",
                    result.actual_steps, max
                ));
            }
        }
        scores.insert(MetricKind::StepEfficiency, score);
    }

    if case.has_output_expectations() {
        let score = score_output(case, &trace.output, &mut details);
        scores.insert(MetricKind::OutputMatch, score);
    }

    (scores, details)
}

/// Mean of the computed metric scores; 1 when no metric applied
pub fn overall_score(scores: &BTreeMap<MetricKind, f64>) -> f64 {
    if scores.is_empty() {
        1.0
    } else {
        scores.values().sum::<f64>() / scores.len() as f64
    }
}

/// Runs golden cases against an agent
pub struct Orchestrator {
    runner: Arc<dyn AgentRunner>,
    options: GoldenRunOptions,
}

impl Orchestrator {
    pub fn new(runner: Arc<dyn AgentRunner>) -> Self {
        Self::with_options(runner, GoldenRunOptions::default())
    }

    pub fn with_options(runner: Arc<dyn AgentRunner>, options: GoldenRunOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &GoldenRunOptions {
        &self.options
    }

    /// Run one case, isolating any failure into the result
    pub async fn run_case(&self, case: &GoldenCase) -> EvaluationResult {
        let start = Instant::now();
        let runner = self.runner.clone();
        let input = case.input.clone();

        let outcome = race_with_timeout(
            async move { runner.run_agent(&input).await },
            self.options.timeout,
        )
        .await;

        match outcome {
            RaceOutcome::Completed(trace) => {
                let (scores, details) = score_trace(case, &trace, &self.options);
                let score = overall_score(&scores);
                EvaluationResult {
                    case_id: case.id.clone(),
                    input: case.input.clone(),
                    passed: self.options.passes(score),
                    scores,
                    score,
                    details,
                    trace: self.options.include_trace.then_some(trace),
                    duration_ms: start.elapsed().as_millis() as u64,
                    error: None,
                }
            }
            RaceOutcome::Failed(message) => {
                warn!(case_id = %case.id, error = %message, "golden case errored");
                EvaluationResult::errored(case, message, start.elapsed())
            }
            RaceOutcome::TimedOut => {
                let error = EvalError::CaseTimeout {
                    case_id: case.id.clone(),
                    timeout_ms: self.options.timeout.as_millis() as u64,
                };
                warn!(
                    case_id = %case.id,
                    timeout_ms = self.options.timeout.as_millis() as u64,
                    "golden case timed out; the agent call is left running"
                );
                EvaluationResult::errored(case, error.to_string(), start.elapsed())
            }
        }
    }

    /// Run the selected cases sequentially and aggregate a report
    pub async fn run(&self, cases: &[GoldenCase]) -> EvaluationReport {
        let selected: Vec<&GoldenCase> = cases.iter().filter(|c| self.options.selects(c)).collect();
        let total = selected.len();
        info!(total, skipped = cases.len() - total, "running golden cases");

        let mut results = Vec::with_capacity(total);
        for case in selected {
            let result = self.run_case(case).await;
            info!(
                case_id = %result.case_id,
                passed = result.passed,
                score = result.score,
                duration_ms = result.duration_ms,
                "golden case finished"
            );

            let failed = !result.passed;
            results.push(result);

            if let (Some(callback), Some(last)) = (&self.options.on_progress, results.last()) {
                callback(results.len(), total, last);
            }

            if failed && self.options.stop_on_failure {
                warn!(case_id = %case.id, "stopping after failed case");
                break;
            }
        }

        let report = EvaluationReport::from_results(results, cases);
        info!(
            total = report.total,
            passed = report.passed,
            failed = report.failed,
            pass_rate = report.pass_rate,
            "golden run finished"
        );
        report
    }
}

/// Run golden cases against `runner` with `options`
pub async fn run_golden_cases(
    cases: &[GoldenCase],
    runner: Arc<dyn AgentRunner>,
    options: GoldenRunOptions,
) -> EvaluationReport {
    Orchestrator::with_options(runner, options).run(cases).await
}
