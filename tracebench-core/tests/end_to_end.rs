//! End-to-end tests through the public API

use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracebench_core::eval::AgentFn;
use tracebench_core::mock::{ChatMessage, MockAgent, MockModel, MockResponse, ResponseRule};
use tracebench_core::prelude::*;
use tracebench_core::trace::{codec, TraceStats};

fn args(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

#[tokio::test]
async fn grep_scenario_passes_with_mock_agent() {
    let model = Arc::new(MockModel::new());
    model.queue_responses(vec![
        MockResponse::tool_call("grep", json!({"pattern": "TODO"})),
        MockResponse::text("Found 3 files containing TODO"),
    ]);
    let agent = Arc::new(MockAgent::new(model.clone()));

    let result = Scenario::named("find todos")
        .user("Find all files containing TODO")
        .agent()
        .assert_tool_called("grep", Some(json!({"pattern": "TODO"})))
        .assert_output_not_empty()
        .run(&ScenarioAgentConfig::from_runner(agent))
        .await;

    assert!(result.success, "{:?}", result.failures());
    assert_eq!(result.step_results.len(), 2);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].call.tool_name, "grep");
    assert_eq!(model.call_count(), 2);
}

#[test]
fn resolver_precedence_queue_then_rule_then_default() {
    let model = MockModel::new();
    model.queue_response(MockResponse::text("A"));
    model.set_response_rule(ResponseRule::always(MockResponse::text("B")).once());

    let messages = vec![ChatMessage::user("anything")];
    let texts: Vec<Option<String>> = (0..3)
        .map(|_| model.get_response(&messages, None).text)
        .collect();

    assert_eq!(
        texts,
        vec![
            Some("A".to_string()),
            Some("B".to_string()),
            Some("Mock response".to_string())
        ]
    );
}

#[tokio::test]
async fn golden_case_that_never_resolves_times_out() {
    let runner = AgentFn(|_input: String| std::future::pending::<anyhow::Result<Trace>>());
    let cases = vec![GoldenCase::new("stuck", "never returns")];
    let options = GoldenRunOptions::default().with_timeout(Duration::from_millis(30));

    let report = run_golden_cases(&cases, Arc::new(runner), options).await;

    assert_eq!(report.failed, 1);
    assert!(!report.results[0].passed);
    assert!(report.results[0].error.as_deref().unwrap().contains("timed out"));
}

#[test]
fn tool_correctness_ordering_penalty() {
    let options = ToolCorrectnessOptions {
        consider_ordering: true,
        ..Default::default()
    };
    let expected = ["readFile", "grep"];

    let swapped = vec![
        ToolCall::new("1", "grep", json!({})),
        ToolCall::new("2", "readFile", json!({})),
    ];
    let in_order = vec![
        ToolCall::new("1", "readFile", json!({})),
        ToolCall::new("2", "grep", json!({})),
    ];

    assert!((score_tool_correctness(&swapped, &expected, &options).score - 0.8).abs() < 1e-9);
    assert_eq!(score_tool_correctness(&in_order, &expected, &options).score, 1.0);
}

#[test]
fn tool_correctness_without_expectations_counts_extras() {
    let none: [&str; 0] = [];
    let options = ToolCorrectnessOptions {
        allowed_extra_tools: vec!["glob".to_string()],
        ..Default::default()
    };

    assert_eq!(score_tool_correctness(&[], &none, &options).score, 1.0);
    let allowed = vec![ToolCall::new("1", "glob", json!({}))];
    assert_eq!(score_tool_correctness(&allowed, &none, &options).score, 1.0);
    let extra = vec![
        ToolCall::new("1", "grep", json!({})),
        ToolCall::new("2", "readFile", json!({})),
    ];
    assert_eq!(score_tool_correctness(&extra, &none, &options).score, 0.0);
}

#[test]
fn argument_correctness_scores() {
    let options = ArgumentCorrectnessOptions::default();
    let call = ToolCall::new("1", "readFile", json!({"path": "/test.ts"}));

    let exact = score_arguments(&call, &args(json!({"path": "/test.ts"})), &options);
    assert_eq!(exact.score, 1.0);

    let missing = score_arguments(&call, &args(json!({"file": "/test.ts"})), &options);
    assert_eq!(missing.score, 0.0);
    assert_eq!(missing.missing_keys, vec!["file"]);

    let two_keys = ToolCall::new("2", "grep", json!({"pattern": "TODO", "path": "/lib"}));
    let half = score_arguments(
        &two_keys,
        &args(json!({"pattern": "TODO", "path": "/src"})),
        &options,
    );
    assert_eq!(half.score, 0.5);
}

#[test]
fn step_efficiency_flags_repeated_reads() {
    let mut recorder = TraceRecorder::new();
    recorder.start_trace("read three files", None).unwrap();
    for path in ["/a.rs", "/b.rs", "/c.rs"] {
        recorder.record_tool_call("readFile", json!({"path": path}), None).unwrap();
    }
    let trace = recorder.end_trace("done", None).unwrap();

    let result = score_step_efficiency(&trace.steps, &StepEfficiencyOptions::default());
    assert!(result.score < 1.0);
    assert!(result
        .detected_patterns
        .iter()
        .any(|p| p.name == "repeated-tool-call"));
}

#[test]
fn recorder_cancel_is_idempotent() {
    let mut recorder = TraceRecorder::new();
    assert!(!recorder.cancel_trace());
    assert!(!recorder.cancel_trace());
    assert!(!recorder.is_tracing());
    assert_eq!(recorder.get_stats(), TraceStats::default());

    recorder.start_trace("x", None).unwrap();
    assert!(recorder.cancel_trace());
    assert!(!recorder.cancel_trace());
    assert!(recorder.history().is_empty());
}

#[tokio::test]
async fn failing_trace_round_trips_through_disk() {
    let model = Arc::new(MockModel::new());
    model.queue_response(MockResponse::tool_call("grep", json!({"pattern": "TODO"})));
    let agent = MockAgent::new(model);
    let trace = agent.run_agent("Find all files containing TODO").await.unwrap();

    let dir = tempfile::TempDir::new().unwrap();
    for name in ["trace.json", "trace.jsonl"] {
        let path = dir.path().join(name);
        codec::save(&trace, &path).unwrap();
        assert_eq!(codec::load(&path).unwrap(), trace);
    }
}
