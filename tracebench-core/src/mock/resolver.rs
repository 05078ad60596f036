//! Deterministic response resolver
//!
//! [`MockModel`] stands in for a live model. Each call is logged and then
//! resolved from, in order: the FIFO queue, the priority-ordered rules, the
//! default response.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use super::message::{last_user_text, ChatMessage, ToolDefinition};
use super::response::{FinishReason, MockResponse};
use crate::error::{EvalError, Result};

/// Predicate deciding whether a rule applies to a call
pub type RulePredicate = Arc<dyn Fn(&str, &[ChatMessage]) -> bool + Send + Sync>;

/// Response computed from the input text when a rule matches
pub type DynamicResponder = Arc<dyn Fn(&str) -> MockResponse + Send + Sync>;

/// What a rule returns when it matches
#[derive(Clone)]
pub enum Responder {
    Literal(MockResponse),
    Dynamic(DynamicResponder),
}

impl Responder {
    fn respond(&self, input_text: &str) -> MockResponse {
        match self {
            Responder::Literal(response) => response.clone(),
            Responder::Dynamic(f) => f(input_text),
        }
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Responder::Literal(response) => f.debug_tuple("Literal").field(response).finish(),
            Responder::Dynamic(_) => f.write_str("Dynamic(<fn>)"),
        }
    }
}

/// A conditional response
#[derive(Clone)]
pub struct ResponseRule {
    // Assigned on registration
    id: u64,
    name: Option<String>,
    predicate: RulePredicate,
    responder: Responder,
    priority: i32,
    once: bool,
    match_count: usize,
}

impl ResponseRule {
    /// Rule returning a fixed response
    pub fn new(
        predicate: impl Fn(&str, &[ChatMessage]) -> bool + Send + Sync + 'static,
        response: MockResponse,
    ) -> Self {
        Self {
            id: 0,
            name: None,
            predicate: Arc::new(predicate),
            responder: Responder::Literal(response),
            priority: 0,
            once: false,
            match_count: 0,
        }
    }

    /// Rule computing its response from the input text on each match
    pub fn dynamic(
        predicate: impl Fn(&str, &[ChatMessage]) -> bool + Send + Sync + 'static,
        responder: impl Fn(&str) -> MockResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Responder::Dynamic(Arc::new(responder)),
            ..Self::new(predicate, MockResponse::default())
        }
    }

    /// Rule that matches every call
    pub fn always(response: MockResponse) -> Self {
        Self::new(|_, _| true, response)
    }

    /// Higher priorities are evaluated first
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Only match the first time
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Label used in logs
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn match_count(&self) -> usize {
        self.match_count
    }

    fn exhausted(&self) -> bool {
        self.once && self.match_count > 0
    }
}

impl fmt::Debug for ResponseRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseRule")
            .field("name", &self.name)
            .field("responder", &self.responder)
            .field("priority", &self.priority)
            .field("once", &self.once)
            .field("match_count", &self.match_count)
            .finish_non_exhaustive()
    }
}

/// One logged call to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLogEntry {
    pub messages: Vec<ChatMessage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    pub timestamp: DateTime<Utc>,

    /// Content of the last user message, empty if none
    pub input_text: String,
}

#[derive(Debug)]
struct ResolverState {
    queue: VecDeque<MockResponse>,
    // Sorted by descending priority, registration order within a priority
    rules: Vec<ResponseRule>,
    next_rule_id: u64,
    default_response: MockResponse,
    calls: Vec<CallLogEntry>,
}

impl ResolverState {
    /// Bump the match count of a rule that is still registered and armed
    fn claim_rule(&mut self, id: u64) -> bool {
        match self.rules.iter_mut().find(|rule| rule.id == id) {
            Some(rule) if !rule.exhausted() => {
                rule.match_count += 1;
                true
            }
            _ => false,
        }
    }
}

impl Default for ResolverState {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            rules: Vec::new(),
            next_rule_id: 0,
            default_response: MockResponse::factory_default(),
            calls: Vec::new(),
        }
    }
}

/// Scripted stand-in for a live model
///
/// Methods take `&self` so a model can be shared with the agent under test.
/// One instance should drive one trace or scenario at a time.
#[derive(Debug, Default)]
pub struct MockModel {
    state: Mutex<ResolverState>,
    tool_call_counter: AtomicU64,
}

impl MockModel {
    /// Create a model with no queue, no rules and the factory default response
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a model with a custom default response
    pub fn with_default_response(response: MockResponse) -> Self {
        let model = Self::new();
        model.set_default_response(response);
        model
    }

    fn state(&self) -> MutexGuard<'_, ResolverState> {
        // A panicking rule closure must not brick the model for later calls
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append a response to the FIFO queue
    pub fn queue_response(&self, response: MockResponse) {
        self.state().queue.push_back(response);
    }

    /// Append several responses to the FIFO queue, in order
    pub fn queue_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        self.state().queue.extend(responses);
    }

    /// Number of queued responses not yet returned
    pub fn pending_responses(&self) -> usize {
        self.state().queue.len()
    }

    /// Register a rule, keeping rules sorted by descending priority
    pub fn set_response_rule(&self, mut rule: ResponseRule) {
        let mut state = self.state();
        state.next_rule_id += 1;
        rule.id = state.next_rule_id;
        let index = state
            .rules
            .iter()
            .position(|existing| existing.priority < rule.priority)
            .unwrap_or(state.rules.len());
        state.rules.insert(index, rule);
    }

    /// Respond with `response` whenever the input text contains `needle`
    pub fn when_input_contains(&self, needle: impl Into<String>, response: MockResponse) {
        let needle = needle.into();
        let name = format!("contains:{}", needle);
        self.set_response_rule(
            ResponseRule::new(move |input, _| input.contains(&needle), response).named(name),
        );
    }

    /// Respond with `response` whenever the input text matches `pattern`
    pub fn when_input_matches(&self, pattern: &str, response: MockResponse) -> Result<()> {
        let regex = Regex::new(pattern).map_err(|e| EvalError::invalid_pattern(pattern, e))?;
        self.set_response_rule(
            ResponseRule::new(move |input, _| regex.is_match(input), response)
                .named(format!("matches:{}", pattern)),
        );
        Ok(())
    }

    /// Number of registered rules
    pub fn rule_count(&self) -> usize {
        self.state().rules.len()
    }

    /// Replace the response used when neither queue nor rules apply
    pub fn set_default_response(&self, response: MockResponse) {
        self.state().default_response = response;
    }

    /// Log the call and resolve a response
    ///
    /// Rule predicates and dynamic responders run without the model's lock
    /// held, so they may call back into the model.
    pub fn get_response(
        &self,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> MockResponse {
        let input_text = last_user_text(messages);
        let mut state = self.state();

        state.calls.push(CallLogEntry {
            messages: messages.to_vec(),
            tools: tools.map(<[ToolDefinition]>::to_vec),
            timestamp: Utc::now(),
            input_text: input_text.clone(),
        });
        let call_number = state.calls.len();

        if let Some(queued) = state.queue.pop_front() {
            drop(state);
            debug!(call = call_number, source = "queue", "mock response resolved");
            return self.finalize(queued);
        }

        let candidates: Vec<ResponseRule> = state
            .rules
            .iter()
            .filter(|rule| !rule.exhausted())
            .cloned()
            .collect();
        let default_response = state.default_response.clone();
        drop(state);

        for rule in candidates {
            if !(rule.predicate)(&input_text, messages) {
                continue;
            }
            // A "once" rule may have fired on another thread in the meantime
            if !self.state().claim_rule(rule.id) {
                continue;
            }
            debug!(
                call = call_number,
                source = "rule",
                rule = rule.name.as_deref().unwrap_or("<unnamed>"),
                priority = rule.priority,
                "mock response resolved"
            );
            return self.finalize(rule.responder.respond(&input_text));
        }

        debug!(call = call_number, source = "default", "mock response resolved");
        self.finalize(default_response)
    }

    /// Assign synthetic tool-call ids and infer a missing finish reason
    fn finalize(&self, mut response: MockResponse) -> MockResponse {
        if let Some(calls) = response.tool_calls.as_mut() {
            for call in calls.iter_mut().filter(|c| c.tool_call_id.is_empty()) {
                let n = self.tool_call_counter.fetch_add(1, Ordering::SeqCst) + 1;
                call.tool_call_id = format!("tc-mock-{}", n);
            }
        }

        if response.finish_reason.is_none() {
            response.finish_reason = Some(if response.has_tool_calls() {
                FinishReason::ToolCalls
            } else {
                FinishReason::Stop
            });
        }
        response
    }

    /// Every logged call, oldest first
    pub fn calls(&self) -> Vec<CallLogEntry> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn last_call(&self) -> Option<CallLogEntry> {
        self.state().calls.last().cloned()
    }

    /// Clear the queue, the call log and "once" counters; rules are kept
    pub fn reset(&self) {
        let mut state = self.state();
        state.queue.clear();
        state.calls.clear();
        for rule in state.rules.iter_mut() {
            rule.match_count = 0;
        }
    }

    /// Reset and also remove every rule
    pub fn clear(&self) {
        self.reset();
        self.state().rules.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockToolCall;
    use serde_json::json;

    fn ask(model: &MockModel, text: &str) -> MockResponse {
        model.get_response(&[ChatMessage::user(text)], None)
    }

    #[test]
    fn queue_wins_then_rule_then_default() {
        let model = MockModel::new();
        model.queue_response(MockResponse::text("A"));
        model.set_response_rule(ResponseRule::always(MockResponse::text("B")).once());

        assert_eq!(ask(&model, "hi").text.as_deref(), Some("A"));
        assert_eq!(ask(&model, "hi").text.as_deref(), Some("B"));
        assert_eq!(ask(&model, "hi").text.as_deref(), Some("Mock response"));
    }

    #[test]
    fn rules_by_priority_then_registration_order() {
        let model = MockModel::new();
        let rule = |text: &str, priority| {
            ResponseRule::always(MockResponse::text(text)).with_priority(priority)
        };
        model.set_response_rule(rule("low", 1));
        model.set_response_rule(rule("first-high", 5));
        model.set_response_rule(rule("second-high", 5));

        assert_eq!(ask(&model, "x").text.as_deref(), Some("first-high"));
        assert_eq!(model.rule_count(), 3);
    }

    #[test]
    fn input_text_is_last_user_message() {
        let model = MockModel::new();
        model.when_input_contains("deploy", MockResponse::text("deploying"));

        let messages = vec![
            ChatMessage::user("please deploy"),
            ChatMessage::assistant("which env?"),
            ChatMessage::user("staging"),
        ];
        let response = model.get_response(&messages, None);

        assert_eq!(response.text.as_deref(), Some("Mock response"));
        assert_eq!(model.last_call().unwrap().input_text, "staging");

        model.get_response(&[ChatMessage::system("no user")], None);
        assert_eq!(model.last_call().unwrap().input_text, "");
    }

    #[test]
    fn dynamic_responder_sees_input() {
        let model = MockModel::new();
        model.set_response_rule(ResponseRule::dynamic(
            |input, _| input.starts_with("echo "),
            |input| MockResponse::text(input.trim_start_matches("echo ").to_uppercase()),
        ));

        assert_eq!(ask(&model, "echo hello").text.as_deref(), Some("HELLO"));
    }

    #[test]
    fn when_input_matches_rejects_bad_pattern() {
        let model = MockModel::new();
        let err = model
            .when_input_matches("(unclosed", MockResponse::text("x"))
            .unwrap_err();
        assert!(matches!(err, EvalError::InvalidPattern { .. }));

        model
            .when_input_matches(r"^find \w+", MockResponse::text("found"))
            .unwrap();
        assert_eq!(ask(&model, "find files").text.as_deref(), Some("found"));
    }

    #[test]
    fn synthetic_tool_call_ids_increase() {
        let model = MockModel::new();
        model.queue_responses(vec![
            MockResponse::tool_calls(vec![
                MockToolCall::new("glob", json!({"pattern": "*.rs"})),
                MockToolCall::with_id("fixed", "grep", json!({})),
            ]),
            MockResponse::tool_call("readFile", json!({"path": "/a"})),
        ]);

        let first = ask(&model, "go");
        let ids: Vec<_> = first
            .requested_tool_calls()
            .iter()
            .map(|c| c.tool_call_id.as_str())
            .collect();
        assert_eq!(ids, vec!["tc-mock-1", "fixed"]);

        let second = ask(&model, "go");
        assert_eq!(second.requested_tool_calls()[0].tool_call_id, "tc-mock-2");
        assert_eq!(second.finish_reason, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn missing_finish_reason_is_inferred() {
        let model = MockModel::new();
        model.queue_response(MockResponse {
            tool_calls: Some(vec![MockToolCall::new("grep", json!({}))]),
            ..Default::default()
        });
        model.queue_response(MockResponse {
            text: Some("plain".to_string()),
            ..Default::default()
        });

        assert_eq!(ask(&model, "a").finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(ask(&model, "b").finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn reset_keeps_rules_and_rearms_once() {
        let model = MockModel::new();
        model.set_response_rule(ResponseRule::always(MockResponse::text("once")).once());
        model.queue_response(MockResponse::text("queued"));
        model.queue_response(MockResponse::text("queued-2"));

        assert_eq!(ask(&model, "x").text.as_deref(), Some("queued"));
        model.reset();

        assert_eq!(model.pending_responses(), 0);
        assert_eq!(model.call_count(), 0);
        assert_eq!(ask(&model, "x").text.as_deref(), Some("once"));
        assert_eq!(ask(&model, "x").text.as_deref(), Some("Mock response"));

        model.reset();
        assert_eq!(ask(&model, "x").text.as_deref(), Some("once"));

        model.clear();
        assert_eq!(model.rule_count(), 0);
        assert_eq!(ask(&model, "x").text.as_deref(), Some("Mock response"));
    }

    #[test]
    fn calls_are_logged_with_tools() {
        let model = MockModel::with_default_response(MockResponse::text("custom"));
        let tools = vec![ToolDefinition::new("grep", "Search file contents")];

        let response = model.get_response(&[ChatMessage::user("search")], Some(&tools));

        assert_eq!(response.text.as_deref(), Some("custom"));
        let calls = model.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tools.as_ref().unwrap()[0].name, "grep");
        assert_eq!(calls[0].messages.len(), 1);
    }

    #[test]
    fn when_input_contains_fires_on_match() {
        let model = MockModel::new();
        model.when_input_contains(
            "TODO",
            MockResponse::tool_call("grep", json!({"pattern": "TODO"})),
        );

        let response = ask(&model, "Find all files containing TODO");
        assert_eq!(response.requested_tool_calls()[0].tool_name, "grep");
        assert_eq!(ask(&model, "hello").text.as_deref(), Some("Mock response"));
    }

    #[test]
    fn rule_closures_can_read_the_model() {
        let model = Arc::new(MockModel::new());
        let inner = Arc::clone(&model);
        let seen = Arc::clone(&model);
        model.set_response_rule(ResponseRule::dynamic(
            move |_, _| seen.call_count() > 0,
            move |_| MockResponse::text(format!("call #{}", inner.call_count())),
        ));

        let (tx, rx) = std::sync::mpsc::channel();
        let worker = Arc::clone(&model);
        std::thread::spawn(move || {
            let first = ask(&worker, "one").text;
            let second = ask(&worker, "two").text;
            let _ = tx.send((first, second));
        });

        let (first, second) = rx
            .recv_timeout(std::time::Duration::from_secs(2))
            .expect("get_response did not return");
        assert_eq!(first.as_deref(), Some("call #1"));
        assert_eq!(second.as_deref(), Some("call #2"));
    }

    #[test]
    fn once_rule_survives_callbacks_that_add_rules() {
        let model = Arc::new(MockModel::new());
        let inner = Arc::clone(&model);
        model.set_response_rule(
            ResponseRule::dynamic(
                |_, _| true,
                move |_| {
                    inner.queue_response(MockResponse::text("queued by rule"));
                    MockResponse::text("from rule")
                },
            )
            .once(),
        );

        assert_eq!(ask(&model, "x").text.as_deref(), Some("from rule"));
        assert_eq!(ask(&model, "x").text.as_deref(), Some("queued by rule"));
        assert_eq!(ask(&model, "x").text.as_deref(), Some("Mock response"));
    }
}
