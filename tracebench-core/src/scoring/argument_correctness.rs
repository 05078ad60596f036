//! Argument correctness: did a tool call carry the expected arguments?

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::value::deep_equal;
use crate::trace::ToolCall;

/// Custom equality for one argument: `(key, actual, expected) -> matched`
pub type ArgComparator = Arc<dyn Fn(&str, &Value, &Value) -> bool + Send + Sync>;

/// Argument correctness options
#[derive(Clone)]
pub struct ArgumentCorrectnessOptions {
    /// Compare composite values structurally; when off only scalars can match
    pub deep_compare: bool,

    /// Expected keys excluded from scoring
    pub ignore_keys: Vec<String>,

    /// Per-key values accepted in place of the expected value
    pub value_aliases: HashMap<String, Vec<Value>>,

    /// When false, unexpected argument keys are listed in the details
    pub allow_extra_args: bool,

    /// Consulted before alias and structural comparison
    pub custom_comparator: Option<ArgComparator>,
}

impl Default for ArgumentCorrectnessOptions {
    fn default() -> Self {
        Self {
            deep_compare: true,
            ignore_keys: Vec::new(),
            value_aliases: HashMap::new(),
            allow_extra_args: true,
            custom_comparator: None,
        }
    }
}

impl fmt::Debug for ArgumentCorrectnessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgumentCorrectnessOptions")
            .field("deep_compare", &self.deep_compare)
            .field("ignore_keys", &self.ignore_keys)
            .field("value_aliases", &self.value_aliases)
            .field("allow_extra_args", &self.allow_extra_args)
            .field("custom_comparator", &self.custom_comparator.is_some())
            .finish()
    }
}

impl ArgumentCorrectnessOptions {
    pub fn ignore_key(mut self, key: impl Into<String>) -> Self {
        self.ignore_keys.push(key.into());
        self
    }

    pub fn alias(mut self, key: impl Into<String>, value: Value) -> Self {
        self.value_aliases.entry(key.into()).or_default().push(value);
        self
    }

    pub fn with_comparator(
        mut self,
        comparator: impl Fn(&str, &Value, &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.custom_comparator = Some(Arc::new(comparator));
        self
    }
}

/// An argument whose value did not match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentMismatch {
    pub key: String,
    pub expected: Value,
    pub actual: Value,
}

/// Argument correctness score and diagnostics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentCorrectnessResult {
    pub score: f64,
    pub matched_keys: Vec<String>,
    pub missing_keys: Vec<String>,
    pub incorrect: Vec<ArgumentMismatch>,
    pub extra_keys: Vec<String>,
    pub details: Vec<String>,
}

fn values_match(
    key: &str,
    actual: &Value,
    expected: &Value,
    options: &ArgumentCorrectnessOptions,
) -> bool {
    if let Some(comparator) = &options.custom_comparator {
        if comparator(key, actual, expected) {
            return true;
        }
    }

    if options
        .value_aliases
        .get(key)
        .is_some_and(|aliases| aliases.iter().any(|alias| deep_equal(actual, alias)))
    {
        return true;
    }

    if options.deep_compare {
        deep_equal(actual, expected)
    } else {
        match (actual, expected) {
            (Value::Array(_) | Value::Object(_), _) | (_, Value::Array(_) | Value::Object(_)) => {
                false
            }
            _ => deep_equal(actual, expected),
        }
    }
}

/// Score one call's arguments against expected arguments
///
/// Arguments that are not a JSON object are treated as empty.
pub fn score_arguments(
    call: &ToolCall,
    expected_args: &Map<String, Value>,
    options: &ArgumentCorrectnessOptions,
) -> ArgumentCorrectnessResult {
    let empty = Map::new();
    let actual = call.args.as_object().unwrap_or(&empty);
    let ignored: HashSet<&str> = options.ignore_keys.iter().map(String::as_str).collect();

    let mut matched_keys = Vec::new();
    let mut missing_keys = Vec::new();
    let mut incorrect = Vec::new();
    let mut details = Vec::new();

    let scored: Vec<(&String, &Value)> = expected_args
        .iter()
        .filter(|(k, _)| !ignored.contains(k.as_str()))
        .collect();

    for (key, expected) in &scored {
        match actual.get(key.as_str()) {
            None => {
                missing_keys.push(key.to_string());
                details.push(format!("{}: missing argument '{}'", call.tool_name, key));
            }
            Some(value) if values_match(key, value, expected, options) => {
                matched_keys.push(key.to_string());
            }
            Some(value) => {
                details.push(format!(
                    "{}: argument '{}' expected {} but got {}",
                    call.tool_name, key, expected, value
                ));
                incorrect.push(ArgumentMismatch {
                    key: key.to_string(),
                    expected: (*expected).clone(),
                    actual: value.clone(),
                });
            }
        }
    }

    let extra_keys: Vec<String> = actual
        .keys()
        .filter(|k| !expected_args.contains_key(*k) && !ignored.contains(k.as_str()))
        .cloned()
        .collect();
    if !options.allow_extra_args && !extra_keys.is_empty() {
        details.push(format!(
            "{}: unexpected arguments {}",
            call.tool_name,
            extra_keys.join(", ")
        ));
    }

    let score = if scored.is_empty() {
        1.0
    } else {
        matched_keys.len() as f64 / scored.len() as f64
    };

    ArgumentCorrectnessResult {
        score,
        matched_keys,
        missing_keys,
        incorrect,
        extra_keys,
        details,
    }
}

/// Per-call result within a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallArgumentScore {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: ArgumentCorrectnessResult,
}

/// Averaged argument correctness over many calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgumentBatchResult {
    /// Mean of per-call scores; 1 when no call had expectations
    pub score: f64,
    pub calls: Vec<CallArgumentScore>,
}

/// Score every call whose tool has expected arguments, skipping the rest
pub fn score_argument_batch(
    calls: &[ToolCall],
    expected_by_tool: &HashMap<String, Map<String, Value>>,
    options: &ArgumentCorrectnessOptions,
) -> ArgumentBatchResult {
    let scored: Vec<CallArgumentScore> = calls
        .iter()
        .filter_map(|call| {
            expected_by_tool.get(&call.tool_name).map(|expected| CallArgumentScore {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                result: score_arguments(call, expected, options),
            })
        })
        .collect();

    let score = if scored.is_empty() {
        1.0
    } else {
        scored.iter().map(|c| c.result.score).sum::<f64>() / scored.len() as f64
    };

    ArgumentBatchResult {
        score,
        calls: scored,
    }
}
