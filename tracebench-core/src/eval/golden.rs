//! Golden case definitions
//!
//! A golden case is a declarative, regression-style expectation for one input.
//! Cases are plain data and load from JSON or YAML files.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{EvalError, Result};

/// A declarative expectation for one agent input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GoldenCase {
    /// Case identifier
    pub id: String,

    /// Input passed to the agent
    pub input: String,

    /// Description of what this case checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Tools the agent should call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_tools: Option<Vec<String>>,

    /// Expected arguments per tool name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_tool_args: Option<HashMap<String, Map<String, Value>>>,

    /// Substrings the output must contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_contains: Option<Vec<String>>,

    /// Substrings the output must not contain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_not_contains: Option<Vec<String>>,

    /// Regular expressions the output must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output_matches: Option<Vec<String>>,

    /// Minimum tool-call steps the task needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_min_steps: Option<usize>,

    /// Tool-call steps above which the case is penalized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_max_steps: Option<usize>,

    /// Tags for filtering and per-tag reporting
    #[serde(default)]
    pub tags: Vec<String>,

    /// Skip this case entirely
    #[serde(default)]
    pub skip: bool,
}

impl GoldenCase {
    pub fn new(id: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            input: input.into(),
            ..Default::default()
        }
    }

    pub fn expect_tools<S: Into<String>>(mut self, tools: impl IntoIterator<Item = S>) -> Self {
        self.expected_tools = Some(tools.into_iter().map(Into::into).collect());
        self
    }

    pub fn expect_tool_args(mut self, tool: impl Into<String>, args: Value) -> Self {
        let args = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.expected_tool_args
            .get_or_insert_with(HashMap::new)
            .insert(tool.into(), args);
        self
    }

    pub fn expect_output_contains(mut self, text: impl Into<String>) -> Self {
        self.expected_output_contains
            .get_or_insert_with(Vec::new)
            .push(text.into());
        self
    }

    pub fn expect_output_not_contains(mut self, text: impl Into<String>) -> Self {
        self.expected_output_not_contains
            .get_or_insert_with(Vec::new)
            .push(text.into());
        self
    }

    pub fn expect_output_matches(mut self, pattern: impl Into<String>) -> Self {
        self.expected_output_matches
            .get_or_insert_with(Vec::new)
            .push(pattern.into());
        self
    }

    pub fn expect_steps(mut self, min: Option<usize>, max: Option<usize>) -> Self {
        self.expected_min_steps = min;
        self.expected_max_steps = max;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn skipped(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Whether the case carries any of `tags`
    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        self.tags.iter().any(|t| tags.contains(t))
    }

    /// Whether any output expectation is set
    pub fn has_output_expectations(&self) -> bool {
        self.expected_output_contains.is_some()
            || self.expected_output_not_contains.is_some()
            || self.expected_output_matches.is_some()
    }

    /// Check the case is well formed
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(EvalError::Configuration("golden case id must not be empty".to_string()));
        }

        if let (Some(min), Some(max)) = (self.expected_min_steps, self.expected_max_steps) {
            if min > max {
                return Err(EvalError::Configuration(format!(
                    "case {}: expected_min_steps ({}) exceeds expected_max_steps ({})",
                    self.id, min, max
                )));
            }
        }

        for pattern in self.expected_output_matches.iter().flatten() {
            Regex::new(pattern).map_err(|e| EvalError::invalid_pattern(pattern, e))?;
        }

        Ok(())
    }
}

/// Case files hold either a bare list or a `cases:` list
#[derive(Deserialize)]
#[serde(untagged)]
enum CaseFile {
    List(Vec<GoldenCase>),
    Suite { cases: Vec<GoldenCase> },
}

impl CaseFile {
    fn into_cases(self) -> Vec<GoldenCase> {
        match self {
            CaseFile::List(cases) | CaseFile::Suite { cases } => cases,
        }
    }
}

/// Load golden cases from a `.json`, `.yaml` or `.yml` file
pub fn load_cases(path: impl AsRef<Path>) -> Result<Vec<GoldenCase>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;

    let file: CaseFile = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("json") => serde_json::from_str(&content)?,
        other => {
            return Err(EvalError::Configuration(format!(
                "unsupported golden case file extension: {}",
                other.unwrap_or("<none>")
            )));
        }
    };

    Ok(file.into_cases())
}

/// Save golden cases as pretty JSON
pub fn save_cases(cases: &[GoldenCase], path: impl AsRef<Path>) -> Result<()> {
    let content = serde_json::to_string_pretty(cases)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Validate every case and reject duplicate ids
pub fn validate_cases(cases: &[GoldenCase]) -> Result<()> {
    let mut seen = HashSet::new();
    for case in cases {
        case.validate()?;
        if !seen.insert(case.id.as_str()) {
            return Err(EvalError::Configuration(format!(
                "duplicate golden case id: {}",
                case.id
            )));
        }
    }
    Ok(())
}
