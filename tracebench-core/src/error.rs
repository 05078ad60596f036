//! Error types for evaluation operations

/// Result type for evaluation operations
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types for the evaluation engine
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// Recorder used out of sequence (start while tracing, record while idle, ...)
    #[error("Invalid recorder state: {0}")]
    InvalidState(String),

    /// A golden case exceeded its time budget
    #[error("Case {case_id} timed out after {timeout_ms}ms")]
    CaseTimeout { case_id: String, timeout_ms: u64 },

    /// A regular expression could not be compiled
    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl EvalError {
    pub(crate) fn invalid_pattern(pattern: &str, err: regex::Error) -> Self {
        EvalError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        }
    }
}

impl From<String> for EvalError {
    fn from(s: String) -> Self {
        EvalError::Other(s)
    }
}

impl From<&str> for EvalError {
    fn from(s: &str) -> Self {
        EvalError::Other(s.to_string())
    }
}

impl From<anyhow::Error> for EvalError {
    fn from(err: anyhow::Error) -> Self {
        EvalError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_mentions_timed_out() {
        let err = EvalError::CaseTimeout {
            case_id: "slow-case".to_string(),
            timeout_ms: 50,
        };
        let msg = err.to_string();
        assert!(msg.contains("timed out"));
        assert!(msg.contains("slow-case"));
        assert!(msg.contains("50ms"));
    }

    #[test]
    fn invalid_pattern_keeps_source_pattern() {
        let err = regex::Regex::new("(unclosed").unwrap_err();
        let err = EvalError::invalid_pattern("(unclosed", err);
        assert!(err.to_string().contains("(unclosed"));
    }
}
