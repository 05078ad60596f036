//! Configuration for golden evaluation runs

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{EvalError, Result};
use crate::eval::GoldenRunOptions;
use crate::scoring::{StepEfficiencyOptions, ToolCorrectnessOptions};

/// Default configuration file looked up in the working directory
pub const CONFIG_FILE: &str = "tracebench.toml";

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "TRACEBENCH_CONFIG_PATH";

/// Prefix for environment overrides; nested keys are split on `__`
pub const ENV_PREFIX: &str = "TRACEBENCH_";

/// Evaluation run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Minimum overall score for a case to pass (0.7)
    pub pass_threshold: f64,

    /// Stop after the first failed case
    pub stop_on_failure: bool,

    /// Budget for each case
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    /// Keep traces on results
    pub include_trace: bool,

    /// Only run cases with one of these tags (empty runs all)
    pub filter_tags: Vec<String>,

    /// Drop cases with one of these tags
    pub skip_tags: Vec<String>,

    /// Tool correctness scoring
    pub tool_correctness: ToolCorrectnessOptions,

    /// Step efficiency scoring
    pub step_efficiency: StepEfficiencyConfig,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            pass_threshold: 0.7,
            stop_on_failure: false,
            timeout: Duration::from_secs(30),
            include_trace: false,
            filter_tags: Vec::new(),
            skip_tags: Vec::new(),
            tool_correctness: ToolCorrectnessOptions::default(),
            step_efficiency: StepEfficiencyConfig::default(),
        }
    }
}

/// Step efficiency configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepEfficiencyConfig {
    /// Base penalty per redundant pattern (0.15)
    pub redundancy_penalty: f64,

    /// Check the built-in redundant patterns
    pub use_default_patterns: bool,
}

impl Default for StepEfficiencyConfig {
    fn default() -> Self {
        Self {
            redundancy_penalty: 0.15,
            use_default_patterns: true,
        }
    }
}

impl EvalConfig {
    /// Load configuration from files and environment variables.
    ///
    /// Loads in this order, later sources overriding earlier ones:
    /// 1. Defaults
    /// 2. `tracebench.toml` in the working directory
    /// 3. The file named by `TRACEBENCH_CONFIG_PATH`
    /// 4. `TRACEBENCH_*` environment variables (`__` separates nested keys)
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load() -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(EvalConfig::default()))
            .merge(Toml::file(CONFIG_FILE));

        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            figment = figment.merge(Toml::file(path));
        }

        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific TOML file on top of the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(EvalError::Configuration(format!(
                "configuration file not found: {}",
                path.display()
            )));
        }

        Self::from_figment(
            Figment::from(Serialized::defaults(EvalConfig::default())).merge(Toml::file(path)),
        )
    }

    /// Extract and validate configuration from an assembled figment
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: EvalConfig = figment.extract().map_err(|e| {
            EvalError::Configuration(format!("Failed to load configuration: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a threshold or penalty is outside `[0, 1]` or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(EvalError::Configuration(format!(
                "pass_threshold must be within [0, 1], got {}",
                self.pass_threshold
            )));
        }

        if !(0.0..=1.0).contains(&self.step_efficiency.redundancy_penalty) {
            return Err(EvalError::Configuration(format!(
                "step_efficiency.redundancy_penalty must be within [0, 1], got {}",
                self.step_efficiency.redundancy_penalty
            )));
        }

        if self.timeout.is_zero() {
            return Err(EvalError::Configuration("timeout must be greater than zero".to_string()));
        }

        Ok(())
    }

    /// Orchestrator options for this configuration; callbacks are added by the caller
    pub fn to_options(&self) -> GoldenRunOptions {
        let tags = |tags: &[String]| (!tags.is_empty()).then(|| tags.to_vec());

        GoldenRunOptions {
            pass_threshold: self.pass_threshold,
            stop_on_failure: self.stop_on_failure,
            timeout: self.timeout,
            include_trace: self.include_trace,
            filter_tags: tags(&self.filter_tags),
            skip_tags: tags(&self.skip_tags),
            tool_correctness: self.tool_correctness.clone(),
            step_efficiency: StepEfficiencyOptions {
                redundancy_penalty: self.step_efficiency.redundancy_penalty,
                use_default_patterns: self.step_efficiency.use_default_patterns,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Pretty JSON rendering, used when printing the effective configuration
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
