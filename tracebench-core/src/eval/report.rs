//! Aggregated evaluation reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use super::golden::GoldenCase;
use super::orchestrator::EvaluationResult;
use crate::error::Result;
use crate::scoring::MetricKind;

/// Pass counts for one tag
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagStats {
    pub passed: usize,
    pub total: usize,
    pub pass_rate: f64,
}

/// Summary of one golden run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,

    /// Fraction of passed cases, rounded to two decimals
    pub pass_rate: f64,

    /// Mean per metric over the cases that computed it
    pub average_scores: BTreeMap<MetricKind, f64>,

    /// Mean overall case score
    pub overall_average: f64,

    pub by_tag: BTreeMap<String, TagStats>,

    pub results: Vec<EvaluationResult>,

    pub generated_at: DateTime<Utc>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn rate(passed: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(passed as f64 / total as f64)
    }
}

impl EvaluationReport {
    /// Aggregate results; `cases` is the case set before filtering
    pub fn from_results(results: Vec<EvaluationResult>, cases: &[GoldenCase]) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();

        let mut sums: BTreeMap<MetricKind, (f64, usize)> = BTreeMap::new();
        for result in &results {
            for (metric, score) in &result.scores {
                let entry = sums.entry(*metric).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }
        let average_scores = sums
            .into_iter()
            .map(|(metric, (sum, count))| (metric, sum / count as f64))
            .collect();

        let overall_average = if total == 0 {
            0.0
        } else {
            results.iter().map(|r| r.score).sum::<f64>() / total as f64
        };

        let by_id: HashMap<&str, &EvaluationResult> =
            results.iter().map(|r| (r.case_id.as_str(), r)).collect();
        let mut by_tag: BTreeMap<String, TagStats> = BTreeMap::new();
        for case in cases {
            let Some(result) = by_id.get(case.id.as_str()) else {
                continue;
            };
            for tag in &case.tags {
                let stats = by_tag.entry(tag.clone()).or_default();
                stats.total += 1;
                if result.passed {
                    stats.passed += 1;
                }
            }
        }
        for stats in by_tag.values_mut() {
            stats.pass_rate = rate(stats.passed, stats.total);
        }

        Self {
            total,
            passed,
            failed: total - passed,
            pass_rate: rate(passed, total),
            average_scores,
            overall_average,
            by_tag,
            results,
            generated_at: Utc::now(),
        }
    }

    /// Results that did not pass
    pub fn failures(&self) -> impl Iterator<Item = &EvaluationResult> {
        self.results.iter().filter(|r| !r.passed)
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Deterministic plain-text summary
    pub fn render_summary(&self) -> String {
        let mut lines = vec![
            "=== Golden Evaluation Summary ===".to_string(),
            format!("Total: {}", self.total),
            format!("Passed: {}", self.passed),
            format!("Failed: {}", self.failed),
            format!("Pass rate: {:.2}%", self.pass_rate * 100.0),
            format!("Overall average: {:.2}", self.overall_average),
        ];

        if !self.average_scores.is_empty() {
            lines.push(String::new());
            lines.push("Metric averages:".to_string());
            for (metric, score) in &self.average_scores {
                lines.push(format!("  {}: {:.2}", metric, score));
            }
        }

        if !self.by_tag.is_empty() {
            lines.push(String::new());
            lines.push("By tag:".to_string());
            for (tag, stats) in &self.by_tag {
                lines.push(format!(
                    "  {}: {}/{} ({:.2}%)",
                    tag,
                    stats.passed,
                    stats.total,
                    stats.pass_rate * 100.0
                ));
            }
        }

        let failures: Vec<String> = self
            .failures()
            .filter_map(|r| {
                r.failure_reason()
                    .map(|reason| format!("  - {}: {}", r.case_id, reason))
            })
            .collect();
        if !failures.is_empty() {
            lines.push(String::new());
            lines.push("Failed cases:".to_string());
            lines.extend(failures);
        }

        lines.join("\n")
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the report as pretty JSON
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json_pretty()?)?;
        Ok(())
    }

    /// Read a report written by [`write_json`](Self::write_json)
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
