//! Tracebench CLI - Command-line tools for agent evaluation artifacts

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracebench_core::config::EvalConfig;
use tracebench_core::eval::{
    load_cases, overall_score, score_trace, validate_cases, EvaluationReport, GoldenCase,
};
use tracebench_core::trace::{codec, StepData, Trace};

#[derive(Parser)]
#[command(name = "tracebench")]
#[command(about = "Deterministic evaluation tools for coding agents", long_about = None)]
#[command(version)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Configuration file used instead of tracebench.toml and TRACEBENCH_* env vars
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the summary of a saved evaluation report
    Report {
        /// Report JSON file
        file: PathBuf,

        /// Print the full report as JSON instead of the summary
        #[arg(long)]
        json: bool,

        /// Exit with status 1 when any case failed
        #[arg(long)]
        strict: bool,
    },
    /// Inspect and score persisted traces
    Trace {
        #[command(subcommand)]
        command: TraceCommands,
    },
    /// Golden case file commands
    Cases {
        #[command(subcommand)]
        command: CaseCommands,
    },
    /// Print the effective configuration
    Config,
    /// Version information
    Version,
}

#[derive(Subcommand)]
enum TraceCommands {
    /// Show a trace (.json or .jsonl)
    Show {
        file: PathBuf,

        /// Print the trace as pretty JSON
        #[arg(long)]
        json: bool,
    },
    /// Score a trace against ad-hoc expectations
    Score {
        file: PathBuf,

        /// Tool the agent should have called (repeatable)
        #[arg(long = "expected-tool")]
        expected_tools: Vec<String>,

        /// Minimum tool-call steps the task needs
        #[arg(long)]
        min_steps: Option<usize>,

        /// Tool-call steps above which the run is penalized
        #[arg(long)]
        max_steps: Option<usize>,

        /// Substring the output must contain (repeatable)
        #[arg(long = "contains")]
        contains: Vec<String>,

        /// Penalize expected tools called out of order
        #[arg(long)]
        ordered: bool,

        /// Penalize tools that were not expected
        #[arg(long)]
        exact: bool,
    },
}

#[derive(Subcommand)]
enum CaseCommands {
    /// Check a golden case file (.json, .yaml, .yml)
    Validate { file: PathBuf },
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(path: Option<&Path>) -> Result<EvalConfig> {
    tracing::debug!(path = ?path, "Loading configuration");
    match path {
        Some(path) => EvalConfig::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => EvalConfig::load().context("failed to load configuration"),
    }
}

fn print_trace(trace: &Trace) {
    println!("Trace {}", trace.id);
    println!("  input:    {}", trace.input);
    println!("  output:   {}", trace.output);
    println!(
        "  steps:    {} ({} tool calls)",
        trace.metrics.total_steps, trace.metrics.tool_call_count
    );
    println!("  duration: {}ms", trace.metrics.duration_ms);
    if let Some(usage) = trace.metrics.token_usage {
        println!(
            "  tokens:   {} prompt + {} completion = {}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }

    for (index, step) in trace.steps.iter().enumerate() {
        let summary = match &step.data {
            StepData::Text(p) | StepData::Reasoning(p) => p.text.clone(),
            StepData::ToolCall(p) => format!("{} {}", p.tool_name, p.args),
            StepData::ToolResult(p) => format!(
                "{}{} {}",
                p.tool_call_id,
                if p.is_error { " (error)" } else { "" },
                p.result
            ),
            StepData::Error(p) => p.message.clone(),
            StepData::Status(map) => serde_json::Value::Object(map.clone()).to_string(),
        };
        println!(
            "  [{:>3}] {} {:<11} {}",
            index,
            step.timestamp.format("%H:%M:%S%.3f"),
            step.kind().as_str(),
            summary
        );
    }

    let errors = trace.errors();
    if !errors.is_empty() {
        println!("  errors:");
        for err in errors {
            println!("    - {}", err.message);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Version => {
            println!("tracebench {}", env!("CARGO_PKG_VERSION"));
            println!("tracebench-core {}", tracebench_core::VERSION);
        }
        Commands::Config => {
            let config = load_config(cli.config.as_deref())?;
            println!("{}", config.to_pretty_json()?);
        }
        Commands::Report { file, json, strict } => {
            let report = EvaluationReport::load(&file)
                .with_context(|| format!("failed to read report {}", file.display()))?;
            if json {
                println!("{}", report.to_json_pretty()?);
            } else {
                println!("{}", report.render_summary());
            }
            if strict && !report.all_passed() {
                std::process::exit(1);
            }
        }
        Commands::Trace { command } => match command {
            TraceCommands::Show { file, json } => {
                let trace = codec::load(&file)
                    .with_context(|| format!("failed to read trace {}", file.display()))?;
                if json {
                    println!("{}", codec::to_json_pretty(&trace)?);
                } else {
                    print_trace(&trace);
                }
            }
            TraceCommands::Score {
                file,
                expected_tools,
                min_steps,
                max_steps,
                contains,
                ordered,
                exact,
            } => {
                let trace = codec::load(&file)
                    .with_context(|| format!("failed to read trace {}", file.display()))?;
                let mut options = load_config(cli.config.as_deref())?.to_options();
                options.tool_correctness.consider_ordering |= ordered;
                options.tool_correctness.exact_match |= exact;

                let mut case = GoldenCase::new("cli", trace.input.clone())
                    .expect_steps(min_steps, max_steps);
                if !expected_tools.is_empty() {
                    case = case.expect_tools(expected_tools);
                }
                for text in contains {
                    case = case.expect_output_contains(text);
                }

                let (scores, details) = score_trace(&case, &trace, &options);
                tracing::info!(trace_id = %trace.id, metrics = scores.len(), "Scored trace");
                let overall = overall_score(&scores);

                for (metric, score) in &scores {
                    println!("{:<20} {:.2}", metric.as_str(), score);
                }
                println!("{:<20} {:.2}", "overall", overall);
                println!(
                    "{}",
                    if options.passes(overall) { "PASS" } else { "FAIL" }
                );
                for detail in details {
                    println!("  - {}", detail);
                }
            }
        },
        Commands::Cases { command } => match command {
            CaseCommands::Validate { file } => {
                let cases = load_cases(&file)
                    .with_context(|| format!("failed to load cases from {}", file.display()))?;
                validate_cases(&cases).context("invalid golden cases")?;

                let skipped = cases.iter().filter(|c| c.skip).count();
                let tags: BTreeSet<&str> = cases
                    .iter()
                    .flat_map(|c| c.tags.iter().map(String::as_str))
                    .collect();
                println!(
                    "{}: {} cases ({} skipped)",
                    file.display(),
                    cases.len(),
                    skipped
                );
                if !tags.is_empty() {
                    println!("tags: {}", tags.into_iter().collect::<Vec<_>>().join(", "));
                }
            }
        },
    }

    Ok(())
}
