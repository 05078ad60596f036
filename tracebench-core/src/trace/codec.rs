//! Trace serialization
//!
//! Sealed traces round-trip through JSON (compact or pretty) or a JSON-lines
//! layout: one header line with the trace envelope, then one line per step.
//! Failing runs are persisted this way for later inspection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use uuid::Uuid;

use super::record::{Trace, TraceMetrics};
use super::step::Step;
use crate::error::{EvalError, Result};

/// Current schema version written into JSON-lines headers
pub const TRACE_SCHEMA_VERSION: u32 = 1;

/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceFormat {
    /// Compact JSON document
    Json,
    /// Pretty-printed JSON document
    JsonPretty,
    /// Header line followed by one step per line
    JsonLines,
}

impl TraceFormat {
    /// Pick a format from a file extension (`.jsonl` means lines)
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("jsonl") | Some("ndjson") => TraceFormat::JsonLines,
            _ => TraceFormat::JsonPretty,
        }
    }
}

/// First line of the JSON-lines layout
#[derive(Debug, Serialize, Deserialize)]
struct TraceHeader {
    #[serde(rename = "type")]
    record_type: String,
    schema_version: u32,
    id: Uuid,
    input: String,
    output: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    metrics: TraceMetrics,
    #[serde(default)]
    metadata: Value,
}

/// Encode a trace in the given format
pub fn encode(trace: &Trace, format: TraceFormat) -> Result<String> {
    match format {
        TraceFormat::Json => Ok(serde_json::to_string(trace)?),
        TraceFormat::JsonPretty => Ok(serde_json::to_string_pretty(trace)?),
        TraceFormat::JsonLines => {
            let header = TraceHeader {
                record_type: "header".to_string(),
                schema_version: TRACE_SCHEMA_VERSION,
                id: trace.id,
                input: trace.input.clone(),
                output: trace.output.clone(),
                start_time: trace.start_time,
                end_time: trace.end_time,
                metrics: trace.metrics.clone(),
                metadata: trace.metadata.clone(),
            };

            let mut out = serde_json::to_string(&header)?;
            out.push('\n');
            for step in &trace.steps {
                out.push_str(&serde_json::to_string(step)?);
                out.push('\n');
            }
            Ok(out)
        }
    }
}

/// Decode a trace from text in the given format
pub fn decode(text: &str, format: TraceFormat) -> Result<Trace> {
    match format {
        TraceFormat::Json | TraceFormat::JsonPretty => Ok(serde_json::from_str(text)?),
        TraceFormat::JsonLines => decode_lines(BufReader::new(text.as_bytes())),
    }
}

fn decode_lines(reader: impl BufRead) -> Result<Trace> {
    let mut lines = reader.lines();

    let header_line = lines
        .next()
        .ok_or_else(|| EvalError::Other("empty trace file".to_string()))??;
    let header: TraceHeader = serde_json::from_str(&header_line)?;
    if header.record_type != "header" {
        return Err(EvalError::Other(format!(
            "expected trace header, found record type '{}'",
            header.record_type
        )));
    }

    let mut steps = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        steps.push(serde_json::from_str::<Step>(&line)?);
    }

    Ok(Trace {
        id: header.id,
        input: header.input,
        steps,
        output: header.output,
        start_time: header.start_time,
        end_time: header.end_time,
        metrics: header.metrics,
        metadata: header.metadata,
    })
}

/// Serialize a trace to compact JSON
pub fn to_json(trace: &Trace) -> Result<String> {
    encode(trace, TraceFormat::Json)
}

/// Serialize a trace to pretty JSON
pub fn to_json_pretty(trace: &Trace) -> Result<String> {
    encode(trace, TraceFormat::JsonPretty)
}

/// Parse a trace from a JSON document
pub fn from_json(text: &str) -> Result<Trace> {
    decode(text, TraceFormat::Json)
}

/// Save a trace, choosing the format from the file extension
pub fn save(trace: &Trace, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = encode(trace, TraceFormat::for_path(path))?;
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    writer.write_all(content.as_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Load a trace, choosing the format from the file extension
pub fn load(path: impl AsRef<Path>) -> Result<Trace> {
    let path = path.as_ref();
    match TraceFormat::for_path(path) {
        TraceFormat::JsonLines => {
            let file = std::fs::File::open(path)?;
            decode_lines(BufReader::new(file))
        }
        format => {
            let content = std::fs::read_to_string(path)?;
            decode(&content, format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::record::TokenUsage;
    use crate::trace::TraceRecorder;
    use serde_json::{Map, json};

    fn sample_trace() -> Trace {
        let mut recorder = TraceRecorder::new();
        recorder
            .start_trace("Refactor parser", Some(json!({"model": "mock", "attempt": 2})))
            .unwrap();
        recorder.record_reasoning("read the file first").unwrap();
        recorder
            .record_tool_call("readFile", json!({"path": "/src/parser.rs"}), None)
            .unwrap();
        recorder
            .record_tool_result("tc-1", json!({"content": "fn parse() {}"}), false)
            .unwrap();
        let mut status = Map::new();
        status.insert("phase".to_string(), json!("editing"));
        recorder.record_status(status).unwrap();
        recorder
            .record_error("edit rejected", Some("at apply_edit".to_string()))
            .unwrap();
        recorder.record_text("Done").unwrap();
        recorder
            .end_trace("Done", Some(TokenUsage::new(40, 12)))
            .unwrap()
    }

    #[test]
    fn json_round_trip_preserves_every_field() {
        let trace = sample_trace();
        let json = to_json(&trace).unwrap();
        assert_eq!(from_json(&json).unwrap(), trace);

        let pretty = to_json_pretty(&trace).unwrap();
        assert_eq!(from_json(&pretty).unwrap(), trace);
    }

    #[test]
    fn json_lines_round_trip() {
        let trace = sample_trace();
        let text = encode(&trace, TraceFormat::JsonLines).unwrap();

        assert_eq!(text.lines().count(), trace.steps.len() + 1);
        assert_eq!(decode(&text, TraceFormat::JsonLines).unwrap(), trace);
    }

    #[test]
    fn save_and_load_by_extension() {
        let trace = sample_trace();
        let dir = tempfile::TempDir::new().unwrap();

        let lines_path = dir.path().join("failing.jsonl");
        save(&trace, &lines_path).unwrap();
        assert_eq!(load(&lines_path).unwrap(), trace);

        let json_path = dir.path().join("failing.json");
        save(&trace, &json_path).unwrap();
        assert_eq!(load(&json_path).unwrap(), trace);
    }

    #[test]
    fn empty_lines_input_is_an_error() {
        assert!(decode("", TraceFormat::JsonLines).is_err());
    }
}
