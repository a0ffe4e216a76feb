use crate::billing::{PricingProvider, UsageEntry};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Why a transcript line produced no usage entry
#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("blank line")]
    Blank,

    #[error("invalid JSON: {0}")]
    Json(#[from] sonic_rs::Error),

    #[error("not an assistant message (type '{0}')")]
    NotAssistant(String),

    #[error("no usage data in line")]
    NoUsage,

    #[error("missing or invalid '{0}' field")]
    MissingField(&'static str),

    #[error("invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One line of a Claude Code transcript, or a flat usage record
#[derive(Debug, Deserialize)]
struct TranscriptEntry {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(rename = "requestId", default)]
    request_id: Option<String>,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<RawUsage>,
    #[serde(rename = "costUSD", alias = "cost_usd", default)]
    cost_usd: Option<f64>,
    #[serde(alias = "sessionId", default)]
    session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    usage: Option<RawUsage>,
}

#[derive(Debug, Deserialize)]
struct RawUsage {
    #[serde(default)]
    input_tokens: Option<u64>,
    #[serde(default)]
    output_tokens: Option<u64>,
    #[serde(default)]
    cache_creation_input_tokens: Option<u64>,
    #[serde(default)]
    cache_read_input_tokens: Option<u64>,
}

/// A usage entry together with its deduplication key, if the line had one
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    pub entry: UsageEntry,
    pub dedup_key: Option<String>,
}

/// Extract session ID from file path (the UUID part)
pub fn extract_session_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Parse a JSONL line into a usage entry.
///
/// `session_id` is used unless the line names its own session. Cost comes
/// from the line when recorded, otherwise from `pricing`, otherwise zero.
pub fn parse_line(
    line: &[u8],
    session_id: &str,
    pricing: &PricingProvider,
) -> Result<ParsedLine, TranscriptError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Err(TranscriptError::Blank);
    }

    let entry: TranscriptEntry = sonic_rs::from_slice(line)?;

    if let Some(kind) = entry.kind.as_deref() {
        if kind != "assistant" {
            return Err(TranscriptError::NotAssistant(kind.to_string()));
        }
    }

    let TranscriptEntry {
        timestamp,
        request_id,
        message,
        model,
        usage,
        cost_usd,
        session_id: line_session,
        ..
    } = entry;

    // Transcript shape keeps usage under `message`, records keep it at the top
    let (model, usage, dedup_key) = match message {
        Some(Message {
            id,
            model: message_model,
            usage: Some(usage),
        }) => {
            let dedup_key = match (id, request_id) {
                (Some(id), Some(request_id)) => Some(format!("{}:{}", id, request_id)),
                _ => None,
            };
            let model = message_model.unwrap_or_else(|| "unknown".to_string());
            (model, usage, dedup_key)
        }
        _ => {
            let usage = usage.ok_or(TranscriptError::NoUsage)?;
            let model = model.ok_or(TranscriptError::MissingField("model"))?;
            (model, usage, None)
        }
    };

    let timestamp = parse_timestamp(timestamp.as_deref())?;
    let input_tokens = usage
        .input_tokens
        .ok_or(TranscriptError::MissingField("input_tokens"))?;
    let output_tokens = usage
        .output_tokens
        .ok_or(TranscriptError::MissingField("output_tokens"))?;
    let cache_creation_tokens = usage.cache_creation_input_tokens.unwrap_or(0);
    let cache_read_tokens = usage.cache_read_input_tokens.unwrap_or(0);

    let cost_usd = cost_usd.unwrap_or_else(|| {
        pricing
            .calculate_cost(
                &model,
                input_tokens,
                output_tokens,
                cache_creation_tokens,
                cache_read_tokens,
            )
            .unwrap_or(0.0)
    });

    let entry = UsageEntry::new(
        timestamp,
        model,
        input_tokens,
        output_tokens,
        cache_creation_tokens,
        cache_read_tokens,
        cost_usd,
    )
    .with_session(line_session.unwrap_or_else(|| session_id.to_string()));

    Ok(ParsedLine { entry, dedup_key })
}

fn parse_timestamp(value: Option<&str>) -> Result<DateTime<Utc>, TranscriptError> {
    let value = value.ok_or(TranscriptError::MissingField("timestamp"))?;
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| TranscriptError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}
