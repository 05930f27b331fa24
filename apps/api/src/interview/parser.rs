//! Model reply parsing.
//!
//! `parse_strict` is the primary path: fence strip, first balanced `{...}`,
//! typed deserialization, required message check. `parse` never fails; when
//! the strict path errors it salvages the message with a pattern match and
//! finally falls back to the raw text.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::models::{InterviewStatus, Phase};

/// Characters of the raw reply included in degraded-parse logs.
const LOG_PREVIEW_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("no JSON object found in reply")]
    NoJsonObject,

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("reply is missing a non-empty agentMessage")]
    MissingMessage,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryAssessment {
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub value: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub raw_answer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredAssessment {
    #[serde(default, deserialize_with = "lenient_int")]
    pub score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub details: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub raw_answer: Option<String>,
    /// Only meaningful on the veteran entry.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_veteran: Option<bool>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub bonus_points: Option<i64>,
}

/// Qualification entries the model assessed in this exchange, as reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualificationUpdate {
    pub mandatory: BTreeMap<String, MandatoryAssessment>,
    pub preferred: BTreeMap<String, PreferredAssessment>,
}

impl QualificationUpdate {
    pub fn is_empty(&self) -> bool {
        self.mandatory.is_empty() && self.preferred.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decision {
    pub agent_message: String,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub qualification_update: Option<QualificationUpdate>,
    pub next_phase: Option<Phase>,
    pub overall_score: Option<i64>,
    pub conversation_complete: bool,
    pub final_status: Option<InterviewStatus>,
    pub disqualification_reason: Option<String>,
}

impl Decision {
    pub fn message_only(agent_message: impl Into<String>) -> Self {
        Self {
            agent_message: agent_message.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug)]
pub struct ParsedReply {
    pub decision: Decision,
    /// Set when only the conversational text could be salvaged.
    pub degraded: Option<ParseError>,
}

impl ParsedReply {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireDecision {
    #[serde(default, alias = "message", deserialize_with = "lenient_text")]
    agent_message: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    candidate_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    candidate_email: Option<String>,
    #[serde(default)]
    qualification_update: Option<Value>,
    #[serde(default, deserialize_with = "lenient_text")]
    next_phase: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    overall_score: Option<i64>,
    #[serde(default, deserialize_with = "lenient_bool")]
    conversation_complete: Option<bool>,
    #[serde(default, deserialize_with = "lenient_text")]
    final_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    disqualification_reason: Option<String>,
}

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?[ \t]*\r?\n?(.*?)\r?\n?```").ok())
        .as_ref()
}

fn message_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#""(?:agentMessage|message)"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok())
        .as_ref()
}

/// Inner text of the first markdown code fence, if any.
fn fenced_body(text: &str) -> Option<&str> {
    fence_re()
        .and_then(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|inner| inner.as_str().trim())
}

/// First balanced top-level `{...}` span. Braces inside JSON strings are ignored.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

/// A fence match can also come from backticks quoted inside the message, so
/// the whole reply is tried when the fenced body does not parse.
pub fn parse_strict(raw: &str) -> Result<Decision, ParseError> {
    match fenced_body(raw) {
        Some(inner) => decision_from(inner).or_else(|err| decision_from(raw).map_err(|_| err)),
        None => decision_from(raw),
    }
}

fn decision_from(text: &str) -> Result<Decision, ParseError> {
    let object = first_object(text).ok_or(ParseError::NoJsonObject)?;
    let wire: WireDecision = serde_json::from_str(object)?;

    let agent_message = wire.agent_message.ok_or(ParseError::MissingMessage)?;

    let next_phase = wire.next_phase.as_deref().and_then(|p| {
        let phase = Phase::parse(p);
        if phase.is_none() {
            debug!("Ignoring unknown nextPhase {p:?}");
        }
        phase
    });

    Ok(Decision {
        agent_message,
        candidate_name: wire.candidate_name,
        candidate_email: wire.candidate_email,
        qualification_update: wire
            .qualification_update
            .as_ref()
            .and_then(qualification_update_from),
        next_phase,
        overall_score: wire.overall_score,
        conversation_complete: wire.conversation_complete.unwrap_or(false),
        final_status: wire.final_status.as_deref().and_then(InterviewStatus::parse),
        disqualification_reason: wire.disqualification_reason,
    })
}

/// Never fails. A degraded reply carries the salvaged message and no structured fields.
pub fn parse(raw: &str) -> ParsedReply {
    match parse_strict(raw) {
        Ok(decision) => ParsedReply {
            decision,
            degraded: None,
        },
        Err(err) => {
            let preview: String = raw.chars().take(LOG_PREVIEW_CHARS).collect();
            warn!("Structured parse failed ({err}), using raw text. Raw reply: {preview}");
            ParsedReply {
                decision: Decision::message_only(recover_message(raw)),
                degraded: Some(err),
            }
        }
    }
}

fn recover_message(raw: &str) -> String {
    let captured = message_re()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str());

    let salvaged = captured.map(|escaped| {
        serde_json::from_str::<String>(&format!("\"{escaped}\""))
            .unwrap_or_else(|_| escaped.replace("\\n", "\n").replace("\\\"", "\""))
    });

    match salvaged {
        Some(message) if !message.trim().is_empty() => message,
        _ => raw.trim().to_string(),
    }
}

/// Keeps the well-formed entries of a qualification update, dropping the rest.
fn qualification_update_from(value: &Value) -> Option<QualificationUpdate> {
    let object = match value.as_object() {
        Some(object) => object,
        None => {
            warn!("Ignoring qualificationUpdate that is not an object");
            return None;
        }
    };

    let update = QualificationUpdate {
        mandatory: entries(object.get("mandatory")),
        preferred: entries(object.get("preferred")),
    };
    (!update.is_empty()).then_some(update)
}

fn entries<T: DeserializeOwned>(section: Option<&Value>) -> BTreeMap<String, T> {
    let Some(Value::Object(map)) = section else {
        return BTreeMap::new();
    };
    map.iter()
        .filter_map(|(key, entry)| match serde_json::from_value(entry.clone()) {
            Ok(parsed) if entry.is_object() => Some((key.clone(), parsed)),
            Ok(_) => None,
            Err(err) => {
                warn!("Ignoring malformed qualification entry {key}: {err}");
                None
            }
        })
        .collect()
}

fn value_to_text(value: Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        _ => return None,
    };
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(value_to_text))
}

fn lenient_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<bool>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}
