//! Recruiter-facing read model of an interview.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::job::JobProfile;
use super::models::{
    CheckStatus, InterviewRecord, InterviewStatus, Phase, TranscriptEntry, VeteranBonus,
};
use super::scoring::{mandatory_outcome, MandatoryOutcome, MANDATORY_BASE};

const UNKNOWN_CANDIDATE: &str = "Unknown";

/// (preferred key, minimum score, phrase) used in the recruiter summary.
const STRENGTHS: &[(&str, u32, &str)] = &[
    ("deliveryExperience", 15, "strong delivery experience"),
    ("timeManagement", 10, "good time management"),
    ("independence", 10, "comfortable working independently"),
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryLine {
    pub key: String,
    pub label: String,
    pub status: CheckStatus,
    pub value: Option<String>,
    pub raw_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredLine {
    pub key: String,
    pub label: String,
    pub score: u32,
    pub max_score: u32,
    pub details: Option<String>,
    pub raw_answer: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarlyDisqualification {
    pub failed_key: String,
    pub failed_requirement: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewResult {
    pub conversation_id: Uuid,
    pub job_id: String,
    pub job_title: String,
    pub candidate_name: String,
    pub status: InterviewStatus,
    pub current_phase: Phase,
    /// Only for qualified candidates; a disqualified record has no comparable score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_score: Option<i32>,
    pub mandatory_breakdown: Vec<MandatoryLine>,
    pub preferred_breakdown: Vec<PreferredLine>,
    pub veteran_bonus: VeteranBonus,
    pub early_disqualification: Option<EarlyDisqualification>,
    pub recruiter_summary: String,
    pub disqualification_reason: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    pub model_used: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewResult {
    pub fn from_record(record: &InterviewRecord, job: &JobProfile) -> Self {
        let quals = &record.qualifications;

        let mandatory_breakdown: Vec<MandatoryLine> = job
            .mandatory
            .iter()
            .map(|r| {
                let check = quals.mandatory.get(&r.key);
                MandatoryLine {
                    key: r.key.clone(),
                    label: r.result_label.clone(),
                    status: check.map(|c| c.status).unwrap_or_default(),
                    value: check.and_then(|c| c.extracted_value.clone()),
                    raw_answer: check.and_then(|c| c.raw_answer.clone()),
                }
            })
            .collect();

        let preferred_breakdown: Vec<PreferredLine> = job
            .preferred
            .iter()
            .map(|r| {
                let entry = quals.preferred.get(&r.key);
                PreferredLine {
                    key: r.key.clone(),
                    label: r.label.clone(),
                    score: entry.map(|e| e.score.min(r.max_score)).unwrap_or(0),
                    max_score: r.max_score,
                    details: entry.and_then(|e| e.details.clone()),
                    raw_answer: entry.and_then(|e| e.raw_answer.clone()),
                }
            })
            .collect();

        let veteran_bonus = quals.veteran.unwrap_or_default();

        let early_disqualification = match mandatory_outcome(quals, job) {
            MandatoryOutcome::Failed { key } if record.status == InterviewStatus::Disqualified => {
                Some(EarlyDisqualification {
                    failed_key: key.to_string(),
                    failed_requirement: job
                        .mandatory_requirement(key)
                        .map(|r| r.result_label.clone())
                        .unwrap_or_else(|| key.to_string()),
                    reason: record.disqualification_reason.clone(),
                })
            }
            _ => None,
        };

        let candidate_name = record
            .personal_info
            .name
            .clone()
            .unwrap_or_else(|| UNKNOWN_CANDIDATE.to_string());

        let match_score = match record.status {
            InterviewStatus::Qualified => record.overall_score,
            _ => None,
        };

        let max_score = MANDATORY_BASE as u32 + job.preferred_max_total() + job.veteran_bonus;
        let recruiter_summary = recruiter_summary(
            record,
            &candidate_name,
            max_score,
            &mandatory_breakdown,
            &preferred_breakdown,
            veteran_bonus,
        );

        Self {
            conversation_id: record.id,
            job_id: record.job_id.clone(),
            job_title: job.title.clone(),
            candidate_name,
            status: record.status,
            current_phase: record.current_phase,
            match_score,
            mandatory_breakdown,
            preferred_breakdown,
            veteran_bonus,
            early_disqualification,
            recruiter_summary,
            disqualification_reason: record.disqualification_reason.clone(),
            transcript: record.transcript.clone(),
            model_used: record.model_used.clone(),
            processing_time_ms: record.processing_time_ms,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

fn recruiter_summary(
    record: &InterviewRecord,
    name: &str,
    max_score: u32,
    mandatory: &[MandatoryLine],
    preferred: &[PreferredLine],
    veteran: VeteranBonus,
) -> String {
    match record.status {
        InterviewStatus::Disqualified => {
            let passed = mandatory
                .iter()
                .filter(|m| m.status == CheckStatus::Qualified)
                .count();
            format!(
                "{name} was disqualified during screening. Reason: {}. Passed {passed}/{} mandatory checks before disqualification.",
                record
                    .disqualification_reason
                    .as_deref()
                    .unwrap_or("Did not meet mandatory requirements"),
                mandatory.len()
            )
        }
        InterviewStatus::Qualified => {
            let mut strengths: Vec<&str> = STRENGTHS
                .iter()
                .filter(|(key, min, _)| {
                    preferred
                        .iter()
                        .any(|p| p.key == *key && p.score >= *min)
                })
                .map(|(_, _, phrase)| *phrase)
                .collect();
            if veteran.is_veteran {
                strengths.push("military veteran");
            }
            let strengths = if strengths.is_empty() {
                String::new()
            } else {
                format!(" Key strengths: {}.", strengths.join(", "))
            };
            format!(
                "{name} passed all mandatory requirements with a score of {}/{max_score}.{strengths} Recommended for in-person interview.",
                record.overall_score.unwrap_or(0)
            )
        }
        InterviewStatus::InProgress => format!(
            "{name}'s interview is still in progress (Phase: {}).",
            record.current_phase
        ),
    }
}
