use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Interview stage, in its fixed forward order. `Ord` follows that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Introduction,
    MandatoryScreening,
    PreferredScoring,
    WrapUp,
    Completed,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Introduction => "introduction",
            Phase::MandatoryScreening => "mandatory_screening",
            Phase::PreferredScoring => "preferred_scoring",
            Phase::WrapUp => "wrap_up",
            Phase::Completed => "completed",
        }
    }

    /// Lenient: model output arrives as "Mandatory Screening", "wrap-up", etc.
    pub fn parse(s: &str) -> Option<Phase> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "introduction" => Some(Phase::Introduction),
            "mandatory_screening" => Some(Phase::MandatoryScreening),
            "preferred_scoring" => Some(Phase::PreferredScoring),
            "wrap_up" => Some(Phase::WrapUp),
            "completed" => Some(Phase::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    InProgress,
    Qualified,
    Disqualified,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::InProgress => "in_progress",
            InterviewStatus::Qualified => "qualified",
            InterviewStatus::Disqualified => "disqualified",
        }
    }

    pub fn parse(s: &str) -> Option<InterviewStatus> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "in_progress" => Some(InterviewStatus::InProgress),
            "qualified" => Some(InterviewStatus::Qualified),
            "disqualified" => Some(InterviewStatus::Disqualified),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InterviewStatus::InProgress)
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    #[default]
    Pending,
    Qualified,
    Disqualified,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Pending => "pending",
            CheckStatus::Qualified => "qualified",
            CheckStatus::Disqualified => "disqualified",
        }
    }

    pub fn parse(s: &str) -> Option<CheckStatus> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Some(CheckStatus::Pending),
            "qualified" | "passed" | "pass" => Some(CheckStatus::Qualified),
            "disqualified" | "failed" | "fail" => Some(CheckStatus::Disqualified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryCheck {
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredScore {
    pub score: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_answer: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VeteranBonus {
    pub is_veteran: bool,
    pub bonus_points: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalInfo {
    pub name: Option<String>,
    pub email: Option<String>,
}

/// Qualification state keyed by requirement key. Also used as the sparse
/// per-turn change set: only the entries touched in that turn are present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Qualifications {
    #[serde(default)]
    pub mandatory: BTreeMap<String, MandatoryCheck>,
    #[serde(default)]
    pub preferred: BTreeMap<String, PreferredScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veteran: Option<VeteranBonus>,
}

impl Qualifications {
    pub fn is_empty(&self) -> bool {
        self.mandatory.is_empty() && self.preferred.is_empty() && self.veteran.is_none()
    }

    /// Entry-level merge: a key present in `changes` replaces the stored entry.
    pub fn merge(&mut self, changes: &Qualifications) {
        for (key, check) in &changes.mandatory {
            self.mandatory.insert(key.clone(), check.clone());
        }
        for (key, score) in &changes.preferred {
            self.preferred.insert(key.clone(), score.clone());
        }
        if let Some(veteran) = changes.veteran {
            self.veteran = Some(veteran);
        }
    }

    pub fn check_status(&self, key: &str) -> CheckStatus {
        self.mandatory
            .get(key)
            .map(|c| c.status)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    Agent,
    Candidate,
}

impl TranscriptRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TranscriptRole::Agent => "agent",
            TranscriptRole::Candidate => "candidate",
        }
    }

    pub fn parse(s: &str) -> Option<TranscriptRole> {
        match s {
            "agent" => Some(TranscriptRole::Agent),
            "candidate" => Some(TranscriptRole::Candidate),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: TranscriptRole,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn agent(message: impl Into<String>) -> Self {
        Self {
            role: TranscriptRole::Agent,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn candidate(message: impl Into<String>) -> Self {
        Self {
            role: TranscriptRole::Candidate,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewRecord {
    pub id: Uuid,
    pub job_id: String,
    pub personal_info: PersonalInfo,
    pub qualifications: Qualifications,
    pub overall_score: Option<i32>,
    pub status: InterviewStatus,
    pub current_phase: Phase,
    pub disqualification_reason: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    pub model_used: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InterviewRecord {
    pub fn new(job_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_id: job_id.to_string(),
            personal_info: PersonalInfo::default(),
            qualifications: Qualifications::default(),
            overall_score: None,
            status: InterviewStatus::InProgress,
            current_phase: Phase::Introduction,
            disqualification_reason: None,
            transcript: Vec::new(),
            model_used: None,
            processing_time_ms: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a partial update in place. Absent fields are left untouched.
    pub fn apply(&mut self, update: &RecordUpdate) {
        if let Some(name) = &update.name {
            self.personal_info.name = Some(name.clone());
        }
        if let Some(email) = &update.email {
            self.personal_info.email = Some(email.clone());
        }
        self.qualifications.merge(&update.qualifications);
        if let Some(score) = update.overall_score {
            self.overall_score = Some(score);
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(phase) = update.current_phase {
            self.current_phase = phase;
        }
        if let Some(reason) = &update.disqualification_reason {
            self.disqualification_reason = Some(reason.clone());
        }
        if let Some(model) = &update.model_used {
            self.model_used = Some(model.clone());
        }
        if let Some(ms) = update.processing_time_ms {
            self.processing_time_ms = Some(ms);
        }
        self.updated_at = Utc::now();
    }
}

/// Typed partial update of an `InterviewRecord`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub qualifications: Qualifications,
    pub overall_score: Option<i32>,
    pub status: Option<InterviewStatus>,
    pub current_phase: Option<Phase>,
    pub disqualification_reason: Option<String>,
    pub model_used: Option<String>,
    pub processing_time_ms: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_order_is_forward() {
        assert!(Phase::Introduction < Phase::MandatoryScreening);
        assert!(Phase::MandatoryScreening < Phase::PreferredScoring);
        assert!(Phase::PreferredScoring < Phase::WrapUp);
        assert!(Phase::WrapUp < Phase::Completed);
    }

    #[test]
    fn test_phase_parse_is_lenient() {
        assert_eq!(Phase::parse("Mandatory Screening"), Some(Phase::MandatoryScreening));
        assert_eq!(Phase::parse("wrap-up"), Some(Phase::WrapUp));
        assert_eq!(Phase::parse("lunch"), None);
    }

    #[test]
    fn test_apply_leaves_absent_fields_untouched() {
        let mut record = InterviewRecord::new("fedex-driver-001");
        record.personal_info.name = Some("Alex".to_string());
        record.qualifications.mandatory.insert(
            "age".to_string(),
            MandatoryCheck {
                status: CheckStatus::Qualified,
                ..Default::default()
            },
        );

        let mut update = RecordUpdate {
            email: Some("alex@x.com".to_string()),
            ..Default::default()
        };
        update.qualifications.mandatory.insert(
            "validLicense".to_string(),
            MandatoryCheck {
                status: CheckStatus::Qualified,
                ..Default::default()
            },
        );
        record.apply(&update);

        assert_eq!(record.personal_info.name.as_deref(), Some("Alex"));
        assert_eq!(record.personal_info.email.as_deref(), Some("alex@x.com"));
        assert_eq!(record.qualifications.check_status("age"), CheckStatus::Qualified);
        assert_eq!(
            record.qualifications.check_status("validLicense"),
            CheckStatus::Qualified
        );
        assert_eq!(record.status, InterviewStatus::InProgress);
        assert_eq!(record.current_phase, Phase::Introduction);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(InterviewStatus::InProgress).unwrap(),
            "in_progress"
        );
        assert_eq!(
            serde_json::to_value(Phase::MandatoryScreening).unwrap(),
            "mandatory_screening"
        );
    }
}
