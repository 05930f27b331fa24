//! Phase state machine and per-turn mutation rules.
//!
//! The model proposes; these functions decide. Allowed phases are computed
//! from the record itself, and anything outside that set is dropped with a
//! warning.

use tracing::{debug, warn};

use super::job::JobProfile;
use super::models::{
    CheckStatus, InterviewStatus, MandatoryCheck, PersonalInfo, Phase, PreferredScore,
    Qualifications, VeteranBonus,
};
use super::parser::{Decision, QualificationUpdate};
use super::scoring::{mandatory_outcome, overall_score, preferred_addressed, MandatoryOutcome};

/// Filters a reported update down to the entries that may be applied.
///
/// Mandatory checks are taken in canonical order and evaluation stops at the
/// first disqualification. `pending` reports never overwrite stored checks.
/// Preferred scores and the veteran answer are only accepted once every
/// mandatory check has passed; scores are clamped to their dimension's cap.
pub fn qualification_changes(
    update: &QualificationUpdate,
    current: &Qualifications,
    job: &JobProfile,
) -> Qualifications {
    let mut changes = Qualifications::default();

    for requirement in &job.mandatory {
        let Some(assessment) = update.mandatory.get(&requirement.key) else {
            continue;
        };
        let status = match assessment.status.as_deref().and_then(CheckStatus::parse) {
            Some(CheckStatus::Pending) | None => continue,
            Some(status) => status,
        };
        changes.mandatory.insert(
            requirement.key.clone(),
            MandatoryCheck {
                status,
                extracted_value: assessment.value.clone(),
                raw_answer: assessment.raw_answer.clone(),
            },
        );
        if status == CheckStatus::Disqualified {
            break;
        }
    }
    for key in update.mandatory.keys() {
        if job.mandatory_requirement(key).is_none() {
            debug!("Ignoring unknown mandatory check {key}");
        }
    }

    for key in update.preferred.keys() {
        if *key != job.veteran_key && job.preferred_requirement(key).is_none() {
            debug!("Ignoring unknown preferred dimension {key}");
        }
    }

    let mut merged = current.clone();
    merged.merge(&changes);
    if mandatory_outcome(&merged, job) != MandatoryOutcome::Passed {
        if !update.preferred.is_empty() {
            debug!("Ignoring preferred assessments before mandatory screening passed");
        }
        return changes;
    }

    for requirement in &job.preferred {
        let Some(assessment) = update.preferred.get(&requirement.key) else {
            continue;
        };
        let Some(score) = assessment.score else {
            continue;
        };
        changes.preferred.insert(
            requirement.key.clone(),
            PreferredScore {
                score: score.clamp(0, i64::from(requirement.max_score)) as u32,
                details: assessment.details.clone(),
                raw_answer: assessment.raw_answer.clone(),
            },
        );
    }

    if let Some(assessment) = update.preferred.get(&job.veteran_key) {
        let is_veteran = assessment
            .is_veteran
            .or_else(|| assessment.bonus_points.map(|p| p > 0));
        if let Some(is_veteran) = is_veteran {
            changes.veteran = Some(VeteranBonus {
                is_veteran,
                bonus_points: if is_veteran { job.veteran_bonus } else { 0 },
            });
        }
    }

    changes
}

/// Furthest phase the record's data currently supports.
pub fn max_reachable_phase(
    info: &PersonalInfo,
    qualifications: &Qualifications,
    job: &JobProfile,
) -> Phase {
    if info.name.is_none() || info.email.is_none() {
        return Phase::Introduction;
    }
    match mandatory_outcome(qualifications, job) {
        MandatoryOutcome::Pending { .. } | MandatoryOutcome::Failed { .. } => {
            Phase::MandatoryScreening
        }
        MandatoryOutcome::Passed if !preferred_addressed(qualifications, job) => {
            Phase::PreferredScoring
        }
        MandatoryOutcome::Passed => Phase::Completed,
    }
}

/// Phase/status outcome of a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub phase: Phase,
    pub status: InterviewStatus,
    pub overall_score: Option<i32>,
    /// Only set on the turn that disqualifies.
    pub disqualification_reason: Option<String>,
}

impl Transition {
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Resolves the next phase and status from the post-turn record data and the
/// model's proposal. `info` and `qualifications` already include this turn's
/// changes.
pub fn resolve(
    current: Phase,
    info: &PersonalInfo,
    qualifications: &Qualifications,
    decision: &Decision,
    job: &JobProfile,
) -> Transition {
    if let MandatoryOutcome::Failed { key } = mandatory_outcome(qualifications, job) {
        let reason = decision.disqualification_reason.clone().unwrap_or_else(|| {
            let label = job
                .mandatory_requirement(key)
                .map(|r| r.label.as_str())
                .unwrap_or(key);
            format!("Did not meet mandatory requirement: {label}")
        });
        return Transition {
            phase: Phase::Completed,
            status: InterviewStatus::Disqualified,
            overall_score: None,
            disqualification_reason: Some(reason),
        };
    }

    let claims_disqualified = decision.final_status == Some(InterviewStatus::Disqualified);
    if claims_disqualified {
        warn!("Ignoring disqualification with no failed mandatory check");
    }

    let proposed = if decision.conversation_complete && !claims_disqualified {
        Some(Phase::Completed)
    } else {
        decision.next_phase
    };

    let reachable = max_reachable_phase(info, qualifications, job);
    let phase = match proposed {
        None => current,
        Some(p) if p < current => {
            warn!("Rejected phase regression {current} -> {p}");
            current
        }
        Some(p) if p > reachable => {
            warn!("Rejected phase {p}: preconditions only allow up to {reachable}, staying in {current}");
            current
        }
        Some(p) => p,
    };

    if phase == Phase::Completed {
        return Transition {
            phase,
            status: InterviewStatus::Qualified,
            overall_score: overall_score(qualifications, job),
            disqualification_reason: None,
        };
    }

    Transition {
        phase,
        status: InterviewStatus::InProgress,
        overall_score: None,
        disqualification_reason: None,
    }
}
