//! Pure scoring rules. No I/O.
//!
//! overall = 50 (all mandatory qualified) + Σ min(preferred, cap) + veteran bonus.
//! A record with any disqualified or pending check has no overall score.

use serde::Serialize;

use super::job::JobProfile;
use super::models::{CheckStatus, Qualifications};

pub const MANDATORY_BASE: i32 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MandatoryOutcome<'a> {
    /// Nothing failed yet; `next` is the first unanswered check in canonical order.
    Pending { next: &'a str },
    Passed,
    Failed { key: &'a str },
}

/// Walks the checks in canonical order. A disqualified check anywhere wins over pending ones.
pub fn mandatory_outcome<'a>(
    qualifications: &Qualifications,
    job: &'a JobProfile,
) -> MandatoryOutcome<'a> {
    if let Some(failed) = job
        .mandatory
        .iter()
        .find(|r| qualifications.check_status(&r.key) == CheckStatus::Disqualified)
    {
        return MandatoryOutcome::Failed { key: &failed.key };
    }

    match job
        .mandatory
        .iter()
        .find(|r| qualifications.check_status(&r.key) == CheckStatus::Pending)
    {
        Some(next) => MandatoryOutcome::Pending { next: &next.key },
        None => MandatoryOutcome::Passed,
    }
}

pub fn capped_preferred_total(qualifications: &Qualifications, job: &JobProfile) -> u32 {
    job.preferred
        .iter()
        .filter_map(|r| {
            qualifications
                .preferred
                .get(&r.key)
                .map(|s| s.score.min(r.max_score))
        })
        .sum()
}

pub fn veteran_bonus(qualifications: &Qualifications, job: &JobProfile) -> u32 {
    match qualifications.veteran {
        Some(v) if v.is_veteran => job.veteran_bonus,
        _ => 0,
    }
}

/// Every preferred dimension has an answer and the veteran question was asked.
pub fn preferred_addressed(qualifications: &Qualifications, job: &JobProfile) -> bool {
    job.preferred
        .iter()
        .all(|r| qualifications.preferred.contains_key(&r.key))
        && qualifications.veteran.is_some()
}

pub fn overall_score(qualifications: &Qualifications, job: &JobProfile) -> Option<i32> {
    match mandatory_outcome(qualifications, job) {
        MandatoryOutcome::Passed => Some(
            MANDATORY_BASE
                + capped_preferred_total(qualifications, job) as i32
                + veteran_bonus(qualifications, job) as i32,
        ),
        _ => None,
    }
}

/// Running subtotal rendered into prompts and results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    /// `None` until every check is qualified.
    pub mandatory_base: Option<i32>,
    pub disqualified: bool,
    pub preferred: u32,
    pub preferred_max: u32,
    pub veteran_bonus: u32,
    pub veteran_max: u32,
    pub total: Option<i32>,
}

pub fn score_breakdown(qualifications: &Qualifications, job: &JobProfile) -> ScoreBreakdown {
    let outcome = mandatory_outcome(qualifications, job);
    ScoreBreakdown {
        mandatory_base: matches!(outcome, MandatoryOutcome::Passed).then_some(MANDATORY_BASE),
        disqualified: matches!(outcome, MandatoryOutcome::Failed { .. }),
        preferred: capped_preferred_total(qualifications, job),
        preferred_max: job.preferred_max_total(),
        veteran_bonus: veteran_bonus(qualifications, job),
        veteran_max: job.veteran_bonus,
        total: overall_score(qualifications, job),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::models::{MandatoryCheck, PreferredScore, VeteranBonus};

    fn all_qualified(job: &JobProfile) -> Qualifications {
        let mut q = Qualifications::default();
        for r in &job.mandatory {
            q.mandatory.insert(
                r.key.clone(),
                MandatoryCheck {
                    status: CheckStatus::Qualified,
                    ..Default::default()
                },
            );
        }
        q
    }

    fn score(value: u32) -> PreferredScore {
        PreferredScore {
            score: value,
            ..Default::default()
        }
    }

    #[test]
    fn test_pending_points_at_first_unanswered_check() {
        let job = JobProfile::default_driver();
        let mut q = Qualifications::default();
        assert_eq!(mandatory_outcome(&q, &job), MandatoryOutcome::Pending { next: "age" });

        q.mandatory.insert(
            "age".to_string(),
            MandatoryCheck {
                status: CheckStatus::Qualified,
                ..Default::default()
            },
        );
        assert_eq!(
            mandatory_outcome(&q, &job),
            MandatoryOutcome::Pending {
                next: "validLicense"
            }
        );
        assert_eq!(overall_score(&q, &job), None);
    }

    #[test]
    fn test_disqualified_check_has_no_score() {
        let job = JobProfile::default_driver();
        let mut q = all_qualified(&job);
        q.mandatory.get_mut("drugScreening").unwrap().status = CheckStatus::Disqualified;
        q.preferred.insert("deliveryExperience".to_string(), score(20));

        assert_eq!(
            mandatory_outcome(&q, &job),
            MandatoryOutcome::Failed {
                key: "drugScreening"
            }
        );
        assert_eq!(overall_score(&q, &job), None);
        assert!(score_breakdown(&q, &job).disqualified);
    }

    #[test]
    fn test_score_is_base_plus_capped_preferred_plus_bonus() {
        let job = JobProfile::default_driver();
        for (delivery, time, independence, veteran) in [
            (0, 0, 0, false),
            (20, 15, 15, true),
            (35, 7, 99, false),
            (10, 7, 7, true),
        ] {
            let mut q = all_qualified(&job);
            q.preferred.insert("deliveryExperience".to_string(), score(delivery));
            q.preferred.insert("timeManagement".to_string(), score(time));
            q.preferred.insert("independence".to_string(), score(independence));
            q.veteran = Some(VeteranBonus {
                is_veteran: veteran,
                bonus_points: if veteran { 5 } else { 0 },
            });

            let expected = 50
                + delivery.min(20) as i32
                + time.min(15) as i32
                + independence.min(15) as i32
                + if veteran { 5 } else { 0 };
            assert_eq!(overall_score(&q, &job), Some(expected));
        }
    }

    #[test]
    fn test_unknown_preferred_keys_are_ignored() {
        let job = JobProfile::default_driver();
        let mut q = all_qualified(&job);
        q.preferred.insert("forkliftCertified".to_string(), score(40));
        assert_eq!(overall_score(&q, &job), Some(50));
    }

    #[test]
    fn test_preferred_addressed_needs_veteran_answer() {
        let job = JobProfile::default_driver();
        let mut q = all_qualified(&job);
        for r in &job.preferred {
            q.preferred.insert(r.key.clone(), score(0));
        }
        assert!(!preferred_addressed(&q, &job));

        q.veteran = Some(VeteranBonus::default());
        assert!(preferred_addressed(&q, &job));
    }
}
