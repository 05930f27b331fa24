//! Job profiles: the requirements an interview screens against.
//!
//! Requirement order in `mandatory` is the canonical asking order.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

pub const DEFAULT_JOB_ID: &str = "fedex-driver-001";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MandatoryRequirement {
    pub key: String,
    pub label: String,
    /// Longer label used in result breakdowns.
    pub result_label: String,
    pub question: String,
    pub disqualify_condition: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferredRequirement {
    pub key: String,
    pub label: String,
    pub question: String,
    pub max_score: u32,
    pub scoring_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProfile {
    pub job_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub opening_message: String,
    pub mandatory: Vec<MandatoryRequirement>,
    pub preferred: Vec<PreferredRequirement>,
    pub veteran_key: String,
    pub veteran_question: String,
    pub veteran_bonus: u32,
}

fn mandatory(
    key: &str,
    label: &str,
    result_label: &str,
    question: &str,
    disqualify_condition: &str,
) -> MandatoryRequirement {
    MandatoryRequirement {
        key: key.to_string(),
        label: label.to_string(),
        result_label: result_label.to_string(),
        question: question.to_string(),
        disqualify_condition: disqualify_condition.to_string(),
    }
}

fn preferred(
    key: &str,
    label: &str,
    question: &str,
    max_score: u32,
    scoring_description: &str,
) -> PreferredRequirement {
    PreferredRequirement {
        key: key.to_string(),
        label: label.to_string(),
        question: question.to_string(),
        max_score,
        scoring_description: scoring_description.to_string(),
    }
}

impl JobProfile {
    /// FedEx Ground ISP delivery driver, Tampa.
    pub fn default_driver() -> Self {
        Self {
            job_id: DEFAULT_JOB_ID.to_string(),
            title: "FedEx Ground ISP Delivery Driver (Non-CDL)".to_string(),
            company: "Tsavo West Inc".to_string(),
            location: "Tampa, Florida 33610".to_string(),
            opening_message: "Hi there! 👋 I'm an AI assistant helping Tsavo West Inc with \
                applications for the FedEx Ground Delivery Driver position here in Tampa, \
                Florida.\n\nThis should only take about 5-10 minutes. I'll ask you some \
                questions to see if the role is a good fit, and then I'll give you immediate \
                feedback on your application.\n\nReady to get started? First, what's your name?"
                .to_string(),
            mandatory: vec![
                mandatory("age", "Age 21+", "Age (21+)", "Are you at least 21 years old?", "Under 21"),
                mandatory(
                    "validLicense",
                    "Valid Driver's License",
                    "Valid Driver's License",
                    "Do you have a valid driver's license?",
                    "No license or suspended",
                ),
                mandatory(
                    "drivingRecord",
                    "Clean Driving Record",
                    "Clean Driving Record",
                    "Any major violations in past 3 years?",
                    "Multiple violations, DUI, suspended",
                ),
                mandatory(
                    "backgroundCheck",
                    "Background Check",
                    "Background Check Willingness",
                    "Willing to undergo background check?",
                    "Unwilling",
                ),
                mandatory(
                    "drugScreening",
                    "Drug Screening",
                    "Drug Screening Willingness",
                    "Willing to pass drug screening?",
                    "Unwilling",
                ),
                mandatory(
                    "liftingCapability",
                    "Lift 150 lbs",
                    "Lifting Capability (150 lbs)",
                    "Can you lift packages up to 150 pounds?",
                    "Cannot lift",
                ),
                mandatory(
                    "weekendAvailability",
                    "Weekend Availability",
                    "Weekend Availability",
                    "Available to work one weekend day?",
                    "Not available",
                ),
                mandatory(
                    "longShiftFlexibility",
                    "10-Hour Shifts",
                    "Long Shift Flexibility (10-12 hrs)",
                    "Can you work 10-hour shifts starting 7:30 AM?",
                    "Cannot work",
                ),
            ],
            preferred: vec![
                preferred(
                    "deliveryExperience",
                    "Prior Delivery/Courier Experience",
                    "Prior delivery/courier experience?",
                    20,
                    "0pts=none, 10pts=some, 15pts=6mo-1yr, 20pts=1yr+",
                ),
                preferred(
                    "timeManagement",
                    "Time Management Skills",
                    "Time management skills?",
                    15,
                    "0pts=poor, 7pts=average, 15pts=excellent with examples",
                ),
                preferred(
                    "independence",
                    "Ability to Work Independently",
                    "Comfortable working independently?",
                    15,
                    "0pts=not comfortable, 7pts=somewhat, 15pts=very with examples",
                ),
            ],
            veteran_key: "militaryVeteran".to_string(),
            veteran_question: "Have you served in the military?".to_string(),
            veteran_bonus: 5,
        }
    }

    pub fn mandatory_requirement(&self, key: &str) -> Option<&MandatoryRequirement> {
        self.mandatory.iter().find(|r| r.key == key)
    }

    pub fn preferred_requirement(&self, key: &str) -> Option<&PreferredRequirement> {
        self.preferred.iter().find(|r| r.key == key)
    }

    /// Sum of every dimension's cap.
    pub fn preferred_max_total(&self) -> u32 {
        self.preferred.iter().map(|r| r.max_score).sum()
    }
}

/// Read-only registry of job profiles, shared across requests.
#[derive(Debug, Clone)]
pub struct JobCatalog {
    jobs: Arc<HashMap<String, Arc<JobProfile>>>,
}

impl JobCatalog {
    pub fn new(profiles: Vec<JobProfile>) -> Self {
        let jobs = profiles
            .into_iter()
            .map(|p| (p.job_id.clone(), Arc::new(p)))
            .collect();
        Self {
            jobs: Arc::new(jobs),
        }
    }

    pub fn get(&self, job_id: &str) -> Option<Arc<JobProfile>> {
        self.jobs.get(job_id).cloned()
    }
}

impl Default for JobCatalog {
    fn default() -> Self {
        Self::new(vec![JobProfile::default_driver()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_driver_canonical_order() {
        let job = JobProfile::default_driver();
        let keys: Vec<&str> = job.mandatory.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "age",
                "validLicense",
                "drivingRecord",
                "backgroundCheck",
                "drugScreening",
                "liftingCapability",
                "weekendAvailability",
                "longShiftFlexibility",
            ]
        );
        assert_eq!(job.preferred_max_total(), 50);
        assert_eq!(job.veteran_bonus, 5);
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog = JobCatalog::default();
        assert!(catalog.get(DEFAULT_JOB_ID).is_some());
        assert!(catalog.get("warehouse-999").is_none());
    }
}
