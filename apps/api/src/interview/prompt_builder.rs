//! Turn prompt assembly. Pure: same record and message in, same prompt out.
//!
//! Sections: policy, knowledge base, state snapshot, latest message, workflow
//! rules, response format. Progress and rules are gated on the phase the next
//! question belongs to, so later-phase questions never appear early.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use super::job::{JobProfile, MandatoryRequirement, PreferredRequirement};
use super::models::{CheckStatus, InterviewRecord, Phase, TranscriptEntry, TranscriptRole};
use super::prompts::*;
use super::scoring::{score_breakdown, MandatoryOutcome, MANDATORY_BASE};
use crate::llm_client::prompts::JSON_ONLY_INSTRUCTION;
use crate::llm_client::{ChatRole, ChatTurn};

pub const POLICY_FILE: &str = "system-prompt.md";
pub const KNOWLEDGE_FILE: &str = "knowledgebase.md";

/// Static prompt text: behavioural policy and company facts.
#[derive(Debug, Clone, Default)]
pub struct PromptAssets {
    pub policy: String,
    pub knowledge: String,
}

impl PromptAssets {
    /// A missing file is logged and treated as empty; interviews keep running
    /// with reduced context.
    pub fn load(dir: &Path) -> Self {
        Self {
            policy: read_asset(dir, POLICY_FILE),
            knowledge: read_asset(dir, KNOWLEDGE_FILE),
        }
    }
}

fn read_asset(dir: &Path, name: &str) -> String {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(text) => {
            info!("Loaded {name} ({} chars) from {}", text.len(), path.display());
            text
        }
        Err(e) => {
            warn!("Could not load {}: {e}. Continuing without it", path.display());
            String::new()
        }
    }
}

/// The single next thing the interviewer should ask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep<'a> {
    AskName,
    AskEmail,
    Mandatory(&'a MandatoryRequirement),
    Preferred(&'a PreferredRequirement),
    Veteran,
    WrapUp,
}

impl NextStep<'_> {
    pub fn phase(&self) -> Phase {
        match self {
            NextStep::AskName | NextStep::AskEmail => Phase::Introduction,
            NextStep::Mandatory(_) => Phase::MandatoryScreening,
            NextStep::Preferred(_) | NextStep::Veteran => Phase::PreferredScoring,
            NextStep::WrapUp => Phase::WrapUp,
        }
    }
}

pub fn next_step<'a>(record: &InterviewRecord, job: &'a JobProfile) -> NextStep<'a> {
    if record.personal_info.name.is_none() {
        return NextStep::AskName;
    }
    if record.personal_info.email.is_none() {
        return NextStep::AskEmail;
    }
    let quals = &record.qualifications;
    if let Some(pending) = job
        .mandatory
        .iter()
        .find(|r| quals.check_status(&r.key) != CheckStatus::Qualified)
    {
        return NextStep::Mandatory(pending);
    }
    if let Some(pending) = job
        .preferred
        .iter()
        .find(|r| !quals.preferred.contains_key(&r.key))
    {
        return NextStep::Preferred(pending);
    }
    if quals.veteran.is_none() {
        return NextStep::Veteran;
    }
    NextStep::WrapUp
}

fn describe_step(step: NextStep<'_>, job: &JobProfile) -> String {
    match step {
        NextStep::AskName => ASK_NAME.to_string(),
        NextStep::AskEmail => ASK_EMAIL.to_string(),
        NextStep::Mandatory(r) => format!(
            "{}: \"{}\" (disqualify if: {})",
            r.key, r.question, r.disqualify_condition
        ),
        NextStep::Preferred(r) => format!(
            "{}: \"{}\" (scoring: {}, max {} pts)",
            r.key, r.question, r.scoring_description, r.max_score
        ),
        NextStep::Veteran => format!(
            "{}: \"{}\" (+{} pts if veteran)",
            job.veteran_key, job.veteran_question, job.veteran_bonus
        ),
        NextStep::WrapUp => NOTHING_LEFT_TO_ASK.to_string(),
    }
}

fn section(title: &str, body: &str) -> String {
    format!("{SECTION_RULE}\n{title}\n{SECTION_RULE}\n{body}\n")
}

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder {
    assets: Arc<PromptAssets>,
}

impl PromptBuilder {
    pub fn new(assets: PromptAssets) -> Self {
        Self {
            assets: Arc::new(assets),
        }
    }

    pub fn build(&self, user_message: &str, record: &InterviewRecord, job: &JobProfile) -> String {
        let step = next_step(record, job);
        let visible = record.current_phase.max(step.phase());

        [
            self.assets.policy.trim().to_string(),
            section(KNOWLEDGE_HEADER, self.assets.knowledge.trim()),
            section(STATE_HEADER, &render_state(record, job, step, visible)),
            section(MESSAGE_HEADER, user_message.trim()),
            section(RULES_HEADER, &render_rules(record, job, step, visible)),
            section(
                FORMAT_HEADER,
                &RESPONSE_FORMAT.replace("{json_only}", JSON_ONLY_INSTRUCTION),
            ),
        ]
        .join("\n")
    }

    /// Knowledge-only prompt for questions asked after the interview ended.
    pub fn build_follow_up(
        &self,
        user_message: &str,
        record: &InterviewRecord,
        job: &JobProfile,
    ) -> String {
        let score = record
            .overall_score
            .map(|s| s.to_string())
            .unwrap_or_else(|| "N/A".to_string());

        FOLLOW_UP_TEMPLATE
            .replace("{company}", &job.company)
            .replace("{status}", record.status.as_str())
            .replace("{score}", &score)
            .replace("{knowledge}", self.assets.knowledge.trim())
            .replace("{json_only}", JSON_ONLY_INSTRUCTION)
            .replace("{question}", user_message.trim())
    }
}

fn render_state(
    record: &InterviewRecord,
    job: &JobProfile,
    step: NextStep<'_>,
    visible: Phase,
) -> String {
    let info = &record.personal_info;
    let mut lines = vec![
        format!("Conversation ID: {}", record.id),
        format!("Position: {} at {} ({})", job.title, job.company, job.location),
        format!("Current Phase: {}", record.current_phase),
        format!(
            "Candidate Name: {}",
            info.name.as_deref().unwrap_or(NOT_PROVIDED)
        ),
        format!(
            "Candidate Email: {}",
            info.email.as_deref().unwrap_or(NOT_PROVIDED)
        ),
        format!("Status: {}", record.status),
    ];

    if visible >= Phase::MandatoryScreening {
        lines.push(String::new());
        lines.push("--- MANDATORY QUALIFICATIONS PROGRESS ---".to_string());
        lines.extend(render_mandatory(record, job));
    }

    if visible >= Phase::PreferredScoring {
        lines.push(String::new());
        lines.push("--- PREFERRED QUALIFICATIONS PROGRESS ---".to_string());
        lines.extend(render_preferred(record, job));

        let score = score_breakdown(&record.qualifications, job);
        lines.push(String::new());
        lines.push("--- CURRENT SCORE ---".to_string());
        lines.push(format!(
            "Mandatory base: {} / {MANDATORY_BASE}",
            score
                .mandatory_base
                .map(|b| b.to_string())
                .unwrap_or_else(|| "TBD".to_string())
        ));
        lines.push(format!(
            "Preferred: {} / {}",
            score.preferred, score.preferred_max
        ));
        lines.push(format!(
            "Veteran bonus: {} / {}",
            score.veteran_bonus, score.veteran_max
        ));
        lines.push(format!(
            "Current total: {} / {}",
            score
                .total
                .map(|t| t.to_string())
                .unwrap_or_else(|| "TBD".to_string()),
            MANDATORY_BASE as u32 + score.preferred_max + score.veteran_max
        ));
    }

    lines.push(String::new());
    lines.push(format!("NEXT QUESTION TO ASK: {}", describe_step(step, job)));
    lines.join("\n")
}

fn render_mandatory(record: &InterviewRecord, job: &JobProfile) -> Vec<String> {
    let quals = &record.qualifications;
    let mut lines: Vec<String> = job
        .mandatory
        .iter()
        .map(|r| {
            let check = quals.mandatory.get(&r.key);
            let status = check.map(|c| c.status).unwrap_or_default();
            let icon = match status {
                CheckStatus::Qualified => "✅",
                CheckStatus::Disqualified => "❌",
                CheckStatus::Pending => "⬜",
            };
            match check.and_then(|c| c.raw_answer.as_deref()) {
                Some(answer) => format!(
                    "{icon} {}: {} (answered: \"{answer}\")",
                    r.key,
                    status.as_str()
                ),
                None => format!("{icon} {}: {}", r.key, status.as_str()),
            }
        })
        .collect();

    let count = |wanted: CheckStatus| {
        job.mandatory
            .iter()
            .filter(|r| quals.check_status(&r.key) == wanted)
            .count()
    };
    lines.push(String::new());
    lines.push(format!(
        "Completed: {}/{} | Pending: {} | Failed: {}",
        count(CheckStatus::Qualified),
        job.mandatory.len(),
        count(CheckStatus::Pending),
        count(CheckStatus::Disqualified)
    ));

    let next = match super::scoring::mandatory_outcome(quals, job) {
        MandatoryOutcome::Pending { next } => next,
        MandatoryOutcome::Passed => "ALL DONE",
        MandatoryOutcome::Failed { .. } => "NONE - candidate is disqualified",
    };
    lines.push(format!("Next mandatory to ask: {next}"));
    lines
}

fn render_preferred(record: &InterviewRecord, job: &JobProfile) -> Vec<String> {
    let quals = &record.qualifications;
    let mut lines: Vec<String> = job
        .preferred
        .iter()
        .map(|r| match quals.preferred.get(&r.key) {
            Some(scored) => {
                let answer = scored
                    .raw_answer
                    .as_deref()
                    .map(|a| format!(" (answered: \"{a}\")"))
                    .unwrap_or_default();
                format!(
                    "✅ {}: {}/{} pts{answer}",
                    r.key,
                    scored.score.min(r.max_score),
                    r.max_score
                )
            }
            None => format!("⬜ {}: 0/{} pts (not yet asked)", r.key, r.max_score),
        })
        .collect();

    lines.push(match quals.veteran {
        Some(v) if v.is_veteran => format!("✅ {}: veteran (+{} pts)", job.veteran_key, job.veteran_bonus),
        Some(_) => format!("✅ {}: not a veteran", job.veteran_key),
        None => format!(
            "⬜ {}: NOT YET ASKED (bonus: +{} pts if veteran)",
            job.veteran_key, job.veteran_bonus
        ),
    });
    lines
}

fn render_rules(
    record: &InterviewRecord,
    job: &JobProfile,
    step: NextStep<'_>,
    visible: Phase,
) -> String {
    let next_question = describe_step(step, job);
    let phase_rules = match visible {
        Phase::Introduction => INTRODUCTION_RULES.replace("{next_question}", &next_question),
        Phase::MandatoryScreening => {
            let order: Vec<&str> = job.mandatory.iter().map(|r| r.key.as_str()).collect();
            MANDATORY_RULES
                .replace("{order}", &order.join(" -> "))
                .replace("{next_question}", &next_question)
        }
        Phase::PreferredScoring => {
            let mut order: Vec<&str> = job.preferred.iter().map(|r| r.key.as_str()).collect();
            order.push(&job.veteran_key);
            let rubric: Vec<String> = job
                .preferred
                .iter()
                .map(|r| {
                    format!(
                        "- {} (max {}): {}",
                        r.key, r.max_score, r.scoring_description
                    )
                })
                .collect();
            PREFERRED_RULES
                .replace("{order}", &order.join(" -> "))
                .replace("{rubric}", &rubric.join("\n"))
                .replace("{veteran_key}", &job.veteran_key)
                .replace("{veteran_bonus}", &job.veteran_bonus.to_string())
                .replace("{next_question}", &next_question)
        }
        Phase::WrapUp | Phase::Completed => {
            let total = score_breakdown(&record.qualifications, job)
                .total
                .map(|t| t.to_string())
                .unwrap_or_else(|| "TBD".to_string());
            WRAP_UP_RULES
                .replace("{preferred_max}", &job.preferred_max_total().to_string())
                .replace("{veteran_bonus}", &job.veteran_bonus.to_string())
                .replace("{total}", &total)
        }
    };
    format!("{phase_rules}\n\n{QUESTION_RULES}")
}

/// Transcript -> alternating backend history. Leading agent entries are
/// dropped, same-role runs are merged, and a trailing candidate entry is
/// removed because the new message travels in the prompt.
pub fn build_history(transcript: &[TranscriptEntry]) -> Vec<ChatTurn> {
    let mut history: Vec<ChatTurn> = Vec::new();

    for entry in transcript
        .iter()
        .skip_while(|e| e.role == TranscriptRole::Agent)
    {
        let role = match entry.role {
            TranscriptRole::Agent => ChatRole::Model,
            TranscriptRole::Candidate => ChatRole::User,
        };
        match history.last_mut() {
            Some(last) if last.role == role => {
                last.text.push('\n');
                last.text.push_str(&entry.message);
            }
            _ => history.push(ChatTurn {
                role,
                text: entry.message.clone(),
            }),
        }
    }

    if history.last().map(|t| t.role) == Some(ChatRole::User) {
        history.pop();
    }
    history
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::models::{InterviewStatus, MandatoryCheck, PreferredScore, VeteranBonus};
    use std::io::Write;

    fn builder() -> PromptBuilder {
        PromptBuilder::new(PromptAssets {
            policy: "Be a friendly recruiter.".to_string(),
            knowledge: "Pay is $18-20/hour.".to_string(),
        })
    }

    fn screening_record(job: &JobProfile, qualified: usize) -> InterviewRecord {
        let mut record = InterviewRecord::new(&job.job_id);
        record.personal_info.name = Some("Alex".to_string());
        record.personal_info.email = Some("alex@x.com".to_string());
        record.current_phase = Phase::MandatoryScreening;
        for r in job.mandatory.iter().take(qualified) {
            record.qualifications.mandatory.insert(
                r.key.clone(),
                MandatoryCheck {
                    status: CheckStatus::Qualified,
                    extracted_value: None,
                    raw_answer: Some("yes".to_string()),
                },
            );
        }
        record
    }

    #[test]
    fn test_mandatory_screening_prompt_hides_preferred_questions() {
        let job = JobProfile::default_driver();
        for qualified in 0..job.mandatory.len() {
            let record = screening_record(&job, qualified);
            let prompt = builder().build("yes", &record, &job);

            for r in &job.preferred {
                assert!(!prompt.contains(&r.key), "{} leaked", r.key);
                assert!(!prompt.contains(&r.question), "{} leaked", r.question);
            }
            assert!(!prompt.contains(&job.veteran_question));
            assert!(!prompt.contains("PREFERRED QUALIFICATIONS PROGRESS"));
            assert!(prompt.contains(&job.mandatory[qualified].question));
        }
    }

    #[test]
    fn test_next_mandatory_follows_canonical_order() {
        let job = JobProfile::default_driver();
        let mut record = screening_record(&job, 0);
        // answered out of order
        record.qualifications.mandatory.insert(
            "drugScreening".to_string(),
            MandatoryCheck {
                status: CheckStatus::Qualified,
                ..Default::default()
            },
        );
        assert_eq!(next_step(&record, &job), NextStep::Mandatory(&job.mandatory[0]));

        let prompt = builder().build("hi", &record, &job);
        assert!(prompt.contains("Next mandatory to ask: age"));
        assert!(prompt.contains("Completed: 1/8 | Pending: 7 | Failed: 0"));
    }

    #[test]
    fn test_introduction_asks_email_after_name() {
        let job = JobProfile::default_driver();
        let mut record = InterviewRecord::new(&job.job_id);
        assert_eq!(next_step(&record, &job), NextStep::AskName);

        record.personal_info.name = Some("Alex".to_string());
        let prompt = builder().build("I'm Alex", &record, &job);
        assert!(prompt.contains(ASK_EMAIL));
        assert!(!prompt.contains("MANDATORY QUALIFICATIONS PROGRESS"));
        assert!(!prompt.contains(&job.mandatory[0].question));
    }

    #[test]
    fn test_preferred_phase_shows_running_score() {
        let job = JobProfile::default_driver();
        let mut record = screening_record(&job, job.mandatory.len());
        record.current_phase = Phase::PreferredScoring;
        record.qualifications.preferred.insert(
            "deliveryExperience".to_string(),
            PreferredScore {
                score: 15,
                details: None,
                raw_answer: Some("8 months at UPS".to_string()),
            },
        );

        let prompt = builder().build("8 months at UPS", &record, &job);
        assert!(prompt.contains("✅ deliveryExperience: 15/20 pts (answered: \"8 months at UPS\")"));
        assert!(prompt.contains("Mandatory base: 50 / 50"));
        assert!(prompt.contains("Preferred: 15 / 50"));
        assert!(prompt.contains("Current total: 65 / 105"));
        assert!(prompt.contains("timeManagement: \"Time management skills?\""));
    }

    #[test]
    fn test_wrap_up_when_everything_answered() {
        let job = JobProfile::default_driver();
        let mut record = screening_record(&job, job.mandatory.len());
        record.current_phase = Phase::PreferredScoring;
        for r in &job.preferred {
            record
                .qualifications
                .preferred
                .insert(r.key.clone(), PreferredScore::default());
        }
        record.qualifications.veteran = Some(VeteranBonus {
            is_veteran: true,
            bonus_points: 5,
        });

        assert_eq!(next_step(&record, &job), NextStep::WrapUp);
        let prompt = builder().build("no", &record, &job);
        assert!(prompt.contains("PHASE: \"wrap_up\""));
        assert!(prompt.contains("Current computed total: 55"));
    }

    #[test]
    fn test_build_is_deterministic() {
        let job = JobProfile::default_driver();
        let record = screening_record(&job, 3);
        assert_eq!(
            builder().build("yes", &record, &job),
            builder().build("yes", &record, &job)
        );
    }

    #[test]
    fn test_follow_up_prompt_is_knowledge_only() {
        let job = JobProfile::default_driver();
        let mut record = screening_record(&job, 1);
        record.status = InterviewStatus::Disqualified;

        let prompt = builder().build_follow_up("What's the pay?", &record, &job);
        assert!(prompt.contains("Pay is $18-20/hour."));
        assert!(prompt.contains("Candidate's question: What's the pay?"));
        assert!(prompt.contains("Their status: disqualified"));
        assert!(prompt.contains("Their score: N/A"));
        assert!(!prompt.contains("MANDATORY QUALIFICATIONS PROGRESS"));
        assert!(!prompt.contains("Be a friendly recruiter."));
    }

    #[test]
    fn test_history_skips_greeting_merges_and_drops_trailing_user() {
        let transcript = vec![
            TranscriptEntry::agent("Hi! What's your name?"),
            TranscriptEntry::candidate("Alex"),
            TranscriptEntry::agent("Thanks Alex! Email?"),
            TranscriptEntry::candidate("alex@x.com"),
            TranscriptEntry::candidate("sorry, typo"),
            TranscriptEntry::agent("No problem."),
            TranscriptEntry::candidate("retrying"),
        ];
        let history = build_history(&transcript);

        let roles: Vec<ChatRole> = history.iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![ChatRole::User, ChatRole::Model, ChatRole::User, ChatRole::Model]
        );
        assert_eq!(history[2].text, "alex@x.com\nsorry, typo");
    }

    #[test]
    fn test_history_empty_before_first_candidate_message() {
        let transcript = vec![TranscriptEntry::agent("Hi! What's your name?")];
        assert!(build_history(&transcript).is_empty());
    }

    #[test]
    fn test_assets_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join(KNOWLEDGE_FILE)).unwrap();
        writeln!(file, "Terminal at 6708 Harney Road").unwrap();

        let assets = PromptAssets::load(dir.path());
        assert!(assets.policy.is_empty());
        assert!(assets.knowledge.contains("Harney Road"));
    }
}
