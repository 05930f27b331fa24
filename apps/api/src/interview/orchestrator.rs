//! Turn lifecycle: lock, load, prompt, invoke, parse, resolve, persist.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::llm_client::router::BackendRouter;

use super::job::{JobCatalog, JobProfile, DEFAULT_JOB_ID};
use super::locks::ConversationLocks;
use super::models::{
    InterviewRecord, InterviewStatus, Qualifications, RecordUpdate, TranscriptEntry,
};
use super::parser;
use super::prompt_builder::{build_history, PromptBuilder};
use super::prompts::{FOLLOW_UP_ISSUE_MESSAGE, TECHNICAL_ISSUE_MESSAGE};
use super::result::InterviewResult;
use super::store::{ConversationStateStore, StoreError};
use super::transitions;

#[derive(Debug, Error)]
pub enum InterviewError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unknown job: {0}")]
    UnknownJob(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationStart {
    pub conversation_id: Uuid,
    pub first_message: String,
}

/// Outward result of one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    pub agent_response: String,
    /// Entries actually applied this turn, if any.
    pub qualification_update: Option<Qualifications>,
    pub conversation_complete: bool,
    pub status: InterviewStatus,
    /// Informational exchange after the interview ended.
    pub is_follow_up: bool,
}

pub struct ConversationOrchestrator {
    store: Arc<dyn ConversationStateStore>,
    router: Arc<BackendRouter>,
    prompts: PromptBuilder,
    jobs: JobCatalog,
    locks: ConversationLocks,
    default_job_id: String,
}

impl ConversationOrchestrator {
    pub fn new(
        store: Arc<dyn ConversationStateStore>,
        router: Arc<BackendRouter>,
        prompts: PromptBuilder,
        jobs: JobCatalog,
    ) -> Self {
        Self {
            store,
            router,
            prompts,
            jobs,
            locks: ConversationLocks::new(),
            default_job_id: DEFAULT_JOB_ID.to_string(),
        }
    }

    pub fn with_default_job(mut self, job_id: impl Into<String>) -> Self {
        self.default_job_id = job_id.into();
        self
    }

    fn job(&self, job_id: &str) -> Result<Arc<JobProfile>, InterviewError> {
        self.jobs
            .get(job_id)
            .ok_or_else(|| InterviewError::UnknownJob(job_id.to_string()))
    }

    pub async fn start_conversation(
        &self,
        job_id: Option<&str>,
    ) -> Result<ConversationStart, InterviewError> {
        let job = self.job(job_id.unwrap_or(&self.default_job_id))?;

        let record = self.store.create(&job.job_id).await?;
        self.store
            .append_transcript(record.id, &[TranscriptEntry::agent(&job.opening_message)])
            .await?;

        info!("Started conversation {} for {}", record.id, job.title);
        Ok(ConversationStart {
            conversation_id: record.id,
            first_message: job.opening_message.clone(),
        })
    }

    /// Runs one turn. Model unavailability never surfaces as an error; only an
    /// unknown conversation or a store failure does.
    pub async fn process_turn(&self, id: Uuid, message: &str) -> Result<TurnResult, InterviewError> {
        let _turn = self.locks.acquire(id).await;

        let record = self.store.get(id).await?;
        let job = self.job(&record.job_id)?;

        if record.status.is_terminal() {
            return self.follow_up(&record, &job, message).await;
        }

        let started = Instant::now();
        let prompt = self.prompts.build(message, &record, &job);
        let history = build_history(&record.transcript);

        let response = match self.router.invoke(&prompt, &history, None).await {
            Ok(response) => response,
            Err(err) => {
                error!("Turn for conversation {id} failed, no model answered: {err}");
                self.keep_candidate_message(id, message).await;
                return Ok(TurnResult {
                    agent_response: TECHNICAL_ISSUE_MESSAGE.to_string(),
                    qualification_update: None,
                    conversation_complete: false,
                    status: record.status,
                    is_follow_up: false,
                });
            }
        };

        let reply = parser::parse(&response.text);
        if reply.is_degraded() {
            warn!(
                "Degraded reply from {} for conversation {id}",
                response.backend_used
            );
        }
        let decision = reply.decision;

        let changes = match &decision.qualification_update {
            Some(update) => transitions::qualification_changes(update, &record.qualifications, &job),
            None => Qualifications::default(),
        };

        let mut info = record.personal_info.clone();
        let name = non_empty(decision.candidate_name.as_deref());
        let email = non_empty(decision.candidate_email.as_deref());
        if let Some(name) = &name {
            info.name = Some(name.clone());
        }
        if let Some(email) = &email {
            info.email = Some(email.clone());
        }
        let mut qualifications = record.qualifications.clone();
        qualifications.merge(&changes);

        let transition =
            transitions::resolve(record.current_phase, &info, &qualifications, &decision, &job);
        if let Some(claimed) = decision.overall_score {
            if transition.overall_score.map(i64::from) != Some(claimed) {
                debug!(
                    "Model claimed score {claimed}, recorded {:?}",
                    transition.overall_score
                );
            }
        }

        let update = RecordUpdate {
            name,
            email,
            qualifications: changes.clone(),
            overall_score: transition.overall_score,
            status: Some(transition.status),
            current_phase: Some(transition.phase),
            disqualification_reason: transition.disqualification_reason.clone(),
            model_used: Some(response.backend_used.clone()),
            processing_time_ms: Some(started.elapsed().as_millis() as i64),
        };
        let entries = [
            TranscriptEntry::candidate(message),
            TranscriptEntry::agent(&decision.agent_message),
        ];
        let saved = self.store.commit_turn(id, &update, &entries).await?;

        info!(
            "Conversation {id}: phase {} -> {}, status {}, complete {}, model {} ({} attempts, {} fallbacks, {}ms)",
            record.current_phase,
            saved.current_phase,
            saved.status,
            transition.is_complete(),
            response.backend_used,
            response.attempts_made,
            response.fallbacks_used,
            response.total_duration.as_millis()
        );

        Ok(TurnResult {
            agent_response: decision.agent_message,
            qualification_update: (!changes.is_empty()).then_some(changes),
            conversation_complete: transition.is_complete(),
            status: saved.status,
            is_follow_up: false,
        })
    }

    /// Knowledge-only answer for a finished interview. Never touches
    /// qualifications, score, phase or status.
    async fn follow_up(
        &self,
        record: &InterviewRecord,
        job: &JobProfile,
        message: &str,
    ) -> Result<TurnResult, InterviewError> {
        let prompt = self.prompts.build_follow_up(message, record, job);

        let agent_response = match self.router.invoke(&prompt, &[], None).await {
            Ok(response) => {
                let answer = parser::parse(&response.text).decision.agent_message;
                self.store
                    .append_transcript(
                        record.id,
                        &[
                            TranscriptEntry::candidate(message),
                            TranscriptEntry::agent(&answer),
                        ],
                    )
                    .await?;
                answer
            }
            Err(err) => {
                error!("Follow-up for conversation {} failed: {err}", record.id);
                self.keep_candidate_message(record.id, message).await;
                FOLLOW_UP_ISSUE_MESSAGE.to_string()
            }
        };

        info!("Answered follow-up for finished conversation {}", record.id);
        Ok(TurnResult {
            agent_response,
            qualification_update: None,
            conversation_complete: true,
            status: record.status,
            is_follow_up: true,
        })
    }

    async fn keep_candidate_message(&self, id: Uuid, message: &str) {
        if let Err(err) = self
            .store
            .append_transcript(id, &[TranscriptEntry::candidate(message)])
            .await
        {
            warn!("Could not save candidate message for conversation {id}: {err}");
        }
    }

    pub async fn get_result(&self, id: Uuid) -> Result<InterviewResult, InterviewError> {
        let record = self.store.get(id).await?;
        let job = self.job(&record.job_id)?;
        Ok(InterviewResult::from_record(&record, &job))
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interview::models::{CheckStatus, MandatoryCheck, Phase, TranscriptRole};
    use crate::interview::store::InMemoryConversationStore;
    use crate::llm_client::backends::BackendConfig;
    use crate::llm_client::metrics::ModelMetrics;
    use crate::llm_client::testing::ScriptedClient;
    use std::time::Duration;

    struct Harness {
        orchestrator: ConversationOrchestrator,
        store: Arc<InMemoryConversationStore>,
        client: Arc<ScriptedClient>,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryConversationStore::new());
        let client = Arc::new(ScriptedClient::new());
        let router = BackendRouter::new(
            client.clone(),
            vec![BackendConfig::new("primary", 1, Duration::from_secs(5), 0)],
            Arc::new(ModelMetrics::new()),
        );
        let orchestrator = ConversationOrchestrator::new(
            store.clone(),
            Arc::new(router),
            PromptBuilder::default(),
            JobCatalog::default(),
        );
        Harness {
            orchestrator,
            store,
            client,
        }
    }

    /// Conversation with name and email captured, all mandatory checks passed.
    async fn screened(h: &Harness) -> Uuid {
        let id = h.orchestrator.start_conversation(None).await.unwrap().conversation_id;
        let mut update = RecordUpdate {
            name: Some("Alex".to_string()),
            email: Some("alex@x.com".to_string()),
            current_phase: Some(Phase::PreferredScoring),
            ..Default::default()
        };
        for requirement in &JobProfile::default_driver().mandatory {
            update.qualifications.mandatory.insert(
                requirement.key.clone(),
                MandatoryCheck {
                    status: CheckStatus::Qualified,
                    ..Default::default()
                },
            );
        }
        h.store.update_fields(id, &update).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_start_stores_opening_message() {
        let h = harness();
        let start = h.orchestrator.start_conversation(None).await.unwrap();

        let record = h.store.get(start.conversation_id).await.unwrap();
        assert_eq!(record.transcript.len(), 1);
        assert_eq!(record.transcript[0].role, TranscriptRole::Agent);
        assert_eq!(record.transcript[0].message, start.first_message);
        assert_eq!(record.current_phase, Phase::Introduction);
    }

    #[tokio::test]
    async fn test_unknown_job_is_rejected() {
        let h = harness();
        let err = h.orchestrator.start_conversation(Some("nope")).await.unwrap_err();
        assert!(matches!(err, InterviewError::UnknownJob(ref j) if j == "nope"));
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_not_found() {
        let h = harness();
        let err = h.orchestrator.process_turn(Uuid::new_v4(), "hi").await.unwrap_err();
        assert!(matches!(err, InterviewError::Store(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_screening_starts_only_after_name_and_email() {
        let h = harness();
        let id = h.orchestrator.start_conversation(None).await.unwrap().conversation_id;

        h.client.push_reply(
            r#"{"agentMessage":"Thanks Alex! What's your email?","candidateName":"Alex","nextPhase":"mandatory_screening"}"#,
        );
        let first = h.orchestrator.process_turn(id, "I'm Alex").await.unwrap();
        assert_eq!(first.agent_response, "Thanks Alex! What's your email?");
        let record = h.store.get(id).await.unwrap();
        assert_eq!(record.current_phase, Phase::Introduction);
        assert_eq!(record.personal_info.name.as_deref(), Some("Alex"));

        h.client.push_reply(
            r#"{"agentMessage":"Are you at least 21 years old?","candidateEmail":"alex@x.com","nextPhase":"mandatory_screening"}"#,
        );
        h.orchestrator.process_turn(id, "alex@x.com").await.unwrap();
        let record = h.store.get(id).await.unwrap();
        assert_eq!(record.current_phase, Phase::MandatoryScreening);
        assert_eq!(record.status, InterviewStatus::InProgress);
        assert_eq!(record.transcript.len(), 5);
        assert_eq!(record.model_used.as_deref(), Some("primary"));

        // history excludes the opening message and ends on the model's turn
        let calls = h.client.calls();
        assert_eq!(calls[1].history.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_check_disqualifies_and_follow_ups_never_mutate() {
        let h = harness();
        let id = h.orchestrator.start_conversation(None).await.unwrap().conversation_id;
        let setup = RecordUpdate {
            name: Some("Alex".to_string()),
            email: Some("alex@x.com".to_string()),
            current_phase: Some(Phase::MandatoryScreening),
            ..Default::default()
        };
        h.store.update_fields(id, &setup).await.unwrap();

        h.client.push_reply(
            r#"{"agentMessage":"Thanks for your honesty.","qualificationUpdate":{"mandatory":{"age":{"status":"disqualified","value":"19"}}},"nextPhase":"preferred_scoring"}"#,
        );
        let turn = h.orchestrator.process_turn(id, "I'm 19").await.unwrap();
        assert!(turn.conversation_complete);
        assert_eq!(turn.status, InterviewStatus::Disqualified);

        let before = h.store.get(id).await.unwrap();
        assert_eq!(before.overall_score, None);
        assert_eq!(before.current_phase, Phase::Completed);
        assert_eq!(
            before.disqualification_reason.as_deref(),
            Some("Did not meet mandatory requirement: Age 21+")
        );

        h.client.push_reply(
            r#"{"agentMessage":"Pay is $18-20/hour.","qualificationUpdate":{"mandatory":{"age":{"status":"qualified"}}},"finalStatus":"qualified","overallScore":99}"#,
        );
        let follow_up = h.orchestrator.process_turn(id, "What's the pay?").await.unwrap();
        assert!(follow_up.is_follow_up);
        assert_eq!(follow_up.agent_response, "Pay is $18-20/hour.");
        assert_eq!(follow_up.status, InterviewStatus::Disqualified);

        let after = h.store.get(id).await.unwrap();
        assert_eq!(after.qualifications, before.qualifications);
        assert_eq!(after.status, before.status);
        assert_eq!(after.overall_score, None);
        assert_eq!(after.current_phase, Phase::Completed);
        assert_eq!(after.transcript.len(), before.transcript.len() + 2);

        let last_call = h.client.calls().pop().unwrap();
        assert!(last_call.history.is_empty());
        assert!(!last_call.prompt.contains("preferred_scoring"));
    }

    #[tokio::test]
    async fn test_total_model_failure_keeps_candidate_message() {
        let h = harness();
        let id = h.orchestrator.start_conversation(None).await.unwrap().conversation_id;

        let turn = h.orchestrator.process_turn(id, "I'm Alex").await.unwrap();

        assert_eq!(turn.agent_response, TECHNICAL_ISSUE_MESSAGE);
        assert_eq!(turn.status, InterviewStatus::InProgress);
        assert!(!turn.conversation_complete);

        let record = h.store.get(id).await.unwrap();
        assert_eq!(record.transcript.len(), 2);
        assert_eq!(record.transcript[1].role, TranscriptRole::Candidate);
        assert_eq!(record.transcript[1].message, "I'm Alex");
        assert_eq!(record.current_phase, Phase::Introduction);
        assert_eq!(record.personal_info.name, None);
    }

    #[tokio::test]
    async fn test_completed_interview_is_scored_locally() {
        let h = harness();
        let id = screened(&h).await;

        h.client.push_reply(
            r#"{"agentMessage":"That's everything, thank you!",
                "qualificationUpdate":{"preferred":{
                    "deliveryExperience":{"score":25,"details":"3 years at UPS"},
                    "timeManagement":{"score":10},
                    "independence":{"score":"12"},
                    "militaryVeteran":{"isVeteran":true}}},
                "nextPhase":"completed","conversationComplete":true,
                "finalStatus":"qualified","overallScore":12}"#,
        );
        let turn = h.orchestrator.process_turn(id, "Yes, I served in the Army").await.unwrap();

        assert!(turn.conversation_complete);
        assert_eq!(turn.status, InterviewStatus::Qualified);
        let record = h.store.get(id).await.unwrap();
        // 50 + min(25, 20) + 10 + 12 + 5
        assert_eq!(record.overall_score, Some(97));
        assert_eq!(record.current_phase, Phase::Completed);
    }

    #[tokio::test]
    async fn test_premature_completion_is_clamped() {
        let h = harness();
        let id = screened(&h).await;

        h.client.push_reply(
            r#"{"agentMessage":"Great, thanks!","qualificationUpdate":{"preferred":{"timeManagement":{"score":10}}},"conversationComplete":true,"finalStatus":"qualified"}"#,
        );
        let turn = h.orchestrator.process_turn(id, "I'm very punctual").await.unwrap();

        assert!(!turn.conversation_complete);
        assert_eq!(turn.status, InterviewStatus::InProgress);
        let record = h.store.get(id).await.unwrap();
        assert_eq!(record.current_phase, Phase::PreferredScoring);
        assert_eq!(record.overall_score, None);
        assert_eq!(record.qualifications.preferred.len(), 1);
    }

    #[tokio::test]
    async fn test_degraded_reply_still_answers() {
        let h = harness();
        let id = h.orchestrator.start_conversation(None).await.unwrap().conversation_id;

        h.client.push_reply("Sorry, could you repeat your name?");
        let turn = h.orchestrator.process_turn(id, "uh").await.unwrap();

        assert_eq!(turn.agent_response, "Sorry, could you repeat your name?");
        assert_eq!(turn.qualification_update, None);
        let record = h.store.get(id).await.unwrap();
        assert_eq!(record.transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_turns_append_whole_pairs() {
        let h = Arc::new(harness());
        let id = h.orchestrator.start_conversation(None).await.unwrap().conversation_id;
        for i in 0..4 {
            h.client.push_reply(format!(r#"{{"agentMessage":"reply {i}"}}"#));
        }

        let tasks: Vec<_> = (0..4)
            .map(|i| {
                let h = h.clone();
                tokio::spawn(async move {
                    h.orchestrator.process_turn(id, &format!("message {i}")).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let record = h.store.get(id).await.unwrap();
        assert_eq!(record.transcript.len(), 9);
        for pair in record.transcript[1..].chunks(2) {
            assert_eq!(pair[0].role, TranscriptRole::Candidate);
            assert_eq!(pair[1].role, TranscriptRole::Agent);
        }
    }
}
