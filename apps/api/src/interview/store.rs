//! Interview record persistence.
//!
//! `ConversationStateStore` is the only way the orchestrator touches records.
//! Updates are partial: absent fields are left alone and qualification maps
//! are merged entry by entry, never overwritten wholesale.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::models::{
    InterviewRecord, InterviewStatus, MandatoryCheck, PersonalInfo, Phase, PreferredScore,
    Qualifications, RecordUpdate, TranscriptEntry, TranscriptRole, VeteranBonus,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Conversation {0} not found")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

#[async_trait]
pub trait ConversationStateStore: Send + Sync {
    async fn create(&self, job_id: &str) -> Result<InterviewRecord, StoreError>;

    /// Fails with `NotFound` for an unknown id.
    async fn get(&self, id: Uuid) -> Result<InterviewRecord, StoreError>;

    async fn update_fields(
        &self,
        id: Uuid,
        update: &RecordUpdate,
    ) -> Result<InterviewRecord, StoreError>;

    /// Appends in order; all entries land or none do.
    async fn append_transcript(
        &self,
        id: Uuid,
        entries: &[TranscriptEntry],
    ) -> Result<(), StoreError>;

    /// Field update plus transcript append as one logical write.
    async fn commit_turn(
        &self,
        id: Uuid,
        update: &RecordUpdate,
        entries: &[TranscriptEntry],
    ) -> Result<InterviewRecord, StoreError> {
        self.update_fields(id, update).await?;
        self.append_transcript(id, entries).await?;
        self.get(id).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory
// ────────────────────────────────────────────────────────────────────────────

/// Process-local store for tests and database-less local runs.
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    records: RwLock<HashMap<Uuid, InterviewRecord>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStateStore for InMemoryConversationStore {
    async fn create(&self, job_id: &str) -> Result<InterviewRecord, StoreError> {
        let record = InterviewRecord::new(job_id);
        self.records.write().insert(record.id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<InterviewRecord, StoreError> {
        self.records
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: &RecordUpdate,
    ) -> Result<InterviewRecord, StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.apply(update);
        Ok(record.clone())
    }

    async fn append_transcript(
        &self,
        id: Uuid,
        entries: &[TranscriptEntry],
    ) -> Result<(), StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.transcript.extend_from_slice(entries);
        Ok(())
    }

    async fn commit_turn(
        &self,
        id: Uuid,
        update: &RecordUpdate,
        entries: &[TranscriptEntry],
    ) -> Result<InterviewRecord, StoreError> {
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        record.apply(update);
        record.transcript.extend_from_slice(entries);
        Ok(record.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct InterviewRow {
    id: Uuid,
    job_id: String,
    candidate_name: Option<String>,
    candidate_email: Option<String>,
    mandatory: Json<BTreeMap<String, MandatoryCheck>>,
    preferred: Json<BTreeMap<String, PreferredScore>>,
    veteran: Option<Json<VeteranBonus>>,
    overall_score: Option<i32>,
    status: String,
    current_phase: String,
    disqualification_reason: Option<String>,
    model_used: Option<String>,
    processing_time_ms: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct TranscriptRow {
    role: String,
    message: String,
    created_at: DateTime<Utc>,
}

impl InterviewRow {
    fn into_record(self, transcript: Vec<TranscriptRow>) -> Result<InterviewRecord, StoreError> {
        let status = InterviewStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown status {:?}", self.status)))?;
        let current_phase = Phase::parse(&self.current_phase)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown phase {:?}", self.current_phase)))?;
        let transcript = transcript
            .into_iter()
            .map(|row| -> Result<TranscriptEntry, StoreError> {
                let role = TranscriptRole::parse(&row.role)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown role {:?}", row.role)))?;
                Ok(TranscriptEntry {
                    role,
                    message: row.message,
                    timestamp: row.created_at,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InterviewRecord {
            id: self.id,
            job_id: self.job_id,
            personal_info: PersonalInfo {
                name: self.candidate_name,
                email: self.candidate_email,
            },
            qualifications: Qualifications {
                mandatory: self.mandatory.0,
                preferred: self.preferred.0,
                veteran: self.veteran.map(|v| v.0),
            },
            overall_score: self.overall_score,
            status,
            current_phase,
            disqualification_reason: self.disqualification_reason,
            transcript,
            model_used: self.model_used,
            processing_time_ms: self.processing_time_ms,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PgConversationStore {
    pool: PgPool,
}

impl PgConversationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Single-statement partial update. JSONB `||` merges qualification entries.
async fn apply_update(
    conn: &mut PgConnection,
    id: Uuid,
    update: &RecordUpdate,
) -> Result<(), StoreError> {
    let quals = &update.qualifications;
    let result = sqlx::query(
        r#"
        UPDATE interviews SET
            candidate_name          = COALESCE($2, candidate_name),
            candidate_email         = COALESCE($3, candidate_email),
            mandatory               = mandatory || $4,
            preferred               = preferred || $5,
            veteran                 = COALESCE($6, veteran),
            overall_score           = COALESCE($7, overall_score),
            status                  = COALESCE($8, status),
            current_phase           = COALESCE($9, current_phase),
            disqualification_reason = COALESCE($10, disqualification_reason),
            model_used              = COALESCE($11, model_used),
            processing_time_ms      = COALESCE($12, processing_time_ms),
            updated_at              = NOW()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(update.name.as_deref())
    .bind(update.email.as_deref())
    .bind(Json(&quals.mandatory))
    .bind(Json(&quals.preferred))
    .bind(quals.veteran.map(Json))
    .bind(update.overall_score)
    .bind(update.status.map(|s| s.as_str()))
    .bind(update.current_phase.map(|p| p.as_str()))
    .bind(update.disqualification_reason.as_deref())
    .bind(update.model_used.as_deref())
    .bind(update.processing_time_ms)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }
    Ok(())
}

async fn append_entries(
    conn: &mut PgConnection,
    id: Uuid,
    entries: &[TranscriptEntry],
) -> Result<(), StoreError> {
    // also locks the parent row so concurrent appends keep their order
    let touched = sqlx::query("UPDATE interviews SET updated_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    if touched.rows_affected() == 0 {
        return Err(StoreError::NotFound(id));
    }

    for entry in entries {
        sqlx::query(
            "INSERT INTO transcript_entries (interview_id, role, message, created_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id)
        .bind(entry.role.as_str())
        .bind(&entry.message)
        .bind(entry.timestamp)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl ConversationStateStore for PgConversationStore {
    async fn create(&self, job_id: &str) -> Result<InterviewRecord, StoreError> {
        let record = InterviewRecord::new(job_id);
        sqlx::query(
            r#"
            INSERT INTO interviews (id, job_id, status, current_phase, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id)
        .bind(&record.job_id)
        .bind(record.status.as_str())
        .bind(record.current_phase.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        info!("Created conversation {} for job {job_id}", record.id);
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<InterviewRecord, StoreError> {
        let row: Option<InterviewRow> = sqlx::query_as("SELECT * FROM interviews WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let row = row.ok_or(StoreError::NotFound(id))?;

        let transcript: Vec<TranscriptRow> = sqlx::query_as(
            "SELECT role, message, created_at FROM transcript_entries \
             WHERE interview_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        row.into_record(transcript)
    }

    async fn update_fields(
        &self,
        id: Uuid,
        update: &RecordUpdate,
    ) -> Result<InterviewRecord, StoreError> {
        let mut conn = self.pool.acquire().await?;
        apply_update(&mut conn, id, update).await?;
        debug!("Updated fields for conversation {id}");
        self.get(id).await
    }

    async fn append_transcript(
        &self,
        id: Uuid,
        entries: &[TranscriptEntry],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        append_entries(&mut tx, id, entries).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_turn(
        &self,
        id: Uuid,
        update: &RecordUpdate,
        entries: &[TranscriptEntry],
    ) -> Result<InterviewRecord, StoreError> {
        let mut tx = self.pool.begin().await?;
        apply_update(&mut tx, id, update).await?;
        append_entries(&mut tx, id, entries).await?;
        tx.commit().await?;
        self.get(id).await
    }
}
