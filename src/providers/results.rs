// src/providers/results.rs

use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::score::GroupScore;
use crate::models::session::CandidateRef;
use crate::providers::ProviderError;

/// The results collaborator: correlates a session's start with its score
/// submission and guards against re-attempts.
#[async_trait]
pub trait ResultsSink: Send + Sync {
    /// Whether the candidate already has a recorded attempt for this
    /// exam/job combination.
    async fn check_existing_attempt(
        &self,
        candidate: &CandidateRef,
    ) -> Result<bool, ProviderError>;

    /// Opens a proctoring event for the session. Called at the entry into
    /// the monitored phase; a failure degrades to "no event id" and never
    /// blocks the exam.
    async fn record_proctoring_start(
        &self,
        candidate: &CandidateRef,
    ) -> Result<i64, ProviderError>;

    /// Persists the score report. Called exactly once, only for sessions
    /// that completed.
    async fn submit_scores(
        &self,
        candidate: &CandidateRef,
        proctoring_event_id: Option<i64>,
        groups: &[GroupScore],
    ) -> Result<(), ProviderError>;
}

/// Postgres-backed results sink.
#[derive(Clone)]
pub struct PgResultsSink {
    pool: PgPool,
}

impl PgResultsSink {
    pub fn new(pool: PgPool) -> Self {
        PgResultsSink { pool }
    }
}

#[async_trait]
impl ResultsSink for PgResultsSink {
    async fn check_existing_attempt(
        &self,
        candidate: &CandidateRef,
    ) -> Result<bool, ProviderError> {
        let existing = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT 1 FROM exam_scores
            WHERE employee_id = $1 AND exam_id = $2 AND job_id IS NOT DISTINCT FROM $3
            LIMIT 1
            "#,
        )
        .bind(candidate.employee_id)
        .bind(candidate.exam_id)
        .bind(candidate.job.posting_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to check existing attempt for {}: {:?}", candidate, e);
            ProviderError::from(e)
        })?;

        Ok(existing.is_some())
    }

    async fn record_proctoring_start(
        &self,
        candidate: &CandidateRef,
    ) -> Result<i64, ProviderError> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO proctoring_events (employee_id, exam_id, job_id, started_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(candidate.employee_id)
        .bind(candidate.exam_id)
        .bind(candidate.job.posting_id())
        .bind(chrono::Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to open proctoring event for {}: {:?}", candidate, e);
            ProviderError::from(e)
        })?;

        Ok(id)
    }

    async fn submit_scores(
        &self,
        candidate: &CandidateRef,
        proctoring_event_id: Option<i64>,
        groups: &[GroupScore],
    ) -> Result<(), ProviderError> {
        let mut tx = self.pool.begin().await.map_err(ProviderError::from)?;

        let submitted_at = chrono::Utc::now();
        for group in groups {
            sqlx::query(
                r#"
                INSERT INTO exam_scores
                    (employee_id, exam_id, job_id, proctoring_event_id,
                     group_id, total, correct, submitted_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(candidate.employee_id)
            .bind(candidate.exam_id)
            .bind(candidate.job.posting_id())
            .bind(proctoring_event_id)
            .bind(group.group_id)
            .bind(group.total)
            .bind(group.correct)
            .bind(submitted_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert score row for {}: {:?}", candidate, e);
                ProviderError::from(e)
            })?;
        }

        tx.commit().await.map_err(ProviderError::from)?;
        Ok(())
    }
}
