// src/providers/content.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::models::question::{OptionLabel, Question};
use crate::providers::ProviderError;
use crate::utils::html::clean_html;

/// Reference to one question group of an exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupRef {
    pub id: i64,
    pub position: i32,
}

/// The exam content collaborator. Consulted exactly once per session, at
/// the transition into the monitored phase.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn fetch_exam_groups(&self, exam_id: i64) -> Result<Vec<GroupRef>, ProviderError>;

    async fn fetch_group_items(&self, group_id: i64) -> Result<Vec<Question>, ProviderError>;
}

/// Loads the full question set for an exam: groups in their stored order,
/// each group's items in their stored order, concatenated. Question and
/// option text is sanitized before it can reach any client.
pub async fn load_exam_questions(
    provider: &dyn ContentProvider,
    exam_id: i64,
) -> Result<Vec<Question>, ProviderError> {
    let mut groups = provider.fetch_exam_groups(exam_id).await?;
    groups.sort_by_key(|g| g.position);

    let mut questions = Vec::new();
    for group in &groups {
        let mut items = provider.fetch_group_items(group.id).await?;
        items.sort_by_key(|q| q.position);
        for mut question in items {
            question.content = clean_html(&question.content);
            for option in &mut question.options {
                *option = clean_html(option);
            }
            questions.push(question);
        }
    }
    Ok(questions)
}

/// Postgres-backed content provider.
#[derive(Clone)]
pub struct PgContentProvider {
    pool: PgPool,
}

impl PgContentProvider {
    pub fn new(pool: PgPool) -> Self {
        PgContentProvider { pool }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: i64,
    position: i32,
}

#[derive(sqlx::FromRow)]
struct QuestionRow {
    id: i64,
    group_id: i64,
    content: String,
    option_a: String,
    option_b: String,
    option_c: String,
    option_d: String,
    correct: String,
    position: i32,
}

impl QuestionRow {
    fn into_question(self) -> Result<Question, ProviderError> {
        let correct = OptionLabel::parse(&self.correct).ok_or_else(|| {
            ProviderError(format!(
                "question {} has invalid answer key '{}'",
                self.id, self.correct
            ))
        })?;
        Ok(Question {
            id: self.id,
            group_id: self.group_id,
            content: self.content,
            options: [self.option_a, self.option_b, self.option_c, self.option_d],
            correct,
            position: self.position,
        })
    }
}

#[async_trait]
impl ContentProvider for PgContentProvider {
    async fn fetch_exam_groups(&self, exam_id: i64) -> Result<Vec<GroupRef>, ProviderError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            "SELECT id, position FROM question_groups WHERE exam_id = $1 ORDER BY position",
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch groups for exam {}: {:?}", exam_id, e);
            ProviderError::from(e)
        })?;

        Ok(rows
            .into_iter()
            .map(|r| GroupRef {
                id: r.id,
                position: r.position,
            })
            .collect())
    }

    async fn fetch_group_items(&self, group_id: i64) -> Result<Vec<Question>, ProviderError> {
        let rows = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, group_id, content, option_a, option_b, option_c, option_d, correct, position
            FROM questions
            WHERE group_id = $1
            ORDER BY position
            "#,
        )
        .bind(group_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch items for group {}: {:?}", group_id, e);
            ProviderError::from(e)
        })?;

        rows.into_iter().map(QuestionRow::into_question).collect()
    }
}
