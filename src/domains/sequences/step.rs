//! Step: an ordered template within a sequence. `(sequence_id, step_order)`
//! is unique; a conflicting insert surfaces as `AppError::Conflict` (409),
//! not a 500, per §6.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};

use crate::common::entity_ids::{SequenceId, StepId};
use crate::kernel::AppError;

#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub sequence_id: SequenceId,
    pub step_order: i32,
    pub subject: Option<String>,
    pub body_text: Option<String>,
    pub delay_days: i32,
    pub created_at: DateTime<Utc>,
}

const STEP_COLUMNS: &str =
    "id, sequence_id, step_order, subject, body_text, delay_days, created_at";

/// Input for creating a single step, shared by the bulk-create and
/// upsert endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct NewStep {
    pub step_order: i32,
    pub subject: Option<String>,
    pub body_text: Option<String>,
    #[serde(default)]
    pub delay_days: i32,
}

impl Step {
    pub async fn list_for_sequence(
        sequence_id: SequenceId,
        pool: &PgPool,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {STEP_COLUMNS} FROM sequence_steps \
             WHERE sequence_id = $1 ORDER BY step_order ASC"
        ))
        .bind(sequence_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_id(id: StepId, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!("SELECT {STEP_COLUMNS} FROM sequence_steps WHERE id = $1"))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// The step with the smallest `step_order` strictly greater than
    /// `current_step` within the same sequence — §4.F step 6.
    pub async fn next_after(
        sequence_id: SequenceId,
        current_step: i32,
        pool: &PgPool,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {STEP_COLUMNS} FROM sequence_steps \
             WHERE sequence_id = $1 AND step_order > $2 \
             ORDER BY step_order ASC LIMIT 1"
        ))
        .bind(sequence_id)
        .bind(current_step)
        .fetch_optional(pool)
        .await
    }

    /// Insert one step. Translates the unique-constraint violation on
    /// `(sequence_id, step_order)` into `AppError::Conflict`.
    pub async fn insert(
        sequence_id: SequenceId,
        new_step: &NewStep,
        pool: &PgPool,
    ) -> Result<Self, AppError> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO sequence_steps
                (id, sequence_id, step_order, subject, body_text, delay_days, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW())
            RETURNING {STEP_COLUMNS}
            "#
        ))
        .bind(StepId::new())
        .bind(sequence_id)
        .bind(new_step.step_order)
        .bind(&new_step.subject)
        .bind(&new_step.body_text)
        .bind(new_step.delay_days)
        .fetch_one(pool)
        .await
        .map_err(map_step_order_conflict)
    }

    /// Insert or update one step by `id` (upsert endpoint). When `id` is
    /// absent, behaves like [`Step::insert`].
    pub async fn upsert(
        sequence_id: SequenceId,
        id: Option<StepId>,
        step_order: Option<i32>,
        subject: &str,
        body_text: &str,
        delay_days: Option<i32>,
        pool: &PgPool,
    ) -> Result<Self, AppError> {
        match id {
            Some(id) => sqlx::query_as::<_, Self>(&format!(
                r#"
                UPDATE sequence_steps
                SET subject = $2, body_text = $3,
                    step_order = COALESCE($4, step_order),
                    delay_days = COALESCE($5, delay_days)
                WHERE id = $1 AND sequence_id = $6
                RETURNING {STEP_COLUMNS}
                "#
            ))
            .bind(id)
            .bind(subject)
            .bind(body_text)
            .bind(step_order)
            .bind(delay_days)
            .bind(sequence_id)
            .fetch_optional(pool)
            .await
            .map_err(map_step_order_conflict)?
            .ok_or_else(|| AppError::NotFound(format!("step {id} not found"))),
            None => {
                let new_step = NewStep {
                    step_order: step_order
                        .ok_or_else(|| AppError::Validation("step_order is required for a new step".into()))?,
                    subject: Some(subject.to_string()),
                    body_text: Some(body_text.to_string()),
                    delay_days: delay_days.unwrap_or(0),
                };
                Step::insert(sequence_id, &new_step, pool).await
            }
        }
    }
}

fn map_step_order_conflict(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.is_unique_violation() {
            return AppError::Conflict("step_order already in use for this sequence".into());
        }
    }
    AppError::Db(err)
}
