//! Job model: the durable unit of work for a scheduled email send.
//!
//! See [`claim_jobs`] for the atomic batch-claim primitive this whole system's
//! concurrency safety reduces to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;

use crate::common::entity_ids::{JobId, RunId, StepId};

pub const MAX_ATTEMPTS: i32 = 5;
const LAST_ERROR_MAX_LEN: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Scheduled,
    Claimed,
    Sent,
    Failed,
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = JobId::new())]
    pub id: JobId,

    pub owner_id: String,
    pub to_email: String,

    #[builder(default, setter(strip_option))]
    pub subject: Option<String>,
    #[builder(default, setter(strip_option))]
    pub body_text: Option<String>,

    pub scheduled_for: DateTime<Utc>,

    #[builder(default)]
    pub status: JobStatus,
    #[builder(default = 0)]
    pub attempts: i32,
    #[builder(default, setter(strip_option))]
    pub last_error: Option<String>,
    #[builder(default, setter(strip_option))]
    pub message_id: Option<String>,

    #[builder(default, setter(strip_option))]
    pub sequence_run_id: Option<RunId>,
    #[builder(default, setter(strip_option))]
    pub step_id: Option<StepId>,
    #[builder(default, setter(strip_option))]
    pub timezone: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

const JOB_COLUMNS: &str = "id, owner_id, to_email, subject, body_text, scheduled_for, \
     status, attempts, last_error, message_id, sequence_run_id, step_id, timezone, \
     created_at, updated_at";

impl Job {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            INSERT INTO jobs ({JOB_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&self.owner_id)
        .bind(&self.to_email)
        .bind(&self.subject)
        .bind(&self.body_text)
        .bind(self.scheduled_for)
        .bind(self.status)
        .bind(self.attempts)
        .bind(&self.last_error)
        .bind(&self.message_id)
        .bind(self.sequence_run_id)
        .bind(self.step_id)
        .bind(&self.timezone)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_id(id: JobId, pool: &PgPool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Atomically select up to `limit` scheduled-and-due rows, flip them to
    /// `claimed`, and return them. `FOR UPDATE SKIP LOCKED` means two
    /// concurrent invocations never return overlapping rows.
    pub async fn claim_jobs(limit: i64, pool: &PgPool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE status = 'scheduled' AND scheduled_for <= NOW()
                ORDER BY scheduled_for ASC, created_at ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET status = 'claimed', updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    pub async fn mark_sent(
        &self,
        message_id: Option<&str>,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE jobs
            SET status = 'sent', message_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(message_id)
        .fetch_one(pool)
        .await
    }

    /// Apply the retry policy on a send failure: reschedule with exponential
    /// backoff if attempts remain, otherwise transition to the terminal
    /// `failed` state. `error` is truncated to 1000 characters before being
    /// persisted.
    pub async fn record_failure(
        &self,
        error: &str,
        now: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        let truncated: String = error.chars().take(LAST_ERROR_MAX_LEN).collect();
        let next_attempts = self.attempts + 1;

        if next_attempts < MAX_ATTEMPTS {
            // 2^(n+1) minutes where n = self.attempts is the pre-increment
            // count: first failure (n=0) backs off 2 minutes, second (n=1)
            // backs off 4, and so on.
            let delay_minutes = 2i64.pow((self.attempts + 1) as u32);
            let scheduled_for = now + chrono::Duration::minutes(delay_minutes);
            sqlx::query_as::<_, Self>(&format!(
                r#"
                UPDATE jobs
                SET status = 'scheduled', attempts = $2, last_error = $3,
                    scheduled_for = $4, updated_at = NOW()
                WHERE id = $1
                RETURNING {JOB_COLUMNS}
                "#
            ))
            .bind(self.id)
            .bind(next_attempts)
            .bind(&truncated)
            .bind(scheduled_for)
            .fetch_one(pool)
            .await
        } else {
            sqlx::query_as::<_, Self>(&format!(
                r#"
                UPDATE jobs
                SET status = 'failed', attempts = $2, last_error = $3, updated_at = NOW()
                WHERE id = $1
                RETURNING {JOB_COLUMNS}
                "#
            ))
            .bind(self.id)
            .bind(next_attempts)
            .bind(&truncated)
            .fetch_one(pool)
            .await
        }
    }

    pub async fn mark_failed_immediately(
        &self,
        error: &str,
        pool: &PgPool,
    ) -> Result<Self, sqlx::Error> {
        let truncated: String = error.chars().take(LAST_ERROR_MAX_LEN).collect();
        sqlx::query_as::<_, Self>(&format!(
            r#"
            UPDATE jobs
            SET status = 'failed', attempts = attempts + 1, last_error = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {JOB_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(&truncated)
        .fetch_one(pool)
        .await
    }
}
